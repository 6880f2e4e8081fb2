pub mod limiter;

pub use limiter::{
    default_interval, ProviderRateLimiter, ProviderRateLimiterParameters, ProviderSlots,
    RateLimitTable,
};
