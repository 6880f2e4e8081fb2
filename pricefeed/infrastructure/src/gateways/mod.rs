pub mod simulated;

pub use simulated::{
    default_providers, extract_price, FetcherCache, SimulatedPriceFetcher,
    SimulatedProviderRegistry, SimulatedProviderRegistryParameters,
};
