use crate::settings::Settings;
use once_cell::sync::OnceCell;
use pricefeed_application::event_consumer::EventConsumerImplParameters;
use pricefeed_application::moving_average_processor::MovingAverageProcessorImplParameters;
use pricefeed_application::{
    EventConsumerImpl, JobOrchestratorImpl, MovingAverageProcessorImpl, PollingServiceImpl,
};
use pricefeed_domain::DEFAULT_WINDOW_SIZE;
use pricefeed_infrastructure::broker::{KafkaEventPublisherParameters, KafkaEventSourceParameters};
use pricefeed_infrastructure::gateways::{FetcherCache, SimulatedProviderRegistryParameters};
use pricefeed_infrastructure::rate_limiting::{ProviderRateLimiterParameters, ProviderSlots};
use pricefeed_infrastructure::redis_connection::RedisConnectionManagerParameters;
use pricefeed_infrastructure::{
    KafkaEventPublisher, KafkaEventSource, ProviderRateLimiter, RedisConnectionManager,
    RedisJobRepository, RedisMovingAverageRepository, RedisObservationRepository,
    SimulatedProviderRegistry,
};
use shaku::module;
use std::time::Duration;

module! {
    pub AppModule {
        components = [
            RedisConnectionManager,
            RedisJobRepository,
            RedisObservationRepository,
            RedisMovingAverageRepository,
            ProviderRateLimiter,
            SimulatedProviderRegistry,
            KafkaEventPublisher,
            PollingServiceImpl,
            JobOrchestratorImpl,
            KafkaEventSource,
            MovingAverageProcessorImpl,
            EventConsumerImpl
        ],
        providers = []
    }
}

pub fn create_app_module(settings: &Settings) -> AppModule {
    AppModule::builder()
        .with_component_parameters::<RedisConnectionManager>(RedisConnectionManagerParameters {
            url: settings.redis.url.clone(),
            client: OnceCell::new(),
        })
        .with_component_parameters::<ProviderRateLimiter>(ProviderRateLimiterParameters {
            limits: settings.rate_limit_table(),
            slots: ProviderSlots::default(),
        })
        .with_component_parameters::<SimulatedProviderRegistry>(
            SimulatedProviderRegistryParameters {
                providers: settings.simulator.providers.clone(),
                base_price: settings.simulator.base_price,
                fetchers: FetcherCache::default(),
            },
        )
        .with_component_parameters::<KafkaEventPublisher>(KafkaEventPublisherParameters {
            settings: settings.kafka.clone(),
            producer: OnceCell::new(),
        })
        .with_component_parameters::<KafkaEventSource>(KafkaEventSourceParameters {
            settings: settings.kafka.clone(),
            consumer: OnceCell::new(),
        })
        .with_component_parameters::<MovingAverageProcessorImpl>(
            MovingAverageProcessorImplParameters {
                window_size: DEFAULT_WINDOW_SIZE,
            },
        )
        .with_component_parameters::<EventConsumerImpl>(EventConsumerImplParameters {
            poll_timeout: settings.kafka.poll_timeout(),
            failure_backoff: Duration::from_secs(1),
        })
        .build()
}
