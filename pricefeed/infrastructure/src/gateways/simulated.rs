use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pricefeed_application::ports::{FetchError, FetchedPrice, PriceFetcher, ProviderRegistry};
use pricefeed_domain::{Observation, Provider};
use rand::Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use shaku::Component;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

/// Random walk around a base price, answered in the payload shape of the given provider.
pub struct SimulatedPriceFetcher {
    provider: Provider,
    base_price: f64,
    last_prices: Mutex<HashMap<String, f64>>,
}

impl SimulatedPriceFetcher {
    pub fn new(provider: Provider, base_price: f64) -> Self {
        Self {
            provider,
            base_price,
            last_prices: Mutex::new(HashMap::new()),
        }
    }

    fn next_price(&self, symbol: &str) -> Result<f64, FetchError> {
        let mut last_prices = self
            .last_prices
            .lock()
            .map_err(|_| FetchError::InvalidResponse("price state poisoned".to_string()))?;

        let last = last_prices
            .get(symbol)
            .copied()
            .unwrap_or(self.base_price);
        let change = rand::rng().random_range(-2.0..2.0);
        // Keep the walk strictly positive.
        let next = (last + change).max(0.01);

        last_prices.insert(symbol.to_string(), next);
        Ok(next)
    }

    fn raw_payload(&self, symbol: &str, price: f64, at: DateTime<Utc>) -> Value {
        let price = format!("{:.4}", price);
        match self.provider {
            Provider::AlphaVantage => json!({
                "Global Quote": {
                    "01. symbol": symbol,
                    "05. price": price,
                    "07. latest trading day": at.format("%Y-%m-%d").to_string(),
                }
            }),
            Provider::YahooFinance => json!({
                "quoteResponse": {
                    "result": [{
                        "symbol": symbol,
                        "regularMarketPrice": price,
                        "regularMarketTime": at.timestamp(),
                    }],
                    "error": null,
                }
            }),
            Provider::Finnhub => json!({
                "c": price,
                "t": at.timestamp(),
            }),
        }
    }
}

/// Reads the price back out of a provider payload.
pub fn extract_price(provider: Provider, symbol: &str, raw: &Value) -> Result<Decimal, FetchError> {
    let field = match provider {
        Provider::AlphaVantage => raw.get("Global Quote").and_then(|quote| quote.get("05. price")),
        Provider::YahooFinance => raw
            .pointer("/quoteResponse/result/0")
            .and_then(|quote| quote.get("regularMarketPrice")),
        Provider::Finnhub => raw.get("c"),
    };

    let Some(field) = field else {
        return Err(FetchError::NoData(symbol.to_string()));
    };

    let parsed = match field {
        Value::String(s) => Decimal::from_str(s).ok(),
        Value::Number(n) => n.as_f64().and_then(Decimal::from_f64),
        _ => None,
    };

    parsed.ok_or_else(|| {
        FetchError::InvalidResponse(format!("unparseable price {} for {}", field, symbol))
    })
}

#[async_trait]
impl PriceFetcher for SimulatedPriceFetcher {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn fetch(&self, symbol: &str) -> Result<FetchedPrice, FetchError> {
        let now = Utc::now();
        let raw = self.raw_payload(symbol, self.next_price(symbol)?, now);
        let price = extract_price(self.provider, symbol, &raw)?;

        let observation = Observation::new(
            Uuid::new_v4().to_string(),
            symbol.to_string(),
            self.provider,
            price,
            now,
        )
        .map_err(|e| FetchError::InvalidResponse(e.to_string()))?;

        debug!(
            provider = self.provider.as_str(),
            "Simulated {} at {}", symbol, price
        );
        Ok(FetchedPrice { observation, raw })
    }
}

pub fn default_providers() -> Vec<Provider> {
    Provider::ALL.to_vec()
}

#[derive(Component)]
#[shaku(interface = ProviderRegistry)]
pub struct SimulatedProviderRegistry {
    #[shaku(default = default_providers())]
    providers: Vec<Provider>,

    #[shaku(default = 100.0)]
    base_price: f64,

    fetchers: FetcherCache,
}

/// Fetchers are built on first use so that each keeps its random walk across cycles.
#[derive(Default)]
pub struct FetcherCache {
    fetchers: Mutex<HashMap<Provider, Arc<SimulatedPriceFetcher>>>,
}

impl SimulatedProviderRegistry {
    pub fn new(providers: Vec<Provider>, base_price: f64) -> Self {
        Self {
            providers,
            base_price,
            fetchers: FetcherCache::default(),
        }
    }
}

impl ProviderRegistry for SimulatedProviderRegistry {
    fn fetcher(&self, provider: Provider) -> Option<Arc<dyn PriceFetcher>> {
        if !self.providers.contains(&provider) {
            return None;
        }

        let mut fetchers = self.fetchers.fetchers.lock().ok()?;
        let fetcher = fetchers
            .entry(provider)
            .or_insert_with(|| Arc::new(SimulatedPriceFetcher::new(provider, self.base_price)))
            .clone();
        Some(fetcher)
    }

    fn providers(&self) -> Vec<Provider> {
        self.providers.clone()
    }
}
