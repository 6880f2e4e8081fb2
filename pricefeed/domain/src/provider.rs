use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upstream market data provider a polling job fetches from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    AlphaVantage,
    YahooFinance,
    Finnhub,
}

impl Provider {
    pub const ALL: [Provider; 3] = [
        Provider::AlphaVantage,
        Provider::YahooFinance,
        Provider::Finnhub,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::AlphaVantage => "alpha_vantage",
            Provider::YahooFinance => "yahoo_finance",
            Provider::Finnhub => "finnhub",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "alpha_vantage" => Ok(Provider::AlphaVantage),
            "yahoo_finance" => Ok(Provider::YahooFinance),
            "finnhub" => Ok(Provider::Finnhub),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown provider '{0}'")]
pub struct UnknownProvider(pub String);
