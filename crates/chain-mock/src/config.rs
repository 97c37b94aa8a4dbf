use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use wallet_interface::{CoinType, DEFAULT_SUBSCRIPTION_BUFFER};

use crate::error::MockError;

/// Seconds between consecutive mock blocks.
pub const DEFAULT_BLOCK_INTERVAL_SECS: i64 = 600;

/// Upper bound on `blockIntervalSecs` (one year).
pub const MAX_BLOCK_INTERVAL_SECS: i64 = 365 * 24 * 60 * 60;

/// Timestamp of the mock genesis block (2009-01-03T18:15:05Z).
pub const DEFAULT_GENESIS_TIME: i64 = 1_231_006_505;

/// Settings for a `MockChain`. Missing JSON fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MockChainConfig {
    pub coin_type: CoinType,
    /// Capacity of each subscription channel.
    pub subscription_buffer: usize,
    pub block_interval_secs: i64,
    /// Unix seconds.
    pub genesis_time: i64,
    /// Whether the backend starts out reachable.
    pub reachable: bool,
}

impl Default for MockChainConfig {
    fn default() -> Self {
        Self {
            coin_type: CoinType::MOCK,
            subscription_buffer: DEFAULT_SUBSCRIPTION_BUFFER,
            block_interval_secs: DEFAULT_BLOCK_INTERVAL_SECS,
            genesis_time: DEFAULT_GENESIS_TIME,
            reachable: true,
        }
    }
}

impl MockChainConfig {
    pub fn from_json(json: &str) -> Result<Self, MockError> {
        let config: MockChainConfig =
            serde_json::from_str(json).map_err(|e| MockError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MockError> {
        if self.subscription_buffer == 0 {
            return Err(MockError::InvalidConfig(
                "subscriptionBuffer must be positive".into(),
            ));
        }
        if !(1..=MAX_BLOCK_INTERVAL_SECS).contains(&self.block_interval_secs) {
            return Err(MockError::InvalidConfig(format!(
                "blockIntervalSecs must be between 1 and {MAX_BLOCK_INTERVAL_SECS}, got {}",
                self.block_interval_secs
            )));
        }
        self.genesis_time()?;
        Ok(())
    }

    pub fn genesis_time(&self) -> Result<DateTime<Utc>, MockError> {
        DateTime::from_timestamp(self.genesis_time, 0).ok_or_else(|| {
            MockError::InvalidConfig(format!("genesisTime {} is out of range", self.genesis_time))
        })
    }

    pub fn block_interval(&self) -> Result<Duration, MockError> {
        Duration::try_seconds(self.block_interval_secs).ok_or_else(|| {
            MockError::InvalidConfig(format!(
                "blockIntervalSecs {} is out of range",
                self.block_interval_secs
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = MockChainConfig::default();
        assert_eq!(config.coin_type, CoinType::MOCK);
        assert_eq!(config.subscription_buffer, DEFAULT_SUBSCRIPTION_BUFFER);
        assert!(config.reachable);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn genesis_time_converts() {
        let config = MockChainConfig::default();
        assert_eq!(
            config.genesis_time().unwrap().to_rfc3339(),
            "2009-01-03T18:15:05+00:00"
        );
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config = MockChainConfig::from_json(r#"{ "coinType": "BTC", "subscriptionBuffer": 4 }"#)
            .unwrap();
        assert_eq!(config.coin_type, CoinType::BITCOIN);
        assert_eq!(config.subscription_buffer, 4);
        assert_eq!(config.block_interval_secs, DEFAULT_BLOCK_INTERVAL_SECS);
    }

    #[test]
    fn zero_buffer_is_rejected() {
        let err = MockChainConfig::from_json(r#"{ "subscriptionBuffer": 0 }"#).unwrap_err();
        assert!(matches!(err, MockError::InvalidConfig(_)));
    }

    #[test]
    fn negative_interval_is_rejected() {
        let err = MockChainConfig::from_json(r#"{ "blockIntervalSecs": -1 }"#).unwrap_err();
        assert!(matches!(err, MockError::InvalidConfig(_)));
    }

    #[test]
    fn oversized_interval_is_rejected() {
        let err = MockChainConfig::from_json(r#"{ "blockIntervalSecs": 9223372036854775807 }"#)
            .unwrap_err();
        assert!(matches!(err, MockError::InvalidConfig(_)));

        let just_over = format!(r#"{{ "blockIntervalSecs": {} }}"#, MAX_BLOCK_INTERVAL_SECS + 1);
        assert!(MockChainConfig::from_json(&just_over).is_err());

        let at_limit = format!(r#"{{ "blockIntervalSecs": {MAX_BLOCK_INTERVAL_SECS} }}"#);
        assert!(MockChainConfig::from_json(&at_limit).is_ok());
    }

    #[test]
    fn out_of_range_genesis_is_an_error_not_the_epoch() {
        let config = MockChainConfig {
            genesis_time: i64::MAX,
            ..MockChainConfig::default()
        };
        assert!(matches!(config.genesis_time(), Err(MockError::InvalidConfig(_))));
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(MockChainConfig::from_json("{ not json").is_err());
    }
}
