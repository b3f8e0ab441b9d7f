//! Matching configuration from environment variables.

use std::env;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Acceptance threshold for cross-vocabulary linking.
pub const DEFAULT_CONTAINMENT_THRESHOLD: f64 = 0.75;

/// "Any nonzero score" for the simple-ingredient subset.
pub const DEFAULT_SIMPLE_THRESHOLD: f64 = 0.0;

/// Shorter side of a substring match must be at least this many characters.
pub const DEFAULT_MIN_SUBSTRING_LEN: usize = 4;

/// Records committed per transaction.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },
}

/// Fuzzy scoring policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringPolicy {
    /// Equality, substring containment, then word-set overlap against every
    /// vocabulary entry.
    #[default]
    Containment,
    /// Same scoring, restricted to short "simple" vocabulary names.
    SimpleIngredient,
}

impl ScoringPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoringPolicy::Containment => "containment",
            ScoringPolicy::SimpleIngredient => "simple_ingredient",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "containment" => Some(ScoringPolicy::Containment),
            "simple_ingredient" | "simple" => Some(ScoringPolicy::SimpleIngredient),
            _ => None,
        }
    }

    /// Threshold used when none is configured explicitly.
    pub fn default_threshold(&self) -> f64 {
        match self {
            ScoringPolicy::Containment => DEFAULT_CONTAINMENT_THRESHOLD,
            ScoringPolicy::SimpleIngredient => DEFAULT_SIMPLE_THRESHOLD,
        }
    }
}

/// Matcher configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatcherConfig {
    pub policy: ScoringPolicy,
    /// Fuzzy matches are accepted only when their score is strictly above this.
    pub threshold: f64,
    pub min_substring_len: usize,
    /// Scan only the first N candidates (ascending id) in the fuzzy pass.
    pub candidate_limit: Option<usize>,
    /// Skip the fuzzy pass entirely.
    pub exact_only: bool,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self::for_policy(ScoringPolicy::default())
    }
}

impl MatcherConfig {
    /// Defaults for a given policy.
    pub fn for_policy(policy: ScoringPolicy) -> Self {
        Self {
            policy,
            threshold: policy.default_threshold(),
            min_substring_len: DEFAULT_MIN_SUBSTRING_LEN,
            candidate_limit: None,
            exact_only: false,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Optional:
    /// - `LARDER_MATCH_POLICY`: "containment" or "simple_ingredient" (default: containment)
    /// - `LARDER_MATCH_THRESHOLD`: fuzzy acceptance threshold (default: depends on policy)
    /// - `LARDER_MIN_SUBSTRING_LEN`: minimum substring length (default: 4)
    /// - `LARDER_CANDIDATE_LIMIT`: fuzzy scan limit (default: unlimited)
    /// - `LARDER_EXACT_ONLY`: disable the fuzzy pass (default: false)
    pub fn from_env() -> Result<Self, ConfigError> {
        let policy = match env::var("LARDER_MATCH_POLICY") {
            Ok(value) => ScoringPolicy::from_str(&value).ok_or(ConfigError::InvalidValue {
                name: "LARDER_MATCH_POLICY".to_string(),
                value,
            })?,
            Err(_) => ScoringPolicy::default(),
        };

        let mut config = Self::for_policy(policy);

        if let Some(threshold) = parse_env::<f64>("LARDER_MATCH_THRESHOLD")? {
            config.threshold = threshold;
        }
        if let Some(len) = parse_env::<usize>("LARDER_MIN_SUBSTRING_LEN")? {
            config.min_substring_len = len;
        }
        config.candidate_limit = parse_env::<usize>("LARDER_CANDIDATE_LIMIT")?;
        config.exact_only = env::var("LARDER_EXACT_ONLY")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        config.validate()?;
        Ok(config)
    }

    /// Reject thresholds outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ConfigError::InvalidValue {
                name: "threshold".to_string(),
                value: self.threshold.to_string(),
            });
        }
        Ok(())
    }
}

/// Batch size for match persistence, from `LARDER_BATCH_SIZE` (default: 1000).
pub fn batch_size_from_env() -> Result<usize, ConfigError> {
    match parse_env::<usize>("LARDER_BATCH_SIZE")? {
        Some(0) => Err(ConfigError::InvalidValue {
            name: "LARDER_BATCH_SIZE".to_string(),
            value: "0".to_string(),
        }),
        Some(size) => Ok(size),
        None => Ok(DEFAULT_BATCH_SIZE),
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                name: name.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_defaults() {
        let containment = MatcherConfig::for_policy(ScoringPolicy::Containment);
        assert_eq!(containment.threshold, 0.75);
        assert_eq!(containment.min_substring_len, 4);
        assert_eq!(containment.candidate_limit, None);

        let simple = MatcherConfig::for_policy(ScoringPolicy::SimpleIngredient);
        assert_eq!(simple.threshold, 0.0);
    }

    #[test]
    fn test_policy_names() {
        assert_eq!(
            ScoringPolicy::from_str("simple"),
            Some(ScoringPolicy::SimpleIngredient)
        );
        assert_eq!(
            ScoringPolicy::from_str(ScoringPolicy::Containment.as_str()),
            Some(ScoringPolicy::Containment)
        );
        assert_eq!(ScoringPolicy::from_str("levenshtein"), None);
    }

    #[test]
    fn test_validate_threshold() {
        let mut config = MatcherConfig::default();
        config.threshold = 1.5;
        assert!(config.validate().is_err());
        config.threshold = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_value(MatcherConfig::default()).unwrap();
        assert_eq!(json["policy"], "containment");
        assert_eq!(json["threshold"], 0.75);
    }
}
