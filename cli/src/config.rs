//! Run configuration: environment first, then command-line overrides.

use std::env;

use anyhow::{bail, Result};
use clap::{Args, ValueEnum};
use larder_core::{batch_size_from_env, KeyStyle, MatcherConfig, ScoringPolicy};
use serde::Serialize;

pub const DEFAULT_DATABASE_URL: &str = "data/larder.db";

/// How match records reach the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Clear every record of this kind, then batched insert.
    #[default]
    Rebuild,
    /// Batched insert; existing pairs are kept and stale ones are never
    /// removed. Opt-in for loading into an empty table.
    Append,
    /// Clear and replace each source entity's records in its own transaction.
    Replace,
    /// Insert or overwrite record by record.
    Upsert,
}

/// Matching flags shared by the match commands.
#[derive(Debug, Clone, Default, Args)]
pub struct MatchOptions {
    /// Scoring policy: containment or simple_ingredient
    #[arg(long, value_parser = parse_policy)]
    pub policy: Option<ScoringPolicy>,

    /// Fuzzy matches must score strictly above this
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Minimum length of the shorter key in a substring match
    #[arg(long)]
    pub min_substring_len: Option<usize>,

    /// Scan only the first N vocabulary entries in the fuzzy pass
    #[arg(long)]
    pub candidate_limit: Option<usize>,

    /// Disable the fuzzy pass
    #[arg(long)]
    pub exact_only: bool,

    /// Key style: tag, linking or recipe
    #[arg(long, value_parser = parse_style)]
    pub style: Option<KeyStyle>,

    /// Only match against vocabulary rows from this source
    #[arg(long)]
    pub vocabulary_source: Option<String>,

    /// How records reach the store
    #[arg(long, value_enum, default_value_t = WriteMode::Rebuild)]
    pub mode: WriteMode,

    /// Records per transaction (default: LARDER_BATCH_SIZE or 1000)
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Match against a copy of the vocabulary and write nothing
    #[arg(long)]
    pub dry_run: bool,
}

/// Defaults that differ between commands.
#[derive(Debug, Clone, Copy)]
pub struct CommandDefaults {
    pub policy: ScoringPolicy,
    pub style: KeyStyle,
}

/// Effective configuration of one match run.
#[derive(Debug, Clone, Serialize)]
pub struct RunConfig {
    pub matcher: MatcherConfig,
    pub style: KeyStyle,
    pub mode: WriteMode,
    pub batch_size: usize,
    pub vocabulary_source: Option<String>,
}

impl RunConfig {
    /// Resolve from `LARDER_*` environment variables and command-line flags.
    pub fn resolve(options: &MatchOptions, defaults: CommandDefaults) -> Result<Self> {
        let base = MatcherConfig::from_env()?;
        let policy_pinned = env::var_os("LARDER_MATCH_POLICY").is_some();
        let threshold_pinned = env::var_os("LARDER_MATCH_THRESHOLD").is_some();
        let matcher =
            apply_overrides(base, options, defaults, policy_pinned, threshold_pinned)?;

        let batch_size = match options.batch_size {
            Some(0) => bail!("--batch-size must be at least 1"),
            Some(size) => size,
            None => batch_size_from_env()?,
        };

        Ok(Self {
            matcher,
            style: options.style.unwrap_or(defaults.style),
            mode: options.mode,
            batch_size,
            vocabulary_source: options.vocabulary_source.clone(),
        })
    }
}

/// Layer command defaults and flags over an environment-derived config.
///
/// The command's default policy applies only when the environment does not
/// pin one. Switching policy resets the threshold to the new policy's
/// default unless the environment pins it; an explicit flag always wins.
fn apply_overrides(
    mut config: MatcherConfig,
    options: &MatchOptions,
    defaults: CommandDefaults,
    policy_pinned: bool,
    threshold_pinned: bool,
) -> Result<MatcherConfig> {
    let policy = options
        .policy
        .or((!policy_pinned).then_some(defaults.policy));
    if let Some(policy) = policy {
        if policy != config.policy {
            config.policy = policy;
            if !threshold_pinned {
                config.threshold = policy.default_threshold();
            }
        }
    }

    if let Some(threshold) = options.threshold {
        config.threshold = threshold;
    }
    if let Some(len) = options.min_substring_len {
        config.min_substring_len = len;
    }
    if options.candidate_limit.is_some() {
        config.candidate_limit = options.candidate_limit;
    }
    config.exact_only |= options.exact_only;

    config.validate()?;
    Ok(config)
}

fn parse_policy(s: &str) -> Result<ScoringPolicy, String> {
    ScoringPolicy::from_str(s).ok_or_else(|| format!("unknown policy: {}", s))
}

fn parse_style(s: &str) -> Result<KeyStyle, String> {
    match s {
        "tag" => Ok(KeyStyle::Tag),
        "linking" => Ok(KeyStyle::Linking),
        "recipe" => Ok(KeyStyle::Recipe),
        other => Err(format!("unknown key style: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE_LINKING: CommandDefaults = CommandDefaults {
        policy: ScoringPolicy::SimpleIngredient,
        style: KeyStyle::Linking,
    };

    #[test]
    fn test_command_default_policy() {
        let config = apply_overrides(
            MatcherConfig::default(),
            &MatchOptions::default(),
            SIMPLE_LINKING,
            false,
            false,
        )
        .unwrap();
        assert_eq!(config.policy, ScoringPolicy::SimpleIngredient);
        assert_eq!(config.threshold, 0.0);
    }

    #[test]
    fn test_environment_policy_wins_over_command_default() {
        let config = apply_overrides(
            MatcherConfig::default(),
            &MatchOptions::default(),
            SIMPLE_LINKING,
            true,
            false,
        )
        .unwrap();
        assert_eq!(config.policy, ScoringPolicy::Containment);
        assert_eq!(config.threshold, 0.75);
    }

    #[test]
    fn test_pinned_threshold_survives_policy_switch() {
        let base = MatcherConfig {
            threshold: 0.5,
            ..MatcherConfig::default()
        };
        let config =
            apply_overrides(base, &MatchOptions::default(), SIMPLE_LINKING, false, true).unwrap();
        assert_eq!(config.policy, ScoringPolicy::SimpleIngredient);
        assert_eq!(config.threshold, 0.5);
    }

    #[test]
    fn test_flags_override() {
        let options = MatchOptions {
            policy: Some(ScoringPolicy::Containment),
            threshold: Some(0.6),
            candidate_limit: Some(30),
            exact_only: true,
            ..MatchOptions::default()
        };
        let config = apply_overrides(
            MatcherConfig::for_policy(ScoringPolicy::SimpleIngredient),
            &options,
            SIMPLE_LINKING,
            true,
            false,
        )
        .unwrap();
        assert_eq!(config.policy, ScoringPolicy::Containment);
        assert_eq!(config.threshold, 0.6);
        assert_eq!(config.candidate_limit, Some(30));
        assert!(config.exact_only);
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let options = MatchOptions {
            threshold: Some(2.0),
            ..MatchOptions::default()
        };
        assert!(apply_overrides(
            MatcherConfig::default(),
            &options,
            SIMPLE_LINKING,
            true,
            false
        )
        .is_err());
    }

    #[test]
    fn test_parse_style() {
        assert_eq!(parse_style("recipe"), Ok(KeyStyle::Recipe));
        assert!(parse_style("fuzzy").is_err());
    }
}
