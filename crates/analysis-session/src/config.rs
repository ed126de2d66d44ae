//! Session configuration from environment variables

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AnalysisError;

/// Search parameters and timing for one analysis session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnalysisSettings {
    /// Search depth for the regular multi-line analysis
    pub depth: u8,

    /// Number of lines requested per position (1 = best line only)
    pub variation_count: u8,

    /// Optional deeper single-line search whose score replaces the
    /// multi-line score when classifying the move that was just played
    pub verify_depth: Option<u8>,

    /// How long `close` waits for an in-flight evaluation
    pub shutdown_grace: Duration,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            depth: 15,
            variation_count: 2,
            verify_depth: None,
            shutdown_grace: Duration::from_millis(1000),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Path to Stockfish binary
    pub stockfish_path: String,

    /// Engine `Threads` option
    pub engine_threads: u32,

    /// Engine `Hash` option in MB
    pub engine_hash_mb: u32,

    pub analysis: AnalysisSettings,
}

impl SessionConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, AnalysisError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key lookup. Unset keys take defaults,
    /// values that do not parse are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AnalysisError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AnalysisSettings::default();

        let stockfish_path = lookup("STOCKFISH_PATH")
            .unwrap_or_else(|| "/usr/local/bin/stockfish".to_string());

        let depth = parse_var(&lookup, "ANALYSIS_DEPTH")?.unwrap_or(defaults.depth);

        let variation_count =
            parse_var(&lookup, "ANALYSIS_MULTIPV")?.unwrap_or(defaults.variation_count);
        if variation_count == 0 {
            return Err(AnalysisError::Config("ANALYSIS_MULTIPV must be at least 1"));
        }

        let verify_depth = parse_var(&lookup, "VERIFY_DEPTH")?;

        let shutdown_grace = parse_var::<u64, _>(&lookup, "SHUTDOWN_GRACE_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.shutdown_grace);

        let engine_threads = parse_var(&lookup, "ENGINE_THREADS")?.unwrap_or(1);
        let engine_hash_mb = parse_var(&lookup, "ENGINE_HASH_MB")?.unwrap_or(256);

        Ok(Self {
            stockfish_path,
            engine_threads,
            engine_hash_mb,
            analysis: AnalysisSettings {
                depth,
                variation_count,
                verify_depth,
                shutdown_grace,
            },
        })
    }
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, AnalysisError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| AnalysisError::InvalidConfig { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<SessionConfig, AnalysisError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        SessionConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.stockfish_path, "/usr/local/bin/stockfish");
        assert_eq!(config.analysis, AnalysisSettings::default());
        assert_eq!(config.engine_threads, 1);
        assert_eq!(config.engine_hash_mb, 256);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("STOCKFISH_PATH", "/opt/sf"),
            ("ANALYSIS_DEPTH", "20"),
            ("ANALYSIS_MULTIPV", "1"),
            ("VERIFY_DEPTH", "24"),
            ("SHUTDOWN_GRACE_MS", "250"),
        ])
        .unwrap();
        assert_eq!(config.stockfish_path, "/opt/sf");
        assert_eq!(config.analysis.depth, 20);
        assert_eq!(config.analysis.variation_count, 1);
        assert_eq!(config.analysis.verify_depth, Some(24));
        assert_eq!(config.analysis.shutdown_grace, Duration::from_millis(250));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            config_from(&[("ANALYSIS_DEPTH", "deep")]),
            Err(AnalysisError::InvalidConfig { key: "ANALYSIS_DEPTH", .. })
        ));
        assert!(matches!(
            config_from(&[("ANALYSIS_MULTIPV", "0")]),
            Err(AnalysisError::Config(_))
        ));
    }
}
