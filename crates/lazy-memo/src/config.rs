use std::io::Read;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Controls the behavior of a [`LazyMemo`](crate::LazyMemo).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LazyMemoConfig {
    /// The name of the memoizer, attached to all of its log events.
    pub name: String,
    /// Whether a failed computation makes the next call with equal arguments start over.
    ///
    /// When disabled, the failed computation stays selected for its arguments, and equal calls
    /// keep returning `None` until different arguments come in.
    pub retry_failed: bool,
}

impl Default for LazyMemoConfig {
    fn default() -> Self {
        Self {
            name: "lazy_memo".to_owned(),
            retry_failed: true,
        }
    }
}

impl LazyMemoConfig {
    /// Parses a configuration from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Self::from_reader(yaml.as_bytes())
    }

    /// Reads a YAML configuration from `reader`.
    ///
    /// Empty input is rejected rather than silently falling back to the defaults.
    pub fn from_reader(mut reader: impl Read) -> Result<Self> {
        let mut config = String::new();
        reader
            .read_to_string(&mut config)
            .context("failed reading config")?;
        if config.trim().is_empty() {
            anyhow::bail!("config is empty");
        }
        serde_yaml::from_str(&config).context("failed to parse config YAML")
    }
}
