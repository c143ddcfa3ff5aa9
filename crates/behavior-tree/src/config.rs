//! Tree configuration.
use std::env;

/// Tunables shared by a tree and its synchronization helpers.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TreeConfig {
    /// Seed for composite shuffling and timer jitter.
    pub seed: u64,
    /// Separator used when a leaf set is flattened into a single string.
    pub sync_separator: char,
}

impl TreeConfig {
    pub const DEFAULT_SEED: u64 = 0x5eed;
    pub const DEFAULT_SYNC_SEPARATOR: char = '|';

    pub fn new() -> Self {
        Self {
            seed: Self::DEFAULT_SEED,
            sync_separator: Self::DEFAULT_SYNC_SEPARATOR,
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::new()
        }
    }

    /// Construct configuration from environment variables.
    ///
    /// Environment variables:
    /// - `BT_SEED` - RNG seed (default: `0x5eed`)
    /// - `BT_SYNC_SEPARATOR` - single-character leaf-set separator (default: `|`)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(seed) = read_env::<u64>("BT_SEED") {
            config.seed = seed;
        }
        if let Some(separator) = read_env::<char>("BT_SYNC_SEPARATOR") {
            config.sync_separator = separator;
        }

        config
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn read_env<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    env::var(key).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_pipe_separator() {
        let config = TreeConfig::default();
        assert_eq!(config.sync_separator, '|');
        assert_eq!(config.seed, TreeConfig::DEFAULT_SEED);
    }

    #[test]
    fn with_seed_keeps_other_defaults() {
        let config = TreeConfig::with_seed(7);
        assert_eq!(config.seed, 7);
        assert_eq!(config.sync_separator, TreeConfig::DEFAULT_SYNC_SEPARATOR);
    }
}
