//! Refresh timing configuration.
//!
//! The three delays drive the refresh scheduler. Only their ordering is
//! load-bearing: a short debounce for responsiveness, a longer cooldown
//! between catch-up polls, and the longest delay for the one-shot resync
//! after startup.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_SOON_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_COOLDOWN_DELAY: Duration = Duration::from_secs(4);
pub const DEFAULT_INITIAL_RESYNC_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Delay before the first poll of an idle key.
    pub soon_delay: Duration,

    /// Spacing between coalesced catch-up polls.
    pub cooldown_delay: Duration,

    /// Delay of the one-shot resync armed at setup.
    pub initial_resync_delay: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            soon_delay: DEFAULT_SOON_DELAY,
            cooldown_delay: DEFAULT_COOLDOWN_DELAY,
            initial_resync_delay: DEFAULT_INITIAL_RESYNC_DELAY,
        }
    }
}

/// On-disk representation, all values in milliseconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub soon_delay_ms: Option<u64>,
    pub cooldown_delay_ms: Option<u64>,
    pub initial_resync_delay_ms: Option<u64>,
}

impl SyncConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = serde_json::from_str(raw)?;
        Ok(Self::default().merge(&file))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg = Self::from_json_str(&raw)?;
        log::debug!("[CONFIG] loaded {:?} from {}", cfg, path.display());
        Ok(cfg)
    }

    /// Overlays every value present in `file`.
    pub fn merge(mut self, file: &ConfigFile) -> Self {
        if let Some(ms) = file.soon_delay_ms {
            self.soon_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = file.cooldown_delay_ms {
            self.cooldown_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = file.initial_resync_delay_ms {
            self.initial_resync_delay = Duration::from_millis(ms);
        }
        self
    }

    /// Enforces `soon < cooldown < initial_resync`.
    pub fn validate(self) -> Result<Self, ConfigError> {
        for (name, d) in [
            ("soon_delay", self.soon_delay),
            ("cooldown_delay", self.cooldown_delay),
            ("initial_resync_delay", self.initial_resync_delay),
        ] {
            if d.is_zero() {
                return Err(ConfigError::ZeroDelay { name });
            }
        }

        if self.soon_delay >= self.cooldown_delay
            || self.cooldown_delay >= self.initial_resync_delay
        {
            return Err(ConfigError::DelayOrdering {
                soon_ms: self.soon_delay.as_millis(),
                cooldown_ms: self.cooldown_delay.as_millis(),
                resync_ms: self.initial_resync_delay.as_millis(),
            });
        }

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(SyncConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg = SyncConfig::from_json_str(r#"{ "soon_delay_ms": 250 }"#).unwrap();

        assert_eq!(cfg.soon_delay, Duration::from_millis(250));
        assert_eq!(cfg.cooldown_delay, DEFAULT_COOLDOWN_DELAY);
        assert_eq!(cfg.initial_resync_delay, DEFAULT_INITIAL_RESYNC_DELAY);
    }

    #[test]
    fn rejects_cooldown_not_longer_than_soon() {
        let cfg = SyncConfig {
            soon_delay: Duration::from_secs(4),
            cooldown_delay: Duration::from_secs(4),
            initial_resync_delay: Duration::from_secs(60),
        };

        assert!(matches!(cfg.validate(), Err(ConfigError::DelayOrdering { .. })));
    }

    #[test]
    fn rejects_resync_shorter_than_cooldown() {
        let file = ConfigFile {
            initial_resync_delay_ms: Some(2_000),
            ..Default::default()
        };
        let cfg = SyncConfig::default().merge(&file);

        assert!(matches!(cfg.validate(), Err(ConfigError::DelayOrdering { .. })));
    }

    #[test]
    fn rejects_zero_delay() {
        let cfg = SyncConfig {
            soon_delay: Duration::ZERO,
            ..Default::default()
        };

        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::ZeroDelay { name: "soon_delay" })
        ));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            SyncConfig::from_json_str("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
