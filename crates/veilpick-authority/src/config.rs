//! Authority configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use veilpick_types::{PickupError, PickupResult};

/// Runtime configuration for a verifying authority.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthorityConfig {
    /// Directory holding the circuit key artifacts.
    pub keys_dir: PathBuf,
    /// Pinned verifying-key digest (hex). When set, startup fails unless the
    /// loaded key matches.
    pub expected_vk_digest: Option<String>,
    /// Path to the durable nullifier database. `None` keeps nullifiers in
    /// memory, which only makes sense for tests.
    pub nullifier_db_path: Option<PathBuf>,
    /// Pickup window applied when registration does not specify one.
    pub default_pickup_window_secs: i64,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            keys_dir: PathBuf::from("./zk-keys"),
            expected_vk_digest: None,
            nullifier_db_path: None,
            default_pickup_window_secs: 7 * 24 * 3600,
        }
    }
}

impl AuthorityConfig {
    pub fn load(path: &Path) -> PickupResult<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| PickupError::Storage(format!("{}: {}", path.display(), e)))?;
        let config: Self =
            serde_json::from_str(&json).map_err(|e| PickupError::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PickupResult<()> {
        if self.default_pickup_window_secs <= 0 {
            return Err(PickupError::InputValidation(
                "Default pickup window must be positive".into(),
            ));
        }
        if let Some(digest) = &self.expected_vk_digest {
            if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(PickupError::InputValidation(
                    "Expected VK digest must be 64 hex characters".into(),
                ));
            }
        }
        Ok(())
    }

    pub fn default_pickup_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.default_pickup_window_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(AuthorityConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_window_and_digest() {
        let mut config = AuthorityConfig {
            default_pickup_window_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.default_pickup_window_secs = 3600;
        config.expected_vk_digest = Some("not-hex".into());
        assert!(config.validate().is_err());

        config.expected_vk_digest = Some("ab".repeat(32));
        assert!(config.validate().is_ok());
    }
}
