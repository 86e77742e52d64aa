//! Data engine configuration
//!
//! Loaded from TOML. Every field has a default, so an empty document is a
//! valid configuration.

use std::path::Path;
use std::time::Duration;

use modem_data_core::{AccessMode, FailCause, RatMask};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Configuration of the data manager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Move LTE eligibility between slots along with the data SIM
    #[serde(default = "default_handover")]
    pub handover: bool,
    /// Highest access mode left to slots that do not carry data
    #[serde(default = "default_non_data_mode")]
    pub non_data_mode: AccessMode,
    /// Send SetDataAllowed on modems without a preferred data modem call
    #[serde(default = "default_set_data_allowed")]
    pub set_data_allowed: bool,
    /// Silent retries of a setup that failed with an unspecified cause
    #[serde(default = "default_setup_retry_limit")]
    pub setup_retry_limit: u32,
    /// Delay between silent setup retries after the first one
    #[serde(default = "default_setup_retry_delay")]
    pub setup_retry_delay_ms: u64,
    /// Delay before resubmitting a request the radio was not ready for
    #[serde(default = "default_transient_retry_delay")]
    pub transient_retry_delay_ms: u64,
    /// Transient retries allowed for setup and deactivate requests
    #[serde(default = "default_transient_retry_limit")]
    pub transient_retry_limit: u32,
    /// Delay before querying the phone capability again after a failure
    #[serde(default = "default_capability_retry_delay")]
    pub capability_retry_delay_ms: u64,
    #[serde(default)]
    pub profiles: ProfileConfig,
    #[serde(default)]
    pub hangup: HangupConfig,
    #[serde(default)]
    pub slots: Vec<SlotConfig>,
}

fn default_handover() -> bool {
    true
}

fn default_non_data_mode() -> AccessMode {
    AccessMode::Umts
}

fn default_set_data_allowed() -> bool {
    true
}

fn default_setup_retry_limit() -> u32 {
    4
}

fn default_setup_retry_delay() -> u64 {
    200
}

fn default_transient_retry_delay() -> u64 {
    2000
}

fn default_transient_retry_limit() -> u32 {
    3
}

fn default_capability_retry_delay() -> u64 {
    5000
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            handover: default_handover(),
            non_data_mode: default_non_data_mode(),
            set_data_allowed: default_set_data_allowed(),
            setup_retry_limit: default_setup_retry_limit(),
            setup_retry_delay_ms: default_setup_retry_delay(),
            transient_retry_delay_ms: default_transient_retry_delay(),
            transient_retry_limit: default_transient_retry_limit(),
            capability_retry_delay_ms: default_capability_retry_delay(),
            profiles: ProfileConfig::default(),
            hangup: HangupConfig::default(),
            slots: Vec::new(),
        }
    }
}

impl DataConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: DataConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            if seen.contains(&slot.slot) {
                return Err(ConfigError::Invalid(format!(
                    "slot {} configured twice",
                    slot.slot
                )));
            }
            if slot.techs.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "slot {} has no access technologies",
                    slot.slot
                )));
            }
            seen.push(slot.slot);
        }
        Ok(())
    }

    pub fn setup_retry_delay(&self) -> Duration {
        Duration::from_millis(self.setup_retry_delay_ms)
    }

    pub fn transient_retry_delay(&self) -> Duration {
        Duration::from_millis(self.transient_retry_delay_ms)
    }

    pub fn capability_retry_delay(&self) -> Duration {
        Duration::from_millis(self.capability_retry_delay_ms)
    }
}

// =============================================================================
// Profiles
// =============================================================================

/// Data profile ids sent with setup requests, by context type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    #[serde(default = "default_profile_id")]
    pub default: i32,
    #[serde(default = "default_mms_profile_id")]
    pub mms: i32,
    #[serde(default = "default_ims_profile_id")]
    pub ims: i32,
}

fn default_profile_id() -> i32 {
    0
}

fn default_mms_profile_id() -> i32 {
    1001
}

fn default_ims_profile_id() -> i32 {
    2
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            default: default_profile_id(),
            mms: default_mms_profile_id(),
            ims: default_ims_profile_id(),
        }
    }
}

// =============================================================================
// Hangup classification
// =============================================================================

/// How fail causes of vanished calls are classified
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HangupConfig {
    /// Causes reported as a local hangup; any other cause is remote
    #[serde(default = "default_local_causes")]
    pub local_causes: Vec<FailCause>,
}

fn default_local_causes() -> Vec<FailCause> {
    vec![FailCause::RegularDeactivation]
}

impl Default for HangupConfig {
    fn default() -> Self {
        Self {
            local_causes: default_local_causes(),
        }
    }
}

// =============================================================================
// Slots
// =============================================================================

/// Per-slot settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotConfig {
    /// Slot index
    pub slot: usize,
    /// Access technologies the slot's modem supports
    #[serde(default = "default_techs")]
    pub techs: Vec<AccessMode>,
}

fn default_techs() -> Vec<AccessMode> {
    vec![AccessMode::Gsm, AccessMode::Umts, AccessMode::Lte]
}

impl SlotConfig {
    pub fn new(slot: usize) -> Self {
        Self {
            slot,
            techs: default_techs(),
        }
    }

    pub fn with_techs(mut self, techs: &[AccessMode]) -> Self {
        self.techs = techs.to_vec();
        self
    }

    pub fn rat_mask(&self) -> RatMask {
        self.techs
            .iter()
            .fold(RatMask::empty(), |mask, mode| mask | mode.bit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = DataConfig::from_toml_str("").unwrap();
        assert!(config.handover);
        assert_eq!(config.non_data_mode, AccessMode::Umts);
        assert!(config.set_data_allowed);
        assert_eq!(config.setup_retry_limit, 4);
        assert_eq!(config.setup_retry_delay(), Duration::from_millis(200));
        assert_eq!(config.transient_retry_limit, 3);
        assert_eq!(config.profiles.mms, 1001);
        assert_eq!(config.hangup.local_causes, vec![FailCause::RegularDeactivation]);
        assert!(config.slots.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            handover = false
            non_data_mode = "gsm"
            setup_retry_limit = 2
            transient_retry_delay_ms = 500

            [profiles]
            ims = 5

            [hangup]
            local_causes = [36, 65535]

            [[slots]]
            slot = 0
            techs = ["gsm", "umts", "lte", "nr"]

            [[slots]]
            slot = 1
        "#;
        let config = DataConfig::from_toml_str(toml).unwrap();
        assert!(!config.handover);
        assert_eq!(config.non_data_mode, AccessMode::Gsm);
        assert_eq!(config.setup_retry_limit, 2);
        assert_eq!(config.transient_retry_delay(), Duration::from_millis(500));
        assert_eq!(config.profiles.default, 0);
        assert_eq!(config.profiles.ims, 5);
        assert_eq!(
            config.hangup.local_causes,
            vec![FailCause::RegularDeactivation, FailCause::ErrorUnspecified]
        );
        assert_eq!(config.slots[0].rat_mask(), RatMask::all());
        assert_eq!(config.slots[1].rat_mask(), RatMask::default());
    }

    #[test]
    fn test_duplicate_slot_rejected() {
        let toml = r#"
            [[slots]]
            slot = 1
            [[slots]]
            slot = 1
        "#;
        assert!(matches!(
            DataConfig::from_toml_str(toml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_empty_techs_rejected() {
        let toml = r#"
            [[slots]]
            slot = 0
            techs = []
        "#;
        assert!(matches!(
            DataConfig::from_toml_str(toml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("modem-data.toml");
        std::fs::write(&path, "transient_retry_limit = 7\n[[slots]]\nslot = 2\n").unwrap();

        let config = DataConfig::from_file(&path).unwrap();
        assert_eq!(config.transient_retry_limit, 7);
        assert_eq!(config.slots.len(), 1);
        assert_eq!(config.slots[0].slot, 2);

        assert!(matches!(
            DataConfig::from_file(dir.path().join("missing.toml")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_shipped_config_parses() {
        let config =
            DataConfig::from_toml_str(include_str!("../../../config/modem-datad.toml")).unwrap();
        assert_eq!(config.slots.len(), 2);
        assert_eq!(config.slots[1].rat_mask(), RatMask::GSM | RatMask::UMTS);
        assert_eq!(config.hangup.local_causes, vec![FailCause::RegularDeactivation]);
    }
}
