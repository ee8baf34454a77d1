//! Configuration types for devparam
//!
//! The store is configured once at start. Optional field groups stand in
//! for the board options a given device was built with: a disabled group's
//! fields are simply not recognized by the store.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default parameter partition
pub const DEFAULT_DEVICE_PATH: &str = "/dev/block/bootdevice/by-name/param";

/// Default offset of the parameter block inside the partition (9 MB)
pub const DEFAULT_BLOCK_OFFSET: u64 = 0x0090_0000;

/// Default offset of the NAD diagnostic record (8 MB)
pub const DEFAULT_NAD_OFFSET: u64 = 0x0080_0000;

/// Default offset of the NAD DDR result record
pub const DEFAULT_NAD_DDR_RESULT_OFFSET: u64 = 0x0080_2000;

/// Root configuration for devparam
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backing store configuration
    pub store: StoreConfig,
    /// Optional field groups
    pub fields: FieldConfig,
    /// Values captured from the boot command line
    pub boot: BootConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Backing store location
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the parameter partition (block device or image file)
    pub device_path: PathBuf,
    /// Byte offset of the parameter block inside the partition
    pub block_offset: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            device_path: PathBuf::from(DEFAULT_DEVICE_PATH),
            block_offset: DEFAULT_BLOCK_OFFSET,
        }
    }
}

/// Optional field groups
///
/// The parameter block layout never changes; these switches only decide
/// which fields the store will hand out.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    /// CP modem binary update flag
    pub cp_update: bool,
    /// RTC auto power-on alarm (SAPA)
    pub rtc_auto_power_on: bool,
    /// Normal power-off flag used to detect battery removal
    pub battery_removal_monitor: bool,
    /// Factory barcode strings
    pub barcode: bool,
    /// High-voltage wireless charging mode
    pub wireless_charger_hv: bool,
    /// MUIC adaptive fast charging switch
    pub muic_hv: bool,
    /// Out-of-band NAD diagnostic records
    pub nad: Option<NadConfig>,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            cp_update: false,
            rtc_auto_power_on: true,
            battery_removal_monitor: true,
            barcode: true,
            wireless_charger_hv: true,
            muic_hv: true,
            nad: Some(NadConfig::default()),
        }
    }
}

/// Offsets of the out-of-band NAD records
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NadConfig {
    /// Offset of the NAD result record
    pub record_offset: u64,
    /// Offset of the DDR test result record
    pub ddr_result_offset: u64,
}

impl Default for NadConfig {
    fn default() -> Self {
        Self {
            record_offset: DEFAULT_NAD_OFFSET,
            ddr_result_offset: DEFAULT_NAD_DDR_RESULT_OFFSET,
        }
    }
}

/// Boot-time values
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BootConfig {
    /// Sales code handed over by the bootloader
    pub sales_code: Option<String>,
}

/// Logging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.store.device_path, PathBuf::from(DEFAULT_DEVICE_PATH));
        assert_eq!(config.store.block_offset, DEFAULT_BLOCK_OFFSET);
        assert!(config.fields.barcode);
        assert!(!config.fields.cp_update);
        assert_eq!(config.fields.nad, Some(NadConfig::default()));
        assert!(config.boot.sales_code.is_none());
    }

    #[test]
    fn test_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [store]
            device_path = "/tmp/param.img"

            [fields]
            barcode = false

            [boot]
            sales_code = "XAA"
            "#,
        )
        .unwrap();

        assert_eq!(config.store.device_path, PathBuf::from("/tmp/param.img"));
        assert_eq!(config.store.block_offset, DEFAULT_BLOCK_OFFSET);
        assert!(!config.fields.barcode);
        assert!(config.fields.muic_hv);
        assert_eq!(config.boot.sales_code.as_deref(), Some("XAA"));
        assert_eq!(config.logging.level, "warn");
    }
}
