//! Field registry
//!
//! Maps every parameter field to where it lives, how large it is, and how
//! a write to it is vetted. Adding a field means adding a variant and a
//! descriptor row, nothing else.

use crate::layout::{self, FieldSpan};
use devparam_common::config::{FieldConfig, NadConfig};
use devparam_common::{Error, Result};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Sentinel that engages the remote lock
pub const REMOTE_LOCK_MAGIC: u32 = 0x4C4F_434B;

/// A parameter field, numbered by its stable index
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum ParamField {
    DebugLevel = 0,
    UartSel,
    RoryControl,
    MovinandChecksumDone,
    MovinandChecksumPass,
    CpUpdate,
    Sapa,
    NormalPoweroff,
    BarcodeImei,
    BarcodeMeid,
    BarcodeSn,
    BarcodePrdate,
    BarcodeSku,
    WirelessChargingMode,
    AfcDisable,
    CpReservedMem,
    CarrierId,
    Sales,
    LcdResolution,
    ApiGpioTest,
    ApiGpioTestResult,
    RebootRecoveryCause,
    RemoteLock,
    Nad,
    NadDdrResult,
}

impl ParamField {
    /// Every field in index order
    pub const ALL: [Self; 25] = [
        Self::DebugLevel,
        Self::UartSel,
        Self::RoryControl,
        Self::MovinandChecksumDone,
        Self::MovinandChecksumPass,
        Self::CpUpdate,
        Self::Sapa,
        Self::NormalPoweroff,
        Self::BarcodeImei,
        Self::BarcodeMeid,
        Self::BarcodeSn,
        Self::BarcodePrdate,
        Self::BarcodeSku,
        Self::WirelessChargingMode,
        Self::AfcDisable,
        Self::CpReservedMem,
        Self::CarrierId,
        Self::Sales,
        Self::LcdResolution,
        Self::ApiGpioTest,
        Self::ApiGpioTestResult,
        Self::RebootRecoveryCause,
        Self::RemoteLock,
        Self::Nad,
        Self::NadDdrResult,
    ];

    /// Stable numeric index
    #[must_use]
    pub const fn index(self) -> u32 {
        self as u32
    }

    /// Look a field up by index
    #[must_use]
    pub fn from_index(index: u32) -> Option<Self> {
        Self::ALL.get(usize::try_from(index).ok()?).copied()
    }

    /// Name used by tools and config
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::DebugLevel => "debug_level",
            Self::UartSel => "uart_sel",
            Self::RoryControl => "rory_control",
            Self::MovinandChecksumDone => "movinand_checksum_done",
            Self::MovinandChecksumPass => "movinand_checksum_pass",
            Self::CpUpdate => "cp_update",
            Self::Sapa => "sapa",
            Self::NormalPoweroff => "normal_poweroff",
            Self::BarcodeImei => "barcode_imei",
            Self::BarcodeMeid => "barcode_meid",
            Self::BarcodeSn => "barcode_sn",
            Self::BarcodePrdate => "barcode_prdate",
            Self::BarcodeSku => "barcode_sku",
            Self::WirelessChargingMode => "wireless_charging_mode",
            Self::AfcDisable => "afc_disable",
            Self::CpReservedMem => "cp_reserved_mem",
            Self::CarrierId => "carrier_id",
            Self::Sales => "sales",
            Self::LcdResolution => "lcd_resolution",
            Self::ApiGpioTest => "api_gpio_test",
            Self::ApiGpioTestResult => "api_gpio_test_result",
            Self::RebootRecoveryCause => "reboot_recovery_cause",
            Self::RemoteLock => "remote_lock",
            Self::Nad => "nad",
            Self::NadDdrResult => "nad_ddr_result",
        }
    }
}

impl fmt::Display for ParamField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ParamField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|field| field.name() == s)
            .ok_or_else(|| Error::UnknownFieldName(s.to_string()))
    }
}

/// How a field's bytes are interpreted by tools
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// One little-endian u32
    U32,
    /// Several little-endian u32 values
    U32Array(usize),
    /// NUL-padded string
    Text,
    /// Opaque bytes
    Bytes,
}

/// Where a field is stored
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Location {
    /// Inside the cached parameter block
    Block(FieldSpan),
    /// Separate record at its own partition offset, never cached
    OutOfBand { offset: u64, size: usize },
}

/// Decides whether a (zero-padded) write may be applied
pub type WriteValidator = fn(&[u8]) -> bool;

/// Accepts only the remote-lock sentinel or zero
pub fn remote_lock_guard(value: &[u8]) -> bool {
    value
        .get(..4)
        .and_then(|b| <[u8; 4]>::try_from(b).ok())
        .map(u32::from_le_bytes)
        .is_some_and(|v| v == REMOTE_LOCK_MAGIC || v == 0)
}

/// Everything the store needs to know about one field
#[derive(Clone, Copy, Debug)]
pub struct FieldDescriptor {
    pub field: ParamField,
    pub location: Location,
    pub kind: FieldKind,
    validator: Option<WriteValidator>,
}

impl FieldDescriptor {
    const fn block(field: ParamField, span: FieldSpan, kind: FieldKind) -> Self {
        Self {
            field,
            location: Location::Block(span),
            kind,
            validator: None,
        }
    }

    const fn out_of_band(field: ParamField, offset: u64, size: usize) -> Self {
        Self {
            field,
            location: Location::OutOfBand { offset, size },
            kind: FieldKind::Bytes,
            validator: None,
        }
    }

    const fn guarded(mut self, validator: WriteValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Field size in bytes
    #[must_use]
    pub const fn size(&self) -> usize {
        match self.location {
            Location::Block(span) => span.size,
            Location::OutOfBand { size, .. } => size,
        }
    }

    /// Check if the field bypasses the cached block
    #[must_use]
    pub const fn is_out_of_band(&self) -> bool {
        matches!(self.location, Location::OutOfBand { .. })
    }

    /// Check if a write of `value` should be applied
    pub fn accepts(&self, value: &[u8]) -> bool {
        self.validator.is_none_or(|validate| validate(value))
    }

    /// Zero-pad `value` to the field size
    pub fn pad(&self, value: &[u8]) -> Result<Vec<u8>> {
        let size = self.size();
        if value.len() > size {
            return Err(Error::ValueTooLarge {
                field: self.field.name(),
                size,
                len: value.len(),
            });
        }
        let mut padded = vec![0u8; size];
        padded[..value.len()].copy_from_slice(value);
        Ok(padded)
    }
}

/// The fields a store recognizes
#[derive(Clone, Debug)]
pub struct FieldRegistry {
    descriptors: Vec<FieldDescriptor>,
}

impl FieldRegistry {
    /// Build the registry for the enabled field groups
    pub fn new(config: &FieldConfig) -> Self {
        let descriptors = ParamField::ALL
            .iter()
            .filter_map(|&field| describe(field, config))
            .collect();
        Self { descriptors }
    }

    /// Look up a recognized field
    pub fn lookup(&self, field: ParamField) -> Result<&FieldDescriptor> {
        self.descriptors
            .iter()
            .find(|d| d.field == field)
            .ok_or(Error::UnknownField(field.index()))
    }

    /// Look up a recognized field by raw index
    pub fn lookup_index(&self, index: u32) -> Result<&FieldDescriptor> {
        let field = ParamField::from_index(index).ok_or(Error::UnknownField(index))?;
        self.lookup(field)
    }

    /// Recognized fields in index order
    pub fn iter(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.descriptors.iter()
    }

    /// Number of recognized fields
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Check if no field is recognized
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

fn describe(field: ParamField, config: &FieldConfig) -> Option<FieldDescriptor> {
    use FieldKind::{Text, U32, U32Array};
    use ParamField as F;

    let block = FieldDescriptor::block;
    let descriptor = match field {
        F::DebugLevel => block(field, layout::DEBUG_LEVEL, U32),
        F::UartSel => block(field, layout::UART_SEL, U32),
        F::RoryControl => block(field, layout::RORY_CONTROL, U32),
        F::MovinandChecksumDone => block(field, layout::MOVINAND_CHECKSUM_DONE, U32),
        F::MovinandChecksumPass => block(field, layout::MOVINAND_CHECKSUM_PASS, U32),
        F::CpUpdate if config.cp_update => block(field, layout::CP_UPDATE, U32),
        F::Sapa if config.rtc_auto_power_on => block(field, layout::SAPA, U32Array(3)),
        F::NormalPoweroff if config.battery_removal_monitor => {
            block(field, layout::NORMAL_POWEROFF, U32)
        }
        F::BarcodeImei if config.barcode => block(field, layout::BARCODE_IMEI, Text),
        F::BarcodeMeid if config.barcode => block(field, layout::BARCODE_MEID, Text),
        F::BarcodeSn if config.barcode => block(field, layout::BARCODE_SN, Text),
        F::BarcodePrdate if config.barcode => block(field, layout::BARCODE_PRDATE, Text),
        F::BarcodeSku if config.barcode => block(field, layout::BARCODE_SKU, Text),
        F::WirelessChargingMode if config.wireless_charger_hv => {
            block(field, layout::WIRELESS_CHARGING_MODE, U32)
        }
        F::AfcDisable if config.muic_hv => block(field, layout::AFC_DISABLE, U32),
        F::CpReservedMem => block(field, layout::CP_RESERVED_MEM, U32),
        F::CarrierId => block(field, layout::CARRIER_ID, Text),
        F::Sales => block(field, layout::SALES, Text),
        F::LcdResolution => block(field, layout::LCD_RESOLUTION, Text),
        F::ApiGpioTest => block(field, layout::API_GPIO_TEST, U32),
        F::ApiGpioTestResult => block(field, layout::API_GPIO_TEST_RESULT, Text),
        F::RebootRecoveryCause => block(field, layout::REBOOT_RECOVERY_CAUSE, Text),
        F::RemoteLock => block(field, layout::REMOTE_LOCK, U32).guarded(remote_lock_guard),
        F::Nad => {
            let NadConfig { record_offset, .. } = config.nad?;
            FieldDescriptor::out_of_band(field, record_offset, layout::NAD_RECORD_SIZE)
        }
        F::NadDdrResult => {
            let NadConfig {
                ddr_result_offset, ..
            } = config.nad?;
            FieldDescriptor::out_of_band(field, ddr_result_offset, layout::NAD_DDR_RESULT_SIZE)
        }
        _ => return None,
    };
    Some(descriptor)
}
