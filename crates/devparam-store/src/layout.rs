//! Parameter block layout
//!
//! Layout (all integers little-endian u32):
//! ```text
//! +-----------------------------+  block_offset
//! | debug level .. cp update    |  6 x u32
//! | SAPA alarm                  |  3 x u32
//! | normal power-off            |  u32
//! | barcodes (IMEI .. SKU)      |  5 x 32B
//! | charging / CP memory        |  3 x u32
//! | carrier id, sales code      |  4B + 4B
//! | LCD resolution              |  8B
//! | API GPIO test / result      |  u32 + 256B
//! | reboot recovery cause       |  256B
//! | remote lock                 |  u32
//! +-----------------------------+  block_offset + PARAM_BLOCK_SIZE
//! ```
//!
//! The layout is fixed regardless of which field groups a device enables.

use devparam_common::{Error, Result};

/// A byte range inside the parameter block
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldSpan {
    pub offset: usize,
    pub size: usize,
}

impl FieldSpan {
    const fn first(size: usize) -> Self {
        Self { offset: 0, size }
    }

    const fn then(self, size: usize) -> Self {
        Self {
            offset: self.end(),
            size,
        }
    }

    /// End of the span (exclusive)
    #[must_use]
    pub const fn end(self) -> usize {
        self.offset + self.size
    }
}

/// Size of a barcode string
pub const BARCODE_LEN: usize = 32;

/// Size of a free-form diagnostic string
pub const TEXT_LEN: usize = 256;

const U32: usize = 4;

pub const DEBUG_LEVEL: FieldSpan = FieldSpan::first(U32);
pub const UART_SEL: FieldSpan = DEBUG_LEVEL.then(U32);
pub const RORY_CONTROL: FieldSpan = UART_SEL.then(U32);
pub const MOVINAND_CHECKSUM_DONE: FieldSpan = RORY_CONTROL.then(U32);
pub const MOVINAND_CHECKSUM_PASS: FieldSpan = MOVINAND_CHECKSUM_DONE.then(U32);
pub const CP_UPDATE: FieldSpan = MOVINAND_CHECKSUM_PASS.then(U32);
pub const SAPA: FieldSpan = CP_UPDATE.then(3 * U32);
pub const NORMAL_POWEROFF: FieldSpan = SAPA.then(U32);
pub const BARCODE_IMEI: FieldSpan = NORMAL_POWEROFF.then(BARCODE_LEN);
pub const BARCODE_MEID: FieldSpan = BARCODE_IMEI.then(BARCODE_LEN);
pub const BARCODE_SN: FieldSpan = BARCODE_MEID.then(BARCODE_LEN);
pub const BARCODE_PRDATE: FieldSpan = BARCODE_SN.then(BARCODE_LEN);
pub const BARCODE_SKU: FieldSpan = BARCODE_PRDATE.then(BARCODE_LEN);
pub const WIRELESS_CHARGING_MODE: FieldSpan = BARCODE_SKU.then(U32);
pub const AFC_DISABLE: FieldSpan = WIRELESS_CHARGING_MODE.then(U32);
pub const CP_RESERVED_MEM: FieldSpan = AFC_DISABLE.then(U32);
pub const CARRIER_ID: FieldSpan = CP_RESERVED_MEM.then(4);
pub const SALES: FieldSpan = CARRIER_ID.then(4);
pub const LCD_RESOLUTION: FieldSpan = SALES.then(8);
pub const API_GPIO_TEST: FieldSpan = LCD_RESOLUTION.then(U32);
pub const API_GPIO_TEST_RESULT: FieldSpan = API_GPIO_TEST.then(TEXT_LEN);
pub const REBOOT_RECOVERY_CAUSE: FieldSpan = API_GPIO_TEST_RESULT.then(TEXT_LEN);
pub const REMOTE_LOCK: FieldSpan = REBOOT_RECOVERY_CAUSE.then(U32);

/// Total size of the persisted parameter block
pub const PARAM_BLOCK_SIZE: usize = REMOTE_LOCK.end();

/// Size of the out-of-band NAD result record
pub const NAD_RECORD_SIZE: usize = 512;

/// Size of the out-of-band NAD DDR result record
pub const NAD_DDR_RESULT_SIZE: usize = 8;

/// In-memory mirror of the parameter block
#[derive(Debug)]
pub struct ParameterBlock {
    bytes: Box<[u8]>,
}

impl ParameterBlock {
    /// Allocate a zeroed block, reporting allocation failure instead of aborting
    pub fn try_new() -> Result<Self> {
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(PARAM_BLOCK_SIZE)
            .map_err(|_| Error::AllocationFailed {
                size: PARAM_BLOCK_SIZE,
            })?;
        bytes.resize(PARAM_BLOCK_SIZE, 0);

        Ok(Self {
            bytes: bytes.into_boxed_slice(),
        })
    }

    /// The whole block as stored on disk
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Replace the mirror with a full on-disk image
    pub fn load(&mut self, image: &[u8]) -> Result<()> {
        if image.len() != PARAM_BLOCK_SIZE {
            return Err(Error::internal(format!(
                "parameter image is {} bytes, expected {}",
                image.len(),
                PARAM_BLOCK_SIZE
            )));
        }
        self.bytes.copy_from_slice(image);
        Ok(())
    }

    /// Bytes of one field
    pub fn field(&self, span: FieldSpan) -> &[u8] {
        &self.bytes[span.offset..span.end()]
    }

    /// Mutable bytes of one field
    pub fn field_mut(&mut self, span: FieldSpan) -> &mut [u8] {
        &mut self.bytes[span.offset..span.end()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [FieldSpan; 23] = [
        DEBUG_LEVEL,
        UART_SEL,
        RORY_CONTROL,
        MOVINAND_CHECKSUM_DONE,
        MOVINAND_CHECKSUM_PASS,
        CP_UPDATE,
        SAPA,
        NORMAL_POWEROFF,
        BARCODE_IMEI,
        BARCODE_MEID,
        BARCODE_SN,
        BARCODE_PRDATE,
        BARCODE_SKU,
        WIRELESS_CHARGING_MODE,
        AFC_DISABLE,
        CP_RESERVED_MEM,
        CARRIER_ID,
        SALES,
        LCD_RESOLUTION,
        API_GPIO_TEST,
        API_GPIO_TEST_RESULT,
        REBOOT_RECOVERY_CAUSE,
        REMOTE_LOCK,
    ];

    #[test]
    fn test_spans_are_contiguous() {
        assert_eq!(ALL[0].offset, 0);
        for pair in ALL.windows(2) {
            assert_eq!(pair[0].end(), pair[1].offset);
        }
        assert_eq!(ALL[ALL.len() - 1].end(), PARAM_BLOCK_SIZE);
        assert_eq!(PARAM_BLOCK_SIZE, 748);
    }

    #[test]
    fn test_field_access() {
        let mut block = ParameterBlock::try_new().unwrap();
        assert!(block.as_bytes().iter().all(|&b| b == 0));

        block.field_mut(CARRIER_ID).copy_from_slice(b"XAA\0");
        assert_eq!(block.field(CARRIER_ID), b"XAA\0");
        assert_eq!(&block.as_bytes()[CARRIER_ID.offset..CARRIER_ID.end()], b"XAA\0");
        assert_eq!(block.field(SALES), &[0u8; 4]);
    }

    #[test]
    fn test_load_rejects_wrong_size() {
        let mut block = ParameterBlock::try_new().unwrap();
        assert!(block.load(&[1u8; 16]).is_err());

        let image = vec![7u8; PARAM_BLOCK_SIZE];
        block.load(&image).unwrap();
        assert_eq!(block.field(REMOTE_LOCK), &[7u8; 4]);
    }
}
