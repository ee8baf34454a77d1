//! Field value parsing and rendering for the CLI

use anyhow::{Context, Result, bail};
use devparam_store::FieldKind;

/// Parse a command-line value into the bytes stored for a field of `kind`
pub fn parse(kind: FieldKind, input: &str) -> Result<Vec<u8>> {
    match kind {
        FieldKind::U32 => Ok(parse_u32(input)?.to_le_bytes().to_vec()),
        FieldKind::U32Array(len) => {
            let values = input
                .split(',')
                .map(|part| parse_u32(part.trim()))
                .collect::<Result<Vec<_>>>()?;
            if values.len() != len {
                bail!("expected {len} comma-separated values, got {}", values.len());
            }
            Ok(values.iter().flat_map(|v| v.to_le_bytes()).collect())
        }
        FieldKind::Text => Ok(input.as_bytes().to_vec()),
        FieldKind::Bytes => hex::decode(input).context("expected hex bytes"),
    }
}

/// Render stored bytes for display
pub fn render(kind: FieldKind, bytes: &[u8]) -> String {
    match kind {
        FieldKind::U32 | FieldKind::U32Array(_) => bytes
            .chunks_exact(4)
            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]).to_string())
            .collect::<Vec<_>>()
            .join(","),
        FieldKind::Text => {
            let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            String::from_utf8_lossy(&bytes[..end]).into_owned()
        }
        FieldKind::Bytes => hex::encode(bytes),
    }
}

fn parse_u32(input: &str) -> Result<u32> {
    let parsed = match input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => input.parse(),
    };
    parsed.with_context(|| format!("invalid number: {input:?}"))
}
