//! Human-readable memory sizes.
//!
//! Sizes use binary multipliers regardless of the suffix spelling: `100m`,
//! `100M`, `100mb` and `100MiB` all mean 100 * 1024 * 1024 bytes.

use super::ValidationError;
use regex::Regex;
use std::sync::LazyLock;

pub const KIB: i64 = 1 << 10;
pub const MIB: i64 = 1 << 20;
pub const GIB: i64 = 1 << 30;
pub const TIB: i64 = 1 << 40;
pub const PIB: i64 = 1 << 50;

static RAM_SIZE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+(\.\d+)*) ?([kKmMgGtTpP])?[iI]?[bB]?$").expect("size pattern compiles")
});

const BINARY_UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];

/// Parse a human-readable size into bytes.
pub fn ram_in_bytes(size: &str) -> Result<i64, String> {
    let invalid = || format!("invalid size: '{}'", size);

    let caps = RAM_SIZE.captures(size).ok_or_else(invalid)?;
    let value: f64 = caps[1].parse().map_err(|_| invalid())?;

    let multiplier = match caps.get(3).map(|m| m.as_str().to_ascii_lowercase()).as_deref() {
        None => 1,
        Some("k") => KIB,
        Some("m") => MIB,
        Some("g") => GIB,
        Some("t") => TIB,
        Some("p") => PIB,
        Some(_) => return Err(invalid()),
    };

    let bytes = value * multiplier as f64;
    if !bytes.is_finite() || bytes >= i64::MAX as f64 {
        return Err(format!("size out of range: '{}'", size));
    }
    Ok(bytes as i64)
}

/// Render a byte count with the largest binary unit it reaches.
///
/// The output parses back through [`ram_in_bytes`] to the same count.
pub fn format_ram(bytes: i64) -> String {
    let mut size = bytes as f64;
    let mut unit = 0;
    while size.abs() >= 1024.0 && unit < BINARY_UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{}{}", size, BINARY_UNITS[unit])
}

/// `--memory`: empty leaves the limit unset.
pub fn parse_memory(memory: &str) -> Result<i64, ValidationError> {
    if memory.is_empty() {
        return Ok(0);
    }
    ram_in_bytes(memory).map_err(|reason| ValidationError::new("memory", memory, reason))
}

/// `--memory-swap`: empty leaves it unset, `-1` means unlimited.
pub fn parse_memory_swap(memory_swap: &str) -> Result<i64, ValidationError> {
    match memory_swap {
        "" => Ok(0),
        "-1" => Ok(-1),
        _ => ram_in_bytes(memory_swap)
            .map_err(|reason| ValidationError::new("memory-swap", memory_swap, reason)),
    }
}
