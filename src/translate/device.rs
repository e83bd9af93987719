//! Device mappings and block IO device settings.

use super::ValidationError;
use super::units::ram_in_bytes;
use crate::container::{DeviceMapping, ThrottleDevice, WeightDevice};

/// Cgroup permissions granted when a mapping names none.
pub const DEFAULT_DEVICE_PERMISSIONS: &str = "rwm";

const MIN_BLKIO_WEIGHT: u16 = 10;
const MAX_BLKIO_WEIGHT: u16 = 1000;

/// Whether `mode` is a non-empty, non-repeating combination of `r`, `w`, `m`.
pub fn valid_device_mode(mode: &str) -> bool {
    if mode.is_empty() {
        return false;
    }

    let mut seen = [false; 3];
    for c in mode.chars() {
        let slot = match c {
            'r' => 0,
            'w' => 1,
            'm' => 2,
            _ => return false,
        };
        if seen[slot] {
            return false;
        }
        seen[slot] = true;
    }
    true
}

/// Parse `hostpath[:containerpath[:mode]]`.
///
/// With two segments a valid mode in the second slot is taken as the mode
/// (`/dev/sda:rw`); otherwise it is the container path.
pub fn parse_device(raw: &str) -> Result<DeviceMapping, ValidationError> {
    let invalid = |reason: &str| ValidationError::new("device", raw, reason);

    let parts: Vec<&str> = raw.split(':').collect();
    let (src, dst, permissions) = match parts.as_slice() {
        [src] => (*src, "", DEFAULT_DEVICE_PERMISSIONS),
        [src, second] if valid_device_mode(second) => (*src, "", *second),
        [src, dst] => (*src, *dst, DEFAULT_DEVICE_PERMISSIONS),
        [src, dst, mode] => {
            if !valid_device_mode(mode) {
                return Err(invalid("invalid device mode"));
            }
            (*src, *dst, *mode)
        }
        _ => return Err(invalid("too many colons")),
    };

    if src.is_empty() {
        return Err(invalid("host path cannot be empty"));
    }

    Ok(DeviceMapping {
        path_on_host: src.to_string(),
        path_in_container: if dst.is_empty() { src } else { dst }.to_string(),
        cgroup_permissions: permissions.to_string(),
    })
}

pub fn parse_devices(entries: &[String]) -> Result<Vec<DeviceMapping>, ValidationError> {
    entries.iter().map(|entry| parse_device(entry)).collect()
}

/// `--blkio-weight`: 0 leaves it unset.
pub fn validate_blkio_weight(weight: u16) -> Result<u16, ValidationError> {
    if weight != 0 && !(MIN_BLKIO_WEIGHT..=MAX_BLKIO_WEIGHT).contains(&weight) {
        return Err(ValidationError::new(
            "blkio-weight",
            weight.to_string(),
            "must be in the range [10, 1000]",
        ));
    }
    Ok(weight)
}

/// Split `path:value` and check the path names a device node.
fn split_device_value<'a>(field: &'static str, raw: &'a str) -> Result<(&'a str, &'a str), ValidationError> {
    let (path, value) = raw
        .split_once(':')
        .filter(|(_, value)| !value.contains(':'))
        .ok_or_else(|| ValidationError::new(field, raw, "expected <device-path>:<value>"))?;

    if !path.starts_with("/dev/") {
        return Err(ValidationError::new(field, raw, "device path must start with /dev/"));
    }
    Ok((path, value))
}

/// `--blkio-weight-device path:weight`.
pub fn parse_weight_devices(entries: &[String]) -> Result<Vec<WeightDevice>, ValidationError> {
    const FIELD: &str = "blkio-weight-device";

    entries
        .iter()
        .map(|entry| {
            let (path, value) = split_device_value(FIELD, entry)?;
            let weight: u16 = value
                .parse()
                .map_err(|e| ValidationError::new(FIELD, entry, format!("invalid weight: {}", e)))?;
            if !(MIN_BLKIO_WEIGHT..=MAX_BLKIO_WEIGHT).contains(&weight) {
                return Err(ValidationError::new(
                    FIELD,
                    entry,
                    "weight must be in the range [10, 1000]",
                ));
            }
            Ok(WeightDevice {
                path: path.to_string(),
                weight,
            })
        })
        .collect()
}

/// `--device-{read,write}-bps path:size`; sizes accept the memory grammar.
pub fn parse_throttle_bps(
    field: &'static str,
    entries: &[String],
) -> Result<Vec<ThrottleDevice>, ValidationError> {
    entries
        .iter()
        .map(|entry| {
            let (path, value) = split_device_value(field, entry)?;
            let rate = ram_in_bytes(value).map_err(|reason| ValidationError::new(field, entry, reason))?;
            Ok(ThrottleDevice {
                path: path.to_string(),
                rate: rate as u64,
            })
        })
        .collect()
}

/// `--device-{read,write}-iops path:count`.
pub fn parse_throttle_iops(
    field: &'static str,
    entries: &[String],
) -> Result<Vec<ThrottleDevice>, ValidationError> {
    entries
        .iter()
        .map(|entry| {
            let (path, value) = split_device_value(field, entry)?;
            let rate: u64 = value
                .parse()
                .map_err(|e| ValidationError::new(field, entry, format!("invalid rate: {}", e)))?;
            Ok(ThrottleDevice {
                path: path.to_string(),
                rate,
            })
        })
        .collect()
}
