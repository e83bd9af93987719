//! Key/value options, restart policy, security options and range checks.

use super::ValidationError;
use crate::container::{RestartPolicy, RestartPolicyName};
use std::collections::BTreeMap;

/// Disk quota key used when an entry has no explicit mount path.
pub const ROOT_QUOTA_KEY: &str = "/";

/// Split `key=value` entries on the first `=`; later duplicates win.
fn parse_key_values(
    field: &'static str,
    entries: &[String],
) -> Result<BTreeMap<String, String>, ValidationError> {
    let mut map = BTreeMap::new();
    for entry in entries {
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| ValidationError::new(field, entry, "expected key=value"))?;
        map.insert(key.to_string(), value.to_string());
    }
    Ok(map)
}

pub fn parse_labels(entries: &[String]) -> Result<BTreeMap<String, String>, ValidationError> {
    parse_key_values("label", entries)
}

pub fn parse_sysctls(entries: &[String]) -> Result<BTreeMap<String, String>, ValidationError> {
    parse_key_values("sysctl", entries)
}

/// `--disk-quota`: `path=size`, or a bare `size` applying to `/`.
pub fn parse_disk_quota(entries: &[String]) -> Result<BTreeMap<String, String>, ValidationError> {
    let mut quotas = BTreeMap::new();
    for entry in entries {
        if entry.is_empty() {
            return Err(ValidationError::new("disk-quota", entry, "quota cannot be empty"));
        }

        let parts: Vec<&str> = entry.split('=').collect();
        let (key, value) = match parts.as_slice() {
            [size] => (ROOT_QUOTA_KEY, *size),
            [path, size] => (*path, *size),
            _ => {
                return Err(ValidationError::new(
                    "disk-quota",
                    entry,
                    "expected [path=]size",
                ));
            }
        };
        quotas.insert(key.to_string(), value.to_string());
    }
    Ok(quotas)
}

/// `--restart`: `""` means `no`, otherwise `name[:count]`.
pub fn parse_restart_policy(raw: &str) -> Result<RestartPolicy, ValidationError> {
    let invalid = |reason: String| ValidationError::new("restart", raw, reason);

    if raw.is_empty() {
        return Ok(RestartPolicy::default());
    }

    let parts: Vec<&str> = raw.split(':').collect();
    let (name, count) = match parts.as_slice() {
        [name] => (*name, None),
        [name, count] => (*name, Some(*count)),
        _ => return Err(invalid("expected name[:max-retry]".to_string())),
    };

    let name: RestartPolicyName = name.parse().map_err(invalid)?;
    let maximum_retry_count = match count {
        None => 0,
        Some(_) if name != RestartPolicyName::OnFailure => {
            return Err(invalid(format!(
                "maximum retry count cannot be used with restart policy {}",
                name
            )));
        }
        Some(count) => {
            let count: i64 = count
                .parse()
                .map_err(|e| invalid(format!("invalid maximum retry count: {}", e)))?;
            if count < 0 {
                return Err(invalid("maximum retry count cannot be negative".to_string()));
            }
            count
        }
    };

    Ok(RestartPolicy {
        name,
        maximum_retry_count,
    })
}

/// `--memory-swappiness`: -1 (inherit) or 0..=100.
pub fn validate_memory_swappiness(swappiness: i64) -> Result<i64, ValidationError> {
    if swappiness != -1 && !(0..=100).contains(&swappiness) {
        return Err(ValidationError::new(
            "memory-swappiness",
            swappiness.to_string(),
            "must be -1 or in the range [0, 100]",
        ));
    }
    Ok(swappiness)
}

/// `--oom-score-adj`: -1000..=1000.
pub fn validate_oom_score_adj(score: i64) -> Result<i64, ValidationError> {
    if !(-1000..=1000).contains(&score) {
        return Err(ValidationError::new(
            "oom-score-adj",
            score.to_string(),
            "must be in the range [-1000, 1000]",
        ));
    }
    Ok(score)
}

/// `--memory-wmark-ratio`: 0..=100.
pub fn validate_memory_wmark_ratio(ratio: i64) -> Result<i64, ValidationError> {
    if !(0..=100).contains(&ratio) {
        return Err(ValidationError::new(
            "memory-wmark-ratio",
            ratio.to_string(),
            "must be in the range [0, 100]",
        ));
    }
    Ok(ratio)
}

/// Profiles pulled out of `--security-opt` entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityProfiles {
    pub apparmor: Option<String>,
    pub seccomp: Option<String>,
}

/// `--security-opt`: `apparmor=<profile>` or `seccomp=<profile>`.
pub fn parse_security_opts(entries: &[String]) -> Result<SecurityProfiles, ValidationError> {
    let mut profiles = SecurityProfiles::default();
    for entry in entries {
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| ValidationError::new("security-opt", entry, "expected key=value"))?;

        match key {
            "apparmor" => profiles.apparmor = Some(value.to_string()),
            "seccomp" => profiles.seccomp = Some(value.to_string()),
            other => {
                return Err(ValidationError::new(
                    "security-opt",
                    entry,
                    format!("unknown security option {}", other),
                ));
            }
        }
    }
    Ok(profiles)
}
