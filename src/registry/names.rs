//! Container names: validation, generation windows and the name index.

use super::{RegistryError, Result};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use regex::Regex;
use std::sync::LazyLock;

static VALID_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/?[a-zA-Z0-9][a-zA-Z0-9_.-]+$").expect("name pattern compiles")
});

/// Check an explicit name and strip its optional leading `/`.
pub fn validate_name(name: &str) -> Result<String> {
    if !VALID_NAME.is_match(name) {
        return Err(RegistryError::InvalidName(name.to_string()));
    }
    Ok(name.strip_prefix('/').unwrap_or(name).to_string())
}

/// Successive `len`-character windows of `id`, starting at offset 0.
pub fn name_windows(id: &str, len: usize) -> impl Iterator<Item = &str> {
    let count = if len == 0 { 0 } else { (id.len() + 1).saturating_sub(len) };
    (0..count).filter_map(move |start| id.get(start..start + len))
}

/// `name → id` index.
///
/// Derived from the persisted objects; a reservation is the only way in, so
/// two callers can never both hold the same name.
#[derive(Debug, Default)]
pub struct NameIndex {
    names: DashMap<String, String>,
}

impl NameIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point `name` at `id` unless another ID already holds it.
    ///
    /// Reserving a name already held by the same ID succeeds.
    pub fn reserve(&self, name: &str, id: &str) -> bool {
        match self.names.entry(name.to_string()) {
            Entry::Occupied(entry) => entry.get() == id,
            Entry::Vacant(entry) => {
                entry.insert(id.to_string());
                true
            }
        }
    }

    /// Drop `name` if it still points at `id`.
    pub fn release(&self, name: &str, id: &str) -> bool {
        self.names.remove_if(name, |_, holder| holder == id).is_some()
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.names.get(name).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn clear(&self) {
        self.names.clear();
    }
}
