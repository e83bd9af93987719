//! Random container IDs and in-process reservations.

use crate::env::{self, identity};
use dashmap::DashSet;
use rand::Rng;
use std::fmt::Write;
use std::sync::Arc;

/// 32 random bytes, hex encoded.
///
/// IDs whose short form is all digits are regenerated, so a short ID can
/// never be mistaken for a number.
pub fn random_id() -> String {
    let mut rng = rand::rng();
    loop {
        let mut bytes = [0u8; identity::ID_LENGTH / 2];
        rng.fill(&mut bytes);

        let id = bytes.iter().fold(String::with_capacity(identity::ID_LENGTH), |mut s, b| {
            let _ = write!(s, "{:02x}", b);
            s
        });

        if !env::short_id(&id).bytes().all(|b| b.is_ascii_digit()) {
            return id;
        }
    }
}

/// An allocated ID not yet persisted.
///
/// Holds an in-process reservation so no concurrent allocation can settle on
/// the same value. Dropping the guard releases it.
#[derive(Debug)]
pub struct ReservedId {
    id: String,
    reservations: Arc<DashSet<String>>,
}

impl ReservedId {
    /// Reserve `id`, or `None` if another allocation holds it.
    pub(crate) fn try_reserve(id: String, reservations: &Arc<DashSet<String>>) -> Option<Self> {
        if !reservations.insert(id.clone()) {
            return None;
        }
        Some(Self {
            id,
            reservations: Arc::clone(reservations),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for ReservedId {
    fn drop(&mut self) {
        self.reservations.remove(&self.id);
    }
}
