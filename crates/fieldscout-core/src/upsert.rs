//! Natural-key upsert semantics.
//!
//! A record's natural key is the only uniqueness criterion. Writing a record
//! whose key already exists replaces the mutable payload of the stored row in
//! place; the key and the row's realm/reporter binding never change. There is
//! no field-level merge.

use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

impl UpsertOutcome {
    pub fn from_created(created: bool) -> Self {
        if created {
            UpsertOutcome::Created
        } else {
            UpsertOutcome::Updated
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, UpsertOutcome::Created)
    }
}

pub trait Upsertable {
    type Key: Eq + Hash + Clone;

    fn natural_key(&self) -> Self::Key;

    /// Copies the mutable portion of `incoming` into `self`, leaving the
    /// natural key and ownership fields untouched.
    fn replace_payload(&mut self, incoming: Self);
}

/// Applies one upsert to an in-memory table. Callers must hold whatever lock
/// guards `rows` for the whole call; the lookup and the write are one step.
pub fn upsert_in<R: Upsertable>(rows: &mut HashMap<R::Key, R>, record: R) -> UpsertOutcome {
    match rows.get_mut(&record.natural_key()) {
        Some(existing) => {
            existing.replace_payload(record);
            UpsertOutcome::Updated
        }
        None => {
            rows.insert(record.natural_key(), record);
            UpsertOutcome::Created
        }
    }
}
