//! Fill-if-absent field merging
//!
//! Used when a won offer's data flows onto its project: a project field is
//! written only when it is still empty, so explicit project data survives a
//! repeated or late win.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A value that can be "not yet set".
pub trait Absent {
    /// Whether the slot should be treated as empty.
    fn is_absent(&self) -> bool;
}

impl Absent for String {
    fn is_absent(&self) -> bool {
        self.trim().is_empty()
    }
}

impl Absent for f64 {
    fn is_absent(&self) -> bool {
        self.abs() < f64::EPSILON
    }
}

impl<T: Absent> Absent for Option<T> {
    fn is_absent(&self) -> bool {
        self.as_ref().map_or(true, Absent::is_absent)
    }
}

impl Absent for Uuid {
    fn is_absent(&self) -> bool {
        self.is_nil()
    }
}

impl Absent for DateTime<Utc> {
    fn is_absent(&self) -> bool {
        self.timestamp() == 0
    }
}

/// Write `incoming` into `slot` when `slot` is absent and `incoming` is not.
///
/// Returns whether the slot changed.
pub fn fill_if_absent<T: Absent>(slot: &mut T, incoming: T) -> bool {
    if slot.is_absent() && !incoming.is_absent() {
        *slot = incoming;
        true
    } else {
        false
    }
}
