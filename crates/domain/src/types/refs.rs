//! Cross-entity references and collaborator payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "ts-gen")]
use ts_rs::TS;
use uuid::Uuid;

use crate::impl_domain_status_conversions;

/// The user performing an operation, resolved by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    pub display_name: String,
}

impl Actor {
    /// Create an actor from an id and display name.
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), display_name: display_name.into() }
    }

    /// Actor used by scheduled jobs.
    pub fn system() -> Self {
        Self::new("system", "System")
    }
}

/// Kind tag of an [`EntityRef`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Deal,
    Offer,
    Project,
}

impl_domain_status_conversions!(EntityKind {
    Deal => "deal",
    Offer => "offer",
    Project => "project",
});

/// Polymorphic reference to one of the lifecycle entities.
///
/// Used as the target of activity entries and as the owner of stored files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EntityRef {
    Deal(Uuid),
    Offer(Uuid),
    Project(Uuid),
}

impl EntityRef {
    /// Kind tag.
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Deal(_) => EntityKind::Deal,
            Self::Offer(_) => EntityKind::Offer,
            Self::Project(_) => EntityKind::Project,
        }
    }

    /// Referenced id.
    pub const fn id(&self) -> Uuid {
        match self {
            Self::Deal(id) | Self::Offer(id) | Self::Project(id) => *id,
        }
    }

    /// Rebuild a reference from its stored kind and id.
    pub const fn from_parts(kind: EntityKind, id: Uuid) -> Self {
        match kind {
            EntityKind::Deal => Self::Deal(id),
            EntityKind::Offer => Self::Offer(id),
            EntityKind::Project => Self::Project(id),
        }
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

/// Customer as seen through the contact directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRef {
    pub id: Uuid,
    pub name: String,
    /// Company the customer is primarily served by, if any.
    pub company_id: Option<String>,
}

/// User as seen through the contact directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: String,
    pub display_name: String,
}

/// Organisational unit settings relevant to numbering and ownership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub id: String,
    /// Two-letter number prefix, e.g. `ST`.
    pub prefix: String,
    pub default_responsible: Option<UserRef>,
}

/// Append-only activity entry written after a successful operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: Uuid,
    pub target: EntityRef,
    pub target_name: String,
    pub title: String,
    pub body: String,
    pub actor_id: String,
    pub actor_name: String,
    pub occurred_at: DateTime<Utc>,
}

impl ActivityEntry {
    /// Create an entry stamped now.
    pub fn new(
        target: EntityRef,
        target_name: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
        actor: &Actor,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            target,
            target_name: target_name.into(),
            title: title.into(),
            body: body.into(),
            actor_id: actor.user_id.clone(),
            actor_name: actor.display_name.clone(),
            occurred_at: Utc::now(),
        }
    }
}

/// Outbound notification handed to the notifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient_id: String,
    pub title: String,
    pub body: String,
    pub target: EntityRef,
}
