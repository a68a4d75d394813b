use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A location-tagged annotation record, the primary user-facing entity.
/// Pins are immutable after creation; the only destructive operation is a
/// full wipe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pin {
    pub id: Uuid,
    /// Free-form category tag ("evidence", "article", "vehicle", ...).
    pub kind: String,
    pub title: String,
    pub notes: String,
    pub lat: f64,
    pub lng: f64,
    pub severity: i64,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    pub attachments: Vec<Attachment>,
}

/// What kind of evidence an attachment carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    File,
    Link,
}

impl AttachmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Link => "link",
        }
    }
}

/// A file or external link evidencing a pin.
///
/// `path`, `mime`, `size` and `sha256` are only meaningful for files;
/// they are empty/zero for links. `url` is only set for links.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    pub kind: AttachmentKind,
    pub name: String,
    pub path: String,
    pub url: String,
    pub mime: String,
    pub size: i64,
    pub sha256: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}
