use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Attachment, Pin};

// -- Health --

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
}

// -- Pins --

fn default_severity() -> i64 {
    3
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePinRequest {
    pub kind: String,
    pub title: String,
    #[serde(default)]
    pub notes: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(default = "default_severity")]
    pub severity: i64,
    /// Existing attachments to link to the new pin. Linking is idempotent.
    #[serde(default)]
    pub attachment_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct CreatePinResponse {
    pub ok: bool,
    pub id: Uuid,
}

// -- Wipe --

#[derive(Debug, Serialize)]
pub struct WipeResponse {
    pub ok: bool,
    pub mode: &'static str,
    pub cleared_pins: usize,
    pub cleared_attachments: usize,
}

// -- Upload / ingest --

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub ok: bool,
    pub attachment: Attachment,
    pub pin: Pin,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub ok: bool,
    pub created_pins: usize,
    pub created_attachments: usize,
}
