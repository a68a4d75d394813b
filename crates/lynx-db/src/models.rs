/// Raw pin row as stored in SQLite. Timestamps stay RFC 3339 strings here;
/// the API layer parses them into chrono types.
#[derive(Debug, Clone)]
pub struct PinRow {
    pub id: String,
    pub kind: String,
    pub title: String,
    pub notes: String,
    pub lat: f64,
    pub lng: f64,
    pub severity: i64,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct AttachmentRow {
    pub id: String,
    pub kind: String,
    pub name: String,
    pub path: String,
    pub url: String,
    pub mime: String,
    pub size: i64,
    pub sha256: String,
    pub created_at: String,
}

/// What a successful wipe cleared.
#[derive(Debug, Clone, Copy)]
pub struct WipeOutcome {
    pub cleared_pins: usize,
    pub cleared_attachments: usize,
}
