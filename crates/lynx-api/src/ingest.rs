use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use tracing::{info, warn};
use uuid::Uuid;

use lynx_db::models::{AttachmentRow, PinRow};
use lynx_types::api::{IngestResponse, UploadResponse};
use lynx_types::models::{Attachment, AttachmentKind, Pin};

use crate::error::ApiError;
use crate::vault::StoredFile;
use crate::{run_blocking, AppState};

/// Fallback drop point for ingested items when the client sends no
/// coordinates.
const DEFAULT_INGEST_LAT: f64 = 40.7178;
const DEFAULT_INGEST_LNG: f64 = -74.0431;

/// Drop point for single uploads.
const DEFAULT_UPLOAD_LAT: f64 = 40.7128;
const DEFAULT_UPLOAD_LNG: f64 = -74.0060;

/// A file that reached the vault during multipart processing, waiting for
/// its attachment/pin rows.
struct IngestFile {
    stored: StoredFile,
    mime: String,
}

/// POST /api/ingest — bulk seed: multipart `files` parts plus a `urls` text
/// field (one URL per line) and optional `lat`/`lng` defaults.
///
/// Files are processed before URLs. Items fail independently: a bad file or
/// DB hiccup skips that item, and the response counts successes only.
pub async fn ingest(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<IngestResponse>, ApiError> {
    let mut files: Vec<IngestFile> = Vec::new();
    let mut urls = String::new();
    let mut lat: Option<f64> = None;
    let mut lng: Option<f64> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "urls" => {
                urls = field
                    .text()
                    .await
                    .map_err(|e| ApiError::validation(format!("unreadable urls field: {}", e)))?;
            }
            "lat" => {
                lat = field.text().await.ok().and_then(|v| v.parse().ok());
            }
            "lng" => {
                lng = field.text().await.ok().and_then(|v| v.parse().ok());
            }
            _ => {
                // Anything carrying a filename is treated as an upload.
                let Some(original_name) = field.file_name().map(str::to_string) else {
                    continue;
                };
                let mime = field.content_type().unwrap_or_default().to_string();

                let mut sink = match state.vault.writer(&original_name).await {
                    Ok(sink) => sink,
                    Err(e) => {
                        warn!("Skipping '{}': vault open failed: {:#}", original_name, e);
                        continue;
                    }
                };

                let mut failed = false;
                while let Some(chunk) = field.chunk().await.map_err(|e| {
                    ApiError::validation(format!("malformed multipart body: {}", e))
                })? {
                    if let Err(e) = sink.write(&chunk).await {
                        warn!("Skipping '{}': vault write failed: {:#}", original_name, e);
                        failed = true;
                        break;
                    }
                }
                if failed {
                    continue;
                }

                match sink.finish().await {
                    Ok(stored) => files.push(IngestFile { stored, mime }),
                    Err(e) => warn!("Skipping '{}': vault finish failed: {:#}", original_name, e),
                }
            }
        }
    }

    let url_lines: Vec<String> = urls
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();

    let (response, pins) = ingest_batch(&state, files, url_lines, lat, lng).await?;
    for pin in &pins {
        state.hub.publish(pin);
    }

    info!(
        "Ingest created {} pins, {} attachments",
        response.created_pins, response.created_attachments
    );
    Ok(Json(response))
}

/// Create attachment + linked pin rows for every ingested item. Files
/// first, then URLs. Returns the response counts and the created pins for
/// broadcasting.
async fn ingest_batch(
    state: &AppState,
    files: Vec<IngestFile>,
    url_lines: Vec<String>,
    lat: Option<f64>,
    lng: Option<f64>,
) -> Result<(IngestResponse, Vec<Pin>), ApiError> {
    let dlat = lat.unwrap_or(DEFAULT_INGEST_LAT);
    let dlng = lng.unwrap_or(DEFAULT_INGEST_LNG);

    let db = state.db.clone();
    run_blocking(move || {
        let mut created_pins = 0;
        let mut created_attachments = 0;
        let mut pins = Vec::new();

        for item in files {
            let title = item.stored.name.clone();
            let notes = format!("file evidence (sha256 {}…)", &item.stored.sha256[..12]);
            let attachment = file_attachment(&item);

            match insert_linked(&db, &attachment, "evidence", &title, &notes, dlat, dlng) {
                Ok(pin) => {
                    created_attachments += 1;
                    created_pins += 1;
                    pins.push(pin);
                }
                Err(e) => warn!("Ingest item '{}' failed: {:#}", title, e),
            }
        }

        for line in url_lines {
            let title = title_from_url(&line);
            let notes = format!("linked source: {}", line);
            let attachment = link_attachment_model(&line);

            match insert_linked(&db, &attachment, "article", &title, &notes, dlat, dlng) {
                Ok(pin) => {
                    created_attachments += 1;
                    created_pins += 1;
                    pins.push(pin);
                }
                Err(e) => warn!("Ingest url '{}' failed: {:#}", line, e),
            }
        }

        Ok((
            IngestResponse {
                ok: true,
                created_pins,
                created_attachments,
            },
            pins,
        ))
    })
    .await
}

/// POST /api/upload — single multipart file; stores it in the vault and
/// drops a generated evidence pin for it.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut uploaded: Option<IngestFile> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("malformed multipart body: {}", e)))?
    {
        let Some(original_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let mime = field.content_type().unwrap_or_default().to_string();

        let mut sink = state.vault.writer(&original_name).await?;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| ApiError::validation(format!("malformed multipart body: {}", e)))?
        {
            sink.write(&chunk).await?;
        }
        let stored = sink.finish().await?;
        uploaded = Some(IngestFile { stored, mime });
        break;
    }

    let Some(item) = uploaded else {
        return Err(ApiError::validation("file required"));
    };

    let title = format!("Upload: {}", item.stored.name);
    let notes = format!("type={} bytes={}", item.mime, item.stored.size);
    let attachment = file_attachment(&item);

    let db = state.db.clone();
    let att = attachment.clone();
    let pin = run_blocking(move || {
        insert_linked(
            &db,
            &att,
            "evidence",
            &title,
            &notes,
            DEFAULT_UPLOAD_LAT,
            DEFAULT_UPLOAD_LNG,
        )
    })
    .await?;

    state.hub.publish(&pin);

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            ok: true,
            attachment,
            pin,
        }),
    ))
}

// ── Helpers ─────────────────────────────────────────────────────────────

fn file_attachment(item: &IngestFile) -> Attachment {
    Attachment {
        id: Uuid::new_v4(),
        kind: AttachmentKind::File,
        name: item.stored.name.clone(),
        path: item.stored.path.clone(),
        url: String::new(),
        mime: item.mime.clone(),
        size: item.stored.size,
        sha256: item.stored.sha256.clone(),
        created_at: chrono::Utc::now(),
    }
}

fn link_attachment_model(url: &str) -> Attachment {
    Attachment {
        id: Uuid::new_v4(),
        kind: AttachmentKind::Link,
        name: String::new(),
        path: String::new(),
        url: url.to_string(),
        mime: String::new(),
        size: 0,
        sha256: String::new(),
        created_at: chrono::Utc::now(),
    }
}

/// Insert one attachment plus its linked pin, returning the full pin for
/// broadcasting.
fn insert_linked(
    db: &lynx_db::Database,
    attachment: &Attachment,
    pin_kind: &str,
    title: &str,
    notes: &str,
    lat: f64,
    lng: f64,
) -> anyhow::Result<Pin> {
    db.insert_attachment(&AttachmentRow {
        id: attachment.id.to_string(),
        kind: attachment.kind.as_str().to_string(),
        name: attachment.name.clone(),
        path: attachment.path.clone(),
        url: attachment.url.clone(),
        mime: attachment.mime.clone(),
        size: attachment.size,
        sha256: attachment.sha256.clone(),
        created_at: attachment.created_at.to_rfc3339(),
    })?;

    let pin_id = Uuid::new_v4();
    let created_at = chrono::Utc::now();
    db.insert_pin(
        &PinRow {
            id: pin_id.to_string(),
            kind: pin_kind.to_string(),
            title: title.to_string(),
            notes: notes.to_string(),
            lat,
            lng,
            severity: 3,
            created_at: created_at.to_rfc3339(),
        },
        &[attachment.id.to_string()],
    )?;

    Ok(Pin {
        id: pin_id,
        kind: pin_kind.to_string(),
        title: title.to_string(),
        notes: notes.to_string(),
        lat,
        lng,
        severity: 3,
        created_at,
        attachments: vec![attachment.clone()],
    })
}

/// Pin title for a URL line: the host when the URL parses, else the raw
/// line.
fn title_from_url(line: &str) -> String {
    let stripped = line
        .strip_prefix("https://")
        .or_else(|| line.strip_prefix("http://"))
        .unwrap_or(line);
    let host = stripped.split('/').next().unwrap_or_default();
    if host.is_empty() {
        line.to_string()
    } else {
        host.to_string()
    }
}
