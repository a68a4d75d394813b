use std::collections::HashMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use tracing::{info, warn};
use uuid::Uuid;

use lynx_db::models::{AttachmentRow, PinRow};
use lynx_types::api::{CreatePinRequest, CreatePinResponse, WipeResponse};
use lynx_types::models::{Attachment, AttachmentKind, Pin};

use crate::error::ApiError;
use crate::{run_blocking, AppState};

/// GET /api/pins — all pins newest-first, attachments nested.
pub async fn list_pins(State(state): State<AppState>) -> Result<Json<Vec<Pin>>, ApiError> {
    let db = state.db.clone();
    let (rows, att_pairs) = run_blocking(move || {
        let rows = db.list_pins()?;
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let att_pairs = db.attachments_for_pins(&ids)?;
        Ok((rows, att_pairs))
    })
    .await?;

    Ok(Json(rows_to_pins(rows, att_pairs)))
}

/// POST /api/pins — create one pin, link any referenced attachments, then
/// broadcast it. The broadcast happens strictly after the durable insert.
pub async fn create_pin(
    State(state): State<AppState>,
    Json(req): Json<CreatePinRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.title.trim().is_empty() {
        return Err(ApiError::validation("title required"));
    }

    let pin_id = Uuid::new_v4();
    let row = PinRow {
        id: pin_id.to_string(),
        kind: req.kind,
        title: req.title,
        notes: req.notes,
        lat: req.lat,
        lng: req.lng,
        severity: req.severity,
        created_at: chrono::Utc::now().to_rfc3339(),
    };

    let db = state.db.clone();
    let insert_row = row.clone();
    let attachment_ids: Vec<String> = req.attachment_ids.iter().map(Uuid::to_string).collect();
    let att_pairs = run_blocking(move || {
        db.insert_pin(&insert_row, &attachment_ids)?;
        db.attachments_for_pins(&[insert_row.id.clone()])
    })
    .await?;

    let attachments = att_pairs.into_iter().map(|(_, a)| att_to_model(a)).collect();
    state.hub.publish(&row_to_pin(row, attachments));

    Ok((
        StatusCode::CREATED,
        Json(CreatePinResponse {
            ok: true,
            id: pin_id,
        }),
    ))
}

/// DELETE /api/pins and POST /api/wipe — clear all pins, attachments and
/// links. Uploaded bytes stay on disk. Idempotent; an empty store wipes
/// successfully with zero counts.
pub async fn wipe(State(state): State<AppState>) -> Result<Json<WipeResponse>, ApiError> {
    let db = state.db.clone();
    let outcome = run_blocking(move || db.wipe()).await?;

    info!(
        "Wipe cleared {} pins, {} attachments",
        outcome.cleared_pins, outcome.cleared_attachments
    );

    Ok(Json(WipeResponse {
        ok: true,
        mode: "sqlite",
        cleared_pins: outcome.cleared_pins,
        cleared_attachments: outcome.cleared_attachments,
    }))
}

// ── Row/model conversion ────────────────────────────────────────────────

pub(crate) fn rows_to_pins(rows: Vec<PinRow>, att_pairs: Vec<(String, AttachmentRow)>) -> Vec<Pin> {
    let mut by_pin: HashMap<String, Vec<Attachment>> = HashMap::new();
    for (pin_id, att) in att_pairs {
        by_pin.entry(pin_id).or_default().push(att_to_model(att));
    }

    rows.into_iter()
        .map(|row| {
            let attachments = by_pin.remove(&row.id).unwrap_or_default();
            row_to_pin(row, attachments)
        })
        .collect()
}

pub(crate) fn row_to_pin(row: PinRow, attachments: Vec<Attachment>) -> Pin {
    Pin {
        id: parse_id(&row.id),
        kind: row.kind,
        title: row.title,
        notes: row.notes,
        lat: row.lat,
        lng: row.lng,
        severity: row.severity,
        created_at: parse_ts(&row.created_at, &row.id),
        attachments,
    }
}

pub(crate) fn att_to_model(row: AttachmentRow) -> Attachment {
    let kind = match row.kind.as_str() {
        "file" => AttachmentKind::File,
        "link" => AttachmentKind::Link,
        other => {
            warn!("Unknown attachment kind '{}' on '{}'", other, row.id);
            AttachmentKind::File
        }
    };

    Attachment {
        id: parse_id(&row.id),
        kind,
        name: row.name,
        path: row.path,
        url: row.url,
        mime: row.mime,
        size: row.size,
        sha256: row.sha256,
        created_at: parse_ts(&row.created_at, &row.id),
    }
}

fn parse_id(id: &str) -> Uuid {
    id.parse().unwrap_or_else(|e| {
        warn!("Corrupt id '{}': {}", id, e);
        Uuid::default()
    })
}

fn parse_ts(ts: &str, id: &str) -> chrono::DateTime<chrono::Utc> {
    ts.parse::<chrono::DateTime<chrono::Utc>>()
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}' on '{}': {}", ts, id, e);
            chrono::DateTime::default()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::Vault;
    use lynx_db::Database;
    use lynx_hub::PinHub;
    use std::sync::Arc;

    async fn test_state() -> AppState {
        let dir = std::env::temp_dir().join(format!("lynx-pins-test-{}", Uuid::new_v4()));
        AppState {
            db: Arc::new(Database::open_in_memory().unwrap()),
            hub: PinHub::new(),
            vault: Arc::new(Vault::new(dir).await.unwrap()),
        }
    }

    fn req(title: &str) -> CreatePinRequest {
        CreatePinRequest {
            kind: "person".into(),
            title: title.into(),
            notes: String::new(),
            lat: 40.0,
            lng: -74.0,
            severity: 3,
            attachment_ids: vec![],
        }
    }

    #[tokio::test]
    async fn create_then_list_shows_pin_first() {
        let state = test_state().await;

        create_pin(State(state.clone()), Json(req("first")))
            .await
            .unwrap();
        create_pin(State(state.clone()), Json(req("second")))
            .await
            .unwrap();

        let Json(pins) = list_pins(State(state)).await.unwrap();
        assert_eq!(pins.len(), 2);
        assert_eq!(pins[0].title, "second");
        assert_eq!(pins[1].title, "first");
    }

    #[tokio::test]
    async fn empty_title_is_rejected_with_no_side_effects() {
        let state = test_state().await;
        let mut sub = state.hub.subscribe();

        let err = create_pin(State(state.clone()), Json(req("   ")))
            .await
            .err()
            .expect("blank title must be rejected");
        assert!(matches!(err, ApiError::Validation(_)));

        let Json(pins) = list_pins(State(state)).await.unwrap();
        assert!(pins.is_empty());
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn created_pin_is_broadcast_after_insert() {
        let state = test_state().await;
        let mut sub = state.hub.subscribe();

        create_pin(State(state.clone()), Json(req("John Doe")))
            .await
            .unwrap();

        let pin = sub.recv().await.unwrap();
        assert_eq!(pin.title, "John Doe");
        assert_eq!(pin.severity, 3);

        // Already durably listed by the time the event is observable.
        let Json(pins) = list_pins(State(state)).await.unwrap();
        assert_eq!(pins[0].id, pin.id);
    }

    #[tokio::test]
    async fn wipe_twice_yields_empty_listing_both_times() {
        let state = test_state().await;
        create_pin(State(state.clone()), Json(req("doomed")))
            .await
            .unwrap();

        let Json(first) = wipe(State(state.clone())).await.unwrap();
        assert!(first.ok);
        assert_eq!(first.cleared_pins, 1);
        let Json(pins) = list_pins(State(state.clone())).await.unwrap();
        assert!(pins.is_empty());

        let Json(second) = wipe(State(state.clone())).await.unwrap();
        assert!(second.ok);
        assert_eq!(second.cleared_pins, 0);
        let Json(pins) = list_pins(State(state)).await.unwrap();
        assert!(pins.is_empty());
    }

    #[tokio::test]
    async fn unknown_attachment_ids_are_skipped_not_fatal() {
        let state = test_state().await;
        let mut r = req("with ghost attachment");
        r.attachment_ids = vec![Uuid::new_v4()];

        create_pin(State(state.clone()), Json(r)).await.unwrap();

        let Json(pins) = list_pins(State(state)).await.unwrap();
        assert_eq!(pins.len(), 1);
        assert!(pins[0].attachments.is_empty());
    }
}
