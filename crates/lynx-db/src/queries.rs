use crate::models::{AttachmentRow, PinRow, WipeOutcome};
use crate::Database;
use anyhow::Result;
use rusqlite::Connection;

impl Database {
    // -- Pins --

    /// Insert a pin and link the given attachments in one transaction.
    /// Links are idempotent; a duplicate pair is a no-op.
    pub fn insert_pin(&self, pin: &PinRow, attachment_ids: &[String]) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "INSERT INTO pins (id, kind, title, notes, lat, lng, severity, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    pin.id,
                    pin.kind,
                    pin.title,
                    pin.notes,
                    pin.lat,
                    pin.lng,
                    pin.severity,
                    pin.created_at,
                ],
            )?;
            for aid in attachment_ids {
                // Links only attachments that exist; unknown ids are skipped.
                tx.execute(
                    "INSERT OR IGNORE INTO pin_attachments (pin_id, attachment_id)
                     SELECT ?1, id FROM attachments WHERE id = ?2",
                    rusqlite::params![pin.id, aid],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    /// All pins, newest first. Same-timestamp inserts keep insertion order
    /// via the rowid tie-break.
    pub fn list_pins(&self) -> Result<Vec<PinRow>> {
        self.with_conn(|conn| query_pins(conn))
    }

    // -- Attachments --

    pub fn insert_attachment(&self, att: &AttachmentRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO attachments (id, kind, name, path, url, mime, size, sha256, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    att.id,
                    att.kind,
                    att.name,
                    att.path,
                    att.url,
                    att.mime,
                    att.size,
                    att.sha256,
                    att.created_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Link an attachment to a pin. Idempotent; linking an unknown
    /// attachment id is a no-op.
    pub fn link_attachment(&self, pin_id: &str, attachment_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO pin_attachments (pin_id, attachment_id)
                 SELECT ?1, id FROM attachments WHERE id = ?2",
                rusqlite::params![pin_id, attachment_id],
            )?;
            Ok(())
        })
    }

    /// Batch-fetch attachments for a set of pin IDs. Returns (pin_id, row)
    /// pairs; the caller groups them. Single query, no N+1.
    pub fn attachments_for_pins(&self, pin_ids: &[String]) -> Result<Vec<(String, AttachmentRow)>> {
        if pin_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=pin_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT pa.pin_id, a.id, a.kind, a.name, a.path, a.url, a.mime, a.size, a.sha256, a.created_at
                 FROM attachments a
                 JOIN pin_attachments pa ON pa.attachment_id = a.id
                 WHERE pa.pin_id IN ({})
                 ORDER BY pa.rowid",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = pin_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        AttachmentRow {
                            id: row.get(1)?,
                            kind: row.get(2)?,
                            name: row.get(3)?,
                            path: row.get(4)?,
                            url: row.get(5)?,
                            mime: row.get(6)?,
                            size: row.get(7)?,
                            sha256: row.get(8)?,
                            created_at: row.get(9)?,
                        },
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Wipe --

    /// Clear pins, attachments and the link table atomically. Uploaded bytes
    /// on disk are deliberately retained (vault policy). Zero rows cleared
    /// is still a successful wipe.
    pub fn wipe(&self) -> Result<WipeOutcome> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute("DELETE FROM pin_attachments", [])?;
            let cleared_pins = tx.execute("DELETE FROM pins", [])?;
            let cleared_attachments = tx.execute("DELETE FROM attachments", [])?;
            tx.commit()?;
            Ok(WipeOutcome {
                cleared_pins,
                cleared_attachments,
            })
        })
    }
}

fn query_pins(conn: &Connection) -> Result<Vec<PinRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, kind, title, notes, lat, lng, severity, created_at
         FROM pins
         ORDER BY created_at DESC, rowid DESC",
    )?;

    let rows = stmt
        .query_map([], |row| {
            Ok(PinRow {
                id: row.get(0)?,
                kind: row.get(1)?,
                title: row.get(2)?,
                notes: row.get(3)?,
                lat: row.get(4)?,
                lng: row.get(5)?,
                severity: row.get(6)?,
                created_at: row.get(7)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn pin(title: &str, created_at: &str) -> PinRow {
        PinRow {
            id: Uuid::new_v4().to_string(),
            kind: "evidence".into(),
            title: title.into(),
            notes: String::new(),
            lat: 40.7,
            lng: -74.0,
            severity: 3,
            created_at: created_at.into(),
        }
    }

    fn att(id: &str) -> AttachmentRow {
        AttachmentRow {
            id: id.into(),
            kind: "file".into(),
            name: "a.bin".into(),
            path: "/tmp/a.bin".into(),
            url: String::new(),
            mime: "application/octet-stream".into(),
            size: 3,
            sha256: "abc".into(),
            created_at: "2026-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn list_is_newest_first_with_insertion_order_tiebreak() {
        let db = Database::open_in_memory().unwrap();

        db.insert_pin(&pin("old", "2026-01-01T00:00:00Z"), &[]).unwrap();
        db.insert_pin(&pin("tie-a", "2026-01-02T00:00:00Z"), &[]).unwrap();
        db.insert_pin(&pin("tie-b", "2026-01-02T00:00:00Z"), &[]).unwrap();

        let titles: Vec<String> = db
            .list_pins()
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, vec!["tie-b", "tie-a", "old"]);
    }

    #[test]
    fn inserted_pin_appears_exactly_once() {
        let db = Database::open_in_memory().unwrap();
        let p = pin("only", "2026-01-01T00:00:00Z");
        db.insert_pin(&p, &[]).unwrap();

        let rows = db.list_pins().unwrap();
        assert_eq!(rows.iter().filter(|r| r.id == p.id).count(), 1);
    }

    #[test]
    fn linking_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let p = pin("with-file", "2026-01-01T00:00:00Z");
        db.insert_attachment(&att("a1")).unwrap();
        db.insert_pin(&p, &["a1".to_string()]).unwrap();
        db.link_attachment(&p.id, "a1").unwrap();
        db.link_attachment(&p.id, "a1").unwrap();

        let atts = db.attachments_for_pins(&[p.id.clone()]).unwrap();
        assert_eq!(atts.len(), 1);
        assert_eq!(atts[0].1.id, "a1");
    }

    #[test]
    fn attachments_batch_fetch_groups_by_pin() {
        let db = Database::open_in_memory().unwrap();
        let p1 = pin("one", "2026-01-01T00:00:00Z");
        let p2 = pin("two", "2026-01-01T00:00:01Z");
        db.insert_attachment(&att("a1")).unwrap();
        db.insert_attachment(&att("a2")).unwrap();
        db.insert_pin(&p1, &["a1".to_string()]).unwrap();
        db.insert_pin(&p2, &["a2".to_string()]).unwrap();

        let rows = db
            .attachments_for_pins(&[p1.id.clone(), p2.id.clone()])
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().any(|(pid, a)| *pid == p1.id && a.id == "a1"));
        assert!(rows.iter().any(|(pid, a)| *pid == p2.id && a.id == "a2"));
    }

    #[test]
    fn wipe_clears_everything_and_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.insert_attachment(&att("a1")).unwrap();
        db.insert_pin(&pin("doomed", "2026-01-01T00:00:00Z"), &["a1".to_string()])
            .unwrap();

        let first = db.wipe().unwrap();
        assert_eq!(first.cleared_pins, 1);
        assert_eq!(first.cleared_attachments, 1);
        assert!(db.list_pins().unwrap().is_empty());

        // Wiping an already-empty store succeeds with zero counts.
        let second = db.wipe().unwrap();
        assert_eq!(second.cleared_pins, 0);
        assert_eq!(second.cleared_attachments, 0);
        assert!(db.list_pins().unwrap().is_empty());
    }
}
