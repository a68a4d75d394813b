use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS pins (
            id          TEXT PRIMARY KEY,
            kind        TEXT NOT NULL,
            title       TEXT NOT NULL,
            notes       TEXT NOT NULL DEFAULT '',
            lat         REAL NOT NULL,
            lng         REAL NOT NULL,
            severity    INTEGER NOT NULL DEFAULT 3,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_pins_created
            ON pins(created_at);

        CREATE TABLE IF NOT EXISTS attachments (
            id          TEXT PRIMARY KEY,
            kind        TEXT NOT NULL,          -- file | link
            name        TEXT NOT NULL DEFAULT '',
            path        TEXT NOT NULL DEFAULT '',
            url         TEXT NOT NULL DEFAULT '',
            mime        TEXT NOT NULL DEFAULT '',
            size        INTEGER NOT NULL DEFAULT 0,
            sha256      TEXT NOT NULL DEFAULT '',
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS pin_attachments (
            pin_id          TEXT NOT NULL REFERENCES pins(id),
            attachment_id   TEXT NOT NULL REFERENCES attachments(id),
            PRIMARY KEY (pin_id, attachment_id)
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
