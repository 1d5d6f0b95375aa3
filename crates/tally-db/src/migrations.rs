use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            email       TEXT NOT NULL UNIQUE COLLATE NOCASE,
            password    TEXT NOT NULL,
            profile     TEXT NOT NULL CHECK (profile IN ('Filipe', 'Carlota')),
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Singleton row. Totals are not stored: they are folded from history.
        CREATE TABLE IF NOT EXISTS game_state (
            id          INTEGER PRIMARY KEY CHECK (id = 1),
            my_image    TEXT,
            their_image TEXT,
            is_setup    INTEGER NOT NULL DEFAULT 0,
            updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS history (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            person      TEXT NOT NULL CHECK (person IN ('Filipe', 'Carlota')),
            amount      INTEGER NOT NULL CHECK (amount <> 0 AND amount BETWEEN -100 AND 100),
            reason      TEXT NOT NULL CHECK (length(trim(reason)) > 0),
            given_by    TEXT CHECK (given_by IN ('Filipe', 'Carlota')),
            disputed    INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_history_created
            ON history(created_at);

        -- One dispute per entry at most.
        CREATE TABLE IF NOT EXISTS disputes (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            entry_id        INTEGER NOT NULL UNIQUE REFERENCES history(id) ON DELETE CASCADE,
            dispute_reason  TEXT NOT NULL CHECK (length(trim(dispute_reason)) > 0),
            status          TEXT NOT NULL DEFAULT 'pending'
                            CHECK (status IN ('pending', 'approved', 'rejected')),
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
