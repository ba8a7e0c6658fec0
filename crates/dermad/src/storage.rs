//! SQLite persistence for cases, stored images, chat history, and feedback.
//!
//! `rusqlite` behind the `tokio-rusqlite` wrapper so D-Bus handlers never
//! block the runtime. Schema creation is idempotent at open.

use chrono::Utc;
use derma_core::types::{Assessment, ParseSkinTypeError, SkinType};
use rusqlite::OptionalExtension;
use std::path::Path;
use thiserror::Error;
use tokio_rusqlite::Connection;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cases (
    session_id  TEXT PRIMARY KEY,
    created_at  TEXT NOT NULL,
    skin_type   TEXT NOT NULL,
    issues      TEXT NOT NULL,   -- ", "-joined labels
    confidence  INTEGER NOT NULL,
    doctor_flag INTEGER NOT NULL DEFAULT 0,
    brain_used  TEXT NOT NULL,
    notes       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS images (
    session_id TEXT NOT NULL,
    image_path TEXT NOT NULL,
    sha256     TEXT NOT NULL,
    encrypted  INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chat (
    session_id TEXT NOT NULL,
    role       TEXT NOT NULL,   -- "user" or "agent"
    message    TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS feedback (
    session_id TEXT NOT NULL,
    helpful    TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chat_session ON chat(session_id);
"#;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database: {0}")]
    Db(#[from] tokio_rusqlite::Error),
    #[error("unknown session: {0}")]
    UnknownSession(String),
    #[error("stored case is corrupt: {0}")]
    BadSkinType(#[from] ParseSkinTypeError),
}

/// One persisted case row, exactly as stored.
#[derive(Debug, Clone)]
pub struct CaseRow {
    pub session_id: String,
    pub created_at: String,
    pub skin_type: String,
    pub issues: String,
    pub confidence: i64,
    pub doctor_flag: bool,
    pub brain_used: String,
    pub notes: String,
}

impl CaseRow {
    /// Rehydrate the assessment stored in this row.
    pub fn assessment(&self) -> Result<Assessment, StoreError> {
        let issues = if self.issues.is_empty() {
            Vec::new()
        } else {
            self.issues.split(", ").map(str::to_string).collect()
        };
        Ok(Assessment {
            skin_type: self.skin_type.parse::<SkinType>()?,
            issues,
            confidence: self.confidence.clamp(0, 100) as u8,
            doctor_flag: self.doctor_flag,
            notes: self.notes.clone(),
        })
    }
}

/// One chat transcript row.
#[derive(Debug, Clone)]
pub struct ChatRow {
    pub role: String,
    pub message: String,
    pub created_at: String,
}

#[derive(Clone)]
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the database and apply the schema.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path.to_path_buf()).await?;
        Self::init(conn).await
    }

    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.call(|conn| -> tokio_rusqlite::Result<()> {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }

    pub async fn insert_case(
        &self,
        session_id: &str,
        assessment: &Assessment,
        brain_used: &str,
    ) -> Result<(), StoreError> {
        let session_id = session_id.to_string();
        let created_at = Utc::now().to_rfc3339();
        let skin_type = assessment.skin_type.to_string();
        let issues = assessment.issues.join(", ");
        let confidence = assessment.confidence as i64;
        let doctor_flag = assessment.doctor_flag as i64;
        let brain_used = brain_used.to_string();
        let notes = assessment.notes.clone();

        self.conn
            .call(move |conn| -> tokio_rusqlite::Result<()> {
                conn.execute(
                    "INSERT INTO cases (session_id, created_at, skin_type, issues, confidence, doctor_flag, brain_used, notes)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    rusqlite::params![
                        session_id, created_at, skin_type, issues, confidence, doctor_flag,
                        brain_used, notes
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn get_case(&self, session_id: &str) -> Result<CaseRow, StoreError> {
        let id = session_id.to_string();
        let row = self
            .conn
            .call(move |conn| -> tokio_rusqlite::Result<Option<CaseRow>> {
                let row = conn
                    .query_row(
                        "SELECT session_id, created_at, skin_type, issues, confidence, doctor_flag, brain_used, notes
                         FROM cases WHERE session_id = ?1",
                        rusqlite::params![id],
                        read_case_row,
                    )
                    .optional()?;
                Ok(row)
            })
            .await?;
        row.ok_or_else(|| StoreError::UnknownSession(session_id.to_string()))
    }

    /// Most recent cases first.
    pub async fn recent_cases(&self, limit: u32) -> Result<Vec<CaseRow>, StoreError> {
        let rows = self
            .conn
            .call(move |conn| -> tokio_rusqlite::Result<Vec<CaseRow>> {
                let mut stmt = conn.prepare(
                    "SELECT session_id, created_at, skin_type, issues, confidence, doctor_flag, brain_used, notes
                     FROM cases ORDER BY created_at DESC, rowid DESC LIMIT ?1",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![limit as i64], read_case_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(rows)
    }

    pub async fn case_count(&self) -> Result<i64, StoreError> {
        let count = self
            .conn
            .call(|conn| -> tokio_rusqlite::Result<i64> {
                Ok(conn.query_row("SELECT COUNT(*) FROM cases", [], |r| r.get(0))?)
            })
            .await?;
        Ok(count)
    }

    pub async fn insert_image(
        &self,
        session_id: &str,
        image_path: &str,
        sha256: &str,
        encrypted: bool,
    ) -> Result<(), StoreError> {
        let row = (
            session_id.to_string(),
            image_path.to_string(),
            sha256.to_string(),
            encrypted as i64,
            Utc::now().to_rfc3339(),
        );
        self.conn
            .call(move |conn| -> tokio_rusqlite::Result<()> {
                conn.execute(
                    "INSERT INTO images (session_id, image_path, sha256, encrypted, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    rusqlite::params![row.0, row.1, row.2, row.3, row.4],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn insert_chat(
        &self,
        session_id: &str,
        role: &str,
        message: &str,
    ) -> Result<(), StoreError> {
        let row = (
            session_id.to_string(),
            role.to_string(),
            message.to_string(),
            Utc::now().to_rfc3339(),
        );
        self.conn
            .call(move |conn| -> tokio_rusqlite::Result<()> {
                conn.execute(
                    "INSERT INTO chat (session_id, role, message, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![row.0, row.1, row.2, row.3],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Chat transcript for a session, oldest first.
    pub async fn chat_history(
        &self,
        session_id: &str,
        limit: u32,
    ) -> Result<Vec<ChatRow>, StoreError> {
        let id = session_id.to_string();
        let rows = self
            .conn
            .call(move |conn| -> tokio_rusqlite::Result<Vec<ChatRow>> {
                let mut stmt = conn.prepare(
                    "SELECT role, message, created_at FROM chat
                     WHERE session_id = ?1 ORDER BY rowid ASC LIMIT ?2",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![id, limit as i64], |r| {
                        Ok(ChatRow {
                            role: r.get(0)?,
                            message: r.get(1)?,
                            created_at: r.get(2)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(rows)
    }

    pub async fn insert_feedback(&self, session_id: &str, helpful: &str) -> Result<(), StoreError> {
        let row = (
            session_id.to_string(),
            helpful.to_string(),
            Utc::now().to_rfc3339(),
        );
        self.conn
            .call(move |conn| -> tokio_rusqlite::Result<()> {
                conn.execute(
                    "INSERT INTO feedback (session_id, helpful, created_at) VALUES (?1, ?2, ?3)",
                    rusqlite::params![row.0, row.1, row.2],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

fn read_case_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<CaseRow> {
    Ok(CaseRow {
        session_id: r.get(0)?,
        created_at: r.get(1)?,
        skin_type: r.get(2)?,
        issues: r.get(3)?,
        confidence: r.get(4)?,
        doctor_flag: r.get::<_, i64>(5)? != 0,
        brain_used: r.get(6)?,
        notes: r.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use derma_core::types::SkinType;

    fn assessment() -> Assessment {
        Assessment {
            skin_type: SkinType::Oily,
            issues: vec!["Mild acne".into(), "Open pores".into()],
            confidence: 74,
            doctor_flag: false,
            notes: "Primary AI analysis based on visible skin features.".into(),
        }
    }

    #[tokio::test]
    async fn test_case_roundtrip() {
        let store = Store::open_in_memory().await.unwrap();
        store
            .insert_case("s-1", &assessment(), "primary + secondary")
            .await
            .unwrap();

        let row = store.get_case("s-1").await.unwrap();
        assert_eq!(row.session_id, "s-1");
        assert_eq!(row.brain_used, "primary + secondary");
        assert_eq!(row.issues, "Mild acne, Open pores");

        let back = row.assessment().unwrap();
        assert_eq!(back.skin_type, SkinType::Oily);
        assert_eq!(back.issues, vec!["Mild acne", "Open pores"]);
        assert_eq!(back.confidence, 74);
        assert!(!back.doctor_flag);
    }

    #[tokio::test]
    async fn test_unknown_session_errors() {
        let store = Store::open_in_memory().await.unwrap();
        let err = store.get_case("nope").await.unwrap_err();
        assert!(matches!(err, StoreError::UnknownSession(id) if id == "nope"));
    }

    #[tokio::test]
    async fn test_empty_issue_list_rehydrates_empty() {
        let store = Store::open_in_memory().await.unwrap();
        let mut a = assessment();
        a.issues.clear();
        store.insert_case("s-2", &a, "primary").await.unwrap();
        let back = store.get_case("s-2").await.unwrap().assessment().unwrap();
        assert!(back.issues.is_empty());
    }

    #[tokio::test]
    async fn test_recent_cases_orders_newest_first_and_limits() {
        let store = Store::open_in_memory().await.unwrap();
        for i in 0..5 {
            store
                .insert_case(&format!("s-{i}"), &assessment(), "primary")
                .await
                .unwrap();
        }
        let rows = store.recent_cases(3).await.unwrap();
        assert_eq!(rows.len(), 3);
        // Same-timestamp inserts fall back to rowid ordering.
        assert_eq!(rows[0].session_id, "s-4");
        assert_eq!(rows[2].session_id, "s-2");
        assert_eq!(store.case_count().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_chat_transcript_keeps_order() {
        let store = Store::open_in_memory().await.unwrap();
        store.insert_chat("s-1", "user", "hi").await.unwrap();
        store.insert_chat("s-1", "agent", "hello").await.unwrap();
        store.insert_chat("s-2", "user", "other").await.unwrap();

        let rows = store.chat_history("s-1", 50).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!((rows[0].role.as_str(), rows[0].message.as_str()), ("user", "hi"));
        assert_eq!((rows[1].role.as_str(), rows[1].message.as_str()), ("agent", "hello"));
    }

    #[tokio::test]
    async fn test_feedback_and_image_rows_insert() {
        let store = Store::open_in_memory().await.unwrap();
        store.insert_feedback("s-1", "Yes").await.unwrap();
        store
            .insert_image("s-1", "/tmp/s-1.jpg", "abc123", false)
            .await
            .unwrap();
    }
}
