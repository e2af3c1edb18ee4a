use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, parse_optional_datetime, parse_status},
};
use crate::models::{SessionRecord, SessionStatus, UserAccessibilityProfile};

const SESSION_COLUMNS: &str =
    "id, user_id, profile, plan, status, started_at, stopped_at, created_at, updated_at";

fn row_to_session(row: &Row) -> Result<SessionRecord> {
    let profile: String = row.get("profile")?;
    let plan: String = row.get("plan")?;
    let status: String = row.get("status")?;
    let started_at: Option<String> = row.get("started_at")?;
    let stopped_at: Option<String> = row.get("stopped_at")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(SessionRecord {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        profile: serde_json::from_str::<UserAccessibilityProfile>(&profile)
            .context("failed to parse profile")?,
        plan: serde_json::from_str(&plan).context("failed to parse plan")?,
        status: parse_status(&status)?,
        started_at: parse_optional_datetime(started_at, "started_at")?,
        stopped_at: parse_optional_datetime(stopped_at, "stopped_at")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

impl Database {
    pub async fn insert_session(&self, record: &SessionRecord) -> Result<()> {
        let record = record.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, user_id, profile, plan, status, started_at, stopped_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.id,
                    record.user_id,
                    serde_json::to_string(&record.profile)?,
                    serde_json::to_string(&record.plan)?,
                    record.status.as_str(),
                    record.started_at.map(|dt| dt.to_rfc3339()),
                    record.stopped_at.map(|dt| dt.to_rfc3339()),
                    record.created_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            )
            .context("failed to insert session")?;
            Ok(())
        })
        .await
    }

    /// Set the status; the first move to `InProgress` also stamps
    /// `started_at`.
    pub async fn mark_session_status(
        &self,
        session_id: &str,
        status: SessionStatus,
        stopped_at: Option<DateTime<Utc>>,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let started_at =
                (status == SessionStatus::InProgress).then(|| updated_at.to_rfc3339());
            let changed = conn
                .execute(
                    "UPDATE sessions
                     SET status = ?1,
                         started_at = COALESCE(started_at, ?2),
                         stopped_at = ?3,
                         updated_at = ?4
                     WHERE id = ?5",
                    params![
                        status.as_str(),
                        started_at,
                        stopped_at.map(|dt| dt.to_rfc3339()),
                        updated_at.to_rfc3339(),
                        session_id,
                    ],
                )
                .context("failed to update session status")?;
            if changed == 0 {
                bail!("unknown session {session_id}");
            }
            Ok(())
        })
        .await
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"
            ))?;
            stmt.query_row(params![session_id], |row| Ok(row_to_session(row)))
                .optional()?
                .transpose()
        })
        .await
    }

    /// Sessions left `InProgress`, newest first.
    pub async fn get_incomplete_sessions(&self) -> Result<Vec<SessionRecord>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE status = 'InProgress'
                 ORDER BY created_at DESC"
            ))?;

            let mut rows = stmt.query([])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(row_to_session(row)?);
            }
            Ok(sessions)
        })
        .await
    }
}
