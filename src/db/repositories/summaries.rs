use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::outcomes::query_outcomes;
use crate::db::{
    connection::Database,
    helpers::{parse_datetime, parse_risk_tier, to_i64, to_usize},
};
use crate::models::SessionSummary;

const SUMMARY_COLUMNS: &str = "session_id, user_id, total_score, max_score, score_ratio, composite_risk_tier,
                               total_risk_contribution, degraded_count, timed_out_count, completed_at";

/// Summary row without its outcomes; `with_outcomes` fills them in.
fn row_to_summary(row: &Row) -> Result<SessionSummary> {
    let tier: String = row.get("composite_risk_tier")?;
    let degraded_count: i64 = row.get("degraded_count")?;
    let timed_out_count: i64 = row.get("timed_out_count")?;
    let completed_at: String = row.get("completed_at")?;

    Ok(SessionSummary {
        session_id: row.get("session_id")?,
        user_id: row.get("user_id")?,
        total_score: row.get("total_score")?,
        max_score: row.get("max_score")?,
        score_ratio: row.get("score_ratio")?,
        composite_risk_tier: parse_risk_tier(&tier)?,
        total_risk_contribution: row.get("total_risk_contribution")?,
        degraded_count: to_usize(degraded_count, "degraded_count")?,
        timed_out_count: to_usize(timed_out_count, "timed_out_count")?,
        per_sub_test_outcomes: Vec::new(),
        completed_at: parse_datetime(&completed_at, "completed_at")?,
    })
}

fn with_outcomes(conn: &Connection, mut summary: SessionSummary) -> Result<SessionSummary> {
    summary.per_sub_test_outcomes = query_outcomes(conn, &summary.session_id)?;
    Ok(summary)
}

impl Database {
    /// Written once per completed session.
    pub async fn insert_summary(&self, summary: &SessionSummary) -> Result<()> {
        let summary = summary.clone();
        self.execute(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO summaries ({SUMMARY_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
                ),
                params![
                    summary.session_id,
                    summary.user_id,
                    summary.total_score,
                    summary.max_score,
                    summary.score_ratio,
                    summary.composite_risk_tier.as_str(),
                    summary.total_risk_contribution,
                    to_i64(summary.degraded_count)?,
                    to_i64(summary.timed_out_count)?,
                    summary.completed_at.to_rfc3339(),
                ],
            )
            .context("failed to insert summary")?;
            Ok(())
        })
        .await
    }

    /// The summary with its per-sub-test outcomes read back from `outcomes`.
    pub async fn get_summary(&self, session_id: &str) -> Result<Option<SessionSummary>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let summary = conn
                .query_row(
                    &format!("SELECT {SUMMARY_COLUMNS} FROM summaries WHERE session_id = ?1"),
                    params![session_id],
                    |row| Ok(row_to_summary(row)),
                )
                .optional()?
                .transpose()?;

            summary
                .map(|summary| with_outcomes(conn, summary))
                .transpose()
        })
        .await
    }

    /// Every summary for `user_id`, oldest completion first.
    pub async fn get_summaries_for_user(&self, user_id: &str) -> Result<Vec<SessionSummary>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut summaries = Vec::new();
            {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SUMMARY_COLUMNS}
                     FROM summaries
                     WHERE user_id = ?1
                     ORDER BY completed_at ASC"
                ))?;
                let mut rows = stmt.query(params![user_id])?;
                while let Some(row) = rows.next()? {
                    summaries.push(row_to_summary(row)?);
                }
            }
            summaries
                .into_iter()
                .map(|summary| with_outcomes(conn, summary))
                .collect()
        })
        .await
    }
}
