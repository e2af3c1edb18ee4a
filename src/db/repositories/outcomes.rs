use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, to_i64},
};
use crate::models::SubTestOutcome;

fn row_to_outcome(row: &Row) -> Result<SubTestOutcome> {
    let recorded_at: String = row.get("recorded_at")?;

    Ok(SubTestOutcome {
        sub_test_id: row.get("sub_test_id")?,
        raw_response_ref: row.get("raw_response_ref")?,
        score: row.get("score")?,
        max_score: row.get("max_score")?,
        risk_contribution: row.get("risk_contribution")?,
        timed_out: row.get("timed_out")?,
        transcript: row.get("transcript")?,
        analysis_failed: row.get("analysis_failed")?,
        capture_failed: row.get("capture_failed")?,
        recorded_at: parse_datetime(&recorded_at, "recorded_at")?,
    })
}

pub(crate) fn query_outcomes(conn: &Connection, session_id: &str) -> Result<Vec<SubTestOutcome>> {
    let mut stmt = conn.prepare(
        "SELECT sub_test_id, raw_response_ref, score, max_score, risk_contribution, timed_out,
                transcript, analysis_failed, capture_failed, recorded_at
         FROM outcomes
         WHERE session_id = ?1
         ORDER BY position ASC",
    )?;

    let mut rows = stmt.query(params![session_id])?;
    let mut outcomes = Vec::new();
    while let Some(row) = rows.next()? {
        outcomes.push(row_to_outcome(row)?);
    }
    Ok(outcomes)
}

impl Database {
    /// Append the outcome at `position`. Positions must be filled in order
    /// and are never rewritten.
    pub async fn append_outcome(
        &self,
        session_id: &str,
        position: usize,
        outcome: &SubTestOutcome,
    ) -> Result<()> {
        let session_id = session_id.to_string();
        let outcome = outcome.clone();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let existing: i64 = tx.query_row(
                "SELECT COUNT(*) FROM outcomes WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )?;
            let position = to_i64(position)?;
            if existing != position {
                bail!(
                    "outcome position {position} for session {session_id} does not follow {existing} stored outcomes"
                );
            }

            tx.execute(
                "INSERT INTO outcomes (session_id, position, sub_test_id, raw_response_ref, score, max_score,
                                       risk_contribution, timed_out, transcript, analysis_failed, capture_failed, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    session_id,
                    position,
                    outcome.sub_test_id,
                    outcome.raw_response_ref,
                    outcome.score,
                    outcome.max_score,
                    outcome.risk_contribution,
                    outcome.timed_out,
                    outcome.transcript,
                    outcome.analysis_failed,
                    outcome.capture_failed,
                    outcome.recorded_at.to_rfc3339(),
                ],
            )
            .context("failed to insert outcome")?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    pub async fn get_outcomes(&self, session_id: &str) -> Result<Vec<SubTestOutcome>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| query_outcomes(conn, &session_id)).await
    }
}
