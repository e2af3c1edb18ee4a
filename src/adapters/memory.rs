use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::SessionStore;
use crate::models::{RawResponse, SessionRecord, SessionStatus, SessionSummary, SubTestOutcome};

#[derive(Default)]
struct MemoryState {
    sessions: HashMap<String, SessionRecord>,
    outcomes: HashMap<String, Vec<SubTestOutcome>>,
    responses: HashMap<String, RawResponse>,
    summaries: HashMap<String, SessionSummary>,
}

/// In-process store. Holds everything until dropped.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn response(&self, reference: &str) -> Option<RawResponse> {
        self.lock().responses.get(reference).cloned()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn save_session(&self, record: &SessionRecord) -> Result<()> {
        self.lock()
            .sessions
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn update_session_status(
        &self,
        session_id: &str,
        status: SessionStatus,
        stopped_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut state = self.lock();
        let Some(record) = state.sessions.get_mut(session_id) else {
            bail!("unknown session {session_id}");
        };
        let now = Utc::now();
        if status == SessionStatus::InProgress && record.started_at.is_none() {
            record.started_at = Some(now);
        }
        record.status = status;
        record.stopped_at = stopped_at;
        record.updated_at = now;
        Ok(())
    }

    async fn save_response(
        &self,
        session_id: &str,
        sub_test_id: &str,
        response: &RawResponse,
    ) -> Result<String> {
        let reference = format!("{session_id}/{sub_test_id}");
        self.lock()
            .responses
            .insert(reference.clone(), response.clone());
        Ok(reference)
    }

    async fn save_outcome(
        &self,
        session_id: &str,
        position: usize,
        outcome: &SubTestOutcome,
    ) -> Result<()> {
        let mut state = self.lock();
        let outcomes = state.outcomes.entry(session_id.to_string()).or_default();
        if position != outcomes.len() {
            bail!(
                "outcome position {position} out of order for session {session_id} ({} stored)",
                outcomes.len()
            );
        }
        outcomes.push(outcome.clone());
        Ok(())
    }

    async fn save_summary(&self, session_id: &str, summary: &SessionSummary) -> Result<()> {
        let mut state = self.lock();
        if state.summaries.contains_key(session_id) {
            bail!("summary already stored for session {session_id}");
        }
        state
            .summaries
            .insert(session_id.to_string(), summary.clone());
        Ok(())
    }

    async fn load_session(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        Ok(self.lock().sessions.get(session_id).cloned())
    }

    async fn load_outcomes(&self, session_id: &str) -> Result<Vec<SubTestOutcome>> {
        Ok(self
            .lock()
            .outcomes
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn load_summary(&self, session_id: &str) -> Result<Option<SessionSummary>> {
        Ok(self.lock().summaries.get(session_id).cloned())
    }

    async fn list_incomplete_sessions(&self) -> Result<Vec<SessionRecord>> {
        let mut sessions: Vec<SessionRecord> = self
            .lock()
            .sessions
            .values()
            .filter(|record| record.status == SessionStatus::InProgress)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn list_summaries_for_user(&self, user_id: &str) -> Result<Vec<SessionSummary>> {
        let mut summaries: Vec<SessionSummary> = self
            .lock()
            .summaries
            .values()
            .filter(|summary| summary.user_id == user_id)
            .cloned()
            .collect();
        summaries.sort_by(|a, b| a.completed_at.cmp(&b.completed_at));
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LiteracyLevel, UserAccessibilityProfile, VisionCapability};

    fn record(id: &str) -> SessionRecord {
        let now = Utc::now();
        SessionRecord {
            id: id.into(),
            user_id: "user-1".into(),
            profile: UserAccessibilityProfile::new(
                VisionCapability::Blind,
                LiteracyLevel::Literate,
                "en",
            ),
            plan: vec!["avlt-immediate".into()],
            status: SessionStatus::NotStarted,
            started_at: None,
            stopped_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn outcomes_must_be_appended_in_order() {
        let store = MemoryStore::new();
        let outcome = SubTestOutcome::capture_failed("avlt-immediate", 15.0);
        store.save_outcome("s1", 0, &outcome).await.unwrap();
        assert!(store.save_outcome("s1", 0, &outcome).await.is_err());
        assert!(store.save_outcome("s1", 2, &outcome).await.is_err());
        assert_eq!(store.load_outcomes("s1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn in_progress_sessions_are_listed() {
        let store = MemoryStore::new();
        store.save_session(&record("a")).await.unwrap();
        store.save_session(&record("b")).await.unwrap();
        store
            .update_session_status("a", SessionStatus::InProgress, None)
            .await
            .unwrap();

        let incomplete = store.list_incomplete_sessions().await.unwrap();
        assert_eq!(incomplete.len(), 1);
        assert_eq!(incomplete[0].id, "a");
        assert!(incomplete[0].started_at.is_some());
    }

    #[tokio::test]
    async fn responses_round_trip_by_reference() {
        let store = MemoryStore::new();
        let reference = store
            .save_response("s1", "story-recall", &RawResponse::text("Anna"))
            .await
            .unwrap();
        assert_eq!(store.response(&reference), Some(RawResponse::text("Anna")));
    }
}
