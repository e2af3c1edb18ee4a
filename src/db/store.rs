use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::connection::Database;
use crate::adapters::SessionStore;
use crate::models::{RawResponse, SessionRecord, SessionStatus, SessionSummary, SubTestOutcome};

#[async_trait]
impl SessionStore for Database {
    async fn save_session(&self, record: &SessionRecord) -> Result<()> {
        self.insert_session(record).await
    }

    async fn update_session_status(
        &self,
        session_id: &str,
        status: SessionStatus,
        stopped_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.mark_session_status(session_id, status, stopped_at, Utc::now())
            .await
    }

    async fn save_response(
        &self,
        session_id: &str,
        sub_test_id: &str,
        response: &RawResponse,
    ) -> Result<String> {
        self.upsert_response(session_id, sub_test_id, response).await
    }

    async fn save_outcome(
        &self,
        session_id: &str,
        position: usize,
        outcome: &SubTestOutcome,
    ) -> Result<()> {
        self.append_outcome(session_id, position, outcome).await
    }

    async fn save_summary(&self, _session_id: &str, summary: &SessionSummary) -> Result<()> {
        self.insert_summary(summary).await
    }

    async fn load_session(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        self.get_session(session_id).await
    }

    async fn load_outcomes(&self, session_id: &str) -> Result<Vec<SubTestOutcome>> {
        self.get_outcomes(session_id).await
    }

    async fn load_summary(&self, session_id: &str) -> Result<Option<SessionSummary>> {
        self.get_summary(session_id).await
    }

    async fn list_incomplete_sessions(&self) -> Result<Vec<SessionRecord>> {
        self.get_incomplete_sessions().await
    }

    async fn list_summaries_for_user(&self, user_id: &str) -> Result<Vec<SessionSummary>> {
        self.get_summaries_for_user(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::aggregate::{aggregate, RiskThresholds};
    use crate::models::{LiteracyLevel, RiskTier, UserAccessibilityProfile, VisionCapability};

    fn open() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("cogbattery.db")).unwrap();
        (dir, db)
    }

    fn record(id: &str, created_at: DateTime<Utc>) -> SessionRecord {
        SessionRecord {
            id: id.into(),
            user_id: "user-1".into(),
            profile: UserAccessibilityProfile::new(
                VisionCapability::LowVision,
                LiteracyLevel::NonLiterate,
                "hi-IN",
            ),
            plan: vec!["avlt-immediate".into(), "clock-drawing".into()],
            status: SessionStatus::NotStarted,
            started_at: None,
            stopped_at: None,
            created_at,
            updated_at: created_at,
        }
    }

    fn scored(id: &str, score: f64) -> SubTestOutcome {
        SubTestOutcome {
            sub_test_id: id.into(),
            raw_response_ref: Some(format!("s1/{id}")),
            score,
            max_score: 10.0,
            risk_contribution: 0.25,
            timed_out: true,
            transcript: Some("dog cat".into()),
            analysis_failed: false,
            capture_failed: false,
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn session_records_survive_a_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cogbattery.db");
        let now = Utc::now();
        {
            let db = Database::new(path.clone()).unwrap();
            db.save_session(&record("s1", now)).await.unwrap();
        }

        let db = Database::new(path).unwrap();
        let loaded = db.load_session("s1").await.unwrap().unwrap();
        assert_eq!(loaded.profile, record("s1", now).profile);
        assert_eq!(loaded.plan, vec!["avlt-immediate", "clock-drawing"]);
        assert_eq!(loaded.status, SessionStatus::NotStarted);
        assert!(db.load_session("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn status_updates_stamp_start_once() {
        let (_dir, db) = open();
        db.save_session(&record("s1", Utc::now())).await.unwrap();

        db.update_session_status("s1", SessionStatus::InProgress, None)
            .await
            .unwrap();
        let started = db.load_session("s1").await.unwrap().unwrap().started_at;
        assert!(started.is_some());

        let stopped = Utc::now();
        db.update_session_status("s1", SessionStatus::Aborted, Some(stopped))
            .await
            .unwrap();
        let loaded = db.load_session("s1").await.unwrap().unwrap();
        assert_eq!(loaded.status, SessionStatus::Aborted);
        assert_eq!(loaded.started_at, started);
        assert!(loaded.stopped_at.is_some());

        assert!(db
            .update_session_status("missing", SessionStatus::Complete, None)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn outcomes_are_append_only_and_ordered() {
        let (_dir, db) = open();
        db.save_session(&record("s1", Utc::now())).await.unwrap();

        db.save_outcome("s1", 0, &scored("avlt-immediate", 7.0))
            .await
            .unwrap();
        assert!(db
            .save_outcome("s1", 0, &scored("avlt-immediate", 9.0))
            .await
            .is_err());
        assert!(db
            .save_outcome("s1", 2, &scored("clock-drawing", 1.0))
            .await
            .is_err());
        db.save_outcome(
            "s1",
            1,
            &SubTestOutcome::analysis_failed("clock-drawing", 3.0, None, false, None),
        )
        .await
        .unwrap();

        let outcomes = db.load_outcomes("s1").await.unwrap();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].score, 7.0);
        assert!(outcomes[0].timed_out);
        assert_eq!(outcomes[0].transcript.as_deref(), Some("dog cat"));
        assert!(outcomes[1].analysis_failed);
    }

    #[tokio::test]
    async fn responses_round_trip_by_reference() {
        let (_dir, db) = open();
        db.save_session(&record("s1", Utc::now())).await.unwrap();

        let cases = [
            ("a", RawResponse::audio(vec![0, 1, 255], "audio/webm")),
            ("b", RawResponse::text("apple")),
            ("c", RawResponse::Drawing { data: vec![3; 16] }),
            (
                "d",
                RawResponse::Choice {
                    selected: vec!["key".into(), "cup".into()],
                },
            ),
            ("e", RawResponse::Empty),
        ];
        for (sub_test, response) in &cases {
            let reference = db.save_response("s1", sub_test, response).await.unwrap();
            assert_eq!(reference, format!("s1/{sub_test}"));
            assert_eq!(
                db.get_response(&reference).await.unwrap().as_ref(),
                Some(response)
            );
        }

        // Re-running a step replaces the earlier capture.
        let reference = db
            .save_response("s1", "b", &RawResponse::text("pear"))
            .await
            .unwrap();
        assert_eq!(
            db.get_response(&reference).await.unwrap(),
            Some(RawResponse::text("pear"))
        );
    }

    #[tokio::test]
    async fn summary_is_written_once_with_outcomes() {
        let (_dir, db) = open();
        db.save_session(&record("s1", Utc::now())).await.unwrap();
        let outcomes = vec![scored("avlt-immediate", 8.0), scored("clock-drawing", 9.0)];
        for (position, outcome) in outcomes.iter().enumerate() {
            db.save_outcome("s1", position, outcome).await.unwrap();
        }

        let summary = aggregate("s1", "user-1", &outcomes, &RiskThresholds::default());
        db.save_summary("s1", &summary).await.unwrap();
        assert!(db.save_summary("s1", &summary).await.is_err());

        let loaded = db.load_summary("s1").await.unwrap().unwrap();
        assert_eq!(loaded.composite_risk_tier, RiskTier::Low);
        assert_eq!(loaded.total_score, 17.0);
        assert_eq!(loaded.timed_out_count, 2);
        assert_eq!(loaded.per_sub_test_outcomes.len(), 2);
        assert!(db.load_summary("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn incomplete_sessions_are_listed_newest_first() {
        let (_dir, db) = open();
        let now = Utc::now();
        db.save_session(&record("old", now - Duration::minutes(10)))
            .await
            .unwrap();
        db.save_session(&record("new", now)).await.unwrap();
        db.save_session(&record("done", now)).await.unwrap();
        for id in ["old", "new", "done"] {
            db.update_session_status(id, SessionStatus::InProgress, None)
                .await
                .unwrap();
        }
        db.update_session_status("done", SessionStatus::Complete, Some(now))
            .await
            .unwrap();

        let ids: Vec<String> = db
            .list_incomplete_sessions()
            .await
            .unwrap()
            .into_iter()
            .map(|record| record.id)
            .collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn summaries_are_listed_per_user_oldest_first() {
        let (_dir, db) = open();
        let now = Utc::now();
        for (id, user_id, score, completed_at) in [
            ("recent", "user-1", 4.0, now),
            ("earlier", "user-1", 9.0, now - Duration::days(30)),
            ("other", "user-2", 5.0, now),
        ] {
            let mut session = record(id, completed_at);
            session.user_id = user_id.into();
            db.save_session(&session).await.unwrap();
            let outcomes = vec![scored("avlt-immediate", score)];
            db.save_outcome(id, 0, &outcomes[0]).await.unwrap();

            let mut summary = aggregate(id, user_id, &outcomes, &RiskThresholds::default());
            summary.completed_at = completed_at;
            db.save_summary(id, &summary).await.unwrap();
        }

        let listed = db.list_summaries_for_user("user-1").await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|s| s.session_id.as_str()).collect();
        assert_eq!(ids, vec!["earlier", "recent"]);
        assert_eq!(listed[0].per_sub_test_outcomes[0].score, 9.0);
        assert_eq!(listed[1].composite_risk_tier, RiskTier::High);
        assert!(db.list_summaries_for_user("user-3").await.unwrap().is_empty());
    }
}
