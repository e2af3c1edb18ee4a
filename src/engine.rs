use std::{path::Path, sync::Arc};

use anyhow::{anyhow, Context};

use chrono::Utc;

use crate::adapters::{
    AnalysisService, CaptureDevice, HttpAnalysisClient, SessionStore, SpeechSynthesizer,
    Transcriber,
};
use crate::aggregate::{next_assessment, progress, AssessmentSchedule, SubTestProgress};
use crate::catalog::Catalog;
use crate::db::Database;
use crate::error::{AssessmentError, Result};
use crate::models::{SessionRecord, SessionSummary, UserAccessibilityProfile};
use crate::planning::{resolve_plan, TestPlan};
use crate::session::{AssessmentSession, SessionConfig, SessionServices};
use crate::settings::SettingsStore;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Entry point for hosts: owns the catalog and the shared collaborators and
/// hands out one `AssessmentSession` per user run.
#[derive(Clone)]
pub struct AssessmentEngine {
    catalog: Arc<Catalog>,
    analysis: Arc<dyn AnalysisService>,
    store: Arc<dyn SessionStore>,
    transcriber: Option<Arc<dyn Transcriber>>,
    speaker: Option<Arc<dyn SpeechSynthesizer>>,
    config: SessionConfig,
}

impl AssessmentEngine {
    pub fn new(
        catalog: Catalog,
        analysis: Arc<dyn AnalysisService>,
        store: Arc<dyn SessionStore>,
        config: SessionConfig,
    ) -> Self {
        Self {
            catalog: Arc::new(catalog),
            analysis,
            store,
            transcriber: None,
            speaker: None,
            config,
        }
    }

    /// Wire the engine from a data directory: `settings.json` for
    /// configuration, `cogbattery.db` for sessions, and the HTTP analysis
    /// service named in settings.
    pub fn open(data_dir: &Path, catalog: Catalog) -> anyhow::Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let settings = SettingsStore::new(data_dir.join("settings.json"))?.settings();
        settings.validate()?;

        let endpoint = settings.analysis.endpoint.as_deref().ok_or_else(|| {
            anyhow!(
                "no analysis endpoint configured (set analysis.endpoint or {})",
                crate::settings::ANALYSIS_URL_ENV
            )
        })?;
        let analysis = HttpAnalysisClient::new(
            endpoint,
            settings.analysis.api_key.clone(),
            settings.analysis.timeout(),
        )?;
        let db = Database::new(data_dir.join("cogbattery.db"))?;

        log_info!(
            "Engine ready with {} catalog entries, data in {}",
            catalog.len(),
            data_dir.display()
        );

        Ok(Self::new(
            catalog,
            Arc::new(analysis),
            Arc::new(db),
            SessionConfig::from(&settings),
        ))
    }

    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    pub fn with_speaker(mut self, speaker: Arc<dyn SpeechSynthesizer>) -> Self {
        self.speaker = Some(speaker);
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn resolve(&self, profile: &UserAccessibilityProfile) -> Result<TestPlan> {
        resolve_plan(profile, &self.catalog)
    }

    fn services(&self, device: Arc<dyn CaptureDevice>) -> SessionServices {
        SessionServices {
            analysis: self.analysis.clone(),
            store: self.store.clone(),
            device,
            transcriber: self.transcriber.clone(),
            speaker: self.speaker.clone(),
        }
    }

    /// Resolve the plan for `profile` and persist a new session. Nothing is
    /// stored when no sub-test fits the profile. A profile without a language
    /// code takes the configured default locale.
    pub async fn create_session(
        &self,
        user_id: &str,
        mut profile: UserAccessibilityProfile,
        device: Arc<dyn CaptureDevice>,
    ) -> Result<AssessmentSession> {
        if profile.language_code.trim().is_empty() {
            profile.language_code = self.config.default_locale.clone();
        }
        let plan = match self.resolve(&profile) {
            Ok(plan) => plan,
            Err(err) => {
                log_warn!("Cannot plan a session for {}: {}", user_id, err);
                return Err(err);
            }
        };
        AssessmentSession::create(
            user_id,
            profile,
            plan,
            self.services(device),
            self.config.clone(),
        )
        .await
    }

    pub async fn resume_session(
        &self,
        session_id: &str,
        device: Arc<dyn CaptureDevice>,
    ) -> Result<AssessmentSession> {
        AssessmentSession::resume(
            session_id,
            &self.catalog,
            self.services(device),
            self.config.clone(),
        )
        .await
    }

    /// Sessions a previous process left `InProgress`, newest first.
    pub async fn recover(&self) -> Result<Vec<SessionRecord>> {
        let sessions = self
            .store
            .list_incomplete_sessions()
            .await
            .map_err(AssessmentError::Storage)?;
        if !sessions.is_empty() {
            log_info!("Found {} interrupted sessions", sessions.len());
        }
        Ok(sessions)
    }

    pub async fn load_summary(&self, session_id: &str) -> Result<Option<SessionSummary>> {
        self.store
            .load_summary(session_id)
            .await
            .map_err(AssessmentError::Storage)
    }

    async fn summaries_for(&self, user_id: &str) -> Result<Vec<SessionSummary>> {
        self.store
            .list_summaries_for_user(user_id)
            .await
            .map_err(AssessmentError::Storage)
    }

    /// Per-sub-test trends over the user's completed sessions.
    pub async fn progress(&self, user_id: &str) -> Result<Vec<SubTestProgress>> {
        let summaries = self.summaries_for(user_id).await?;
        Ok(progress(&summaries))
    }

    /// When the user's next battery is due, from their latest completed session.
    pub async fn next_assessment(&self, user_id: &str) -> Result<AssessmentSchedule> {
        let summaries = self.summaries_for(user_id).await?;
        let schedule = next_assessment(summaries.last(), &self.config.follow_up, Utc::now());
        log_info!(
            "Next assessment for {} due {} ({} days)",
            user_id,
            schedule.due_at.to_rfc3339(),
            schedule.interval_days
        );
        Ok(schedule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStore;
    use crate::aggregate::{ScheduleBasis, Trend};
    use crate::models::{LiteracyLevel, RawResponse, RiskTier, SessionStatus, VisionCapability};
    use crate::session::SessionPhase;
    use crate::testing::{FakeDevice, ScriptedAnalysis};

    fn engine_with(store: Arc<dyn SessionStore>) -> AssessmentEngine {
        AssessmentEngine::new(
            Catalog::builtin(),
            Arc::new(ScriptedAnalysis::scoring(1.0, 2.0)),
            store,
            SessionConfig::default(),
        )
    }

    fn blind() -> UserAccessibilityProfile {
        UserAccessibilityProfile::new(VisionCapability::Blind, LiteracyLevel::NonLiterate, "en")
    }

    #[tokio::test]
    async fn blind_users_get_an_audio_only_battery() {
        let engine = engine_with(Arc::new(crate::adapters::MemoryStore::new()));
        let session = engine
            .create_session("user-1", blind(), Arc::new(FakeDevice::new()))
            .await
            .unwrap();

        assert!(!session.plan().is_empty());
        for def in session.plan().steps() {
            assert!(def.modality.uses_device(), "{} is not audio", def.id);
        }
        assert_eq!(session.phase().await, SessionPhase::NotStarted);
    }

    #[tokio::test]
    async fn unplannable_profiles_store_nothing() {
        let store = Arc::new(crate::adapters::MemoryStore::new());
        let engine = AssessmentEngine::new(
            Catalog::new(vec![Catalog::builtin()
                .get("cube-copy")
                .cloned()
                .unwrap()])
            .unwrap(),
            Arc::new(ScriptedAnalysis::scoring(1.0, 1.0)),
            store.clone(),
            SessionConfig::default(),
        );

        let err = engine
            .create_session("user-1", blind(), Arc::new(FakeDevice::new()))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AssessmentError::NoEligibleTests { .. }));
        assert!(engine.recover().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn interrupted_sessions_are_recovered_from_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cogbattery.db");

        let session_id = {
            let engine = engine_with(Arc::new(Database::new(path.clone()).unwrap()));
            let session = engine
                .create_session("user-1", blind(), Arc::new(FakeDevice::new()))
                .await
                .unwrap();
            session.start().await.unwrap();
            session
                .run_step(RawResponse::audio(vec![1, 2], "audio/wav"))
                .await
                .unwrap();
            session.id().to_string()
        };

        let engine = engine_with(Arc::new(Database::new(path).unwrap()));
        let interrupted = engine.recover().await.unwrap();
        assert_eq!(interrupted.len(), 1);
        assert_eq!(interrupted[0].id, session_id);
        assert_eq!(interrupted[0].status, SessionStatus::InProgress);

        let session = engine
            .resume_session(&session_id, Arc::new(FakeDevice::new()))
            .await
            .unwrap();
        assert_eq!(session.outcomes().await.len(), 1);

        while session.current_step().await.is_some() {
            session
                .run_step(RawResponse::audio(vec![3], "audio/wav"))
                .await
                .unwrap();
        }
        assert_eq!(session.phase().await, SessionPhase::Complete);
        let summary = engine.load_summary(&session_id).await.unwrap().unwrap();
        assert_eq!(summary.per_sub_test_outcomes.len(), session.plan().len());
        assert!(engine.recover().await.unwrap().is_empty());
    }

    async fn complete_battery(engine: &AssessmentEngine, user_id: &str) -> SessionSummary {
        let session = engine
            .create_session(user_id, blind(), Arc::new(FakeDevice::new()))
            .await
            .unwrap();
        session.start().await.unwrap();
        while session.current_step().await.is_some() {
            session
                .run_step(RawResponse::audio(vec![1], "audio/wav"))
                .await
                .unwrap();
        }
        session.summary().await.unwrap()
    }

    #[tokio::test]
    async fn empty_language_takes_the_default_locale() {
        let engine = engine_with(Arc::new(MemoryStore::new()));
        let profile =
            UserAccessibilityProfile::new(VisionCapability::Blind, LiteracyLevel::NonLiterate, "");
        let session = engine
            .create_session("user-1", profile, Arc::new(FakeDevice::new()))
            .await
            .unwrap();
        assert_eq!(session.profile().language_code, "en");
    }

    #[tokio::test]
    async fn progress_compares_completed_sessions() {
        let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
        let engine = engine_with(store.clone());

        let first = engine.next_assessment("user-1").await.unwrap();
        assert_eq!(first.basis, ScheduleBasis::Baseline);
        assert_eq!(first.interval_days, 30);

        let medium = complete_battery(&engine, "user-1").await;
        assert_eq!(medium.composite_risk_tier, RiskTier::Medium);
        let improved = AssessmentEngine::new(
            Catalog::builtin(),
            Arc::new(ScriptedAnalysis::scoring(2.0, 2.0)),
            store,
            SessionConfig::default(),
        );
        complete_battery(&improved, "user-1").await;

        let report = improved.progress("user-1").await.unwrap();
        assert_eq!(report.len(), medium.per_sub_test_outcomes.len());
        for entry in &report {
            assert_eq!(entry.previous_score, Some(1.0));
            assert_eq!(entry.current_score, 2.0);
            assert_eq!(entry.change_percentage, Some(100.0));
            assert_eq!(entry.trend, Trend::Improving);
            assert_eq!(entry.data_points.len(), 2);
        }

        let schedule = improved.next_assessment("user-1").await.unwrap();
        assert_eq!(
            schedule.basis,
            ScheduleBasis::LatestTier {
                tier: RiskTier::Low
            }
        );
        assert_eq!(schedule.interval_days, 90);
        assert!(improved.progress("user-2").await.unwrap().is_empty());
    }

    #[test]
    fn open_requires_an_analysis_endpoint() {
        if std::env::var(crate::settings::ANALYSIS_URL_ENV).is_ok() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let err = AssessmentEngine::open(dir.path(), Catalog::builtin())
            .err()
            .unwrap();
        assert!(err.to_string().contains("analysis endpoint"));
    }
}
