use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use crate::aggregate::{FollowUpPolicy, RiskThresholds};

pub const ANALYSIS_URL_ENV: &str = "COGBATTERY_ANALYSIS_URL";
pub const ANALYSIS_TIMEOUT_ENV: &str = "COGBATTERY_ANALYSIS_TIMEOUT_MS";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisSettings {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub timeout_ms: u64,
    /// Attempts per sub-test before recording a degraded outcome.
    pub max_attempts: u32,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout_ms: 5_000,
            max_attempts: 2,
        }
    }
}

impl AnalysisSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    pub analysis: AnalysisSettings,
    pub risk_thresholds: RiskThresholds,
    pub follow_up: FollowUpPolicy,
    /// Locale for profiles that arrive without a language code.
    pub default_locale: String,
    pub event_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            analysis: AnalysisSettings::default(),
            risk_thresholds: RiskThresholds::default(),
            follow_up: FollowUpPolicy::default(),
            default_locale: "en".into(),
            event_capacity: 100,
        }
    }
}

impl EngineSettings {
    pub fn validate(&self) -> Result<()> {
        if self.analysis.max_attempts == 0 {
            bail!("analysis.maxAttempts must be at least 1");
        }
        if self.analysis.timeout_ms == 0 {
            bail!("analysis.timeoutMs must be greater than zero");
        }
        if !self.risk_thresholds.is_valid() {
            bail!(
                "risk thresholds must satisfy 0 <= medium ({}) <= low ({}) <= 1",
                self.risk_thresholds.medium_min_ratio,
                self.risk_thresholds.low_min_ratio
            );
        }
        if !self.follow_up.is_valid() {
            bail!("followUp intervals must be between 1 and 3650 days");
        }
        if self.default_locale.trim().is_empty() {
            bail!("defaultLocale must not be empty");
        }
        if self.event_capacity == 0 {
            bail!("eventCapacity must be greater than zero");
        }
        Ok(())
    }

    /// Apply `COGBATTERY_*` environment overrides on top of file values.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(ANALYSIS_URL_ENV) {
            if !url.trim().is_empty() {
                self.analysis.endpoint = Some(url);
            }
        }
        if let Some(timeout_ms) = std::env::var(ANALYSIS_TIMEOUT_ENV)
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
        {
            self.analysis.timeout_ms = timeout_ms;
        }
        self
    }
}

/// Engine settings persisted as JSON next to the database.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<EngineSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse settings in {}", path.display()))?
        } else {
            EngineSettings::default()
        };
        data.validate()?;

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, EngineSettings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, EngineSettings> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Current settings with environment overrides applied.
    pub fn settings(&self) -> EngineSettings {
        self.read().clone().with_env_overrides()
    }

    pub fn update(&self, settings: EngineSettings) -> Result<()> {
        settings.validate()?;
        let mut guard = self.write();
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    fn persist(&self, data: &EngineSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let data: EngineSettings = serde_json::from_str(&contents)?;
        data.validate()?;
        *self.write() = data;
        Ok(())
    }
}
