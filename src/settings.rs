use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fmt, fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

const ENABLE_LOGS: bool = true;
const LOG_TAG: &str = "settings";

use crate::log_warn;

/// Environment variable naming the single backend URL used in deployments.
pub const BACKEND_URL_ENV: &str = "EMOTION_SENSE_BACKEND_URL";

/// Inference backends the service knows how to run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum InferenceMethod {
    Fer,
    #[default]
    Deepface,
    Huggingface,
}

impl InferenceMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            InferenceMethod::Fer => "fer",
            InferenceMethod::Deepface => "deepface",
            InferenceMethod::Huggingface => "huggingface",
        }
    }
}

impl std::str::FromStr for InferenceMethod {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fer" => Ok(InferenceMethod::Fer),
            "deepface" => Ok(InferenceMethod::Deepface),
            "huggingface" => Ok(InferenceMethod::Huggingface),
            other => Err(format!(
                "unknown inference method '{other}' (expected fer, deepface or huggingface)"
            )),
        }
    }
}

impl fmt::Display for InferenceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineSettings {
    /// Candidate base URLs, probed in order.
    pub backend_urls: Vec<String>,
    pub method: InferenceMethod,
    pub auto_capture_interval_ms: u64,
    pub request_timeout_ms: u64,
    pub probe_timeout_ms: u64,
    pub jpeg_quality: u8,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            backend_urls: vec![
                "http://localhost:8000".into(),
                "http://127.0.0.1:8000".into(),
            ],
            method: InferenceMethod::Deepface,
            auto_capture_interval_ms: 3_000,
            request_timeout_ms: 15_000,
            probe_timeout_ms: 3_000,
            jpeg_quality: 80,
        }
    }
}

impl PipelineSettings {
    pub fn auto_capture_interval(&self) -> Duration {
        Duration::from_millis(self.auto_capture_interval_ms.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// A non-empty deployment URL replaces the development candidate list.
    pub fn apply_env_override(&mut self, value: Option<String>) {
        if let Some(url) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            self.backend_urls = vec![url];
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<PipelineSettings>,
}

impl SettingsStore {
    /// Loads `path` if present. A missing or unreadable file yields defaults.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log_warn!("ignoring malformed {}: {err}", path.display());
                PipelineSettings::default()
            })
        } else {
            PipelineSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Settings as seen by the pipeline, with the deployment override applied.
    pub fn effective(&self) -> PipelineSettings {
        let mut settings = self.read().clone();
        settings.apply_env_override(std::env::var(BACKEND_URL_ENV).ok());
        settings
    }

    pub fn update(&self, settings: PipelineSettings) -> Result<()> {
        let mut guard = self.write();
        *guard = settings;
        self.persist(&guard)
    }

    fn read(&self) -> RwLockReadGuard<'_, PipelineSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, PipelineSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, data: &PipelineSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        let settings = store.read().clone();
        assert_eq!(settings, PipelineSettings::default());
        assert_eq!(settings.auto_capture_interval(), Duration::from_secs(3));
    }

    #[test]
    fn malformed_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        let store = SettingsStore::new(path).unwrap();
        assert_eq!(*store.read(), PipelineSettings::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "method": "fer", "auto_capture_interval_ms": 5000 }"#).unwrap();
        let settings = SettingsStore::new(path).unwrap().read().clone();
        assert_eq!(settings.method, InferenceMethod::Fer);
        assert_eq!(settings.auto_capture_interval_ms, 5000);
        assert_eq!(settings.backend_urls.len(), 2);
    }

    #[test]
    fn updates_are_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();
        store
            .update(PipelineSettings {
                method: InferenceMethod::Huggingface,
                ..PipelineSettings::default()
            })
            .unwrap();

        let reloaded = SettingsStore::new(path).unwrap();
        assert_eq!(reloaded.read().method, InferenceMethod::Huggingface);
    }

    #[test]
    fn method_names_parse_case_insensitively() {
        assert_eq!("FER".parse::<InferenceMethod>(), Ok(InferenceMethod::Fer));
        assert_eq!(" deepface ".parse(), Ok(InferenceMethod::Deepface));
        assert!("openface".parse::<InferenceMethod>().is_err());
    }

    #[test]
    fn env_override_replaces_candidates() {
        let mut settings = PipelineSettings::default();
        settings.apply_env_override(Some("  ".into()));
        assert_eq!(settings.backend_urls.len(), 2);

        settings.apply_env_override(Some("https://emotion.example.com".into()));
        assert_eq!(settings.backend_urls, vec!["https://emotion.example.com"]);
    }
}
