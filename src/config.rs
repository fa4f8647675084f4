//! Configuration for notebook-puppet automation.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Browser launch configuration.
    pub browser: BrowserConfig,
    /// NotebookLM UI endpoints and selectors.
    pub ui: UiConfig,
    /// Session/auth storage locations.
    pub storage: StorageConfig,
    /// Wait tuning for completion detection.
    pub waits: WaitConfig,
    /// Human-like interaction pacing.
    pub pacing: PacingConfig,
}

/// Browser-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Run browser in headless mode.
    pub headless: bool,
    /// Path to browser executable (auto-detect if None).
    pub executable_path: Option<PathBuf>,
    /// Profile directory for auth persistence (derived from storage dir
    /// if None). Exclusive to one session at a time.
    pub profile_dir: Option<PathBuf>,
    /// Browser window width.
    pub window_width: u32,
    /// Browser window height.
    pub window_height: u32,
    /// Additional browser arguments.
    pub args: Vec<String>,
    /// Sandbox mode (disable for containers).
    pub sandbox: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            executable_path: None,
            profile_dir: None,
            window_width: 1920,
            window_height: 1080,
            args: vec![
                "--disable-gpu".into(),
                "--disable-dev-shm-usage".into(),
                "--no-first-run".into(),
                "--no-default-browser-check".into(),
            ],
            sandbox: true,
        }
    }
}

/// NotebookLM endpoints and CSS selectors.
///
/// Selectors are configuration rather than code because the remote UI
/// changes without notice; a selector update should not require a rebuild.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// Login/landing URL.
    pub login_url: String,
    /// Host the session must land on after authentication.
    pub authenticated_host: String,
    /// Host that indicates the Google sign-in flow is still in progress.
    pub signin_host: String,
    /// Question input box.
    pub ask_input: String,
    /// "New notebook" button on the home page.
    pub new_notebook_button: String,
    /// "Add source" button in a notebook.
    pub add_source_button: String,
    /// URL paste box in the add-source dialog.
    pub source_url_input: String,
    /// Insert/confirm button in the add-source dialog.
    pub insert_button: String,
    /// One entry per ingested source in the source list.
    pub source_entry: String,
    /// Visible while a source is still being processed.
    pub source_processing_indicator: String,
    /// Rendered answer blocks; the last one is the current answer.
    pub answer_block: String,
    /// Visible while an answer is still streaming. Overrides any text
    /// observation: text plus this indicator is still "in progress".
    pub answer_pending_indicator: String,
    /// "Audio Overview" button in the studio panel.
    pub audio_overview_button: String,
    /// "Generate" button in the audio overview dialog.
    pub audio_generate_button: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            login_url: "https://notebooklm.google.com".into(),
            authenticated_host: "notebooklm.google.com".into(),
            signin_host: "accounts.google.com".into(),
            ask_input: r#"textarea[aria-label*="Ask"]"#.into(),
            new_notebook_button: r#"button[aria-label="New notebook"]"#.into(),
            add_source_button: r#"button[aria-label="Add source"]"#.into(),
            source_url_input: r#"textarea[placeholder="Paste any links"]"#.into(),
            insert_button: r#"button[aria-label="Insert"]"#.into(),
            source_entry: ".source-entry".into(),
            source_processing_indicator: ".processing".into(),
            answer_block: ".response-content".into(),
            answer_pending_indicator: r#"div[data-testid="loading"]"#.into(),
            audio_overview_button: r#"button[aria-label="Audio Overview"]"#.into(),
            audio_generate_button: r#"button[aria-label="Generate"]"#.into(),
        }
    }
}

/// Session/auth storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Root data directory (platform data dir if None).
    pub data_dir: Option<PathBuf>,
}

impl StorageConfig {
    /// Resolved root data directory.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("notebook-puppet")
        })
    }

    /// Browser profile directory (exclusive per session).
    pub fn profile_dir(&self) -> PathBuf {
        self.data_dir().join("browser_profile")
    }

    /// Opaque cookies + storage snapshot produced after authentication.
    ///
    /// This crate only reads/writes it whole and existence-checks it; the
    /// schema belongs to the browser side.
    pub fn state_file(&self) -> PathBuf {
        self.data_dir().join("state.json")
    }

    /// Authentication metadata (when we last signed in).
    pub fn auth_info_file(&self) -> PathBuf {
        self.data_dir().join("auth_info.json")
    }
}

/// Wait tuning for the completion-detection engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitConfig {
    /// Suspension between DOM probes.
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Consecutive identical reads required for stability.
    pub required_repeats: u32,
    /// Budget for a streamed answer to settle.
    #[serde(with = "humantime_serde")]
    pub answer_deadline: Duration,
    /// Budget for a source to finish ingesting.
    #[serde(with = "humantime_serde")]
    pub source_deadline: Duration,
    /// Budget for an element to appear when waiting for readiness.
    #[serde(with = "humantime_serde")]
    pub ready_deadline: Duration,
    /// Budget for the interactive Google login to complete.
    #[serde(with = "humantime_serde")]
    pub login_deadline: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(750),
            required_repeats: 3,
            answer_deadline: Duration::from_secs(120),
            source_deadline: Duration::from_secs(90),
            ready_deadline: Duration::from_secs(30),
            login_deadline: Duration::from_secs(300),
        }
    }
}

/// Human-like pacing for interactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Minimum pause before an interaction.
    #[serde(with = "humantime_serde")]
    pub min_action_delay: Duration,
    /// Maximum pause before an interaction.
    #[serde(with = "humantime_serde")]
    pub max_action_delay: Duration,
    /// Minimum per-character typing delay, in milliseconds.
    pub type_min_ms: u64,
    /// Maximum per-character typing delay, in milliseconds.
    pub type_max_ms: u64,
    /// Disable to type and click at machine speed (tests, trusted envs).
    pub humanize: bool,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min_action_delay: Duration::from_millis(100),
            max_action_delay: Duration::from_millis(500),
            type_min_ms: 25,
            type_max_ms: 75,
            humanize: true,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Create a builder for configuration.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set headless mode.
    pub fn headless(mut self, headless: bool) -> Self {
        self.config.browser.headless = headless;
        self
    }

    /// Set browser executable path.
    pub fn executable_path(mut self, path: PathBuf) -> Self {
        self.config.browser.executable_path = Some(path);
        self
    }

    /// Set the root data directory.
    pub fn data_dir(mut self, path: PathBuf) -> Self {
        self.config.storage.data_dir = Some(path);
        self
    }

    /// Disable sandbox (for containers).
    pub fn no_sandbox(mut self) -> Self {
        self.config.browser.sandbox = false;
        self
    }

    /// Set the answer-settling deadline.
    pub fn answer_deadline(mut self, deadline: Duration) -> Self {
        self.config.waits.answer_deadline = deadline;
        self
    }

    /// Disable humanized pacing.
    pub fn machine_speed(mut self) -> Self {
        self.config.pacing.humanize = false;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Config {
        self.config
    }
}
