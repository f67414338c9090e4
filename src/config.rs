//! Loading application configuration (caps, economy, session lifecycle, and
//! an optional question bank) from TOML.
//!
//! See `AppConfig` for the expected schema. Every section is defaulted so the
//! service runs with no config file at all.

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::Question;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub economy: Economy,
    #[serde(default)]
    pub quota: QuotaSettings,
    #[serde(default)]
    pub session: SessionSettings,
    /// Optional question bank; merged with the built-in seeds at startup.
    #[serde(default)]
    pub questions: Vec<QuestionCfg>,
}

/// Hard caps consulted by the quota guard and the selector.
#[derive(Clone, Debug, Deserialize)]
pub struct Limits {
    #[serde(default = "default_daily_questions")]
    pub daily_questions: u32,
    #[serde(default = "default_subject_questions")]
    pub subject_questions: u32,
    #[serde(default = "default_daily_subjects")]
    pub daily_subjects: u32,
    /// Questions per subject in one issued set.
    #[serde(default = "default_set_size")]
    pub set_size: u32,
}

fn default_daily_questions() -> u32 {
    100
}
fn default_subject_questions() -> u32 {
    50
}
fn default_daily_subjects() -> u32 {
    2
}
fn default_set_size() -> u32 {
    25
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            daily_questions: default_daily_questions(),
            subject_questions: default_subject_questions(),
            daily_subjects: default_daily_subjects(),
            set_size: default_set_size(),
        }
    }
}

/// Points economy knobs. Operators tune difficulty here, never in code.
#[derive(Clone, Debug, Deserialize)]
pub struct Economy {
    #[serde(default = "default_fail_penalty")]
    pub fail_penalty: f64,
    #[serde(default = "default_repeat_reward")]
    pub repeat_reward: f64,
}

fn default_fail_penalty() -> f64 {
    15.0
}
fn default_repeat_reward() -> f64 {
    0.2
}

impl Default for Economy {
    fn default() -> Self {
        Self {
            fail_penalty: default_fail_penalty(),
            repeat_reward: default_repeat_reward(),
        }
    }
}

/// How the daily window is anchored: rolling 24h from the last update
/// (observed behavior, the default) or aligned to the UTC calendar day.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WindowMode {
    #[default]
    Rolling,
    Calendar,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct QuotaSettings {
    #[serde(default)]
    pub window: WindowMode,
}

/// Lobby lifecycle: sessions idle longer than `ttl_secs` are reaped.
#[derive(Clone, Debug, Deserialize)]
pub struct SessionSettings {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_reap_interval_secs")]
    pub reap_interval_secs: u64,
}

fn default_ttl_secs() -> u64 {
    3600
}
fn default_reap_interval_secs() -> u64 {
    300
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            reap_interval_secs: default_reap_interval_secs(),
        }
    }
}

/// Question entry accepted in TOML configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct QuestionCfg {
    #[serde(default)]
    pub id: Option<String>,
    pub subject: String,
    #[serde(default)]
    pub topic: Option<String>,
    pub categories: Vec<String>,
    pub options: Vec<OptionCfg>,
    pub points: f64,
    #[serde(default)]
    pub is_theory: bool,
    #[serde(default)]
    pub timer_secs: Option<u32>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct OptionCfg {
    pub text: String,
    #[serde(default)]
    pub correct: bool,
}

impl QuestionCfg {
    /// Bank entries need at least one correct option to be auto-gradable.
    pub fn into_question(self) -> Option<Question> {
        if !self.options.iter().any(|o| o.correct) {
            return None;
        }
        Some(Question {
            id: self
                .id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            subject_id: self.subject,
            topic_id: self.topic,
            category_ids: self.categories,
            options: self
                .options
                .into_iter()
                .map(|o| crate::domain::AnswerOption {
                    text: o.text,
                    correct: o.correct,
                })
                .collect(),
            points: self.points,
            is_theory: self.is_theory,
            timer_secs: self.timer_secs.unwrap_or(30),
        })
    }
}

/// Attempt to load `AppConfig` from QUIZ_CONFIG_PATH. On any parsing/IO
/// error, returns None and the caller falls back to defaults.
pub fn load_config_from_env() -> Option<AppConfig> {
    let path = std::env::var("QUIZ_CONFIG_PATH").ok()?;
    match std::fs::read_to_string(&path) {
        Ok(s) => match toml::from_str::<AppConfig>(&s) {
            Ok(cfg) => {
                info!(target: "quizhive_backend", %path, "Loaded app config (TOML)");
                Some(cfg)
            }
            Err(e) => {
                error!(target: "quizhive_backend", %path, error = %e, "Failed to parse TOML config");
                None
            }
        },
        Err(e) => {
            error!(target: "quizhive_backend", %path, error = %e, "Failed to read TOML config file");
            None
        }
    }
}
