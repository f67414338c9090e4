//! Domain models: questions, quotas, and lobby participants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One answer option on a question. `correct` never leaves the server;
/// the wire DTOs in `protocol` expose only the text.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnswerOption {
    pub text: String,
    pub correct: bool,
}

/// Core question structure held in the in-memory catalog.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub subject_id: String,
    #[serde(default)]
    pub topic_id: Option<String>,
    pub category_ids: Vec<String>,
    pub options: Vec<AnswerOption>,
    /// Base point value (GT) awarded for a correct first-time answer.
    pub points: f64,
    /// Theory questions are excluded from auto-graded selection.
    #[serde(default)]
    pub is_theory: bool,
    #[serde(default = "default_timer_secs")]
    pub timer_secs: u32,
}

fn default_timer_secs() -> u32 {
    30
}

/// Per-subject slice of a user's daily quota.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SubjectQuota {
    pub subject_id: String,
    pub questions_count: u32,
}

/// One active quota record per user. The daily window is anchored to
/// `daily_update`, not to a calendar day; once the window elapses the record
/// is superseded on the next commit rather than eagerly reset.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Quota {
    pub daily_update: DateTime<Utc>,
    pub daily_questions_count: u32,
    pub daily_subjects: Vec<SubjectQuota>,
    pub weekly_update: DateTime<Utc>,
    pub point_per_week: f64,
}

/// Minimal profile snapshot carried into lobby rosters and invites.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProfileSnapshot {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(rename = "avatarUrl", default)]
    pub avatar_url: Option<String>,
}

/// Lobby membership state. `pending` until the user answers the invite.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    Pending,
    Active,
    Declined,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Participant {
    pub profile: ProfileSnapshot,
    pub status: ParticipantStatus,
}

/// The host's category/subject choice, broadcast to the lobby. Advisory only:
/// the selector is invoked separately once play starts.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CategorySelection {
    #[serde(rename = "categoryId")]
    pub category_id: String,
    #[serde(rename = "subjectIds", default)]
    pub subject_ids: Vec<String>,
}

/// Invite payload: enough session context for the target to join.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionSummary {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub host: ProfileSnapshot,
    #[serde(default)]
    pub category: Option<CategorySelection>,
}
