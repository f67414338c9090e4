//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{
    CategorySelection, Participant, ParticipantStatus, ProfileSnapshot, Question, SessionSummary,
};
use crate::scoring::ScoreOutcome;
use crate::selector::{SelectionStats, SelectedQuestion, SubjectGroup, SubjectRequest};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    RegisterUser {
        #[serde(rename = "userId")]
        user_id: String,
    },
    JoinSession {
        #[serde(rename = "sessionId")]
        session_id: String,
        user: ProfileSnapshot,
    },
    SendInvite {
        #[serde(rename = "toUserId")]
        to_user_id: String,
        session: SessionSummary,
    },
    RemoveInvite {
        #[serde(rename = "toUserId")]
        to_user_id: String,
        session: SessionSummary,
    },
    ModeCategory {
        #[serde(rename = "sessionId")]
        session_id: String,
        category: CategorySelection,
    },
    InviteResponse {
        #[serde(rename = "sessionId")]
        session_id: String,
        user: ProfileSnapshot,
        status: ParticipantStatus,
    },
}

/// Messages the server sends over WebSocket, both as direct replies and as
/// session/user channel broadcasts. Clone because one message fans out to
/// every subscriber of a broadcast channel.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    /// Full current roster, sent to the joiner only.
    SessionSnapshot { participants: Vec<Participant> },
    /// New member announcement to the rest of the session.
    UserJoined { participant: Participant },
    /// Invite delivered on the target user's private channel.
    ReceiveInvite { session: SessionSummary },
    /// Informational invite broadcast on the session channel.
    NewInvite { session: SessionSummary },
    /// Invite retraction on the target user's private channel.
    UnInvite { session: SessionSummary },
    /// Retraction broadcast on the session channel.
    RemoveInvited { session: SessionSummary },
    SetCategory { category: CategorySelection },
    InviteStatusUpdate {
        user: ProfileSnapshot,
        status: ParticipantStatus,
    },
    Error { message: String },
}

//
// HTTP request/response DTOs
//

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuizMode {
    Solo,
    Friends,
}

#[derive(Debug, Deserialize)]
pub struct QuestionSetRequest {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "categoryId")]
    pub category_id: String,
    pub subjects: Vec<SubjectRequest>,
    pub mode: QuizMode,
}

/// Question DTO with the answer key stripped: options carry text only.
#[derive(Debug, Serialize)]
pub struct QuestionOut {
    pub id: String,
    #[serde(rename = "subjectId")]
    pub subject_id: String,
    #[serde(rename = "topicId")]
    pub topic_id: Option<String>,
    pub options: Vec<String>,
    pub points: f64,
    #[serde(rename = "timerSecs")]
    pub timer_secs: u32,
    #[serde(rename = "hasAnswered")]
    pub has_answered: bool,
}

#[derive(Debug, Serialize)]
pub struct SubjectGroupOut {
    #[serde(rename = "subjectId")]
    pub subject_id: String,
    pub questions: Vec<QuestionOut>,
}

#[derive(Debug, Serialize)]
pub struct AttemptMeta {
    pub stats: SelectionStats,
}

#[derive(Debug, Serialize)]
pub struct QuestionSetResponse {
    pub groups: Vec<SubjectGroupOut>,
    /// Accurate for the requesting user (the host) only.
    pub meta: AttemptMeta,
}

fn question_out(sq: &SelectedQuestion) -> QuestionOut {
    let q: &Question = &sq.question;
    QuestionOut {
        id: q.id.clone(),
        subject_id: q.subject_id.clone(),
        topic_id: q.topic_id.clone(),
        options: q.options.iter().map(|o| o.text.clone()).collect(),
        points: q.points,
        timer_secs: q.timer_secs,
        has_answered: sq.has_answered,
    }
}

/// Convert internal selection groups to the public DTO.
pub fn groups_out(groups: &[SubjectGroup]) -> Vec<SubjectGroupOut> {
    groups
        .iter()
        .map(|g| SubjectGroupOut {
            subject_id: g.subject_id.clone(),
            questions: g.questions.iter().map(question_out).collect(),
        })
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct AttemptAnswerIn {
    #[serde(rename = "questionId")]
    pub question_id: String,
    /// Index into the question's option list.
    pub option: usize,
}

#[derive(Debug, Deserialize)]
pub struct SubmitAttemptRequest {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub mode: QuizMode,
    pub answers: Vec<AttemptAnswerIn>,
}

#[derive(Debug, Serialize)]
pub struct SubmitAttemptResponse {
    #[serde(flatten)]
    pub outcome: ScoreOutcome,
    /// User's point balance after this attempt.
    pub balance: f64,
    #[serde(rename = "pointPerWeek")]
    pub point_per_week: f64,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}
