//! Quota guard: rolling daily caps on questions, per-subject questions, and
//! distinct subjects.
//!
//! The guard is pure: `evaluate` never mutates, `commit` returns the
//! superseding record. The fetch path evaluates before selection and commits
//! only after selection succeeds, so a failed fetch never burns quota.

use chrono::{DateTime, Duration, Utc};
use tracing::instrument;

use crate::config::{Limits, WindowMode};
use crate::domain::{Quota, SubjectQuota};
use crate::error::ApiError;

/// True if the quota's daily window is still open at `now`.
pub fn window_open(quota: &Quota, now: DateTime<Utc>, mode: WindowMode) -> bool {
    match mode {
        WindowMode::Rolling => now - quota.daily_update < Duration::hours(24),
        WindowMode::Calendar => now.date_naive() == quota.daily_update.date_naive(),
    }
}

fn subject_count(quota: &Quota, subject_id: &str) -> u32 {
    quota
        .daily_subjects
        .iter()
        .find(|s| s.subject_id == subject_id)
        .map(|s| s.questions_count)
        .unwrap_or(0)
}

/// Check a request of `per_subject` questions for each of `subject_ids`
/// against the caps, in order: total daily cap, per-subject cap, then the
/// distinct-subject cap. A lapsed window counts as zero everywhere.
#[instrument(level = "debug", skip(quota, limits), fields(subjects = subject_ids.len(), per_subject))]
pub fn evaluate(
    quota: Option<&Quota>,
    subject_ids: &[String],
    per_subject: u32,
    limits: &Limits,
    mode: WindowMode,
    now: DateTime<Utc>,
) -> Result<(), ApiError> {
    let live = quota.filter(|q| window_open(q, now, mode));
    let daily_count = live.map(|q| q.daily_questions_count).unwrap_or(0);

    let requested = per_subject * subject_ids.len() as u32;
    if daily_count + requested > limits.daily_questions {
        let remaining = limits.daily_questions.saturating_sub(daily_count);
        return Err(ApiError::QuotaExceeded {
            scope: "daily_questions",
            remaining,
            message: format!(
                "daily question cap reached: {} of {} left",
                remaining, limits.daily_questions
            ),
        });
    }

    for subject_id in subject_ids {
        let used = live.map(|q| subject_count(q, subject_id)).unwrap_or(0);
        if used + per_subject > limits.subject_questions {
            let remaining = limits.subject_questions.saturating_sub(used);
            return Err(ApiError::QuotaExceeded {
                scope: "subject_questions",
                remaining,
                message: format!(
                    "subject '{}' cap reached: {} of {} left",
                    subject_id, remaining, limits.subject_questions
                ),
            });
        }
    }

    let mut distinct: Vec<&str> = live
        .map(|q| q.daily_subjects.iter().map(|s| s.subject_id.as_str()).collect())
        .unwrap_or_default();
    for subject_id in subject_ids {
        if !distinct.contains(&subject_id.as_str()) {
            distinct.push(subject_id);
        }
    }
    if distinct.len() as u32 > limits.daily_subjects {
        return Err(ApiError::QuotaExceeded {
            scope: "daily_subjects",
            remaining: 0,
            message: format!(
                "at most {} distinct subjects per day",
                limits.daily_subjects
            ),
        });
    }

    Ok(())
}

/// Produce the quota record that supersedes `quota` after issuing
/// `per_subject` questions for each of `subject_ids`. A lapsed daily window
/// starts fresh counts; the weekly side is carried unchanged here and rolled
/// by the submit path.
pub fn commit(
    quota: Option<&Quota>,
    subject_ids: &[String],
    per_subject: u32,
    mode: WindowMode,
    now: DateTime<Utc>,
) -> Quota {
    let live = quota.filter(|q| window_open(q, now, mode));

    let mut daily_subjects: Vec<SubjectQuota> =
        live.map(|q| q.daily_subjects.clone()).unwrap_or_default();
    for subject_id in subject_ids {
        match daily_subjects.iter_mut().find(|s| &s.subject_id == subject_id) {
            Some(s) => s.questions_count += per_subject,
            None => daily_subjects.push(SubjectQuota {
                subject_id: subject_id.clone(),
                questions_count: per_subject,
            }),
        }
    }

    Quota {
        daily_update: live.map(|q| q.daily_update).unwrap_or(now),
        daily_questions_count: live.map(|q| q.daily_questions_count).unwrap_or(0)
            + per_subject * subject_ids.len() as u32,
        daily_subjects,
        weekly_update: quota.map(|q| q.weekly_update).unwrap_or(now),
        point_per_week: quota.map(|q| q.point_per_week).unwrap_or(0.0),
    }
}
