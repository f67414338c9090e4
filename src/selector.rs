//! Question selection: capped, fairness-ordered per-subject sets.
//!
//! Candidates are ordered fresh-first (questions absent from the user's
//! answered-question bank come before repeats) with a random tie-breaker
//! inside each band, so users preferentially see unseen questions and only
//! fall back to repeats once the fresh supply is exhausted.

use std::collections::HashSet;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::domain::Question;
use crate::error::{ApiError, SubjectShortfall};

/// One subject of a question-set request: subject id plus an optional topic
/// filter. `_id` matches the wire shape.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubjectRequest {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub topics: Option<Vec<String>>,
}

/// A candidate tagged with its fresh/repeated classification at selection
/// time. `has_answered` is computed against the requesting user's bank only.
#[derive(Clone, Debug, Serialize)]
pub struct SelectedQuestion {
    pub question: Question,
    pub has_answered: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct SubjectGroup {
    pub subject_id: String,
    pub questions: Vec<SelectedQuestion>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SubjectStats {
    #[serde(rename = "subjectId")]
    pub subject_id: String,
    pub fresh: usize,
    pub repeated: usize,
}

/// Host-facing statistics over the final truncated sets. Accurate only for
/// the requesting user; other participants in a shared session have their
/// own banks.
#[derive(Clone, Debug, Serialize)]
pub struct SelectionStats {
    #[serde(rename = "perSubject")]
    pub per_subject: Vec<SubjectStats>,
    #[serde(rename = "freshTotal")]
    pub fresh_total: usize,
    #[serde(rename = "repeatedTotal")]
    pub repeated_total: usize,
}

/// Build one group of exactly `set_size` questions per requested subject.
///
/// Fails with `SelectionUnsatisfiable` naming every short subject when any
/// group cannot be filled; a subject with zero matches is a shortfall with
/// `available: 0`, not a silent omission.
#[instrument(level = "debug", skip(catalog, qbank, rng), fields(category_id, subjects = subjects.len(), set_size))]
pub fn select<R: Rng>(
    catalog: &[Question],
    category_id: &str,
    subjects: &[SubjectRequest],
    qbank: &HashSet<String>,
    set_size: usize,
    rng: &mut R,
) -> Result<(Vec<SubjectGroup>, SelectionStats), ApiError> {
    let mut groups = Vec::with_capacity(subjects.len());
    let mut insufficient = Vec::new();

    for subject in subjects {
        let topic_filter = subject
            .topics
            .as_ref()
            .filter(|t| !t.is_empty());

        let mut candidates: Vec<(SelectedQuestion, u32)> = catalog
            .iter()
            .filter(|q| !q.is_theory)
            .filter(|q| q.subject_id == subject.id)
            .filter(|q| q.category_ids.iter().any(|c| c == category_id))
            .filter(|q| match topic_filter {
                Some(topics) => q
                    .topic_id
                    .as_ref()
                    .is_some_and(|t| topics.contains(t)),
                None => true,
            })
            .map(|q| {
                (
                    SelectedQuestion {
                        question: q.clone(),
                        has_answered: qbank.contains(&q.id),
                    },
                    rng.gen::<u32>(),
                )
            })
            .collect();

        if candidates.len() < set_size {
            insufficient.push(SubjectShortfall {
                subject_id: subject.id.clone(),
                available: candidates.len(),
                required: set_size,
            });
            continue;
        }

        // Fresh first, random within each band.
        candidates.sort_by_key(|(sq, tiebreak)| (sq.has_answered, *tiebreak));
        candidates.truncate(set_size);

        groups.push(SubjectGroup {
            subject_id: subject.id.clone(),
            questions: candidates.into_iter().map(|(sq, _)| sq).collect(),
        });
    }

    if !insufficient.is_empty() {
        return Err(ApiError::SelectionUnsatisfiable { insufficient });
    }

    let per_subject: Vec<SubjectStats> = groups
        .iter()
        .map(|g| {
            let repeated = g.questions.iter().filter(|q| q.has_answered).count();
            SubjectStats {
                subject_id: g.subject_id.clone(),
                fresh: g.questions.len() - repeated,
                repeated,
            }
        })
        .collect();
    let fresh_total = per_subject.iter().map(|s| s.fresh).sum();
    let repeated_total = per_subject.iter().map(|s| s.repeated).sum();

    Ok((
        groups,
        SelectionStats {
            per_subject,
            fresh_total,
            repeated_total,
        },
    ))
}
