//! Scoring: turns a completed attempt into awarded points and the
//! new/repeated id lists the submit path appends to the user's bank.

use std::collections::HashSet;

use serde::Serialize;
use tracing::instrument;

/// One answer resolved against the catalog: the question's base value and
/// whether the chosen option was correct.
#[derive(Clone, Debug)]
pub struct ResolvedAnswer {
    pub question_id: String,
    pub points: f64,
    pub correct: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct ScoreOutcome {
    #[serde(rename = "totalPoints")]
    pub total_points: f64,
    #[serde(rename = "newQuestionIds")]
    pub new_question_ids: Vec<String>,
    #[serde(rename = "repeatedQuestionIds")]
    pub repeated_question_ids: Vec<String>,
    #[serde(rename = "newCount")]
    pub new_count: usize,
    #[serde(rename = "repeatedCount")]
    pub repeated_count: usize,
}

/// Score an attempt against the user's answered-question bank.
///
/// Correct + fresh earns the question's full value; correct + repeated earns
/// the flat `repeat_reward`; incorrect deducts `fail_penalty` regardless of
/// prior-seen status but is still classified for bookkeeping. The total is
/// floored at zero. Both output id lists must be unioned into the bank by
/// the caller.
#[instrument(level = "debug", skip(answers, qbank), fields(answers = answers.len(), fail_penalty, repeat_reward))]
pub fn score(
    answers: &[ResolvedAnswer],
    qbank: &HashSet<String>,
    fail_penalty: f64,
    repeat_reward: f64,
) -> ScoreOutcome {
    let mut total = 0.0_f64;
    let mut new_question_ids = Vec::new();
    let mut repeated_question_ids = Vec::new();

    for answer in answers {
        let repeated = qbank.contains(&answer.question_id);
        if answer.correct {
            total += if repeated { repeat_reward } else { answer.points };
        } else {
            total -= fail_penalty;
        }
        if repeated {
            repeated_question_ids.push(answer.question_id.clone());
        } else {
            new_question_ids.push(answer.question_id.clone());
        }
    }

    ScoreOutcome {
        total_points: total.max(0.0),
        new_count: new_question_ids.len(),
        repeated_count: repeated_question_ids.len(),
        new_question_ids,
        repeated_question_ids,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(id: &str, points: f64, correct: bool) -> ResolvedAnswer {
        ResolvedAnswer {
            question_id: id.to_string(),
            points,
            correct,
        }
    }

    #[test]
    fn mixed_attempt_totals_up() {
        // 10 correct-new at 40, 5 correct-repeat, 3 incorrect, penalty 15:
        // max(0, 400 + 1.0 - 45) = 356.
        let mut answers: Vec<ResolvedAnswer> =
            (0..10).map(|i| answer(&format!("new-{i}"), 40.0, true)).collect();
        answers.extend((0..5).map(|i| answer(&format!("rep-{i}"), 40.0, true)));
        answers.extend((0..3).map(|i| answer(&format!("miss-{i}"), 40.0, false)));

        let qbank: HashSet<String> = (0..5).map(|i| format!("rep-{i}")).collect();
        let outcome = score(&answers, &qbank, 15.0, 0.2);

        assert!((outcome.total_points - 356.0).abs() < 1e-9);
        assert_eq!(outcome.new_count, 13); // 10 correct + 3 incorrect, all unseen
        assert_eq!(outcome.repeated_count, 5);
    }

    #[test]
    fn total_is_floored_at_zero() {
        let answers: Vec<ResolvedAnswer> =
            (0..4).map(|i| answer(&format!("q-{i}"), 10.0, false)).collect();
        let outcome = score(&answers, &HashSet::new(), 15.0, 0.2);
        assert_eq!(outcome.total_points, 0.0);
        assert_eq!(outcome.new_count, 4);
    }

    #[test]
    fn incorrect_repeats_are_classified_as_repeated() {
        let answers = vec![answer("seen", 40.0, false)];
        let qbank: HashSet<String> = ["seen".to_string()].into_iter().collect();
        let outcome = score(&answers, &qbank, 5.0, 0.2);
        assert_eq!(outcome.repeated_question_ids, vec!["seen".to_string()]);
        assert!(outcome.new_question_ids.is_empty());
    }

    #[test]
    fn repeated_correct_earns_flat_reward() {
        let answers = vec![answer("seen", 40.0, true)];
        let qbank: HashSet<String> = ["seen".to_string()].into_iter().collect();
        let outcome = score(&answers, &qbank, 15.0, 0.2);
        assert!((outcome.total_points - 0.2).abs() < 1e-9);
    }
}
