//! Built-in seed catalog so the service answers something useful even
//! without an external question bank. Real deployments load their bank via
//! `QUIZ_CONFIG_PATH`.

use crate::domain::{AnswerOption, Question};

fn opts(correct: &str, wrong: &[&str]) -> Vec<AnswerOption> {
    let mut v = vec![AnswerOption {
        text: correct.to_string(),
        correct: true,
    }];
    v.extend(wrong.iter().map(|w| AnswerOption {
        text: w.to_string(),
        correct: false,
    }));
    v
}

fn q(id: &str, subject: &str, topic: Option<&str>, options: Vec<AnswerOption>) -> Question {
    Question {
        id: id.to_string(),
        subject_id: subject.to_string(),
        topic_id: topic.map(|t| t.to_string()),
        category_ids: vec!["general".to_string()],
        options,
        points: 40.0,
        is_theory: false,
        timer_secs: 30,
    }
}

pub fn seed_questions() -> Vec<Question> {
    vec![
        q(
            "seed-math-1",
            "math",
            Some("arithmetic"),
            opts("12", &["10", "14", "16"]),
        ),
        q(
            "seed-math-2",
            "math",
            Some("arithmetic"),
            opts("81", &["72", "64", "99"]),
        ),
        q(
            "seed-math-3",
            "math",
            Some("algebra"),
            opts("x = 4", &["x = 2", "x = 8", "x = 16"]),
        ),
        q(
            "seed-physics-1",
            "physics",
            Some("mechanics"),
            opts("9.8 m/s²", &["8.9 m/s²", "10.8 m/s²", "6.7 m/s²"]),
        ),
        q(
            "seed-physics-2",
            "physics",
            Some("mechanics"),
            opts("Newton", &["Joule", "Watt", "Pascal"]),
        ),
        q(
            "seed-physics-3",
            "physics",
            Some("optics"),
            opts("Refraction", &["Reflection", "Diffusion", "Dispersion"]),
        ),
    ]
}
