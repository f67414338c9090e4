// tests/api_tests.rs

use quizhive_backend::config::{AppConfig, Limits};
use quizhive_backend::routes::build_router;
use quizhive_backend::state::AppState;
use std::sync::Arc;

/// Spawn the app on a random port. Returns the base URL.
async fn spawn_app(config: AppConfig) -> String {
    let state = Arc::new(AppState::from_config(config));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://127.0.0.1:{}", port)
}

/// Seed catalog has 3 math and 3 physics questions; a set size of 3 lets the
/// built-in seeds fill a full request.
fn small_config() -> AppConfig {
    AppConfig {
        limits: Limits {
            daily_questions: 100,
            subject_questions: 50,
            daily_subjects: 2,
            set_size: 3,
        },
        ..AppConfig::default()
    }
}

fn question_set_body(user: &str, subjects: &[&str]) -> serde_json::Value {
    serde_json::json!({
        "userId": user,
        "categoryId": "general",
        "subjects": subjects.iter().map(|s| serde_json::json!({ "_id": s })).collect::<Vec<_>>(),
        "mode": "solo",
    })
}

#[tokio::test]
async fn health_check_works() {
    let address = spawn_app(small_config()).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/v1/health", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn solo_flow_fetch_submit_refetch() {
    let address = spawn_app(small_config()).await;
    let client = reqwest::Client::new();

    // 1. Fetch a question set.
    let response = client
        .post(format!("{}/api/v1/question-set", address))
        .json(&question_set_body("u1", &["math"]))
        .send()
        .await
        .expect("Fetch failed");
    assert_eq!(response.status().as_u16(), 200);
    let set: serde_json::Value = response.json().await.unwrap();

    let questions = set["groups"][0]["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 3);
    assert!(questions.iter().all(|q| q["hasAnswered"] == false));
    // Answer keys are stripped from the wire shape.
    assert!(questions.iter().all(|q| q["options"][0].is_string()));
    assert_eq!(set["meta"]["stats"]["freshTotal"], 3);

    // 2. Submit the attempt; seed questions keep the correct option at 0.
    let answers: Vec<serde_json::Value> = questions
        .iter()
        .map(|q| serde_json::json!({ "questionId": q["id"], "option": 0 }))
        .collect();
    let response = client
        .post(format!("{}/api/v1/attempt", address))
        .json(&serde_json::json!({ "userId": "u1", "mode": "solo", "answers": answers }))
        .send()
        .await
        .expect("Submit failed");
    assert_eq!(response.status().as_u16(), 200);
    let result: serde_json::Value = response.json().await.unwrap();
    assert_eq!(result["totalPoints"], 120.0);
    assert_eq!(result["newCount"], 3);
    assert_eq!(result["repeatedCount"], 0);
    assert_eq!(result["balance"], 120.0);

    // 3. The next fetch classifies everything as repeated.
    let response = client
        .post(format!("{}/api/v1/question-set", address))
        .json(&question_set_body("u1", &["math"]))
        .send()
        .await
        .expect("Refetch failed");
    let set: serde_json::Value = response.json().await.unwrap();
    let questions = set["groups"][0]["questions"].as_array().unwrap();
    assert!(questions.iter().all(|q| q["hasAnswered"] == true));
    assert_eq!(set["meta"]["stats"]["repeatedTotal"], 3);
}

#[tokio::test]
async fn quota_exceeded_carries_remaining() {
    let mut config = small_config();
    config.limits.daily_questions = 3;
    let address = spawn_app(config).await;
    let client = reqwest::Client::new();

    let first = client
        .post(format!("{}/api/v1/question-set", address))
        .json(&question_set_body("u1", &["math"]))
        .send()
        .await
        .unwrap();
    assert_eq!(first.status().as_u16(), 200);

    let second = client
        .post(format!("{}/api/v1/question-set", address))
        .json(&question_set_body("u1", &["math"]))
        .send()
        .await
        .unwrap();
    assert_eq!(second.status().as_u16(), 429);
    let body: serde_json::Value = second.json().await.unwrap();
    assert_eq!(body["error"], "quota_exceeded");
    assert_eq!(body["scope"], "daily_questions");
    assert_eq!(body["remaining"], 0);
}

#[tokio::test]
async fn insufficient_subjects_names_the_short_subject() {
    let address = spawn_app(small_config()).await;
    let client = reqwest::Client::new();

    // The optics topic has a single seed question; a set of 3 cannot fill.
    let body = serde_json::json!({
        "userId": "u1",
        "categoryId": "general",
        "subjects": [{ "_id": "physics", "topics": ["optics"] }],
        "mode": "solo",
    });
    let response = client
        .post(format!("{}/api/v1/question-set", address))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 422);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "insufficient_subjects");
    assert_eq!(body["insufficientSubjects"][0]["subjectId"], "physics");
    assert_eq!(body["insufficientSubjects"][0]["available"], 1);
    assert_eq!(body["insufficientSubjects"][0]["required"], 3);
}

#[tokio::test]
async fn unknown_category_is_not_found() {
    let address = spawn_app(small_config()).await;
    let client = reqwest::Client::new();

    let mut body = question_set_body("u1", &["math"]);
    body["categoryId"] = serde_json::json!("nope");
    let response = client
        .post(format!("{}/api/v1/question-set", address))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn three_subjects_fail_validation() {
    let address = spawn_app(small_config()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/v1/question-set", address))
        .json(&question_set_body("u1", &["math", "physics", "chemistry"]))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "validation");
}
