//! HTTP contract of the garden gateway.

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tower::ServiceExt;

use sprout::classifier::{
    Classified, HabitClassifier, InitialAssessment, PlantSeed, TrendRequest,
};
use sprout::config::ClassifierConfig;
use sprout::db::{GardenStore, LibSqlBackend};
use sprout::error::ClassifierError;
use sprout::garden::{GardenEngine, GardenService, InitialHabits, Polarity, Verdict, Verdicts};
use sprout::gateway::{GatewayState, build_router};

/// Judges progress whenever the current food list is non-empty.
struct RuleClassifier;

#[async_trait]
impl HabitClassifier for RuleClassifier {
    async fn initiate(
        &self,
        habits: &InitialHabits,
    ) -> Result<Classified<InitialAssessment>, ClassifierError> {
        if habits.regular.iter().any(|h| h == "poison") {
            return Err(ClassifierError::InvalidOutput {
                reason: "model refused".to_string(),
            });
        }
        Ok(Classified::Structured(InitialAssessment::from_fn(|_| {
            PlantSeed {
                polarity_a: Polarity::Good,
                polarity_b: Polarity::Bad,
                age: 2,
                health: 5,
            }
        })))
    }

    async fn classify(
        &self,
        request: &TrendRequest,
    ) -> Result<Classified<Verdicts>, ClassifierError> {
        let food = if request.current.food.is_empty() {
            Verdict::Constant
        } else {
            Verdict::Progress
        };
        Ok(Classified::Structured(Verdicts {
            food,
            health: Verdict::Constant,
            toxic: Verdict::Constant,
        }))
    }
}

async fn app() -> (tempfile::TempDir, Router) {
    let dir = tempfile::tempdir().unwrap();
    let store = LibSqlBackend::new_local(&dir.path().join("garden.db"))
        .await
        .unwrap();
    store.run_migrations().await.unwrap();
    let service = GardenService::with_seed(
        Arc::new(store),
        Arc::new(RuleClassifier),
        GardenEngine::default(),
        ClassifierConfig::default(),
        1,
    );
    let state = Arc::new(GatewayState {
        service: Arc::new(service),
    });
    (dir, build_router(state))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    user: Option<&str>,
    body: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(request).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

const INITIAL: &str =
    r#"{"regular": ["oats"], "occasional": ["cake"], "health": [], "toxic": ["smoking"]}"#;

#[tokio::test]
async fn health_probe() {
    let (_dir, app) = app().await;
    let (status, body) = send(&app, Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "healthy"}));
}

#[tokio::test]
async fn garden_requires_user_header() {
    let (_dir, app) = app().await;
    let (status, body) = send(&app, Method::GET, "/api/garden", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"error": "Not authenticated"}));
}

#[tokio::test]
async fn empty_garden_for_new_user() {
    let (_dir, app) = app().await;
    let (status, body) = send(&app, Method::GET, "/api/garden", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"plants": [], "streaks": null}));
}

#[tokio::test]
async fn initiate_then_conflict() {
    let (_dir, app) = app().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/garden/initiate",
        Some("alice"),
        Some(INITIAL),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["plants"].as_array().unwrap().len(), 6);
    assert_eq!(body["confidence"], "structured");
    assert_eq!(body["streaks"], json!({"food": 0, "health": 0, "toxic": 0}));

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/garden/initiate",
        Some("alice"),
        Some(INITIAL),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("already exists"));
}

#[tokio::test]
async fn initiate_rejects_bad_input() {
    let (_dir, app) = app().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/garden/initiate",
        Some("alice"),
        Some(r#"{"regular": "unchanged"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/garden/initiate",
        Some("alice"),
        Some(r#"{"regular": [""], "occasional": [], "health": [], "toxic": []}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/garden/initiate",
        Some("alice"),
        Some("not json"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn initiate_requires_every_habit_list() {
    let (_dir, app) = app().await;

    for body in [
        "{}",
        r#"{"regular": ["oats"], "occasional": [], "health": []}"#,
    ] {
        let (status, resp) = send(
            &app,
            Method::POST,
            "/api/garden/initiate",
            Some("alice"),
            Some(body),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert!(resp["error"].is_string());
    }

    let (_, garden) = send(&app, Method::GET, "/api/garden", Some("alice"), None).await;
    assert_eq!(garden["plants"], json!([]));
}

#[tokio::test]
async fn classifier_failure_is_bad_gateway() {
    let (_dir, app) = app().await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/garden/initiate",
        Some("alice"),
        Some(r#"{"regular": ["poison"], "occasional": [], "health": [], "toxic": []}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("model refused"));

    let (_, garden) = send(&app, Method::GET, "/api/garden", Some("alice"), None).await;
    assert_eq!(garden["plants"], json!([]));
}

#[tokio::test]
async fn update_before_initiate_is_not_found() {
    let (_dir, app) = app().await;
    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/garden/update",
        Some("bob"),
        Some(r#"{"food": ["salad"], "health": "unchanged", "toxic": []}"#),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("not initialized"));
}

#[tokio::test]
async fn update_cycle_reports_verdicts_and_mutations() {
    let (_dir, app) = app().await;
    send(
        &app,
        Method::POST,
        "/api/garden/initiate",
        Some("alice"),
        Some(INITIAL),
    )
    .await;

    let submission = r#"{"food": ["salad"], "health": "unchanged", "toxic": "unchanged"}"#;
    let (status, first) = send(
        &app,
        Method::PUT,
        "/api/garden/update",
        Some("alice"),
        Some(submission),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        first["verdicts"],
        json!({"food": "progress", "health": "constant", "toxic": "constant"})
    );
    assert_eq!(first["streaks"]["food"], 1);
    assert_eq!(first["mutations"][0]["kind"], "streak_delta");

    let (_, second) = send(
        &app,
        Method::PUT,
        "/api/garden/update",
        Some("alice"),
        Some(submission),
    )
    .await;
    assert_eq!(second["streaks"]["food"], 0);
    let kinds: Vec<&str> = second["mutations"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|m| m["kind"].as_str())
        .collect();
    assert!(kinds.contains(&"reset_streak"));
    assert!(kinds.contains(&"adjust_health"));
    assert!(kinds.contains(&"grow"));

    let (_, garden) = send(&app, Method::GET, "/api/garden", Some("alice"), None).await;
    let good_food = garden["plants"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["dimension"] == "food" && p["polarity"] == "good")
        .unwrap()
        .clone();
    assert_eq!(good_food["health"], 6);
    assert_eq!(good_food["age"], 3);
}

#[tokio::test]
async fn update_rejects_unknown_marker() {
    let (_dir, app) = app().await;
    send(
        &app,
        Method::POST,
        "/api/garden/initiate",
        Some("alice"),
        Some(INITIAL),
    )
    .await;

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/garden/update",
        Some("alice"),
        Some(r#"{"food": "same as before", "health": [], "toxic": []}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("food"));
}
