use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use base64::Engine;
use quizstream::api::{router, ADMIN_PASSWORD_HEADER};
use quizstream::auth::{hash_password, Accounts};
use quizstream::catalog::{import::parse_catalog, Catalog};
use quizstream::config::Config;
use quizstream::protocol::ServerMessage;
use quizstream::state::AppState;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tower::ServiceExt;

const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 1, 2, 3];

fn catalog_json() -> Value {
    let image = base64::engine::general_purpose::STANDARD.encode(PNG);
    json!({
        "groups": [
            {
                "id": "basics",
                "title": "Basics",
                "is_release": true,
                "categories": [
                    {
                        "id": "math",
                        "title": "Math",
                        "description": "Small sums",
                        "questions": [
                            {
                                "question": {"type": "text", "text": "1 + 1?"},
                                "correct": [{"type": "text", "text": "2"}],
                                "wrong": [{"type": "text", "text": "3"}]
                            },
                            {
                                "question": {"type": "text", "text": "2 + 2?"},
                                "correct": [{"type": "text", "text": "4"}],
                                "wrong": [{"type": "text", "text": "5"}]
                            },
                            {
                                "question": {"type": "text", "text": "broken"},
                                "correct": [],
                                "wrong": [{"type": "text", "text": "5"}]
                            }
                        ]
                    },
                    {
                        "id": "pictures",
                        "title": "Pictures",
                        "questions": [
                            {
                                "question": {"type": "image", "text": "What is this?", "media": image},
                                "correct": [{"type": "text", "text": "a png"}],
                                "wrong": [{"type": "text", "text": "a gif"}]
                            }
                        ]
                    }
                ]
            },
            {
                "id": "drafts",
                "title": "Drafts",
                "is_dev": true,
                "categories": [
                    {
                        "id": "draft",
                        "questions": [
                            {
                                "question": {"type": "text", "text": "?"},
                                "correct": [{"type": "text", "text": "yes"}],
                                "wrong": [{"type": "text", "text": "no"}]
                            }
                        ]
                    }
                ]
            }
        ]
    })
}

fn test_catalog() -> Catalog {
    let (groups, media) = parse_catalog(&catalog_json().to_string()).unwrap();
    Catalog::new(groups, media).unwrap()
}

fn test_config() -> Config {
    Config {
        accounts: Accounts::parse(&format!(
            "alice:{}:#alice,bob:{}:bob",
            hash_password("secret"),
            hash_password("hunter2")
        )),
        admin_password: Some("admin".to_string()),
        ..Default::default()
    }
}

fn setup() -> (Arc<AppState>, Router) {
    let state = Arc::new(AppState::new(test_config(), test_catalog()));
    let app = router(state.clone());
    (state, app)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn basic(username: &str, password: &str) -> String {
    let encoded =
        base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", username, password));
    format!("Basic {}", encoded)
}

async fn login(app: &Router, username: &str, password: &str) -> String {
    let request = Request::post("/login")
        .header(header::AUTHORIZATION, basic(username, password))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    body["token"].as_str().unwrap().to_string()
}

fn authed(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token));
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Position (1-based) of the answer with the given text
fn position_of(round: &Value, text: &str) -> usize {
    round["answers"]
        .as_array()
        .unwrap()
        .iter()
        .position(|a| a["text"] == text)
        .unwrap()
        + 1
}

fn correct_text(round: &Value) -> &'static str {
    match round["question"]["text"].as_str().unwrap() {
        "1 + 1?" => "2",
        "2 + 2?" => "4",
        other => panic!("unexpected question {}", other),
    }
}

/// End-to-end: two rounds, streamer answers the first one correctly
#[tokio::test]
async fn test_full_game_flow() {
    let (_state, app) = setup();
    let token = login(&app, "alice", "secret").await;

    let request = json!({"categories": {"math": 2}, "round_duration_seconds": 5});
    let (status, first) = send(&app, authed("POST", "/game", &token, Some(request))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["current_round"], 1);
    assert_eq!(first["max_round"], 2);

    // the open round never carries the correct answer
    let (status, round) = send(&app, authed("GET", "/game/round", &token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(round.get("correct").is_none());
    assert_eq!(round["answers"].as_array().unwrap().len(), 2);
    assert_eq!(round["category"]["id"], "math");

    let vote = position_of(&round, correct_text(&round));
    let (status, body) = send(
        &app,
        authed("POST", "/game/vote", &token, Some(json!({"vote": vote.to_string()}))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["vote"], vote);

    // second vote in the same round
    let (status, body) = send(
        &app,
        authed("POST", "/game/vote", &token, Some(json!({"vote": "1"}))),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "ALREADY_VOTED");

    let (status, summary) = send(&app, authed("POST", "/game/round/next", &token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["correct"], vote);
    assert_eq!(summary["streamer_vote"], vote);
    assert_eq!(summary["streamer_points"], 5);
    assert_eq!(summary["chat_vote"], 0);
    assert!(summary.get("game").is_none());

    let (status, game) = send(&app, authed("GET", "/game", &token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(game["current_round"], 2);
    assert_eq!(game["streamer_won"], 1);

    let (status, last) = send(&app, authed("POST", "/game/round/next", &token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(last["current_round"], 2);
    assert_eq!(last["game"]["streamer_points"], 5);
    assert_eq!(last["game"]["streamer_won"], 1);
    assert_eq!(last["game"]["chat_won"], 0);

    // the finished session is gone
    let (status, body) = send(&app, authed("POST", "/game/round/next", &token, None)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "NO_GAME");

    // and a new one can start
    let request = json!({"categories": {"math": 1}, "round_duration": 5});
    let (status, _) = send(&app, authed("POST", "/game", &token, Some(request))).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_start_game_validation() {
    let (_state, app) = setup();
    let token = login(&app, "alice", "secret").await;

    let cases = [
        (json!({"categories": {"math": 2}, "round_duration": 0}), "INVALID_DURATION"),
        (json!({"categories": {"math": 2}, "round_duration": -3}), "INVALID_DURATION"),
        (json!({"categories": {"nope": 2}, "round_duration": 5}), "UNKNOWN_CATEGORY"),
        (json!({"groups": {"nope": {"random": 2}}, "round_duration": 5}), "UNKNOWN_GROUP"),
        (json!({"categories": {"math": 0}, "round_duration": 5}), "INSUFFICIENT_QUESTIONS"),
    ];

    for (request, code) in cases {
        let (status, body) = send(&app, authed("POST", "/game", &token, Some(request))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], code);
    }

    // nothing was started by the failed requests
    let (status, body) = send(&app, authed("GET", "/game/round", &token, None)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "NO_GAME");

    let request = json!({"categories": {"math": 2}, "round_duration": 5});
    let (status, _) = send(&app, authed("POST", "/game", &token, Some(request.clone()))).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = send(&app, authed("POST", "/game", &token, Some(request))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "GAME_IN_PROGRESS");

    let (status, body) = send(
        &app,
        authed("POST", "/game/vote", &token, Some(json!({"vote": "e"}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_VOTE");
}

#[tokio::test]
async fn test_end_game_returns_summary_once() {
    let (_state, app) = setup();
    let token = login(&app, "alice", "secret").await;

    let request = json!({"groups": {"basics": {"random": 3}}, "round_duration": 30});
    let (status, round) = send(&app, authed("POST", "/game", &token, Some(request))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(round["max_round"], 3);
    assert_eq!(round["group"]["id"], "basics");

    let (status, summary) = send(&app, authed("DELETE", "/game", &token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["streamer_points"], 0);

    let (status, _) = send(&app, authed("DELETE", "/game", &token, None)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_authentication() {
    let (state, app) = setup();

    let request = Request::post("/login")
        .header(header::AUTHORIZATION, basic("alice", "wrong"))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, authed("GET", "/game/round", "bogus", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::get("/game/round").body(Body::empty()).unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = login(&app, "alice", "secret").await;

    // a live connection is never replaced
    let request = Request::post("/login")
        .header(header::AUTHORIZATION, basic("alice", "secret"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "CONFLICT");

    // other accounts are independent
    login(&app, "bob", "hunter2").await;
    assert_eq!(state.registry.len().await, 2);

    let (status, _) = send(&app, authed("POST", "/logout", &token, None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, authed("GET", "/game", &token, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    login(&app, "alice", "secret").await;
}

#[tokio::test]
async fn test_chat_bridge_votes() {
    let (state, app) = setup();
    let token = login(&app, "alice", "secret").await;
    let conn = state.registry.lookup("alice").await.unwrap();
    let mut notifications = conn.subscribe().await.unwrap();

    let request = json!({"categories": {"math": 2}, "round_duration": 30});
    let (_, round) = send(&app, authed("POST", "/game", &token, Some(request))).await;
    let right = position_of(&round, correct_text(&round));
    let wrong = 3 - right;

    let chat = |username: &str, text: String| {
        json!({"channel": "#Alice", "username": username, "text": text})
    };

    // no admin password
    let request = Request::post("/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(chat("viewer1", "1".into()).to_string()))
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let votes = [
        ("viewer1", right.to_string()),
        ("viewer2", wrong.to_string()),
        ("viewer3", wrong.to_string()),
        ("viewer2", right.to_string()),
        ("viewer4", "hello".to_string()),
    ];
    for (username, text) in votes {
        let request = Request::post("/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .header(ADMIN_PASSWORD_HEADER, "admin")
            .body(Body::from(chat(username, text).to_string()))
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["delivered"], true);
    }

    // three accepted votes, in order
    let mut last_counts = [0u32; 4];
    for _ in 0..3 {
        match notifications.recv().await.unwrap() {
            ServerMessage::ChatVote {
                chat_vote_count, ..
            } => last_counts = chat_vote_count,
            other => panic!("unexpected notification {:?}", other),
        }
    }
    assert_eq!(last_counts[right - 1], 1);
    assert_eq!(last_counts[wrong - 1], 2);

    // chat picked the wrong answer by majority
    let (status, summary) = send(&app, authed("POST", "/game/round/next", &token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["chat_vote"], wrong);
    assert_eq!(summary["chat_points"], 0);

    match notifications.recv().await.unwrap() {
        ServerMessage::RoundEnd(outcome) => assert_eq!(outcome.summary.chat_vote, wrong),
        other => panic!("unexpected notification {:?}", other),
    }
}

#[tokio::test]
async fn test_categories_and_media() {
    let (_state, app) = setup();

    let request = Request::get("/categories").body(Body::empty()).unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    let groups = body.as_array().unwrap();
    // development group hidden
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["id"], "basics");
    // the broken question never made it into the pool
    assert_eq!(groups[0]["categories"][0]["count"], 2);
    assert_eq!(groups[0]["categories"][0]["description"], "Small sums");
    assert!(groups[0]["categories"][0].get("pool").is_none());

    let media_id = hex::encode(Sha256::digest(PNG));
    let request = Request::get(format!("/media/{}", media_id))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], PNG);

    let request = Request::get("/media/unknown").body(Body::empty()).unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NOT_FOUND");
}

#[tokio::test]
async fn test_catalog_reload() {
    let dir = tempfile::tempdir().unwrap();
    let catalog_path = dir.path().join("catalog.json");
    let export_dir = dir.path().join("sheets");
    std::fs::write(&catalog_path, catalog_json().to_string()).unwrap();

    let config = Config {
        catalog_path: catalog_path.clone(),
        export_dir: Some(export_dir.clone()),
        ..test_config()
    };
    let state = Arc::new(AppState::new(config, Catalog::default()));
    let app = router(state.clone());

    let reload = |password: &str| {
        Request::put("/categories")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({"password": password}).to_string()))
            .unwrap()
    };

    let (status, _) = send(&app, reload("wrong")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, reload("admin")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["categories"], 3);
    assert_eq!(body["questions"], 4);
    assert_eq!(body["exported"], 3);
    assert!(export_dir.join("math.json").exists());
    assert!(export_dir.join("draft.json").exists());

    // a game started now keeps its questions through a failed reload
    let token = login(&app, "alice", "secret").await;
    let request = json!({"categories": {"math": 2}, "round_duration": 30});
    let (status, _) = send(&app, authed("POST", "/game", &token, Some(request))).await;
    assert_eq!(status, StatusCode::CREATED);

    std::fs::write(&catalog_path, "{ not json").unwrap();
    let (status, body) = send(&app, reload("admin")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "CATALOG_ERROR");

    std::fs::write(&catalog_path, json!({"groups": []}).to_string()).unwrap();
    let (status, body) = send(&app, reload("admin")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "EMPTY_CATALOG");

    assert_eq!(state.categories().await.len(), 1);
    let (status, _) = send(&app, authed("POST", "/game/round/next", &token, None)).await;
    assert_eq!(status, StatusCode::OK);
}
