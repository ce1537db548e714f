//! End-to-end requests through the HTTP router over a temporary sled database

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, StatusCode};
use progress_engine::Curriculum;
use progress_server::{HttpServer, Services};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct TestServer {
    _dir: TempDir,
    server: HttpServer,
}

impl TestServer {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path().join("progress.sled")).unwrap();
        let services =
            Services::new(&db, Curriculum::default(), Duration::from_secs(5)).unwrap();
        let server = HttpServer::new(Arc::new(services), "127.0.0.1:0".parse().unwrap());
        Self { _dir: dir, server }
    }

    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let body = body
            .map(|b| Bytes::from(b.to_string()))
            .unwrap_or_default();
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Full::new(body))
            .unwrap();

        let response = self.server.handle_request(req).await;
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn create_student(&self, username: &str) {
        let (status, _) = self
            .send(
                Method::POST,
                "/api/users",
                Some(json!({
                    "Username": username,
                    "Password": "pass1234",
                    "Role": "Student",
                    "Section": "Sampaguita"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }
}

#[tokio::test]
async fn test_account_lifecycle() {
    let server = TestServer::new();
    server.create_student("Lea").await;

    let (status, body) = server.send(Method::GET, "/api/users/LEA", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["Username"], "lea");
    assert!(body["user"].get("Password").is_none());

    let (status, body) = server
        .send(
            Method::POST,
            "/api/login",
            Some(json!({"Username": "lea", "Password": "pass1234"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Login successful");

    let (status, body) = server
        .send(
            Method::POST,
            "/api/login",
            Some(json!({"Username": "lea", "Password": "wrong"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["retryable"], false);

    let (status, _) = server
        .send(
            Method::POST,
            "/api/users",
            Some(json!({"Username": "LEA", "Password": "x", "Role": "Teacher"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_student_without_section_is_rejected() {
    let server = TestServer::new();
    let (status, body) = server
        .send(
            Method::POST,
            "/api/users",
            Some(json!({"Username": "kid", "Password": "x", "Role": "Student"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Section is required for Students.");
}

#[tokio::test]
async fn test_progress_flow() {
    let server = TestServer::new();
    server.create_student("lea").await;

    // Default document, never saved
    let (status, body) = server.send(Method::GET, "/api/progress/lea", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("revision").is_none());
    assert_eq!(body["tutorial"]["status"], "NotStarted");
    assert_eq!(body["units"]["Unit1"]["lessons"]["Lesson1"]["status"], "Available");

    let (status, body) = server
        .send(
            Method::POST,
            "/api/progress",
            Some(json!({
                "Username": "Lea",
                "tutorial": {"completedNpcs": ["Janica", "Mark", "Annie", "Rojan"]}
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["revision"], 1);
    assert_eq!(body["tutorial"]["status"], "Completed");

    let (status, body) = server
        .send(
            Method::POST,
            "/api/progress/lea/units/Unit1/lessons/Lesson1/checkpoints/Mang%20Juan",
            Some(json!({"status": "Completed", "score": 4, "totalQuestions": 5})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Mang Juan");
    assert_eq!(body["scoreDisplay"], "4/5");

    let (status, body) = server
        .send(
            Method::GET,
            "/api/progress/lea/checkpoints?unit=Unit1&lesson=Lesson1",
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["completed"], json!(["Mang Juan"]));

    let (status, body) = server
        .send(Method::GET, "/api/progress/lea/checkpoints", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["completed"].as_array().unwrap().len(), 4);

    let (status, body) = server
        .send(Method::DELETE, "/api/progress/lea/units/Unit1/lessons/Lesson1", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["units"]["Unit1"]["lessons"]["Lesson1"]["checkpoints"],
        json!({})
    );

    let (status, body) = server.send(Method::DELETE, "/api/progress/lea/tutorial", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tutorial"]["status"], "NotStarted");

    let (status, body) = server.send(Method::DELETE, "/api/progress/lea", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["revision"], 5);
}

#[tokio::test]
async fn test_post_test_opens_next_unit() {
    let server = TestServer::new();
    server.create_student("lea").await;

    let (status, body) = server
        .send(
            Method::POST,
            "/api/progress/lea/units/Unit1/post-test",
            Some(json!({"score": 8, "totalQuestions": 10, "passed": true})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["scoreDisplay"], "8/10");
    assert_eq!(body["unitStatus"], "Completed");
    assert_eq!(body["unlockedUnit"], "Unit2");
}

#[tokio::test]
async fn test_progress_errors() {
    let server = TestServer::new();
    server.create_student("lea").await;

    let (status, _) = server.send(Method::GET, "/api/progress/nobody", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = server
        .send(
            Method::POST,
            "/api/progress/lea/units/Chapter1/post-test",
            Some(json!({"score": 1, "totalQuestions": 2})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["retryable"], false);

    let (status, _) = server
        .send(
            Method::POST,
            "/api/progress/lea/units/Unit9/post-test",
            Some(json!({"score": 1, "totalQuestions": 2})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = server
        .send(Method::POST, "/api/progress", Some(json!({"units": {}})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = server.send(Method::PUT, "/api/progress/lea", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let (status, _) = server.send(Method::GET, "/api/nothing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_classrooms() {
    let server = TestServer::new();

    let (status, body) = server
        .send(
            Method::POST,
            "/api/classrooms",
            Some(json!({"name": "Grade 7", "code": "G7-A", "teacherUsername": "MsCruz"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["classroom"]["teacherUsername"], "mscruz");

    let (status, _) = server
        .send(
            Method::POST,
            "/api/classrooms",
            Some(json!({"name": "Again", "code": "G7-A", "teacherUsername": "mscruz"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = server
        .send(Method::GET, "/api/classrooms?teacherUsername=mscruz", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["classrooms"].as_array().unwrap().len(), 1);

    let (status, _) = server.send(Method::GET, "/api/classrooms", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = server.send(Method::DELETE, "/api/classrooms/G7-A", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Classroom deleted successfully");
}

#[tokio::test]
async fn test_preflight_and_cors() {
    let server = TestServer::new();
    let req = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/progress")
        .body(Full::new(Bytes::new()))
        .unwrap();
    let response = server.server.handle_request(req).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");

    let (status, body) = server.send(Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
