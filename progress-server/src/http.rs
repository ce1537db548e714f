//! HTTP API for accounts, classrooms and progress
//!
//! ## Accounts
//! - `POST /api/users` - Create a user
//! - `GET /api/users/{username}` - Fetch a user (no credentials)
//! - `POST /api/login` - Check credentials
//!
//! ## Classrooms
//! - `POST /api/classrooms` - Create a classroom
//! - `GET /api/classrooms?teacherUsername=` - List a teacher's classrooms
//! - `DELETE /api/classrooms/{code}` - Delete a classroom
//!
//! ## Progress
//! - `GET /api/progress/{username}` - Current document (default if none)
//! - `POST /api/progress` - Merge a partial update (`Username` in the body)
//! - `POST /api/progress/{username}/units/{unit}/lessons/{lesson}/checkpoints/{name}` - One checkpoint
//! - `POST /api/progress/{username}/units/{unit}/post-test` - Post-test result
//! - `GET /api/progress/{username}/checkpoints?unit=&lesson=` - Completed checkpoint names
//! - `DELETE /api/progress/{username}/tutorial` - Reset the tutorial
//! - `DELETE /api/progress/{username}/units/{unit}/lessons/{lesson}` - Reset one lesson
//! - `DELETE /api/progress/{username}` - Reset everything
//!
//! ## Example Usage
//!
//! ```bash
//! curl -X POST -H "Content-Type: application/json" \
//!      -d '{"Username":"student01","tutorial":{"completedNpcs":["Janica"]}}' \
//!      http://localhost:5000/api/progress
//!
//! curl -X POST -H "Content-Type: application/json" \
//!      -d '{"score":8,"totalQuestions":10,"passed":true}' \
//!      http://localhost:5000/api/progress/student01/units/Unit1/post-test
//! ```
//!
//! All origins are allowed; `OPTIONS` preflights get 204.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Incoming};
use hyper::header::{self, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use progress_engine::{CheckpointUpdate, LessonId, PostTestResult, ProgressPatch, UnitId, Username};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::borrow::Cow;
use std::convert::Infallible;
use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::error::{Result, ServerError};
use crate::services::{
    created, error_response, from_create_result, from_result, method_not_allowed, no_content,
    not_found, ok, CreateClassroomInput, CreateUserInput, LoginInput, Services,
};
use crate::views::{
    ClassroomResponse, ClassroomsResponse, MessageResponse, ProgressView, UserResponse,
};

type HttpResponse = Response<Full<Bytes>>;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ClassroomQuery {
    teacher_username: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CheckpointQuery {
    unit: Option<UnitId>,
    lesson: Option<LessonId>,
}

/// HTTP server state
pub struct HttpServer {
    services: Arc<Services>,
    bind_addr: SocketAddr,
}

impl HttpServer {
    pub fn new(services: Arc<Services>, bind_addr: SocketAddr) -> Self {
        Self {
            services,
            bind_addr,
        }
    }

    /// Run the HTTP server
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        info!(addr = %self.bind_addr, "HTTP server listening");

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let server = self.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let server = server.clone();
                    async move { Ok::<_, Infallible>(server.handle_request(req).await) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    warn!(addr = %remote_addr, error = %err, "Connection error");
                }
            });
        }
    }

    /// Route a request and attach CORS headers to whatever comes back
    pub async fn handle_request<B>(&self, req: Request<B>) -> HttpResponse
    where
        B: Body,
        B::Error: Display,
    {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        debug!(method = %method, path = %path, "Incoming request");

        let mut response = match self.route(req, &method, &path).await {
            Ok(response) => response,
            Err(e) => error_response(e),
        };
        add_cors_headers(&mut response);
        response
    }

    async fn route<B>(&self, req: Request<B>, method: &Method, path: &str) -> Result<HttpResponse>
    where
        B: Body,
        B::Error: Display,
    {
        let segments = path_segments(path)?;
        let segments: Vec<&str> = segments.iter().map(|s| &**s).collect();
        let query = req.uri().query().unwrap_or("").to_string();

        match (method, segments.as_slice()) {
            (&Method::OPTIONS, _) => Ok(no_content()),

            (&Method::GET, ["health"]) => self.handle_health(),

            // Accounts
            (&Method::POST, ["api", "users"]) => {
                let input: CreateUserInput = read_json(req).await?;
                let user = self.services.users.create(input)?;
                Ok(created(&UserResponse {
                    message: "User created successfully".into(),
                    user,
                }))
            }
            (&Method::GET, ["api", "users", username]) => {
                let user = self.services.users.get(&Username::parse(username)?)?;
                Ok(ok(&UserResponse {
                    message: "User found".into(),
                    user,
                }))
            }
            (&Method::POST, ["api", "login"]) => {
                let input: LoginInput = read_json(req).await?;
                let user = self.services.users.login(input)?;
                Ok(ok(&UserResponse {
                    message: "Login successful".into(),
                    user,
                }))
            }

            // Classrooms
            (&Method::POST, ["api", "classrooms"]) => {
                let input: CreateClassroomInput = read_json(req).await?;
                Ok(from_create_result(self.services.classrooms.create(input).map(
                    |classroom| ClassroomResponse {
                        message: "Classroom created successfully".into(),
                        classroom,
                    },
                )))
            }
            (&Method::GET, ["api", "classrooms"]) => {
                let params: ClassroomQuery = parse_query(&query)?;
                let classrooms = self
                    .services
                    .classrooms
                    .list_by_teacher(params.teacher_username.as_deref())?;
                Ok(ok(&ClassroomsResponse { classrooms }))
            }
            (&Method::DELETE, ["api", "classrooms", code]) => {
                self.services.classrooms.delete(code)?;
                Ok(ok(&MessageResponse::new("Classroom deleted successfully")))
            }

            // Progress
            (&Method::POST, ["api", "progress"]) => {
                let patch: ProgressPatch = read_json(req).await?;
                let updated = self.services.progress.apply_progress_patch(&patch).await?;
                Ok(ok(&ProgressView::from(updated)))
            }
            (&Method::GET, ["api", "progress", username]) => {
                let view = self
                    .services
                    .progress
                    .get_progress(&Username::parse(username)?)
                    .await?;
                Ok(ok(&view))
            }
            (&Method::DELETE, ["api", "progress", username]) => {
                let updated = self
                    .services
                    .progress
                    .reset_whole_progress(&Username::parse(username)?)
                    .await?;
                Ok(ok(&ProgressView::from(updated)))
            }
            (&Method::GET, ["api", "progress", username, "checkpoints"]) => {
                let params: CheckpointQuery = parse_query(&query)?;
                Ok(from_result(
                    self.services
                        .progress
                        .get_completed_checkpoints(
                            &Username::parse(username)?,
                            params.unit,
                            params.lesson,
                        )
                        .await,
                ))
            }
            (&Method::DELETE, ["api", "progress", username, "tutorial"]) => {
                let updated = self
                    .services
                    .progress
                    .reset_tutorial(&Username::parse(username)?)
                    .await?;
                Ok(ok(&ProgressView::from(updated)))
            }
            (&Method::POST, ["api", "progress", username, "units", unit, "post-test"]) => {
                let username = Username::parse(username)?;
                let unit: UnitId = unit.parse()?;
                let result: PostTestResult = read_json(req).await?;
                Ok(from_result(
                    self.services
                        .progress
                        .apply_post_test_result(&username, unit, result)
                        .await,
                ))
            }
            (
                &Method::POST,
                ["api", "progress", username, "units", unit, "lessons", lesson, "checkpoints", name],
            ) => {
                let username = Username::parse(username)?;
                let unit: UnitId = unit.parse()?;
                let lesson: LessonId = lesson.parse()?;
                let name = name.to_string();
                let update: CheckpointUpdate = read_json(req).await?;
                Ok(from_result(
                    self.services
                        .progress
                        .apply_checkpoint_update(&username, unit, lesson, &name, update)
                        .await,
                ))
            }
            (&Method::DELETE, ["api", "progress", username, "units", unit, "lessons", lesson]) => {
                let updated = self
                    .services
                    .progress
                    .reset_lesson(&Username::parse(username)?, unit.parse()?, lesson.parse()?)
                    .await?;
                Ok(ok(&ProgressView::from(updated)))
            }

            // Known resources, wrong method
            (_, ["health"])
            | (_, ["api", "users", ..])
            | (_, ["api", "login"])
            | (_, ["api", "classrooms", ..])
            | (_, ["api", "progress", ..]) => Ok(method_not_allowed()),

            _ => Ok(not_found("Not Found")),
        }
    }

    fn handle_health(&self) -> Result<HttpResponse> {
        let curriculum = self.services.progress.curriculum();
        Ok(ok(&serde_json::json!({
            "status": "ok",
            "units": curriculum.unit_count,
            "lessonsPerUnit": curriculum.lessons_per_unit,
            "eventSubscribers": self.services.events.subscriber_count(),
        })))
    }
}

/// Percent-decoded, non-empty path segments
fn path_segments(path: &str) -> Result<Vec<Cow<'_, str>>> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            urlencoding::decode(s)
                .map_err(|e| ServerError::Validation(format!("Invalid path segment '{}': {}", s, e)))
        })
        .collect()
}

fn parse_query<T: DeserializeOwned>(query: &str) -> Result<T> {
    serde_urlencoded::from_str(query)
        .map_err(|e| ServerError::Validation(format!("Invalid query string: {}", e)))
}

async fn read_json<T, B>(req: Request<B>) -> Result<T>
where
    T: DeserializeOwned,
    B: Body,
    B::Error: Display,
{
    let body = req
        .into_body()
        .collect()
        .await
        .map_err(|e| ServerError::Validation(format!("Failed to read body: {}", e)))?
        .to_bytes();
    Ok(serde_json::from_slice(&body)?)
}

fn add_cors_headers(response: &mut HttpResponse) {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET,HEAD,PUT,PATCH,POST,DELETE"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_segments_decode() {
        let segments = path_segments("/api/progress/ana/units/Unit1/lessons/Lesson1/checkpoints/Mang%20Juan").unwrap();
        assert_eq!(segments.len(), 9);
        assert_eq!(segments[8], "Mang Juan");
        assert!(path_segments("/").unwrap().is_empty());
    }

    #[test]
    fn test_checkpoint_query() {
        let q: CheckpointQuery = parse_query("unit=Unit2&lesson=PreTest").unwrap();
        assert_eq!(q.unit, Some(UnitId::new(2)));
        assert_eq!(q.lesson, Some(LessonId::PreTest));

        let empty: CheckpointQuery = parse_query("").unwrap();
        assert!(empty.unit.is_none());
        assert!(parse_query::<CheckpointQuery>("unit=Chapter9").is_err());
    }
}
