// HTTP adapter.
// Serves the dashboard report and a status page over axum.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{Method, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::signal::{self, ctrl_c};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::context::Context;
use crate::error::{PulseError, Result};
use crate::model::{ProgressReport, Window};

/// Body of `POST /api/repo-progress`. Both dates or neither.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRequest {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl ProgressRequest {
    /// The requested window, or the trailing `default_days` when no dates are given.
    pub fn window(&self, default_days: u32) -> Result<Window> {
        match (self.start_date.as_deref(), self.end_date.as_deref()) {
            (None, None) => Ok(Window::trailing(default_days)),
            (Some(start), Some(end)) => {
                let since = parse_date("startDate", start)?;
                let until = parse_date("endDate", end)?;
                if since >= until {
                    return Err(PulseError::InvalidRequest(
                        "startDate must be before endDate".to_string(),
                    ));
                }
                Ok(Window::range(since, until))
            }
            _ => Err(PulseError::InvalidRequest(
                "startDate and endDate must be given together".to_string(),
            )),
        }
    }
}

/// RFC 3339 timestamp, or a bare `YYYY-MM-DD` taken as midnight UTC.
fn parse_date(field: &str, raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Ok(timestamp.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .ok_or_else(|| {
            PulseError::InvalidRequest(format!(
                "{} must be an RFC 3339 timestamp or YYYY-MM-DD, got {:?}",
                field, raw
            ))
        })
}

impl IntoResponse for PulseError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            PulseError::NoData => (StatusCode::NOT_FOUND, self.to_string()),
            PulseError::InvalidRequest(reason) => (StatusCode::BAD_REQUEST, reason.clone()),
            PulseError::UpstreamTimeout => (StatusCode::GATEWAY_TIMEOUT, self.to_string()),
            _ => {
                error!("Error fetching repository data: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to fetch repository data".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

async fn repo_progress(
    State(ctx): State<Arc<Context>>,
    body: Bytes,
) -> Result<Json<ProgressReport>> {
    let request: ProgressRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ProgressRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| PulseError::InvalidRequest(format!("malformed body: {}", e)))?
    };

    let window = request.window(ctx.config.report_window_days)?;
    info!("Progress report requested for {}", window.key_part());

    let report = ctx
        .with_timeout(ctx.aggregator.progress_report(&ctx.repos, &window))
        .await?;
    Ok(Json(report))
}

async fn status(State(ctx): State<Arc<Context>>) -> Json<Value> {
    Json(json!({
        "status": "Active",
        "message": "repopulse is up and running",
        "timestamp": Utc::now().to_rfc3339(),
        "trackedRepositories": ctx.repos.len(),
    }))
}

pub fn router(ctx: Arc<Context>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/", get(status))
        .route("/api/repo-progress", post(repo_progress))
        .layer(cors)
        .with_state(ctx)
}

/// Bind the configured port and serve until Ctrl+C or SIGTERM.
pub async fn serve(ctx: Arc<Context>) -> Result<()> {
    let address = format!("0.0.0.0:{}", ctx.config.port);
    info!("Binding to {}", address);

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {}", address);

    axum::serve(listener, router(ctx))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::{context, tracked};
    use crate::github::fake::{FakeGitHub, FakeRepo, commit_at};
    use chrono::TimeZone;

    #[test]
    fn test_window_from_request() {
        let none = ProgressRequest::default();
        assert_eq!(none.window(30).unwrap(), Window::trailing(30));

        let dates = ProgressRequest {
            start_date: Some("2024-01-01".to_string()),
            end_date: Some("2024-02-01T12:00:00+05:30".to_string()),
        };
        assert_eq!(
            dates.window(30).unwrap(),
            Window::range(
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 2, 1, 6, 30, 0).unwrap()
            )
        );
    }

    #[test]
    fn test_bad_windows_rejected() {
        let cases = [
            (Some("2024-01-01"), None),
            (None, Some("2024-01-01")),
            (Some("yesterday"), Some("2024-01-01")),
            (Some("2024-02-01"), Some("2024-01-01")),
        ];

        for (start, end) in cases {
            let request = ProgressRequest {
                start_date: start.map(str::to_string),
                end_date: end.map(str::to_string),
            };
            assert!(
                matches!(request.window(30), Err(PulseError::InvalidRequest(_))),
                "{:?} should be rejected",
                request
            );
        }
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            PulseError::NoData.into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            PulseError::InvalidRequest("x".to_string())
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            PulseError::UpstreamTimeout.into_response().status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            PulseError::Unauthorized.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    async fn spawn_server(fake: FakeGitHub, repos: Vec<crate::model::TrackedRepository>) -> String {
        let app = router(Arc::new(context(fake, repos)));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", address)
    }

    fn fake() -> FakeGitHub {
        FakeGitHub::new()
            .with_repo(
                "acme",
                "api",
                FakeRepo::new().stars(4).branch(
                    "main",
                    vec![commit_at("1", Some("alice"), Utc::now() - chrono::Duration::days(2))],
                ),
            )
            .with_repo("acme", "gone", FakeRepo::new().missing())
    }

    #[tokio::test]
    async fn test_repo_progress_default_window() {
        let base = spawn_server(fake(), vec![tracked("acme", "api"), tracked("acme", "gone")]).await;

        let response = reqwest::Client::new()
            .post(format!("{}/api/repo-progress", base))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let body: Value = response.json().await.unwrap();
        let repositories = body["repositories"].as_array().unwrap();
        assert_eq!(repositories.len(), 1);
        assert_eq!(repositories[0]["name"], "api");
        assert_eq!(repositories[0]["stars"], 4);
        assert_eq!(repositories[0]["commits"], 1);
        assert_eq!(repositories[0]["branches"][0]["branch"], "main");
        assert!(body["metadata"]["lastUpdated"].is_string());
    }

    #[tokio::test]
    async fn test_repo_progress_errors() {
        let base = spawn_server(fake(), vec![tracked("acme", "gone")]).await;
        let client = reqwest::Client::new();
        let url = format!("{}/api/repo-progress", base);

        let response = client
            .post(&url)
            .json(&json!({ "startDate": "2024-01-01" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);

        let response = client.post(&url).json(&json!({})).send().await.unwrap();
        assert_eq!(response.status(), 404);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, json!({ "error": "No repository data found" }));
    }

    #[tokio::test]
    async fn test_status_page() {
        let base = spawn_server(fake(), vec![tracked("acme", "api")]).await;

        let body: Value = reqwest::get(format!("{}/", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "Active");
        assert_eq!(body["trackedRepositories"], 1);
    }
}
