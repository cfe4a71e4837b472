// # HTTP Query Surface
//
// Thin read-only HTTP layer over the monitor's stores. This is a pure
// integration layer: every handler reads a store or the shared tracker and
// formats the result — no business logic, no probes, no scheduling.
//
// ## Endpoints
//
// - `GET /logs-raw`             raw event log text
// - `GET /logs`                 event log rendered as HTML with severity classes
// - `GET /errors`               error log rendered as HTML
// - `GET /ips`                  raw allow-list JSON document
// - `GET /add-<service>-ip?<ip>` register an IP fragment, replies "success"
// - `GET /<service>-connected`  literal "true"/"false"
// - anything else               404 "Not found"

use axum::Router;
use axum::extract::{RawQuery, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use linkwatch_core::classify::{AllowListStore, ServiceKind};
use linkwatch_core::config::SeverityThresholds;
use linkwatch_core::logstore::LogStore;
use linkwatch_core::render::render_html;
use linkwatch_core::tracker::{Signal, StatusTracker};

/// Shared state behind the query surface
#[derive(Clone)]
pub struct QueryState {
    /// Main event log
    pub log: LogStore,

    /// Error log
    pub errors: LogStore,

    /// Service allow-list document
    pub allow_list: AllowListStore,

    /// Debounce state shared with the engine
    pub tracker: Arc<Mutex<StatusTracker>>,

    /// Severity cutoffs for rendered views
    pub thresholds: SeverityThresholds,
}

/// Build the query router over the given state
pub fn router(state: QueryState) -> Router {
    Router::new()
        .route("/logs-raw", get(logs_raw))
        .route("/logs", get(logs_html))
        .route("/errors", get(errors_html))
        .route("/ips", get(ips_raw))
        .route("/add-fibre-ip", get(add_fibre_ip))
        .route("/add-cable-ip", get(add_cable_ip))
        .route("/add-cellular-ip", get(add_cellular_ip))
        .route("/fibre-connected", get(fibre_connected))
        .route("/cable-connected", get(cable_connected))
        .route("/cellular-connected", get(cellular_connected))
        .fallback(not_found)
        .with_state(state)
}

async fn logs_raw(State(state): State<QueryState>) -> Response {
    match state.log.read_all().await {
        Ok(content) => content.into_response(),
        Err(e) => internal_error(e),
    }
}

async fn logs_html(State(state): State<QueryState>) -> Response {
    render_store(&state.log, &state.thresholds).await
}

async fn errors_html(State(state): State<QueryState>) -> Response {
    render_store(&state.errors, &state.thresholds).await
}

async fn render_store(store: &LogStore, thresholds: &SeverityThresholds) -> Response {
    match store.read_all().await {
        Ok(content) => {
            let lines: Vec<String> = content
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(str::to_string)
                .collect();
            Html(render_html(&lines, thresholds)).into_response()
        }
        Err(e) => internal_error(e),
    }
}

async fn ips_raw(State(state): State<QueryState>) -> Response {
    match state.allow_list.raw_json().await {
        Ok(json) => ([("content-type", "application/json")], json).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn add_fibre_ip(state: State<QueryState>, query: RawQuery) -> Response {
    register_ip(state, ServiceKind::Fibre, query).await
}

async fn add_cable_ip(state: State<QueryState>, query: RawQuery) -> Response {
    register_ip(state, ServiceKind::Cable, query).await
}

async fn add_cellular_ip(state: State<QueryState>, query: RawQuery) -> Response {
    register_ip(state, ServiceKind::Cellular, query).await
}

/// The fragment arrives as the raw query string: `/add-fibre-ip?81.223.`
async fn register_ip(
    State(state): State<QueryState>,
    kind: ServiceKind,
    RawQuery(query): RawQuery,
) -> Response {
    let Some(fragment) = query.filter(|q| !q.trim().is_empty()) else {
        return (StatusCode::BAD_REQUEST, "missing IP fragment").into_response();
    };

    match state.allow_list.register_ip(kind, &fragment).await {
        Ok(()) => {
            info!(service = kind.id(), fragment = %fragment, "registered IP fragment");
            "success".into_response()
        }
        Err(e) => internal_error(e),
    }
}

async fn fibre_connected(state: State<QueryState>) -> Response {
    service_connected(state, ServiceKind::Fibre).await
}

async fn cable_connected(state: State<QueryState>) -> Response {
    service_connected(state, ServiceKind::Cable).await
}

async fn cellular_connected(state: State<QueryState>) -> Response {
    service_connected(state, ServiceKind::Cellular).await
}

/// Literal "true"/"false": is this service the active one right now?
async fn service_connected(State(state): State<QueryState>, kind: ServiceKind) -> Response {
    let tracker = state.tracker.lock().await;
    let marker = format!("{} CONNECTED", kind.label());
    let connected = tracker
        .last_value(Signal::ConnectionService)
        .is_some_and(|value| value.contains(&marker));
    connected.to_string().into_response()
}

/// Serve the router on an already-bound listener
pub async fn serve(listener: tokio::net::TcpListener, router: Router) -> std::io::Result<()> {
    axum::serve(listener, router).await
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not found").into_response()
}

fn internal_error(e: linkwatch_core::Error) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::Duration;
    use http_body_util::BodyExt;
    use tempfile::tempdir;
    use tower::ServiceExt;

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn state(dir: &std::path::Path) -> QueryState {
        QueryState {
            log: LogStore::new(dir.join("log.txt")),
            errors: LogStore::new(dir.join("errors.txt")),
            allow_list: AllowListStore::new(dir.join("ips.json")),
            tracker: Arc::new(Mutex::new(StatusTracker::new(Duration::hours(4)))),
            thresholds: SeverityThresholds::default(),
        }
    }

    #[tokio::test]
    async fn logs_raw_round_trip() {
        let dir = tempdir().unwrap();
        let state = state(dir.path());
        state.log.append("NETWORK UP").await.unwrap();

        let app = router(state);
        let response = app
            .oneshot(Request::get("/logs-raw").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("NETWORK UP"));
    }

    #[tokio::test]
    async fn logs_render_with_severity_classes() {
        let dir = tempdir().unwrap();
        let state = state(dir.path());
        state.log.append("NETWORK DOWN").await.unwrap();

        let app = router(state);
        let response = app
            .oneshot(Request::get("/logs").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("class=\"error\""));
    }

    #[tokio::test]
    async fn registration_replies_success_and_persists() {
        let dir = tempdir().unwrap();
        let state = state(dir.path());
        let allow_list = state.allow_list.clone();

        let app = router(state);
        let response = app
            .oneshot(
                Request::get("/add-fibre-ip?81.223.")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "success");

        let doc = allow_list.load().await.unwrap();
        assert_eq!(doc.fragments(ServiceKind::Fibre), ["81.223.".to_string()]);
    }

    #[tokio::test]
    async fn connected_reflects_tracker_state() {
        let dir = tempdir().unwrap();
        let state = state(dir.path());

        {
            let mut tracker = state.tracker.lock().await;
            tracker.commit(
                Signal::ConnectionService,
                "FIBRE CONNECTED / CABLE STANDBY / CELLULAR STANDBY",
                chrono::Utc::now(),
            );
        }

        let app = router(state);
        let response = app
            .clone()
            .oneshot(Request::get("/fibre-connected").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_text(response).await, "true");

        let response = app
            .oneshot(
                Request::get("/cellular-connected")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_text(response).await, "false");
    }

    #[tokio::test]
    async fn unknown_path_is_404() {
        let dir = tempdir().unwrap();
        let app = router(state(dir.path()));

        let response = app
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(response).await, "Not found");
    }
}
