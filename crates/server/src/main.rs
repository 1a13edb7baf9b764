use std::{net::SocketAddr, sync::Arc, time::Instant};

use axum::{
    body::{Bytes, HttpBody},
    extract::{rejection::FormRejection, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    BoxError, Form, Json, Router,
};
use chrono::Utc;
use gateway::HttpBackendGateway;
use menu::{MenuSettings, MenuStateMachine};
use shared::{
    domain::UssdSession,
    protocol::{latest_input, UssdReply, UssdRequest},
};
use storage::Storage;
use tokio::time::{self, MissedTickBehavior};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;
mod session_gate;

use app_state::AppState;
use config::{load_settings, prepare_database_url};
use session_gate::SessionGate;

const SERVICE_NAME: &str = "USSD Voting Gateway";
const MAX_FORM_BYTES: usize = 16 * 1024;
const INVALID_REQUEST: &str = "Invalid Request";
const SERVICE_UNAVAILABLE: &str = "Service temporarily unavailable. Please try again.";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let backend = HttpBackendGateway::new(&settings.backend_url, Some(settings.backend_timeout()))?;
    info!(backend_url = %backend.base_url(), short_code = %settings.short_code, "backend gateway configured");
    let menu = MenuStateMachine::new(
        Arc::new(backend),
        MenuSettings {
            short_code: settings.short_code.clone(),
        },
    );

    spawn_session_purge(storage.clone(), settings.purge_interval());

    let state = AppState {
        menu,
        sessions: Arc::new(storage),
        session_ttl: settings.session_ttl(),
        request_timeout: settings.request_timeout(),
        gate: SessionGate::default(),
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(service_info))
        .route("/healthz", get(healthz))
        .route("/ussd", post(ussd))
        .layer(RequestBodyLimitLayer::new(MAX_FORM_BYTES))
        .layer(middleware::map_response(oversized_in_band))
        .with_state(state)
}

/// Turns the body limit's `413` into an in-band `200 END Invalid Request`.
async fn oversized_in_band<B>(response: Response<B>) -> Response
where
    B: HttpBody<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    if response.status() == StatusCode::PAYLOAD_TOO_LARGE {
        warn!(limit = MAX_FORM_BYTES, "oversized request body refused");
        return UssdReply::end(INVALID_REQUEST).to_string().into_response();
    }
    response.into_response()
}

fn spawn_session_purge(storage: Storage, every: std::time::Duration) {
    tokio::spawn(async move {
        let mut ticker = time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match storage.purge_expired().await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "purged expired sessions"),
                Err(error) => warn!(%error, "expired session purge failed"),
            }
        }
    });
}

async fn healthz(State(state): State<Arc<AppState>>) -> (StatusCode, &'static str) {
    match state.sessions.health_check().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(error) => {
            warn!(%error, "session store health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    }
}

async fn service_info() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": SERVICE_NAME,
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Carrier webhook. Every outcome is a `200 text/plain` body starting with
/// `CON` or `END`.
async fn ussd(
    State(state): State<Arc<AppState>>,
    form: Result<Form<UssdRequest>, FormRejection>,
) -> String {
    let started = Instant::now();
    let request = match form {
        Ok(Form(request)) => request,
        Err(rejection) => {
            warn!(%rejection, "unreadable ussd request");
            UssdRequest::default()
        }
    };

    let session_id = non_blank(request.session_id.as_deref());
    let phone_number = non_blank(request.phone_number.as_deref());
    let (Some(session_id), Some(phone_number)) = (session_id, phone_number) else {
        warn!(?request, "ussd request without session id or phone number");
        return UssdReply::end(INVALID_REQUEST).to_string();
    };
    let text = request.text.as_deref().unwrap_or_default();
    info!(
        %session_id,
        %phone_number,
        %text,
        service_code = ?request.service_code,
        "ussd request"
    );

    let reply = match time::timeout(
        state.request_timeout,
        converse(&state, session_id, phone_number, text),
    )
    .await
    {
        Ok(reply) => reply,
        Err(_) => {
            error!(%session_id, timeout = ?state.request_timeout, "ussd request timed out");
            UssdReply::end(SERVICE_UNAVAILABLE)
        }
    };

    let response = reply.to_string();
    info!(
        %session_id,
        elapsed_ms = started.elapsed().as_millis() as u64,
        response = %response.escape_debug(),
        "ussd response"
    );
    response
}

/// One serialised read-modify-write of the stored session.
async fn converse(state: &AppState, session_id: &str, phone_number: &str, text: &str) -> UssdReply {
    let _pass = state.gate.acquire(session_id).await;

    let mut session = match state.sessions.get(session_id).await {
        Ok(Some(session)) => session,
        Ok(None) => UssdSession::new(session_id, phone_number),
        Err(error) => {
            warn!(%session_id, %error, "session lookup failed; starting over");
            UssdSession::new(session_id, phone_number)
        }
    };
    session.phone_number = phone_number.to_string();

    let reply = state.menu.handle(&mut session, latest_input(text)).await;

    if reply.is_terminal() {
        if let Err(error) = state.sessions.delete(session_id).await {
            warn!(%session_id, %error, "failed to drop finished session");
        }
    } else if let Err(error) = state.sessions.put(&mut session, state.session_ttl).await {
        error!(%session_id, %error, "failed to persist session");
    }
    reply
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
