//! Provider webhook: inbound WhatsApp messages and health check.

use std::sync::Arc;

use axum::{
    Form, Json, Router,
    extract::{State, rejection::FormRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::conversation::{ConversationEngine, Outbound, plan_turn};
use crate::dispatch::Dispatcher;
use crate::error::DatabaseError;
use crate::localization::Language;
use crate::session::SessionStore;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionStore>,
    pub engine: Arc<ConversationEngine>,
    pub dispatcher: Arc<Dispatcher>,
}

/// Form body posted by the provider. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
pub struct WebhookForm {
    #[serde(rename = "From", default)]
    pub from: String,
    #[serde(rename = "Body", default)]
    pub body: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/whatsapp/webhook", get(verify).post(receive))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Strip a channel prefix such as `whatsapp:`.
pub fn bare_identity(from: &str) -> &str {
    let from = from.trim();
    from.split_once(':').map(|(_, id)| id).unwrap_or(from).trim()
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ── Webhook ─────────────────────────────────────────────────────────────

async fn verify() -> &'static str {
    "Webhook verified!"
}

async fn receive(
    State(state): State<AppState>,
    form: Result<Form<WebhookForm>, FormRejection>,
) -> impl IntoResponse {
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            warn!(error = %rejection, "Malformed webhook payload ignored");
            return (StatusCode::OK, "OK");
        }
    };

    let identity = bare_identity(&form.from);
    if identity.is_empty() {
        debug!("Webhook without sender identity ignored");
        return (StatusCode::OK, "OK");
    }

    let _turn = state.sessions.lock(identity).await;
    match handle_turn(&state, identity, &form.body).await {
        Ok(()) => (StatusCode::OK, "OK"),
        Err(e) => {
            error!(identity, error = %e, "Turn failed");
            recover(&state, identity).await;
            (StatusCode::INTERNAL_SERVER_ERROR, "Error")
        }
    }
}

/// One inbound message. The caller holds the identity's turn lock.
async fn handle_turn(state: &AppState, identity: &str, body: &str) -> Result<(), DatabaseError> {
    if state.engine.cancels_pending_on_inbound() {
        state.dispatcher.cancel_pending(identity).await;
    }

    let mut session = state.sessions.get_or_create(identity).await?;
    let plan = plan_turn(&session, body);
    plan.apply(&mut session);
    state.sessions.save(&session).await?;
    info!(
        identity,
        from = %plan.previous,
        to = %plan.next,
        action = ?plan.action,
        "Conversation step"
    );

    if let Some(ack) = state.engine.acknowledgment(&plan).await {
        state.dispatcher.send(identity, &ack).await;
    }
    let messages = state.engine.execute(&plan, body).await;
    dispatch(&state.dispatcher, identity, messages).await;
    Ok(())
}

async fn dispatch(dispatcher: &Dispatcher, identity: &str, messages: Vec<Outbound>) {
    for message in messages {
        match message.delay {
            Some(delay) => dispatcher.send_after(identity, &message.text, delay).await,
            None => {
                dispatcher.send(identity, &message.text).await;
            }
        }
    }
}

/// Best-effort reset to the main menu plus an apology in the sender's
/// stored language.
async fn recover(state: &AppState, identity: &str) {
    let language = match state.sessions.get_or_create(identity).await {
        Ok(mut session) => {
            session.reset();
            if let Err(e) = state.sessions.save(&session).await {
                warn!(identity, error = %e, "Session reset after failure also failed");
            }
            session.language
        }
        Err(e) => {
            warn!(identity, error = %e, "Session reload after failure also failed");
            Language::default()
        }
    };
    let messages = state.engine.failure_messages(language).await;
    dispatch(&state.dispatcher, identity, messages).await;
}
