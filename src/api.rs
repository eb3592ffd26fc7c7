//! HTTP intake endpoint for new leads.

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::error::Error;
use crate::notify::Notifier;
use crate::store::Store;

#[derive(Clone)]
pub struct ApiState {
    pub store: Store,
    pub notifier: Notifier,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct NewLeadRequest {
    name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
}

impl NewLeadRequest {
    /// First missing or empty required field, if any.
    fn missing_field(&self) -> Option<&'static str> {
        fn empty(v: &Option<String>) -> bool {
            v.as_deref().map_or(true, str::is_empty)
        }
        if empty(&self.name) {
            Some("name")
        } else if empty(&self.email) {
            Some("email")
        } else if empty(&self.phone) {
            Some("phone")
        } else {
            None
        }
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/leads", post(create_lead))
        .with_state(state)
}

/// Bind and serve the intake API until the process exits.
pub async fn serve(state: ApiState, port: u16) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind API port {port}"))?;
    info!("Lead intake API listening on port {}", port);
    axum::serve(listener, router(state))
        .await
        .context("API server failed")?;
    Ok(())
}

fn error_response(e: &Error) -> (StatusCode, Json<Value>) {
    match e {
        Error::MissingField(_) => (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))),
        // Database details stay in the logs
        Error::Storage(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Internal server error" })),
        ),
    }
}

async fn create_lead(
    State(state): State<ApiState>,
    Json(body): Json<NewLeadRequest>,
) -> (StatusCode, Json<Value>) {
    if let Some(field) = body.missing_field() {
        return error_response(&Error::MissingField(field));
    }

    // Checked non-empty above
    let name = body.name.as_deref().unwrap_or_default();
    let email = body.email.as_deref().unwrap_or_default();
    let phone = body.phone.as_deref();

    match state.store.insert_lead(name, email, phone).await {
        Ok(lead) => {
            info!("New lead saved: {}", lead.id);

            // Fire-and-forget: the response must not wait on Telegram, and
            // delivery failures never surface here.
            let lead_id = lead.id;
            state.notifier.dispatch(lead);

            (
                StatusCode::CREATED,
                Json(json!({ "message": "Lead saved", "leadId": lead_id })),
            )
        }
        Err(e) => {
            error!("Failed to save lead: {}", e);
            error_response(&e)
        }
    }
}
