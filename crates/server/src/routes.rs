//! Mobile-facing routes and their JSON envelopes.
//!
//! `GET /challenge` issues a CAPTCHA and its single-use handle;
//! `POST /report` spends the handle to log in and scrape one report.
//! Every body carries a `success` flag; failures add a stable `code` and a
//! human-readable `message`.

use std::sync::Arc;

use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use erp_relay::relay::{LoginAttempt, Relay, ReportParams};
use erp_relay::{RelayError, Report, ReportKind};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

/// Builds the application router over a shared relay.
///
/// CORS is wide open: the mobile client ships from arbitrary dev origins.
pub fn router(relay: Arc<Relay>) -> Router {
	let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
	Router::new()
		.route("/challenge", get(challenge))
		.route("/report", post(report))
		.layer(cors)
		.with_state(relay)
}

/// Form fields accepted by `POST /report`.
#[derive(Debug, Deserialize)]
pub struct ReportForm {
	pub username: String,
	pub password: String,
	pub captcha_answer: String,
	pub handle: String,
	#[serde(default = "default_academic_year_code")]
	pub academic_year_code: String,
	#[serde(default = "default_semester_id")]
	pub semester_id: String,
	#[serde(default = "default_report_kind")]
	pub report_kind: ReportKind,
}

// Current academic year and odd semester, matching the mobile client.
fn default_academic_year_code() -> String {
	"19".to_string()
}

fn default_semester_id() -> String {
	"1".to_string()
}

fn default_report_kind() -> ReportKind {
	ReportKind::Timetable
}

#[derive(Debug, Serialize)]
struct ReportEnvelope {
	success: bool,
	#[serde(flatten)]
	report: Report,
}

async fn challenge(State(relay): State<Arc<Relay>>) -> Response {
	match relay.begin_challenge().await {
		Ok(ticket) => Json(json!({
			"success": true,
			"handle": ticket.handle,
			"image": format!("data:image/jpeg;base64,{}", STANDARD.encode(&ticket.image)),
		}))
		.into_response(),
		Err(err) => error_response(err),
	}
}

async fn report(State(relay): State<Arc<Relay>>, Form(form): Form<ReportForm>) -> Response {
	let attempt = LoginAttempt {
		username: &form.username,
		password: &form.password,
		captcha_answer: &form.captcha_answer,
	};
	let params = ReportParams {
		academic_year_code: &form.academic_year_code,
		semester_id: &form.semester_id,
	};

	match relay.login_and_fetch(&form.handle, attempt, form.report_kind, params).await {
		Ok(report) => Json(ReportEnvelope { success: true, report }).into_response(),
		Err(err) => error_response(err),
	}
}

fn error_response(err: RelayError) -> Response {
	let status = match err {
		RelayError::UpstreamUnavailable(_) | RelayError::UpstreamProtocol(_) | RelayError::CaptchaNotFound => {
			StatusCode::BAD_GATEWAY
		}
		RelayError::TableNotFound(_) | RelayError::ReportNotFound => StatusCode::NOT_FOUND,
		RelayError::SessionNotFound => StatusCode::GONE,
		RelayError::AuthFailed => StatusCode::UNAUTHORIZED,
	};
	warn!(target = "relay.http", code = err.code(), error = %err, "request failed");
	(status, Json(json!({ "success": false, "code": err.code(), "message": err.to_string() }))).into_response()
}
