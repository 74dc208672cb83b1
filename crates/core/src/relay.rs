//! Orchestrates the challenge → login → fetch → extract flow.
//!
//! Per-handle state machine: `CHALLENGED → {AUTHENTICATED, FAILED, EXPIRED}`,
//! every terminal state consumed. There is no sessionless path: a fetch
//! always requires a handle from a prior challenge, so a login attempt can
//! never sidestep the CAPTCHA it was issued with.

use std::time::Instant;

use tracing::{info, warn};

use crate::error::Result;
use crate::extract;
use crate::registry::{SessionRecord, SessionRegistry};
use crate::report::{Report, ReportKind};
use crate::upstream::{UpstreamConfig, UpstreamSession};

/// Credentials plus the solved CAPTCHA for one login attempt.
#[derive(Debug, Clone, Copy)]
pub struct LoginAttempt<'a> {
	pub username: &'a str,
	pub password: &'a str,
	pub captcha_answer: &'a str,
}

/// Report selection parameters forwarded verbatim to the upstream.
#[derive(Debug, Clone, Copy)]
pub struct ReportParams<'a> {
	pub academic_year_code: &'a str,
	pub semester_id: &'a str,
}

/// A freshly issued CAPTCHA challenge for the client to solve.
#[derive(Debug)]
pub struct ChallengeTicket {
	/// Opaque single-use handle mapping back to the parked session.
	pub handle: String,
	/// Raw CAPTCHA image bytes.
	pub image: Vec<u8>,
}

/// The two public relay operations over one shared [`SessionRegistry`].
pub struct Relay {
	config: UpstreamConfig,
	registry: SessionRegistry,
}

impl Relay {
	/// Relay against `config` with a standard-TTL registry.
	pub fn new(config: UpstreamConfig) -> Self {
		Self { config, registry: SessionRegistry::new() }
	}

	/// Establishes a CAPTCHA challenge and parks the live session.
	pub async fn begin_challenge(&self) -> Result<ChallengeTicket> {
		self.registry.sweep(Instant::now());

		let upstream = UpstreamSession::connect(self.config.clone())?;
		let challenge = upstream.begin_challenge().await?;
		let handle = self.registry.create(SessionRecord::new(upstream, challenge.csrf_token));

		info!(target = "relay.flow", %handle, image_bytes = challenge.image.len(), "issued captcha challenge");
		Ok(ChallengeTicket { handle, image: challenge.image })
	}

	/// Resumes a parked session, completes login, and extracts one report.
	///
	/// The handle is spent the moment the record is claimed: whatever the
	/// outcome — auth failure, fetch failure, extractor failure, success —
	/// the record drops here and the caller must start a new challenge to
	/// try again.
	pub async fn login_and_fetch(
		&self,
		handle: &str,
		attempt: LoginAttempt<'_>,
		kind: ReportKind,
		params: ReportParams<'_>,
	) -> Result<Report> {
		self.registry.sweep(Instant::now());

		let record = self.registry.resume(handle)?;
		let refreshed_csrf = match record
			.upstream
			.complete_login(&record.csrf_token, attempt.username, attempt.password, attempt.captcha_answer)
			.await
		{
			Ok(refreshed) => refreshed,
			Err(err) => {
				warn!(target = "relay.flow", %handle, code = err.code(), "login attempt failed");
				return Err(err);
			}
		};

		let csrf_token = refreshed_csrf.as_deref().unwrap_or(&record.csrf_token);
		let html = record.upstream.fetch_report(kind, params.academic_year_code, params.semester_id, csrf_token).await?;
		let report = match kind {
			ReportKind::Timetable => Report::Timetable(extract::extract_grid(&html, extract::TIMETABLE.container)?),
			ReportKind::Attendance => {
				Report::Attendance(extract::extract_records(&html, extract::ATTENDANCE.container, extract::ATTENDANCE.min_cells)?)
			}
		};

		info!(target = "relay.flow", %handle, %kind, "report extracted");
		Ok(report)
	}

	/// The shared handle registry. Exposed for lifecycle introspection.
	pub fn registry(&self) -> &SessionRegistry {
		&self.registry
	}
}
