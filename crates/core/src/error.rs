//! Error taxonomy shared across the relay core.
//!
//! Two failure families matter operationally: transport failures
//! ([`RelayError::UpstreamUnavailable`]) are transient and worth a fresh
//! challenge, while markup-drift failures (`UpstreamProtocol`,
//! `CaptchaNotFound`, `TableNotFound`, `ReportNotFound`) mean the upstream
//! changed shape and need a code change to fix.

use thiserror::Error;

/// Convenience result type for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

/// All failure modes surfaced by the relay core.
#[derive(Debug, Error)]
pub enum RelayError {
	/// The upstream could not be reached or timed out.
	#[error("upstream unavailable: {0}")]
	UpstreamUnavailable(#[from] reqwest::Error),

	/// The upstream markup no longer matches the expected contract.
	#[error("upstream markup changed: {0}")]
	UpstreamProtocol(String),

	/// The login probe response carried no CAPTCHA image.
	#[error("CAPTCHA image not present in upstream response")]
	CaptchaNotFound,

	/// No table in the document matched the shape's container selector.
	#[error("no table matches selector `{0}`")]
	TableNotFound(String),

	/// The report page came back without the expected table container.
	#[error("requested report not present in upstream response")]
	ReportNotFound,

	/// The handle is unknown: never issued, expired, or already consumed.
	#[error("challenge session not found; request a new CAPTCHA")]
	SessionNotFound,

	/// The upstream rejected the credentials or the CAPTCHA answer.
	#[error("invalid credentials or CAPTCHA answer")]
	AuthFailed,
}

impl RelayError {
	/// Stable machine-readable code for the HTTP layer and log fields.
	pub fn code(&self) -> &'static str {
		match self {
			Self::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
			Self::UpstreamProtocol(_) => "UPSTREAM_PROTOCOL",
			Self::CaptchaNotFound => "CAPTCHA_NOT_FOUND",
			Self::TableNotFound(_) => "TABLE_NOT_FOUND",
			Self::ReportNotFound => "REPORT_NOT_FOUND",
			Self::SessionNotFound => "SESSION_NOT_FOUND",
			Self::AuthFailed => "AUTH_FAILED",
		}
	}

	/// Whether retrying with a fresh challenge can plausibly succeed.
	///
	/// Markup-drift errors are excluded: they repeat until the scraping
	/// contract is updated.
	pub fn is_transient(&self) -> bool {
		matches!(self, Self::UpstreamUnavailable(_) | Self::AuthFailed | Self::SessionNotFound)
	}
}

impl From<url::ParseError> for RelayError {
	fn from(err: url::ParseError) -> Self {
		Self::UpstreamProtocol(format!("invalid upstream url: {err}"))
	}
}
