//! Session-managed scraping relay for a CAPTCHA-gated university ERP portal.
//!
//! The upstream portal has no API: login is cookie-stateful, CSRF-guarded,
//! and CAPTCHA-gated, and the two reports it serves (class timetable,
//! attendance record) only exist as rendered HTML tables. This crate drives
//! that flow end to end: [`Relay::begin_challenge`] parks a half-authenticated
//! upstream session under an opaque single-use handle, and
//! [`Relay::login_and_fetch`] later resumes it to finish login and scrape one
//! report into structured data.

pub mod error;
pub mod extract;
pub mod registry;
pub mod relay;
pub mod report;
pub mod upstream;

pub use error::{RelayError, Result};
pub use relay::{ChallengeTicket, LoginAttempt, Relay, ReportParams};
pub use report::{CourseAttendance, Report, ReportKind};
