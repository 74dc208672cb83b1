//! Single-use, time-bounded store for half-authenticated upstream sessions.
//!
//! The registry is the only state shared across concurrent requests. The
//! lock guards nothing but the map itself; upstream I/O always happens with
//! the record claimed out of the map, so a handle can never be double-spent.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::error::{RelayError, Result};
use crate::upstream::UpstreamSession;

/// How long an unconsumed challenge session stays resumable.
pub const SESSION_TTL: Duration = Duration::from_secs(10 * 60);

/// Live state parked between `begin_challenge` and `login_and_fetch`.
pub struct SessionRecord {
	/// The cookie-jar-bound client carrying the CAPTCHA challenge.
	pub upstream: UpstreamSession,
	/// CSRF token captured from the login page at challenge time.
	pub csrf_token: String,
	pub created_at: Instant,
}

impl SessionRecord {
	/// Record created now, around a freshly challenged upstream session.
	pub fn new(upstream: UpstreamSession, csrf_token: String) -> Self {
		Self::new_at(upstream, csrf_token, Instant::now())
	}

	/// Record with an explicit creation time, so tests can pin the clock
	/// against [`SessionRegistry::sweep`] instead of racing the real one.
	pub fn new_at(upstream: UpstreamSession, csrf_token: String, created_at: Instant) -> Self {
		Self { upstream, csrf_token, created_at }
	}
}

/// Handle → record map with claim-on-resume semantics and a lazy TTL sweep.
pub struct SessionRegistry {
	ttl: Duration,
	records: Mutex<HashMap<String, SessionRecord>>,
}

impl SessionRegistry {
	/// Registry with the standard 10 minute TTL.
	pub fn new() -> Self {
		Self::with_ttl(SESSION_TTL)
	}

	/// Registry with a caller-chosen TTL. Intended for tests.
	pub fn with_ttl(ttl: Duration) -> Self {
		Self { ttl, records: Mutex::new(HashMap::new()) }
	}

	/// Parks a record and returns the opaque handle that maps back to it.
	pub fn create(&self, record: SessionRecord) -> String {
		let handle = Uuid::new_v4().simple().to_string();
		self.records.lock().insert(handle.clone(), record);
		handle
	}

	/// Claims the record for `handle`, removing it from the map.
	///
	/// Removal at claim time is what makes the handle single-use: a
	/// concurrent resume, consume, or sweep of the same handle observes
	/// [`RelayError::SessionNotFound`], never a half-spent record. Expired
	/// and never-issued handles are deliberately indistinguishable.
	pub fn resume(&self, handle: &str) -> Result<SessionRecord> {
		self.records.lock().remove(handle).ok_or(RelayError::SessionNotFound)
	}

	/// Drops the record for `handle` if it is still parked. Idempotent.
	pub fn consume(&self, handle: &str) {
		self.records.lock().remove(handle);
	}

	/// Drops every record whose age exceeds the TTL, as observed at `now`.
	///
	/// Runs at the start of every public relay operation rather than on a
	/// timer, so the map cannot grow unbounded between requests. A record
	/// exactly at the TTL is still live.
	pub fn sweep(&self, now: Instant) {
		let mut records = self.records.lock();
		let before = records.len();
		records.retain(|_, record| now.saturating_duration_since(record.created_at) <= self.ttl);
		let expired = before - records.len();
		if expired > 0 {
			debug!(target = "relay.registry", expired, live = records.len(), "swept expired challenge sessions");
		}
	}

	/// Number of parked records.
	pub fn len(&self) -> usize {
		self.records.lock().len()
	}

	/// Whether no records are parked.
	pub fn is_empty(&self) -> bool {
		self.records.lock().is_empty()
	}
}

impl Default for SessionRegistry {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashSet;
	use std::sync::Arc;

	use url::Url;

	use super::*;
	use crate::upstream::UpstreamConfig;

	fn record() -> SessionRecord {
		record_at(Instant::now())
	}

	fn record_at(created_at: Instant) -> SessionRecord {
		// Never dialed; any unroutable base works.
		let config = UpstreamConfig::new(Url::parse("http://127.0.0.1:9/").unwrap());
		SessionRecord::new_at(UpstreamSession::connect(config).unwrap(), "csrf-tok".into(), created_at)
	}

	#[test]
	fn resume_claims_the_record_exactly_once() {
		let registry = SessionRegistry::new();
		let handle = registry.create(record());

		let claimed = registry.resume(&handle).unwrap();
		assert_eq!(claimed.csrf_token, "csrf-tok");
		assert!(matches!(registry.resume(&handle), Err(RelayError::SessionNotFound)));
	}

	#[test]
	fn resume_after_consume_is_session_not_found() {
		let registry = SessionRegistry::new();
		let handle = registry.create(record());

		registry.consume(&handle);
		registry.consume(&handle); // idempotent
		assert!(matches!(registry.resume(&handle), Err(RelayError::SessionNotFound)));
	}

	#[test]
	fn resume_of_unknown_handle_is_session_not_found() {
		let registry = SessionRegistry::new();
		assert!(matches!(registry.resume("no-such-handle"), Err(RelayError::SessionNotFound)));
	}

	#[test]
	fn sweep_expires_only_records_past_ttl() {
		let registry = SessionRegistry::new();
		let created = Instant::now();
		let handle = registry.create(record_at(created));

		// Exactly at the TTL: still live.
		registry.sweep(created + SESSION_TTL);
		assert!(!registry.is_empty());

		// One tick past the TTL: swept.
		registry.sweep(created + SESSION_TTL + Duration::from_nanos(1));
		assert!(registry.is_empty());
		assert!(matches!(registry.resume(&handle), Err(RelayError::SessionNotFound)));
	}

	#[test]
	fn sweep_leaves_fresh_records_untouched() {
		let registry = SessionRegistry::new();
		let created = Instant::now();
		let _stale = registry.create(record_at(created));
		let fresh = registry.create(record_at(created + SESSION_TTL));

		registry.sweep(created + SESSION_TTL + Duration::from_secs(2));
		assert_eq!(registry.len(), 1);
		assert!(registry.resume(&fresh).is_ok());
	}

	#[test]
	fn concurrent_creates_never_collide_on_handle() {
		let registry = Arc::new(SessionRegistry::new());
		let mut workers = Vec::new();
		for _ in 0..8 {
			let registry = Arc::clone(&registry);
			workers.push(std::thread::spawn(move || (0..16).map(|_| registry.create(record())).collect::<Vec<_>>()));
		}

		let handles: Vec<String> = workers.into_iter().flat_map(|w| w.join().unwrap()).collect();
		let unique: HashSet<&String> = handles.iter().collect();
		assert_eq!(unique.len(), 8 * 16);
		assert_eq!(registry.len(), 8 * 16);
	}

	#[test]
	fn only_one_concurrent_resume_wins_a_handle() {
		let registry = Arc::new(SessionRegistry::new());
		let handle = registry.create(record());

		let mut workers = Vec::new();
		for _ in 0..8 {
			let registry = Arc::clone(&registry);
			let handle = handle.clone();
			workers.push(std::thread::spawn(move || registry.resume(&handle).is_ok()));
		}

		let wins = workers.into_iter().map(|w| w.join().unwrap()).filter(|won| *won).count();
		assert_eq!(wins, 1);
	}
}
