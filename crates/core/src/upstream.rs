//! Cookie-bound client for the upstream ERP's CAPTCHA-gated login flow.
//!
//! Every step is markup-coupled: the portal exposes no API, so login is a
//! choreography of a CSRF meta tag, an empty-credential probe that forces a
//! CAPTCHA to render, and a textual logout marker standing in for a status
//! code. The same cookie jar must carry the whole sequence, which is why one
//! [`UpstreamSession`] owns one client from challenge to report fetch.

use std::sync::LazyLock;
use std::time::Duration;

use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use crate::error::{RelayError, Result};
use crate::extract;
use crate::report::ReportKind;

/// Default timeout applied to every upstream request.
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

// The upstream serves an error page to unrecognized agents.
const USER_AGENT: &str = "Mozilla/5.0";

const LOGIN_ROUTE: &str = "index.php?r=site%2Flogin";
const TIMETABLE_ROUTE: &str =
	"index.php?r=timetables%2Funiversitymasteracademictimetableview%2Findividualstudenttimetableget";
const ATTENDANCE_ROUTE: &str = "index.php?r=studentattendance%2Fattendance%2Fcourselist";

const YEAR_PARAM: &str = "UniversityMasterAcademicTimetableView[academicyear]";
const SEMESTER_PARAM: &str = "UniversityMasterAcademicTimetableView[semesterid]";

// Fragment of the CAPTCHA image src; the rest of the URL varies per render.
const CAPTCHA_SRC_FRAGMENT: &str = "r=site%2Fcaptcha";

// Presence of the logout affordance is the only success signal upstream gives.
const LOGOUT_MARKER: &str = "Logout";

static CSRF_META: LazyLock<Selector> = LazyLock::new(|| Selector::parse(r#"meta[name="csrf-token"]"#).unwrap());
static IMAGES: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img[src]").unwrap());

/// Where and how to reach the upstream portal.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
	pub base_url: Url,
	pub timeout: Duration,
}

impl UpstreamConfig {
	/// Config for `base_url` with the default request timeout.
	pub fn new(base_url: Url) -> Self {
		Self { base_url, timeout: UPSTREAM_TIMEOUT }
	}
}

/// A freshly established CAPTCHA challenge.
#[derive(Debug)]
pub struct Challenge {
	/// Anti-forgery token scraped from the login page; required on every
	/// later form submission in this session.
	pub csrf_token: String,
	/// Raw CAPTCHA image bytes to relay to the client.
	pub image: Vec<u8>,
}

/// One cookie-jar-bound client driving one upstream account flow.
pub struct UpstreamSession {
	http: reqwest::Client,
	config: UpstreamConfig,
}

impl UpstreamSession {
	/// Opens a fresh cookie-bearing client for one login flow.
	pub fn connect(config: UpstreamConfig) -> Result<Self> {
		let http = reqwest::Client::builder()
			.cookie_store(true)
			.timeout(config.timeout)
			.user_agent(USER_AGENT)
			.build()?;
		Ok(Self { http, config })
	}

	/// Establishes a CAPTCHA challenge against a fresh upstream session.
	///
	/// Fetches the login page for its CSRF token, submits an empty-credential
	/// probe to force the upstream to render a CAPTCHA, and downloads the
	/// image. The session's cookies must be retained for [`Self::complete_login`].
	pub async fn begin_challenge(&self) -> Result<Challenge> {
		let login_url = self.route(LOGIN_ROUTE)?;
		let login_page = self.http.get(login_url.clone()).send().await?.text().await?;
		let csrf_token = scrape_csrf_token(&login_page)
			.ok_or_else(|| RelayError::UpstreamProtocol("login page is missing the csrf-token meta tag".into()))?;

		let probe = [("_csrf", csrf_token.as_str()), ("LoginForm[username]", ""), ("LoginForm[password]", "")];
		let probe_page = self.http.post(login_url).form(&probe).send().await?.text().await?;

		let image_url = captcha_image_url(&probe_page, &self.config.base_url).ok_or(RelayError::CaptchaNotFound)?;
		debug!(target = "relay.upstream", url = %image_url, "fetching captcha image");
		let image = self.http.get(image_url).send().await?.bytes().await?.to_vec();

		Ok(Challenge { csrf_token, image })
	}

	/// Submits credentials and the solved CAPTCHA over the challenge cookies.
	///
	/// Returns the fresh post-login CSRF token when the landing page carries
	/// one; form submissions after login should prefer it over the
	/// challenge-time token. CAPTCHA verification is entirely upstream's:
	/// the relay only observes pass/fail through the logout marker.
	pub async fn complete_login(
		&self,
		csrf_token: &str,
		username: &str,
		password: &str,
		captcha_answer: &str,
	) -> Result<Option<String>> {
		let form = [
			("_csrf", csrf_token),
			("LoginForm[username]", username),
			("LoginForm[password]", password),
			("LoginForm[captcha]", captcha_answer),
		];
		let body = self.http.post(self.route(LOGIN_ROUTE)?).form(&form).send().await?.text().await?;
		if !body.contains(LOGOUT_MARKER) {
			return Err(RelayError::AuthFailed);
		}
		debug!(target = "relay.upstream", user = %username, "upstream login accepted");
		Ok(scrape_csrf_token(&body))
	}

	/// Fetches the raw HTML of one report page over the authenticated session.
	///
	/// The timetable is a plain GET with query parameters; the attendance
	/// courselist is a CSRF-bearing POST. Either way the response must carry
	/// the report's table container, or the fetch is [`RelayError::ReportNotFound`].
	pub async fn fetch_report(
		&self,
		kind: ReportKind,
		academic_year_code: &str,
		semester_id: &str,
		csrf_token: &str,
	) -> Result<String> {
		let (request, container) = match kind {
			ReportKind::Timetable => (
				self.http
					.get(self.route(TIMETABLE_ROUTE)?)
					.query(&[(YEAR_PARAM, academic_year_code), (SEMESTER_PARAM, semester_id)]),
				extract::TIMETABLE.container,
			),
			ReportKind::Attendance => (
				self.http
					.post(self.route(ATTENDANCE_ROUTE)?)
					.form(&[("_csrf", csrf_token), ("academicyear", academic_year_code), ("semesterid", semester_id)]),
				extract::ATTENDANCE.container,
			),
		};

		let body = request.send().await?.text().await?;
		if !extract::has_table(&body, container) {
			return Err(RelayError::ReportNotFound);
		}
		debug!(target = "relay.upstream", %kind, bytes = body.len(), "fetched report page");
		Ok(body)
	}

	fn route(&self, route: &str) -> Result<Url> {
		Ok(self.config.base_url.join(route)?)
	}
}

fn scrape_csrf_token(html: &str) -> Option<String> {
	let document = Html::parse_document(html);
	document
		.select(&CSRF_META)
		.next()
		.and_then(|meta| meta.value().attr("content"))
		.map(str::to_string)
}

fn captcha_image_url(html: &str, base: &Url) -> Option<Url> {
	let document = Html::parse_document(html);
	let src = document.select(&IMAGES).find_map(|img| {
		let src = img.value().attr("src")?;
		src.contains(CAPTCHA_SRC_FRAGMENT).then(|| src.to_string())
	})?;
	base.join(&src).ok()
}
