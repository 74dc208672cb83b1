//! Report kinds and the extracted payloads returned to the client layer.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Which of the two known upstream report pages to fetch and parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
	Timetable,
	Attendance,
}

impl fmt::Display for ReportKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Timetable => f.write_str("timetable"),
			Self::Attendance => f.write_str("attendance"),
		}
	}
}

/// Day name mapped to `{period label: slot text}`.
pub type TimetableGrid = BTreeMap<String, BTreeMap<String, String>>;

/// One row of the upstream attendance courselist.
///
/// Column positions are a fixed contract of the upstream layout; integer
/// cells that fail to parse are reported as zero rather than failing the
/// whole extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseAttendance {
	pub subject_code: String,
	pub subject_name: String,
	/// L/T/P/S course component the row counts attendance for.
	pub component: String,
	pub location: String,
	pub academic_year: String,
	pub semester: String,
	pub conducted: u32,
	pub attended: u32,
	/// Raw percentage cell as rendered by the upstream, e.g. `"85.71"`.
	pub percentage: String,
}

/// An extracted report, tagged by kind for the response envelope.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Report {
	Timetable(TimetableGrid),
	Attendance(Vec<CourseAttendance>),
}

impl Report {
	/// Kind tag of this payload.
	pub fn kind(&self) -> ReportKind {
		match self {
			Self::Timetable(_) => ReportKind::Timetable,
			Self::Attendance(_) => ReportKind::Attendance,
		}
	}
}
