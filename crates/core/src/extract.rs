//! HTML table extraction for the two known upstream report layouts.
//!
//! Each report kind carries a small declarative shape describing where its
//! table lives and how rows map to output, so upstream markup drift stays
//! contained here and in [`crate::upstream`].

use std::collections::BTreeMap;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use crate::error::{RelayError, Result};
use crate::report::{CourseAttendance, TimetableGrid};

/// Structural contract for a day-keyed grid report.
#[derive(Debug, Clone, Copy)]
pub struct GridShape {
	/// CSS selector for the table container.
	pub container: &'static str,
}

/// Structural contract for a flat record-list report.
#[derive(Debug, Clone, Copy)]
pub struct RecordShape {
	/// CSS selector for the table container.
	pub container: &'static str,
	/// Rows with fewer cells than this are skipped silently.
	pub min_cells: usize,
}

/// Timetable: one table of day rows against period-slot columns.
pub const TIMETABLE: GridShape = GridShape { container: "table" };

/// Attendance: the courselist grid, thirteen columns per course row.
pub const ATTENDANCE: RecordShape = RecordShape { container: "table", min_cells: 13 };

static HEADER_CELLS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("thead th").unwrap());
static BODY_ROWS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tbody tr").unwrap());
static DATA_CELLS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());

/// Extracts a label-keyed grid from the first table matching
/// `container_selector`.
///
/// The first header cell names the label column and is skipped; remaining
/// headers are zipped against each body row's cells, keyed by the row's
/// first-cell text. An empty body yields an empty map, not an error.
pub fn extract_grid(html: &str, container_selector: &str) -> Result<TimetableGrid> {
	let document = Html::parse_document(html);
	let table = find_table(&document, container_selector)?;

	let headers: Vec<String> = table.select(&HEADER_CELLS).map(cell_text).skip(1).collect();

	let mut grid = TimetableGrid::new();
	for row in table.select(&BODY_ROWS) {
		let mut cells = row.select(&DATA_CELLS).map(cell_text);
		let Some(label) = cells.next() else {
			continue;
		};
		let slots: BTreeMap<String, String> = headers.iter().cloned().zip(cells).collect();
		grid.insert(label, slots);
	}
	Ok(grid)
}

/// Extracts fixed-position course records from the first table matching
/// `container_selector`.
///
/// Rows with fewer than `min_cells` cells (serial headers, footers, colspan
/// banners) are skipped silently. Numeric cells fail soft to zero.
pub fn extract_records(html: &str, container_selector: &str, min_cells: usize) -> Result<Vec<CourseAttendance>> {
	let document = Html::parse_document(html);
	let table = find_table(&document, container_selector)?;

	let mut records = Vec::new();
	for row in table.select(&BODY_ROWS) {
		let cells: Vec<String> = row.select(&DATA_CELLS).map(cell_text).collect();
		if cells.len() < min_cells {
			continue;
		}
		// Position 0 is the serial-number column; named fields follow the
		// upstream courselist layout.
		records.push(CourseAttendance {
			subject_code: cell(&cells, 1),
			subject_name: cell(&cells, 2),
			component: cell(&cells, 3),
			location: cell(&cells, 4),
			academic_year: cell(&cells, 5),
			semester: cell(&cells, 6),
			conducted: parse_count(&cells, 8),
			attended: parse_count(&cells, 9),
			percentage: cell(&cells, 12),
		});
	}
	Ok(records)
}

/// Whether any table matches `container_selector` in the document.
pub(crate) fn has_table(html: &str, container_selector: &str) -> bool {
	let Ok(selector) = Selector::parse(container_selector) else {
		return false;
	};
	Html::parse_document(html).select(&selector).next().is_some()
}

fn find_table<'a>(document: &'a Html, container_selector: &str) -> Result<ElementRef<'a>> {
	let selector =
		Selector::parse(container_selector).map_err(|_| RelayError::TableNotFound(container_selector.to_string()))?;
	document
		.select(&selector)
		.next()
		.ok_or_else(|| RelayError::TableNotFound(container_selector.to_string()))
}

fn cell_text(element: ElementRef<'_>) -> String {
	let joined: String = element.text().collect();
	joined.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn cell(cells: &[String], index: usize) -> String {
	cells.get(index).cloned().unwrap_or_default()
}

fn parse_count(cells: &[String], index: usize) -> u32 {
	cells.get(index).and_then(|c| c.trim().parse().ok()).unwrap_or(0)
}
