use crate::sheets::{FetchError, TabularRangeFetcher};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Columns 0..4 of a class sheet: roll number, name, unused, section.
pub const METADATA_COLUMNS: usize = 4;

const ROLL_COL: usize = 0;
const NAME_COL: usize = 1;
const SECTION_COL: usize = 3;

const PRESENT: &str = "Present";

#[derive(Debug, Clone)]
pub struct AttendanceConfig {
    pub spreadsheet_id: String,
    /// Searched in this order; the first sheet holding the roll number wins.
    pub class_sheets: Vec<String>,
    /// A1 cell window appended to each sheet name, e.g. `A1:Z`.
    pub columns: String,
}

#[derive(Debug, Error)]
pub enum AttendanceError {
    #[error("missing required field: rollNumber")]
    Validation,
    #[error("student not found in any class sheet")]
    NotFound,
    #[error(transparent)]
    RemoteFetch(#[from] FetchError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StudentLookup {
    Found {
        sheet_name: String,
        header: Vec<String>,
        row: Vec<String>,
    },
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceEntry {
    pub date: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub sheet_name: String,
    pub roll_number: String,
    pub student_name: Option<String>,
    pub section: Option<String>,
    pub entries: Vec<AttendanceEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestAttendance {
    pub sheet_name: String,
    pub roll_number: String,
    pub student_name: Option<String>,
    pub section: Option<String>,
    pub latest_date: Option<String>,
    pub latest_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceTracker {
    pub total_days: usize,
    pub days_present: usize,
    pub attendance_percentage: String,
}

/// Fetches `sheet_names` in order and stops at the first sheet whose
/// non-header rows contain `roll_number` in column 0.
pub fn find_student(
    fetcher: &dyn TabularRangeFetcher,
    spreadsheet_id: &str,
    roll_number: &str,
    sheet_names: &[String],
    columns: &str,
) -> Result<StudentLookup, FetchError> {
    for sheet_name in sheet_names {
        let range = format!("{sheet_name}!{columns}");
        let grid = fetcher.fetch(spreadsheet_id, &range).map_err(|e| {
            warn!(sheet = %sheet_name, error = %e, "class sheet fetch failed");
            e
        })?;
        let mut rows = grid.into_iter();
        let Some(header) = rows.next() else {
            debug!(sheet = %sheet_name, "class sheet is empty");
            continue;
        };
        if let Some(row) = rows.find(|r| r.get(ROLL_COL).map(String::as_str) == Some(roll_number)) {
            return Ok(StudentLookup::Found {
                sheet_name: sheet_name.clone(),
                header,
                row,
            });
        }
        debug!(sheet = %sheet_name, "roll number not in class sheet");
    }
    Ok(StudentLookup::NotFound)
}

/// Pairs every date column of `header` with the student's cell, reading
/// missing trailing cells as "".
pub fn build_series(header: &[String], row: &[String]) -> Vec<AttendanceEntry> {
    header
        .iter()
        .enumerate()
        .skip(METADATA_COLUMNS)
        .map(|(i, date)| AttendanceEntry {
            date: date.clone(),
            status: row.get(i).cloned().unwrap_or_default(),
        })
        .collect()
}

/// `days_present / total_days * 100` to two decimals. Zero days yields "NaN".
pub fn attendance_percentage(days_present: usize, total_days: usize) -> String {
    let pct = days_present as f64 / total_days as f64 * 100.0;
    format!("{:.2}", (pct * 100.0).round() / 100.0)
}

struct Located {
    sheet_name: String,
    header: Vec<String>,
    row: Vec<String>,
}

impl Located {
    fn cell(&self, idx: usize) -> Option<String> {
        self.row.get(idx).cloned()
    }
}

pub struct AttendanceAggregator {
    config: AttendanceConfig,
    fetcher: Arc<dyn TabularRangeFetcher>,
}

impl AttendanceAggregator {
    pub fn new(config: AttendanceConfig, fetcher: Arc<dyn TabularRangeFetcher>) -> Self {
        Self { config, fetcher }
    }

    pub fn config(&self) -> &AttendanceConfig {
        &self.config
    }

    fn locate(&self, roll_number: &str) -> Result<Located, AttendanceError> {
        if roll_number.is_empty() {
            return Err(AttendanceError::Validation);
        }
        let lookup = find_student(
            self.fetcher.as_ref(),
            &self.config.spreadsheet_id,
            roll_number,
            &self.config.class_sheets,
            &self.config.columns,
        )?;
        match lookup {
            StudentLookup::Found {
                sheet_name,
                header,
                row,
            } => {
                info!(roll_number, sheet = %sheet_name, "student located");
                Ok(Located {
                    sheet_name,
                    header,
                    row,
                })
            }
            StudentLookup::NotFound => Err(AttendanceError::NotFound),
        }
    }

    pub fn full_attendance(&self, roll_number: &str) -> Result<AttendanceRecord, AttendanceError> {
        let found = self.locate(roll_number)?;
        let entries = build_series(&found.header, &found.row);
        Ok(AttendanceRecord {
            roll_number: roll_number.to_string(),
            student_name: found.cell(NAME_COL),
            section: found.cell(SECTION_COL),
            sheet_name: found.sheet_name,
            entries,
        })
    }

    /// Reads the last header column, whatever it holds. Sheets with no date
    /// columns report metadata here.
    pub fn latest_attendance(&self, roll_number: &str) -> Result<LatestAttendance, AttendanceError> {
        let found = self.locate(roll_number)?;
        let last = found.header.len().checked_sub(1);
        Ok(LatestAttendance {
            roll_number: roll_number.to_string(),
            student_name: found.cell(NAME_COL),
            section: found.cell(SECTION_COL),
            latest_date: last.and_then(|i| found.header.get(i).cloned()),
            latest_status: last.and_then(|i| found.cell(i)),
            sheet_name: found.sheet_name,
        })
    }

    pub fn attendance_tracker(&self, roll_number: &str) -> Result<AttendanceTracker, AttendanceError> {
        let found = self.locate(roll_number)?;
        let entries = build_series(&found.header, &found.row);
        let total_days = entries.len();
        let days_present = entries.iter().filter(|e| e.status == PRESENT).count();
        Ok(AttendanceTracker {
            total_days,
            days_present,
            attendance_percentage: attendance_percentage(days_present, total_days),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheets::Grid;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingFetcher {
        sheets: HashMap<String, Grid>,
        failing: Option<String>,
        calls: Mutex<Vec<String>>,
    }

    impl RecordingFetcher {
        fn with_sheet(mut self, name: &str, rows: &[&[&str]]) -> Self {
            self.sheets.insert(
                name.to_string(),
                rows.iter()
                    .map(|r| r.iter().map(|c| c.to_string()).collect())
                    .collect(),
            );
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    impl TabularRangeFetcher for RecordingFetcher {
        fn fetch(&self, _spreadsheet_id: &str, range: &str) -> Result<Grid, FetchError> {
            self.calls.lock().expect("calls lock").push(range.to_string());
            let sheet = range.split('!').next().unwrap_or(range);
            if self.failing.as_deref() == Some(sheet) {
                return Err(FetchError::Status {
                    status: 503,
                    range: range.to_string(),
                });
            }
            Ok(self.sheets.get(sheet).cloned().unwrap_or_default())
        }
    }

    const HEADER: &[&str] = &["Roll", "Name", "X", "Section", "2024-01-01", "2024-01-02"];

    fn aggregator(fetcher: Arc<RecordingFetcher>, sheets: &[&str]) -> AttendanceAggregator {
        AttendanceAggregator::new(
            AttendanceConfig {
                spreadsheet_id: "sid".into(),
                class_sheets: sheets.iter().map(|s| s.to_string()).collect(),
                columns: "A1:Z".into(),
            },
            fetcher,
        )
    }

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn tracker_and_latest_for_two_day_sheet() {
        let fetcher = Arc::new(
            RecordingFetcher::default()
                .with_sheet("Class1", &[HEADER, &["R1", "Alice", "", "A", "Present", "Absent"]]),
        );
        let agg = aggregator(fetcher, &["Class1"]);

        let t = agg.attendance_tracker("R1").expect("tracker");
        assert_eq!(t.total_days, 2);
        assert_eq!(t.days_present, 1);
        assert_eq!(t.attendance_percentage, "50.00");

        let l = agg.latest_attendance("R1").expect("latest");
        assert_eq!(l.sheet_name, "Class1");
        assert_eq!(l.student_name.as_deref(), Some("Alice"));
        assert_eq!(l.section.as_deref(), Some("A"));
        assert_eq!(l.latest_date.as_deref(), Some("2024-01-02"));
        assert_eq!(l.latest_status.as_deref(), Some("Absent"));
    }

    #[test]
    fn full_attendance_has_one_entry_per_date_column() {
        let fetcher = Arc::new(
            RecordingFetcher::default()
                .with_sheet("Class1", &[HEADER, &["R1", "Alice", "", "A", "Present", "Absent"]]),
        );
        let rec = aggregator(fetcher, &["Class1"])
            .full_attendance("R1")
            .expect("full");
        assert_eq!(rec.entries.len(), HEADER.len() - METADATA_COLUMNS);
        assert_eq!(
            rec.entries[0],
            AttendanceEntry {
                date: "2024-01-01".into(),
                status: "Present".into()
            }
        );
    }

    #[test]
    fn search_stops_at_first_matching_sheet_in_order() {
        let fetcher = Arc::new(
            RecordingFetcher::default()
                .with_sheet("Class1", &[HEADER, &["R9", "Zed", "", "B", "Absent"]])
                .with_sheet("Class2", &[HEADER, &["R1", "Alice", "", "A", "Present"]])
                .with_sheet("Class3", &[HEADER, &["R1", "Dup", "", "C", "Absent"]]),
        );
        let rec = aggregator(fetcher.clone(), &["Class1", "Class2", "Class3"])
            .full_attendance("R1")
            .expect("full");
        assert_eq!(rec.sheet_name, "Class2");
        assert_eq!(rec.student_name.as_deref(), Some("Alice"));
        assert_eq!(fetcher.calls(), strings(&["Class1!A1:Z", "Class2!A1:Z"]));
    }

    #[test]
    fn absent_roll_number_scans_every_sheet_once() {
        let fetcher = Arc::new(
            RecordingFetcher::default()
                .with_sheet("Class1", &[HEADER, &["R9", "Zed"]])
                .with_sheet("Class2", &[HEADER]),
        );
        let agg = aggregator(fetcher.clone(), &["Class1", "Class2"]);
        assert!(matches!(agg.full_attendance("R1"), Err(AttendanceError::NotFound)));
        assert!(matches!(agg.latest_attendance("R1"), Err(AttendanceError::NotFound)));
        assert!(matches!(agg.attendance_tracker("R1"), Err(AttendanceError::NotFound)));
        assert_eq!(fetcher.calls().len(), 6);
        assert_eq!(&fetcher.calls()[..2], &strings(&["Class1!A1:Z", "Class2!A1:Z"])[..]);
    }

    #[test]
    fn header_row_is_never_matched() {
        let fetcher = Arc::new(RecordingFetcher::default().with_sheet("Class1", &[HEADER]));
        let agg = aggregator(fetcher, &["Class1"]);
        assert!(matches!(agg.full_attendance("Roll"), Err(AttendanceError::NotFound)));
    }

    #[test]
    fn empty_roll_number_is_rejected_before_fetching() {
        let fetcher = Arc::new(RecordingFetcher::default().with_sheet("Class1", &[HEADER]));
        let agg = aggregator(fetcher.clone(), &["Class1"]);
        assert!(matches!(agg.full_attendance(""), Err(AttendanceError::Validation)));
        assert!(fetcher.calls().is_empty());
    }

    #[test]
    fn fetch_failure_aborts_the_search() {
        let fetcher = Arc::new(RecordingFetcher {
            failing: Some("Class1".into()),
            ..RecordingFetcher::default()
        }
        .with_sheet("Class2", &[HEADER, &["R1", "Alice"]]));
        let agg = aggregator(fetcher.clone(), &["Class1", "Class2"]);
        assert!(matches!(
            agg.attendance_tracker("R1"),
            Err(AttendanceError::RemoteFetch(FetchError::Status { status: 503, .. }))
        ));
        assert_eq!(fetcher.calls(), strings(&["Class1!A1:Z"]));
    }

    #[test]
    fn short_row_yields_empty_statuses() {
        let header = strings(HEADER);
        let row = strings(&["R1", "Alice", "", "A", "Present"]);
        let series = build_series(&header, &row);
        assert_eq!(series.len(), 2);
        assert_eq!(series[1].status, "");
        assert_eq!(series, build_series(&header, &row));
    }

    #[test]
    fn header_shorter_than_metadata_gives_empty_series() {
        let series = build_series(&strings(&["Roll", "Name"]), &strings(&["R1", "Al"]));
        assert!(series.is_empty());
    }

    #[test]
    fn present_count_is_case_sensitive() {
        let fetcher = Arc::new(RecordingFetcher::default().with_sheet(
            "Class1",
            &[
                &["Roll", "Name", "X", "Section", "d1", "d2", "d3"],
                &["R1", "Al", "", "A", "present", "Present", "PRESENT"],
            ],
        ));
        let t = aggregator(fetcher, &["Class1"])
            .attendance_tracker("R1")
            .expect("tracker");
        assert_eq!(t.days_present, 1);
        assert_eq!(t.attendance_percentage, "33.33");
    }

    #[test]
    fn zero_attendance_columns_reports_nan_and_metadata_latest() {
        let fetcher = Arc::new(RecordingFetcher::default().with_sheet(
            "Class1",
            &[&["Roll", "Name", "X", "Section"], &["R1", "Al", "", "B"]],
        ));
        let agg = aggregator(fetcher, &["Class1"]);
        let t = agg.attendance_tracker("R1").expect("tracker");
        assert_eq!(t.total_days, 0);
        assert_eq!(t.attendance_percentage, "NaN");

        let l = agg.latest_attendance("R1").expect("latest");
        assert_eq!(l.latest_date.as_deref(), Some("Section"));
        assert_eq!(l.latest_status.as_deref(), Some("B"));
    }

    #[test]
    fn percentage_rounds_half_up() {
        assert_eq!(attendance_percentage(2, 3), "66.67");
        assert_eq!(attendance_percentage(1, 8), "12.50");
        assert_eq!(attendance_percentage(5, 5), "100.00");
    }
}
