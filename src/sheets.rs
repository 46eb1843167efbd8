use crate::google_auth::{AuthError, ServiceAccountKey, ServiceAccountTokens};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Row-major cell values, row 0 = header.
pub type Grid = Vec<Vec<String>>;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid range {0:?}")]
    InvalidRange(String),
    #[error("sheet file not found: {}", .0.display())]
    SheetMissing(PathBuf),
    #[error("sheets request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("sheets request for {range} returned status {status}")]
    Status { status: u16, range: String },
    #[error("malformed sheets payload: {0}")]
    Decode(String),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("sheets auth failed: {0}")]
    Auth(#[from] AuthError),
    #[error("reading sheet file: {0}")]
    Io(#[from] std::io::Error),
}

/// Reads one rectangular window of a spreadsheet.
pub trait TabularRangeFetcher: Send + Sync {
    fn fetch(&self, spreadsheet_id: &str, range: &str) -> Result<Grid, FetchError>;
}

/// A parsed A1-notation range such as `Class1!A1:Z` or `Sheet1!A:C`.
/// Columns and rows are zero-based; `None` upper bounds are open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRange {
    pub sheet: String,
    pub first_col: usize,
    pub last_col: Option<usize>,
    pub first_row: usize,
    pub last_row: Option<usize>,
}

pub fn parse_a1(range: &str) -> Result<SheetRange, FetchError> {
    let invalid = || FetchError::InvalidRange(range.to_string());
    let (sheet, cells) = match range.rsplit_once('!') {
        Some((s, c)) => (s, Some(c)),
        None => (range, None),
    };
    let sheet = sheet.trim();
    let sheet = sheet
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .map(|s| s.replace("''", "'"))
        .unwrap_or_else(|| sheet.to_string());
    if sheet.is_empty() {
        return Err(invalid());
    }

    let Some(cells) = cells else {
        return Ok(SheetRange {
            sheet,
            first_col: 0,
            last_col: None,
            first_row: 0,
            last_row: None,
        });
    };

    let (start, end) = match cells.split_once(':') {
        Some((a, b)) => (a, b),
        None => (cells, cells),
    };
    let (start_col, start_row) = parse_cell_ref(start).ok_or_else(invalid)?;
    let (end_col, end_row) = parse_cell_ref(end).ok_or_else(invalid)?;
    let first_col = start_col.unwrap_or(0);
    let first_row = start_row.unwrap_or(0);
    if end_col.is_some_and(|c| c < first_col) || end_row.is_some_and(|r| r < first_row) {
        return Err(invalid());
    }
    Ok(SheetRange {
        sheet,
        first_col,
        last_col: end_col,
        first_row,
        last_row: end_row,
    })
}

fn parse_cell_ref(raw: &str) -> Option<(Option<usize>, Option<usize>)> {
    let t = raw.trim();
    if t.is_empty() {
        return None;
    }
    let split = t
        .char_indices()
        .find(|(_, c)| !c.is_ascii_alphabetic())
        .map(|(i, _)| i)
        .unwrap_or(t.len());
    let (letters, digits) = t.split_at(split);

    let col = if letters.is_empty() {
        None
    } else {
        let mut n = 0usize;
        for ch in letters.chars() {
            let v = (ch.to_ascii_uppercase() as u8 - b'A') as usize + 1;
            n = n.checked_mul(26)?.checked_add(v)?;
        }
        Some(n - 1)
    };
    let row = if digits.is_empty() {
        None
    } else {
        let n = digits.parse::<usize>().ok()?;
        if n == 0 {
            return None;
        }
        Some(n - 1)
    };
    Some((col, row))
}

/// Drops trailing empty cells per row, then trailing empty rows.
fn trim_grid(mut grid: Grid) -> Grid {
    for row in grid.iter_mut() {
        while row.last().is_some_and(|c| c.is_empty()) {
            row.pop();
        }
    }
    while grid.last().is_some_and(|r| r.is_empty()) {
        grid.pop();
    }
    grid
}

#[derive(Debug, Clone)]
pub enum SheetsCredential {
    Anonymous,
    AccessToken(String),
    ApiKey(String),
    ServiceAccount(ServiceAccountKey),
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

fn grid_from_value_range(body: &str) -> Result<Grid, FetchError> {
    let parsed: ValueRange =
        serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))?;
    Ok(parsed
        .values
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|cell| match cell {
                    serde_json::Value::String(s) => s,
                    serde_json::Value::Null => String::new(),
                    other => other.to_string(),
                })
                .collect()
        })
        .collect())
}

/// Google Sheets v4 `spreadsheets.values.get`.
pub struct GoogleSheetsFetcher {
    client: reqwest::blocking::Client,
    base_url: String,
    credential: SheetsCredential,
    tokens: Option<ServiceAccountTokens>,
}

impl GoogleSheetsFetcher {
    pub fn new(
        base_url: impl Into<String>,
        credential: SheetsCredential,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        let tokens = match &credential {
            SheetsCredential::ServiceAccount(key) => Some(ServiceAccountTokens::new(key.clone())?),
            _ => None,
        };
        Ok(Self {
            client,
            base_url: base_url.into(),
            credential,
            tokens,
        })
    }

    fn values_url(&self, spreadsheet_id: &str, range: &str) -> Result<reqwest::Url, FetchError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| FetchError::InvalidRange(format!("bad sheets base url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| FetchError::InvalidRange("sheets base url cannot be a base".into()))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", spreadsheet_id, "values", range]);
        if let SheetsCredential::ApiKey(key) = &self.credential {
            url.query_pairs_mut().append_pair("key", key);
        }
        Ok(url)
    }
}

impl TabularRangeFetcher for GoogleSheetsFetcher {
    fn fetch(&self, spreadsheet_id: &str, range: &str) -> Result<Grid, FetchError> {
        let url = self.values_url(spreadsheet_id, range)?;
        debug!(spreadsheet_id, range, "sheets values.get");
        let mut req = self.client.get(url);
        if let SheetsCredential::AccessToken(token) = &self.credential {
            req = req.bearer_auth(token);
        } else if let Some(tokens) = &self.tokens {
            req = req.bearer_auth(tokens.token(&self.client)?);
        }
        let resp = req.send()?;
        if !resp.status().is_success() {
            return Err(FetchError::Status {
                status: resp.status().as_u16(),
                range: range.to_string(),
            });
        }
        let body = resp.text()?;
        grid_from_value_range(&body)
    }
}

/// The csv reader skips empty lines, but Sheets returns an empty row for
/// them. Gives each blank line outside a quoted field one empty field.
fn mark_blank_lines(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut in_quotes = false;
    let mut line_start = true;
    for (i, &b) in raw.iter().enumerate() {
        let blank = b == b'\n' || (b == b'\r' && raw.get(i + 1) == Some(&b'\n'));
        if line_start && !in_quotes && blank {
            out.extend_from_slice(b"\"\"");
        }
        if b == b'"' {
            in_quotes = !in_quotes;
        }
        line_start = b == b'\n';
        out.push(b);
    }
    out
}

/// Serves ranges from `<root>/<spreadsheet_id>/<sheet>.csv`, shaped the
/// way the Sheets API shapes them.
pub struct CsvDirFetcher {
    root: PathBuf,
}

impl CsvDirFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn sheet_path(&self, spreadsheet_id: &str, sheet: &str) -> Result<PathBuf, FetchError> {
        for part in [spreadsheet_id, sheet] {
            if part.is_empty() || part == "." || part == ".." || part.contains(['/', '\\']) {
                return Err(FetchError::InvalidRange(part.to_string()));
            }
        }
        Ok(self.root.join(spreadsheet_id).join(format!("{sheet}.csv")))
    }
}

impl TabularRangeFetcher for CsvDirFetcher {
    fn fetch(&self, spreadsheet_id: &str, range: &str) -> Result<Grid, FetchError> {
        let window = parse_a1(range)?;
        let path = self.sheet_path(spreadsheet_id, &window.sheet)?;
        if !path.is_file() {
            return Err(FetchError::SheetMissing(path));
        }
        debug!(path = %path.display(), range, "csv sheet read");

        let raw = mark_blank_lines(&std::fs::read(&path)?);
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(raw.as_slice());
        let mut grid: Grid = Vec::new();
        for (idx, record) in reader.records().enumerate() {
            if window.last_row.is_some_and(|last| idx > last) {
                break;
            }
            let record = record?;
            if idx < window.first_row {
                continue;
            }
            let take = window
                .last_col
                .map(|last| last + 1 - window.first_col)
                .unwrap_or(usize::MAX);
            grid.push(
                record
                    .iter()
                    .skip(window.first_col)
                    .take(take)
                    .map(|s| s.to_string())
                    .collect(),
            );
        }
        Ok(trim_grid(grid))
    }
}
