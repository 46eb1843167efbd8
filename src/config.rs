use crate::google_auth::ServiceAccountKey;
use crate::sheets::SheetsCredential;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CLASS_SHEETS: &[&str] = &["Class1", "Class2", "Class3"];
pub const DEFAULT_ATTENDANCE_COLUMNS: &str = "A1:Z";
pub const DEFAULT_SHEETS_API_BASE: &str = "https://sheets.googleapis.com";
pub const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub enum SheetsSource {
    /// `<dir>/<spreadsheet_id>/<sheet>.csv`
    CsvDir(PathBuf),
    Google {
        base_url: String,
        credential: SheetsCredential,
        timeout: Duration,
    },
}

#[derive(Debug, Clone)]
pub struct SchoolConfig {
    pub db_path: Option<PathBuf>,
    pub spreadsheet_id: Option<String>,
    pub posts_sheet_id: Option<String>,
    pub class_sheets: Vec<String>,
    pub attendance_columns: String,
    pub sheets: SheetsSource,
    pub port: u16,
    pub log_json: bool,
}

impl SchoolConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let class_sheets = match non_empty("SCHOOLD_CLASS_SHEETS") {
            Some(raw) => {
                let names: Vec<String> = raw
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                if names.is_empty() {
                    return Err(ConfigError::Invalid {
                        name: "SCHOOLD_CLASS_SHEETS",
                        value: raw,
                    });
                }
                names
            }
            None => DEFAULT_CLASS_SHEETS.iter().map(|s| s.to_string()).collect(),
        };

        let sheets = match non_empty("SCHOOLD_SHEETS_DIR") {
            Some(dir) => SheetsSource::CsvDir(PathBuf::from(dir)),
            None => {
                let credential = if let Some(raw) = non_empty("GOOGLE_CREDENTIALS") {
                    let key = ServiceAccountKey::from_json(&raw).map_err(|e| ConfigError::Invalid {
                        name: "GOOGLE_CREDENTIALS",
                        value: format!("<service account json: {e}>"),
                    })?;
                    SheetsCredential::ServiceAccount(key)
                } else if let Some(token) = non_empty("SHEETS_ACCESS_TOKEN") {
                    SheetsCredential::AccessToken(token)
                } else if let Some(key) = non_empty("SHEETS_API_KEY") {
                    SheetsCredential::ApiKey(key)
                } else {
                    SheetsCredential::Anonymous
                };
                let timeout_secs =
                    parse_or("SHEETS_TIMEOUT_SECS", non_empty("SHEETS_TIMEOUT_SECS"), 30u64)?;
                SheetsSource::Google {
                    base_url: non_empty("SHEETS_API_BASE")
                        .unwrap_or_else(|| DEFAULT_SHEETS_API_BASE.to_string()),
                    credential,
                    timeout: Duration::from_secs(timeout_secs),
                }
            }
        };

        Ok(Self {
            db_path: non_empty("SCHOOLD_DB_PATH").map(PathBuf::from),
            spreadsheet_id: non_empty("SPREADSHEET_ID"),
            posts_sheet_id: non_empty("DATA_SHEET_ID"),
            class_sheets,
            attendance_columns: non_empty("SCHOOLD_ATTENDANCE_COLUMNS")
                .unwrap_or_else(|| DEFAULT_ATTENDANCE_COLUMNS.to_string()),
            sheets,
            port: parse_or("PORT", non_empty("PORT"), DEFAULT_PORT)?,
            log_json: parse_bool("SCHOOLD_LOG_JSON", non_empty("SCHOOLD_LOG_JSON"), false)?,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(v) => v
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { name, value: v }),
        None => Ok(default),
    }
}

fn parse_bool(name: &'static str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    match raw.as_deref().map(str::trim) {
        None => Ok(default),
        Some("1" | "true" | "TRUE" | "yes" | "YES") => Ok(true),
        Some("0" | "false" | "FALSE" | "no" | "NO") => Ok(false),
        Some(other) => Err(ConfigError::Invalid {
            name,
            value: other.to_string(),
        }),
    }
}
