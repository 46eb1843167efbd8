use crate::attendance::{AttendanceAggregator, AttendanceConfig};
use crate::config::{SchoolConfig, SheetsSource};
use crate::db;
use crate::sheets::{CsvDirFetcher, GoogleSheetsFetcher, TabularRangeFetcher};
use rusqlite::Connection;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub config: SchoolConfig,
    pub fetcher: Arc<dyn TabularRangeFetcher>,
    pub attendance: Option<AttendanceAggregator>,
    pub db: Option<Mutex<Connection>>,
}

impl AppState {
    pub fn from_config(config: SchoolConfig) -> anyhow::Result<Self> {
        let fetcher: Arc<dyn TabularRangeFetcher> = match &config.sheets {
            SheetsSource::CsvDir(dir) => {
                info!(dir = %dir.display(), "reading sheets from csv directory");
                Arc::new(CsvDirFetcher::new(dir))
            }
            SheetsSource::Google {
                base_url,
                credential,
                timeout,
            } => Arc::new(GoogleSheetsFetcher::new(
                base_url.clone(),
                credential.clone(),
                *timeout,
            )?),
        };
        let db = match &config.db_path {
            Some(path) => {
                info!(path = %path.display(), "opening student database");
                Some(Mutex::new(db::open_db(path)?))
            }
            None => None,
        };
        Ok(Self::new(config, fetcher, db))
    }

    pub fn new(
        config: SchoolConfig,
        fetcher: Arc<dyn TabularRangeFetcher>,
        db: Option<Mutex<Connection>>,
    ) -> Self {
        let attendance = config.spreadsheet_id.as_ref().map(|spreadsheet_id| {
            AttendanceAggregator::new(
                AttendanceConfig {
                    spreadsheet_id: spreadsheet_id.clone(),
                    class_sheets: config.class_sheets.clone(),
                    columns: config.attendance_columns.clone(),
                },
                fetcher.clone(),
            )
        });
        Self {
            config,
            fetcher,
            attendance,
            db,
        }
    }
}
