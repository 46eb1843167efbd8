use crate::ipc::error::HandlerErr;
use crate::ipc::types::AppState;
use rusqlite::Connection;
use serde::Serialize;
use std::sync::MutexGuard;

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("Missing required field: {}", key)))
}

pub fn to_result<T: Serialize>(value: &T) -> Result<serde_json::Value, HandlerErr> {
    serde_json::to_value(value).map_err(|e| HandlerErr::new("serialize_failed", e.to_string()))
}

pub fn db_conn(state: &AppState) -> Result<MutexGuard<'_, Connection>, HandlerErr> {
    let Some(db) = state.db.as_ref() else {
        return Err(HandlerErr::new("no_database", "no student database configured"));
    };
    db.lock()
        .map_err(|_| HandlerErr::new("db_lock_poisoned", "student database lock poisoned"))
}

pub fn db_query_failed(e: rusqlite::Error) -> HandlerErr {
    HandlerErr::new("db_query_failed", e.to_string())
}
