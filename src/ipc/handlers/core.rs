use crate::ipc::error::ok;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_health(state: &AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "attendanceConfigured": state.attendance.is_some(),
            "classSheets": state.attendance.as_ref().map(|a| a.config().class_sheets.clone()),
            "postsConfigured": state.config.posts_sheet_id.is_some(),
            "databaseConfigured": state.db.is_some(),
        }),
    )
}

pub fn try_handle(state: &AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        _ => None,
    }
}
