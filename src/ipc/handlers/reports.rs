use crate::db;
use crate::ipc::error::{reply, HandlerErr};
use crate::ipc::helpers::{db_conn, db_query_failed, get_required_str};
use crate::ipc::types::{AppState, Request};

fn reports_marks(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let roll_number = get_required_str(params, "rollNumber")?;
    let conn = db_conn(state)?;
    let rows = db::marks_report(&conn, &roll_number).map_err(db_query_failed)?;
    if rows.is_empty() {
        return Err(HandlerErr::new(
            "not_found",
            format!("No exam reports found for roll number {}", roll_number),
        ));
    }
    Ok(serde_json::Value::Array(
        rows.into_iter().map(serde_json::Value::Object).collect(),
    ))
}

pub fn try_handle(state: &AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.marks" => Some(reply(&req.id, reports_marks(state, &req.params))),
        _ => None,
    }
}
