use crate::db;
use crate::ipc::error::{reply, HandlerErr};
use crate::ipc::helpers::{db_conn, db_query_failed, get_required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use tracing::info;

fn student_not_found() -> HandlerErr {
    HandlerErr::new("not_found", "Student not found")
}

/// The parent contact number doubles as the password.
fn students_login(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let roll_number = get_required_str(params, "rollNumber")?;
    let password = get_required_str(params, "password")?;
    info!(roll_number = %roll_number, "login attempt");

    let conn = db_conn(state)?;
    let mut student = db::student_by_roll(&conn, &roll_number)
        .map_err(db_query_failed)?
        .ok_or_else(student_not_found)?;
    if student.get("parentContact").and_then(|v| v.as_str()) != Some(password.as_str()) {
        return Err(HandlerErr::new("unauthorized", "Incorrect password"));
    }
    student.remove("password");
    Ok(serde_json::Value::Object(student))
}

fn students_get(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let roll_number = get_required_str(params, "rollNumber")?;
    let conn = db_conn(state)?;
    db::student_by_roll(&conn, &roll_number)
        .map_err(db_query_failed)?
        .map(serde_json::Value::Object)
        .ok_or_else(student_not_found)
}

fn fees_status(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let roll_number = get_required_str(params, "rollNumber")?;
    let conn = db_conn(state)?;
    match db::fee_status(&conn, &roll_number).map_err(db_query_failed)? {
        Some(fee_status) => Ok(json!({ "feeStatus": fee_status })),
        None => Err(HandlerErr::new(
            "not_found",
            format!("No fee status found for roll number {}", roll_number),
        )),
    }
}

pub fn try_handle(state: &AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.login" => students_login(state, &req.params),
        "students.get" => students_get(state, &req.params),
        "fees.status" => fees_status(state, &req.params),
        _ => return None,
    };
    Some(reply(&req.id, result))
}
