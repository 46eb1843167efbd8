use crate::attendance::{AttendanceAggregator, AttendanceError};
use crate::ipc::error::{reply, HandlerErr};
use crate::ipc::helpers::{get_required_str, to_result};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

impl From<AttendanceError> for HandlerErr {
    fn from(e: AttendanceError) -> Self {
        match e {
            AttendanceError::Validation => {
                HandlerErr::new("bad_params", "Missing required field: rollNumber")
            }
            AttendanceError::NotFound => {
                HandlerErr::new("not_found", "Student not found in any class sheet.")
            }
            AttendanceError::RemoteFetch(cause) => {
                HandlerErr::new("remote_fetch_failed", "Failed to fetch attendance report")
                    .with_details(json!({ "cause": cause.to_string() }))
            }
        }
    }
}

fn aggregator(state: &AppState) -> Result<&AttendanceAggregator, HandlerErr> {
    state.attendance.as_ref().ok_or_else(|| {
        HandlerErr::new("not_configured", "attendance spreadsheet is not configured")
    })
}

fn attendance_full(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let roll_number = get_required_str(params, "rollNumber")?;
    let record = aggregator(state)?.full_attendance(&roll_number)?;
    to_result(&record)
}

fn attendance_latest(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let roll_number = get_required_str(params, "rollNumber")?;
    let latest = aggregator(state)?.latest_attendance(&roll_number)?;
    to_result(&latest)
}

fn attendance_tracker(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let roll_number = get_required_str(params, "rollNumber")?;
    let tracker = aggregator(state)?.attendance_tracker(&roll_number)?;
    to_result(&tracker)
}

pub fn try_handle(state: &AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "attendance.full" => attendance_full(state, &req.params),
        "attendance.latest" => attendance_latest(state, &req.params),
        "attendance.tracker" => attendance_tracker(state, &req.params),
        _ => return None,
    };
    Some(reply(&req.id, result))
}
