use crate::ipc::error::{reply, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use tracing::warn;

const POSTS_RANGE: &str = "Sheet1!A:C";

/// Every row is a post, header included; absent cells become null.
fn posts_list(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    let Some(sheet_id) = state.config.posts_sheet_id.as_deref() else {
        return Err(HandlerErr::new("not_configured", "posts spreadsheet is not configured"));
    };
    let rows = state.fetcher.fetch(sheet_id, POSTS_RANGE).map_err(|e| {
        warn!(error = %e, "posts fetch failed");
        HandlerErr::new("remote_fetch_failed", format!("Error retrieving posts: {e}"))
    })?;
    let posts: Vec<serde_json::Value> = rows
        .into_iter()
        .map(|row| {
            let mut cells = row.into_iter();
            json!({
                "title": cells.next(),
                "description": cells.next(),
                "timestamp": cells.next(),
            })
        })
        .collect();
    Ok(json!(posts))
}

pub fn try_handle(state: &AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "posts.list" => Some(reply(&req.id, posts_list(state))),
        _ => None,
    }
}
