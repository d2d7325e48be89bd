use crate::db::{self, Snapshot};
use crate::error::EngineError;
use crate::ipc::error::{engine_err, engine_err_details, err};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde::de::DeserializeOwned;

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

/// Absent and `null` both read as `None`; any other non-string is rejected.
pub fn optional_str(req: &Request, key: &str) -> Result<Option<String>, serde_json::Value> {
    match req.params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(err(
            &req.id,
            "bad_params",
            format!("{} must be a string", key),
            None,
        )),
    }
}

/// Deserializes `params[key]` into `T`, mapping failures to `bad_params`.
pub fn param_as<T: DeserializeOwned>(req: &Request, key: &str) -> Result<T, serde_json::Value> {
    let Some(raw) = req.params.get(key) else {
        return Err(err(&req.id, "bad_params", format!("missing {}", key), None));
    };
    serde_json::from_value(raw.clone()).map_err(|e| {
        err(
            &req.id,
            "bad_params",
            format!("invalid {}: {}", key, e),
            None,
        )
    })
}

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn load_snapshot(conn: &Connection, req: &Request) -> Result<Snapshot, serde_json::Value> {
    Snapshot::load(conn).map_err(|e| engine_err(&req.id, &e))
}

pub fn load_exam(conn: &Connection, req: &Request, exam_id: &str) -> Result<crate::model::Exam, serde_json::Value> {
    match db::get_exam(conn, exam_id) {
        Ok(Some(exam)) => Ok(exam),
        Ok(None) => Err(engine_err_details(
            &req.id,
            &EngineError::NotFound("exam not found".to_string()),
            Some(serde_json::json!({ "examId": exam_id })),
        )),
        Err(e) => Err(engine_err(&req.id, &e)),
    }
}
