use crate::backup;
use crate::db;
use crate::error::EngineError;
use crate::ipc::error::{engine_err_details, err, ok};
use crate::ipc::helpers::required_str;
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn handle_backup_export_workspace(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (Some(workspace_path), Some(conn)) = (state.workspace.clone(), state.db.as_ref()) else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let out_path = match required_str(req, "outPath") {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        Ok(_) => return err(&req.id, "bad_params", "missing outPath", None),
        Err(e) => return e,
    };

    let _ = conn.execute_batch("PRAGMA wal_checkpoint(FULL)");

    let out = PathBuf::from(&out_path);
    let export = match backup::export_workspace_bundle(&workspace_path, &out) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "io_failed",
                e.to_string(),
                Some(json!({ "path": out_path })),
            )
        }
    };

    ok(
        &req.id,
        json!({
            "ok": true,
            "path": out_path,
            "bundleFormat": export.bundle_format,
            "entryCount": export.entry_count,
            "dbSha256": export.db_sha256
        }),
    )
}

fn handle_backup_import_workspace(state: &mut AppState, req: &Request) -> serde_json::Value {
    let in_path = match required_str(req, "inPath") {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        Ok(_) => return err(&req.id, "bad_params", "missing inPath", None),
        Err(e) => return e,
    };
    let workspace_path = req
        .params
        .get("workspacePath")
        .and_then(|v| v.as_str())
        .map(PathBuf::from)
        .or_else(|| state.workspace.clone());
    let Some(workspace_path) = workspace_path else {
        return err(&req.id, "bad_params", "missing workspacePath", None);
    };

    let src = PathBuf::from(&in_path);
    if !src.is_file() {
        return engine_err_details(
            &req.id,
            &EngineError::NotFound("bundle file not found".to_string()),
            Some(json!({ "path": in_path })),
        );
    }

    // Drop open handle before replacing file.
    state.db = None;
    let previous = state.workspace.take();

    let import = match backup::import_workspace_bundle(&src, &workspace_path) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(path = %in_path, error = %e, "workspace import failed");
            // The database is only replaced after a successful extract, so the old one is intact.
            if let Some(prev) = previous {
                match db::open_db(&prev) {
                    Ok(conn) => {
                        state.workspace = Some(prev);
                        state.db = Some(conn);
                    }
                    Err(reopen) => tracing::error!(
                        workspace = %prev.display(),
                        error = %reopen,
                        "failed to reopen previous workspace; no workspace is open"
                    ),
                }
            }
            return err(
                &req.id,
                "io_failed",
                e.to_string(),
                Some(json!({ "path": src.to_string_lossy() })),
            );
        }
    };

    match db::open_db(&workspace_path) {
        Ok(conn) => {
            state.workspace = Some(workspace_path.clone());
            state.db = Some(conn);
            ok(
                &req.id,
                json!({
                    "ok": true,
                    "workspacePath": workspace_path.to_string_lossy(),
                    "bundleFormatDetected": import.bundle_format_detected
                }),
            )
        }
        Err(e) => err(&req.id, "db_open_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.exportWorkspace" => Some(handle_backup_export_workspace(state, req)),
        "backup.importWorkspace" => Some(handle_backup_import_workspace(state, req)),
        _ => None,
    }
}
