use crate::db;
use crate::import::{self, ImportContext};
use crate::error::EngineError;
use crate::ipc::error::{engine_err, engine_err_details, err, ok};
use crate::ipc::helpers::{db_conn, load_exam, load_snapshot, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::{new_id, ExamResult};
use crate::scoring;
use serde_json::json;

fn handle_results_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let exam_id = match optional_str(req, "examId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match optional_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let results = match (exam_id.as_deref(), student_id.as_deref()) {
        (Some(eid), Some(sid)) => db::result_find(conn, eid, sid).map(|r| r.into_iter().collect::<Vec<_>>()),
        (Some(eid), None) => db::results_for_exam(conn, eid),
        (None, _) => db::list_results(conn).map(|all| {
            all.into_iter()
                .filter(|r| student_id.as_deref().map_or(true, |sid| r.student_id == sid))
                .collect::<Vec<_>>()
        }),
    };
    match results {
        Ok(results) => ok(&req.id, json!({ "results": results })),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_results_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let exam_id = match required_str(req, "examId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(scores) = req.params.get("scores").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing scores", None);
    };

    let exam = match load_exam(conn, req, &exam_id) {
        Ok(e) => e,
        Err(e) => return e,
    };
    match db::get_student(conn, &student_id) {
        Ok(Some(_)) => {}
        Ok(None) => {
            return engine_err_details(
                &req.id,
                &EngineError::NotFound("student not found".to_string()),
                Some(json!({ "studentId": student_id })),
            )
        }
        Err(e) => return engine_err(&req.id, &e),
    }

    let (results, warnings) = match import::score_manual_entry(&exam, scores) {
        Ok(v) => v,
        Err(e) => return engine_err(&req.id, &e),
    };
    let id = match db::result_find(conn, &exam.id, &student_id) {
        Ok(Some(existing)) => existing.id,
        Ok(None) => new_id(),
        Err(e) => return engine_err(&req.id, &e),
    };
    let total_net = scoring::compute_total_net(&results);
    let result = ExamResult {
        id,
        exam_id: exam.id.clone(),
        student_id,
        results,
        total_net,
    };
    if let Err(e) = db::upsert_result(conn, &result) {
        return engine_err(&req.id, &e);
    }
    ok(&req.id, json!({ "result": result, "warnings": warnings }))
}

fn handle_results_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let exam_id = match required_str(req, "examId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(records) = req.params.get("records").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "records must be an array", None);
    };

    let exam = match load_exam(conn, req, &exam_id) {
        Ok(e) => e,
        Err(e) => return e,
    };
    let snapshot = match load_snapshot(conn, req) {
        Ok(s) => s,
        Err(e) => return e,
    };

    let ctx = ImportContext {
        exam: &exam,
        students: &snapshot.students,
        classes: &snapshot.classes,
        existing: &snapshot.results,
    };
    let outcome = import::import_values(&ctx, records, new_id);
    if let Err(e) = db::results_upsert_batch(conn, &outcome.accepted) {
        return engine_err(&req.id, &e);
    }
    tracing::info!(
        exam_id = %exam.id,
        accepted = outcome.accepted.len(),
        rejected = outcome.rejected.len(),
        warnings = outcome.warnings.len(),
        "results imported"
    );

    match serde_json::to_value(&outcome) {
        Ok(v) => ok(&req.id, v),
        Err(e) => err(&req.id, "internal", e.to_string(), None),
    }
}

fn handle_results_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let exam_id = match required_str(req, "examId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let exam = match load_exam(conn, req, &exam_id) {
        Ok(e) => e,
        Err(e) => return e,
    };
    let snapshot = match load_snapshot(conn, req) {
        Ok(s) => s,
        Err(e) => return e,
    };

    let records = import::export_records(&exam, &snapshot.results, &snapshot.students, &snapshot.classes);
    ok(&req.id, json!({ "records": records }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "results.list" => Some(handle_results_list(state, req)),
        "results.upsert" => Some(handle_results_upsert(state, req)),
        "results.import" => Some(handle_results_import(state, req)),
        "results.export" => Some(handle_results_export(state, req)),
        _ => None,
    }
}
