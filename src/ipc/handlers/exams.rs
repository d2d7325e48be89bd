use crate::db;
use crate::error::EngineError;
use crate::ipc::error::{engine_err, engine_err_details, err, ok};
use crate::ipc::helpers::{db_conn, load_exam, param_as, required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::{new_id, Exam, ExamType, SubjectConfig};
use crate::subjects;
use chrono::NaiveDate;
use serde_json::json;

fn parse_date(req: &Request, key: &str) -> Result<NaiveDate, serde_json::Value> {
    let raw = required_str(req, key)?;
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        err(
            &req.id,
            "bad_params",
            format!("{} must be YYYY-MM-DD", key),
            Some(json!({ key: raw })),
        )
    })
}

fn parse_subjects(req: &Request) -> Result<Vec<SubjectConfig>, serde_json::Value> {
    let list: Vec<SubjectConfig> = param_as(req, "subjects")?;
    subjects::validate_subjects(&list).map_err(|m| err(&req.id, "bad_params", m, None))?;
    Ok(list)
}

/// Present-but-null clears the field, so this is `Option<Option<_>>`.
fn source_document_param(req: &Request) -> Result<Option<Option<String>>, serde_json::Value> {
    match req.params.get("sourceDocumentName") {
        None => Ok(None),
        Some(serde_json::Value::Null) => Ok(Some(None)),
        Some(serde_json::Value::String(s)) => {
            let s = s.trim();
            Ok(Some((!s.is_empty()).then(|| s.to_string())))
        }
        Some(_) => Err(err(
            &req.id,
            "bad_params",
            "sourceDocumentName must be a string",
            None,
        )),
    }
}

fn handle_subjects_defaults(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let raw = match required_str(req, "type") {
        Ok(v) => v,
        Err(e) => return e,
    };
    ok(
        &req.id,
        json!({
            "type": ExamType::parse_lenient(&raw),
            "subjects": subjects::subjects_for_type_name(&raw),
        }),
    )
}

fn handle_exams_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let exam_type: Option<ExamType> = match req.params.get("type") {
        None | Some(serde_json::Value::Null) => None,
        Some(_) => match param_as(req, "type") {
            Ok(t) => Some(t),
            Err(e) => return e,
        },
    };

    let mut exams = match db::list_exams(conn) {
        Ok(v) => v,
        Err(e) => return engine_err(&req.id, &e),
    };
    if let Some(t) = exam_type {
        exams.retain(|e| e.exam_type == t);
    }
    exams.sort_by_key(|e| e.date);
    ok(&req.id, json!({ "exams": exams }))
}

fn handle_exams_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v.trim().to_string(),
        Err(e) => return e,
    };
    if name.is_empty() {
        return err(&req.id, "bad_params", "name must not be empty", None);
    }
    let exam_type: ExamType = match param_as(req, "type") {
        Ok(t) => t,
        Err(e) => return e,
    };
    let date = match parse_date(req, "date") {
        Ok(d) => d,
        Err(e) => return e,
    };
    let subjects = if req.params.get("subjects").map_or(true, |v| v.is_null()) {
        subjects::subjects_for_type(exam_type)
    } else {
        match parse_subjects(req) {
            Ok(s) => s,
            Err(e) => return e,
        }
    };
    let source_document_name = match source_document_param(req) {
        Ok(v) => v.flatten(),
        Err(e) => return e,
    };

    let exam = Exam {
        id: new_id(),
        name,
        exam_type,
        date,
        subjects,
        source_document_name,
    };
    if let Err(e) = db::upsert_exam(conn, &exam) {
        return engine_err(&req.id, &e);
    }
    tracing::info!(exam_id = %exam.id, exam_type = %exam.exam_type, "exam created");
    ok(&req.id, json!({ "exam": exam }))
}

fn handle_exams_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let exam_id = match required_str(req, "examId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut exam = match load_exam(conn, req, &exam_id) {
        Ok(e) => e,
        Err(e) => return e,
    };

    if req.params.get("name").is_some() {
        let name = match required_str(req, "name") {
            Ok(v) => v.trim().to_string(),
            Err(e) => return e,
        };
        if name.is_empty() {
            return err(&req.id, "bad_params", "name must not be empty", None);
        }
        exam.name = name;
    }
    if req.params.get("date").is_some() {
        exam.date = match parse_date(req, "date") {
            Ok(d) => d,
            Err(e) => return e,
        };
    }
    match source_document_param(req) {
        Ok(Some(v)) => exam.source_document_name = v,
        Ok(None) => {}
        Err(e) => return e,
    }
    if req.params.get("subjects").is_some() {
        let subjects = match parse_subjects(req) {
            Ok(s) => s,
            Err(e) => return e,
        };
        if subjects != exam.subjects {
            // Stored nets are keyed by subject name; changing the list would strand them.
            match db::count_results_for_exam(conn, &exam.id) {
                Ok(0) => {}
                Ok(n) => {
                    return engine_err_details(
                        &req.id,
                        &EngineError::Conflict("subjects cannot change once results exist".to_string()),
                        Some(json!({ "examId": exam.id, "resultCount": n })),
                    )
                }
                Err(e) => return engine_err(&req.id, &e),
            }
            exam.subjects = subjects;
        }
    }

    if let Err(e) = db::upsert_exam(conn, &exam) {
        return engine_err(&req.id, &e);
    }
    ok(&req.id, json!({ "exam": exam }))
}

fn handle_exams_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let exam_id = match required_str(req, "examId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    match db::delete_exam_cascade(conn, &exam_id) {
        Ok(Some(deleted_results)) => {
            tracing::info!(%exam_id, deleted_results, "exam deleted");
            ok(&req.id, json!({ "ok": true, "deletedResults": deleted_results }))
        }
        Ok(None) => engine_err_details(
            &req.id,
            &EngineError::NotFound("exam not found".to_string()),
            Some(json!({ "examId": exam_id })),
        ),
        Err(e) => engine_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.defaults" => Some(handle_subjects_defaults(state, req)),
        "exams.list" => Some(handle_exams_list(state, req)),
        "exams.create" => Some(handle_exams_create(state, req)),
        "exams.update" => Some(handle_exams_update(state, req)),
        "exams.delete" => Some(handle_exams_delete(state, req)),
        _ => None,
    }
}
