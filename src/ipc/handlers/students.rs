use crate::db;
use crate::error::EngineError;
use crate::ipc::error::{engine_err, engine_err_details, err, ok};
use crate::ipc::helpers::{db_conn, load_snapshot, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::{new_id, Student};
use serde_json::json;

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let class_id = match optional_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let snapshot = match load_snapshot(conn, req) {
        Ok(s) => s,
        Err(e) => return e,
    };

    let students: Vec<serde_json::Value> = snapshot
        .students
        .iter()
        .filter(|s| class_id.as_deref().map_or(true, |cid| s.class_id == cid))
        .map(|s| {
            json!({
                "id": s.id,
                "name": s.name,
                "classId": s.class_id,
                "className": snapshot.class_name(&s.class_id),
            })
        })
        .collect();
    ok(&req.id, json!({ "students": students }))
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v.split_whitespace().collect::<Vec<_>>().join(" "),
        Err(e) => return e,
    };
    if name.is_empty() {
        return err(&req.id, "bad_params", "name must not be empty", None);
    }
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    match db::get_class(conn, &class_id) {
        Ok(Some(_)) => {}
        Ok(None) => {
            return engine_err_details(
                &req.id,
                &EngineError::NotFound("class not found".to_string()),
                Some(json!({ "classId": class_id })),
            )
        }
        Err(e) => return engine_err(&req.id, &e),
    }

    let student = Student {
        id: new_id(),
        name,
        class_id,
    };
    if let Err(e) = db::upsert_student(conn, &student) {
        return engine_err(&req.id, &e);
    }
    tracing::info!(student_id = %student.id, class_id = %student.class_id, "student created");
    ok(&req.id, json!({ "studentId": student.id }))
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    match db::delete_student_cascade(conn, &student_id) {
        Ok(Some(deleted_results)) => {
            tracing::info!(%student_id, deleted_results, "student deleted");
            ok(&req.id, json!({ "ok": true, "deletedResults": deleted_results }))
        }
        Ok(None) => engine_err_details(
            &req.id,
            &EngineError::NotFound("student not found".to_string()),
            Some(json!({ "studentId": student_id })),
        ),
        Err(e) => engine_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        _ => None,
    }
}
