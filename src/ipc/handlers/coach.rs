use crate::coach::CoachingInput;
use crate::error::EngineError;
use crate::ipc::error::{engine_err, engine_err_details, ok};
use crate::ipc::helpers::{db_conn, load_snapshot, required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_coach_analyze(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let snapshot = match load_snapshot(conn, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let Some(student) = snapshot.students.iter().find(|s| s.id == student_id) else {
        return engine_err_details(
            &req.id,
            &EngineError::NotFound("student not found".to_string()),
            Some(json!({ "studentId": student_id })),
        );
    };

    let input = CoachingInput::for_student(&student.name, &student.id, &snapshot.results, &snapshot.exams);
    match state.coach.analyze(&input) {
        Ok(report) => ok(&req.id, json!({ "report": report })),
        Err(e) => {
            tracing::warn!(%student_id, error = %e, "coaching request failed");
            engine_err(&req.id, &e)
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "coach.analyze" => Some(handle_coach_analyze(state, req)),
        _ => None,
    }
}
