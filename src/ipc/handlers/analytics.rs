use crate::aggregate::{self, DashboardFilter, SeriesFilter};
use crate::db;
use crate::error::EngineError;
use crate::ipc::error::{engine_err, engine_err_details, err, ok};
use crate::ipc::helpers::{db_conn, load_snapshot, optional_str, param_as, required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::ExamType;
use crate::stats;
use serde_json::json;

fn handle_analytics_series(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let filter: SeriesFilter = match serde_json::from_value(req.params.clone()) {
        Ok(f) => f,
        Err(e) => {
            return err(
                &req.id,
                "bad_params",
                format!("invalid series filter: {}", e),
                None,
            )
        }
    };
    let snapshot = match load_snapshot(conn, req) {
        Ok(s) => s,
        Err(e) => return e,
    };

    let points = aggregate::build_series(&snapshot.exams, &snapshot.results, &snapshot.students, &filter);
    ok(&req.id, json!({ "points": points }))
}

fn handle_analytics_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let snapshot = match load_snapshot(conn, req) {
        Ok(s) => s,
        Err(e) => return e,
    };

    let summary = stats::summarize(&snapshot.exams, &snapshot.results, &snapshot.students, &snapshot.classes);
    match serde_json::to_value(&summary) {
        Ok(v) => ok(&req.id, v),
        Err(e) => err(&req.id, "internal", e.to_string(), None),
    }
}

fn handle_analytics_exam_rankings(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let exam_id = match required_str(req, "examId") {
        Ok(v) => v,
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
    let Some(exam) = snapshot.exams.iter().find(|e| e.id == exam_id) else {
        return engine_err_details(
            &req.id,
            &EngineError::NotFound("exam not found".to_string()),
            Some(json!({ "examId": exam_id })),
        );
    };

    let rankings = stats::exam_rankings(
        exam,
        &snapshot.results,
        &snapshot.students,
        &snapshot.classes,
        class_id.as_deref(),
    );
    ok(
        &req.id,
        json!({
            "exam": exam,
            "rows": rankings.rows,
            "subjectAverages": rankings.subject_averages,
            "averageTotalNet": rankings.average_total_net,
        }),
    )
}

fn handle_analytics_filter_select_class(state: &mut AppState, req: &Request) -> serde_json::Value {
    let mut filter: DashboardFilter = match param_as(req, "filter") {
        Ok(f) => f,
        Err(e) => return e,
    };
    let class_id = match optional_str(req, "classId") {
        Ok(v) => v.filter(|c| !c.is_empty()),
        Err(e) => return e,
    };

    // Without a workspace nobody belongs to any class.
    let students = match state.db.as_ref() {
        Some(conn) => match db::list_students(conn) {
            Ok(s) => s,
            Err(e) => return engine_err(&req.id, &e),
        },
        None => Vec::new(),
    };
    filter.select_class(class_id, &students);
    filter_response(req, &filter)
}

fn filter_response(req: &Request, filter: &DashboardFilter) -> serde_json::Value {
    ok(
        &req.id,
        json!({ "filter": filter, "seriesFilter": filter.to_series_filter() }),
    )
}

fn handle_analytics_filter_new(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let exam_type: ExamType = match param_as(req, "type") {
        Ok(t) => t,
        Err(e) => return e,
    };
    filter_response(req, &DashboardFilter::new(exam_type))
}

fn handle_analytics_filter_select_type(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let mut filter: DashboardFilter = match param_as(req, "filter") {
        Ok(f) => f,
        Err(e) => return e,
    };
    let exam_type: ExamType = match param_as(req, "type") {
        Ok(t) => t,
        Err(e) => return e,
    };
    filter.select_type(exam_type);
    filter_response(req, &filter)
}

fn handle_analytics_filter_select_student(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let mut filter: DashboardFilter = match param_as(req, "filter") {
        Ok(f) => f,
        Err(e) => return e,
    };
    let student_id = match optional_str(req, "studentId") {
        Ok(v) => v.filter(|s| !s.is_empty()),
        Err(e) => return e,
    };
    filter.select_student(student_id);
    filter_response(req, &filter)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "analytics.series" => Some(handle_analytics_series(state, req)),
        "analytics.summary" => Some(handle_analytics_summary(state, req)),
        "analytics.exam.rankings" => Some(handle_analytics_exam_rankings(state, req)),
        "analytics.filter.new" => Some(handle_analytics_filter_new(state, req)),
        "analytics.filter.selectType" => Some(handle_analytics_filter_select_type(state, req)),
        "analytics.filter.selectClass" => Some(handle_analytics_filter_select_class(state, req)),
        "analytics.filter.selectStudent" => Some(handle_analytics_filter_select_student(state, req)),
        _ => None,
    }
}
