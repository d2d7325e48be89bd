mod test_support;

use serde_json::json;
use test_support::{request, request_err, request_ok, spawn_sidecar, temp_dir};

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("netokul-router-smoke");
    let bundle_out = workspace.join("smoke-backup.zip");

    let mut sidecar = spawn_sidecar();

    let health = request_ok(&mut sidecar, "1", "health", json!({}));
    assert!(health["workspacePath"].is_null());

    for (i, method) in [
        "classes.list",
        "students.list",
        "exams.list",
        "results.list",
        "analytics.summary",
        "backup.exportWorkspace",
    ]
    .iter()
    .enumerate()
    {
        let (code, _) = request_err(&mut sidecar, &format!("nows-{}", i), method, json!({}));
        assert_eq!(code, "no_workspace", "{}", method);
    }

    let defaults = request_ok(&mut sidecar, "2", "subjects.defaults", json!({ "type": "TYT" }));
    assert_eq!(defaults["subjects"].as_array().map(|a| a.len()), Some(4));

    request_ok(
        &mut sidecar,
        "3",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert!(workspace.join("netokul.sqlite3").is_file());

    let class = request_ok(&mut sidecar, "4", "classes.create", json!({ "name": "12-A" }));
    let class_id = class["classId"].as_str().expect("classId").to_string();
    let student = request_ok(
        &mut sidecar,
        "5",
        "students.create",
        json!({ "name": "Ali Can", "classId": class_id }),
    );
    let student_id = student["studentId"].as_str().expect("studentId").to_string();
    let exam = request_ok(
        &mut sidecar,
        "6",
        "exams.create",
        json!({ "name": "TYT-1", "type": "TYT", "date": "2025-10-05" }),
    );
    let exam_id = exam["exam"]["id"].as_str().expect("exam id").to_string();

    let calls = vec![
        ("7", "classes.list", json!({})),
        ("8", "students.list", json!({ "classId": class_id })),
        ("9", "exams.list", json!({ "type": "TYT" })),
        (
            "10",
            "results.upsert",
            json!({
                "examId": exam_id,
                "studentId": student_id,
                "scores": { "Türkçe": { "correct": 30, "incorrect": 4 } }
            }),
        ),
        ("11", "results.list", json!({ "examId": exam_id })),
        ("12", "results.export", json!({ "examId": exam_id })),
        ("13", "analytics.series", json!({ "type": "TYT" })),
        ("14", "analytics.summary", json!({})),
        ("15", "analytics.exam.rankings", json!({ "examId": exam_id })),
        ("16", "analytics.filter.new", json!({ "type": "TYT" })),
        (
            "17",
            "backup.exportWorkspace",
            json!({ "outPath": bundle_out.to_string_lossy() }),
        ),
    ];
    for (id, method, params) in calls {
        request_ok(&mut sidecar, id, method, params);
    }

    let (code, _) = request_err(&mut sidecar, "18", "coach.analyze", json!({ "studentId": student_id }));
    assert_eq!(code, "external_service_failed");

    let unknown = request(&mut sidecar, "19", "nope.method", json!({}));
    assert_eq!(unknown["error"]["code"], json!("not_implemented"));

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn malformed_request_lines_get_bad_json() {
    use std::io::{BufRead, Write};

    let mut sidecar = spawn_sidecar();
    writeln!(sidecar.stdin, "{{not json").expect("write");
    sidecar.stdin.flush().expect("flush");
    let mut line = String::new();
    sidecar.reader.read_line(&mut line).expect("read");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("json");
    assert_eq!(value["ok"], json!(false));
    assert_eq!(value["error"]["code"], json!("bad_json"));

    // The loop keeps serving after a bad line.
    request_ok(&mut sidecar, "after", "health", json!({}));
}
