mod test_support;

use serde_json::json;
use test_support::{
    create_class, create_exam, create_student, open_workspace, request_err, request_ok, spawn_sidecar,
    spawn_sidecar_with_env,
};

#[test]
fn unconfigured_coach_reports_an_external_service_error() {
    let mut sidecar = spawn_sidecar();
    let workspace = open_workspace(&mut sidecar, "netokul-coach-off");
    let class_a = create_class(&mut sidecar, "12-A");
    let ali = create_student(&mut sidecar, "Ali", &class_a);

    let (code, message) = request_err(&mut sidecar, "coach", "coach.analyze", json!({ "studentId": ali }));
    assert_eq!(code, "external_service_failed");
    assert_eq!(message, "coaching service is not configured");

    let (code, _) = request_err(&mut sidecar, "ghost", "coach.analyze", json!({ "studentId": "ghost" }));
    assert_eq!(code, "not_found");

    let _ = std::fs::remove_dir_all(workspace);
}

#[cfg(unix)]
#[test]
fn command_coach_receives_the_students_history_in_date_order() {
    let mut sidecar = spawn_sidecar_with_env(&[("NETOKUL_COACH_COMMAND", "cat")]);
    let workspace = open_workspace(&mut sidecar, "netokul-coach-cat");
    let class_a = create_class(&mut sidecar, "12-A");
    let ali = create_student(&mut sidecar, "Ali", &class_a);
    let later = create_exam(&mut sidecar, "TYT-2", "TYT", "2025-12-01");
    let earlier = create_exam(&mut sidecar, "TYT-1", "TYT", "2025-10-01");
    for (exam, net) in [(&later, 40), (&earlier, 30)] {
        request_ok(
            &mut sidecar,
            "score",
            "results.upsert",
            json!({ "examId": exam["id"], "studentId": ali, "scores": { "Türkçe": net } }),
        );
    }

    let res = request_ok(&mut sidecar, "coach", "coach.analyze", json!({ "studentId": ali }));
    // `cat` echoes the input document back as the report.
    let echoed: serde_json::Value =
        serde_json::from_str(res["report"].as_str().expect("report")).expect("input json");
    assert_eq!(echoed["studentName"], json!("Ali"));
    let order: Vec<&serde_json::Value> = echoed["results"]
        .as_array()
        .expect("results")
        .iter()
        .map(|r| &r["examId"])
        .collect();
    assert_eq!(order, vec![&earlier["id"], &later["id"]]);
    assert_eq!(echoed["exams"].as_array().map(|a| a.len()), Some(2));

    let _ = std::fs::remove_dir_all(workspace);
}

#[cfg(unix)]
#[test]
fn failing_command_coach_surfaces_the_failure() {
    let mut sidecar = spawn_sidecar_with_env(&[("NETOKUL_COACH_COMMAND", "false")]);
    let workspace = open_workspace(&mut sidecar, "netokul-coach-false");
    let class_a = create_class(&mut sidecar, "12-A");
    let ali = create_student(&mut sidecar, "Ali", &class_a);

    let (code, message) = request_err(&mut sidecar, "coach", "coach.analyze", json!({ "studentId": ali }));
    assert_eq!(code, "external_service_failed");
    assert!(message.starts_with("coaching service failed"), "{}", message);

    let _ = std::fs::remove_dir_all(workspace);
}
