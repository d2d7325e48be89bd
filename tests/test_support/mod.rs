#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub struct Sidecar {
    pub child: Child,
    pub stdin: ChildStdin,
    pub reader: BufReader<ChildStdout>,
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub fn spawn_sidecar() -> Sidecar {
    spawn_sidecar_with_env(&[])
}

/// The NETOKUL_* variables are cleared first so a developer's shell or `.env`
/// cannot leak into the child.
pub fn spawn_sidecar_with_env(env: &[(&str, &str)]) -> Sidecar {
    spawn_with(env, Stdio::null())
}

/// Same as `spawn_sidecar`, with the sidecar's log output written to `log_path`.
pub fn spawn_sidecar_logging_to(log_path: &Path) -> Sidecar {
    let log = File::create(log_path).expect("create log file");
    spawn_with(&[], Stdio::from(log))
}

fn spawn_with(env: &[(&str, &str)], stderr: Stdio) -> Sidecar {
    let exe = env!("CARGO_BIN_EXE_netokuld");
    let mut cmd = Command::new(exe);
    cmd.env_remove("NETOKUL_WORKSPACE")
        .env_remove("NETOKUL_COACH_COMMAND")
        .env("NETOKUL_LOG", "warn")
        .current_dir(std::env::temp_dir());
    for (k, v) in env {
        cmd.env(k, v);
    }
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(stderr)
        .spawn()
        .expect("spawn netokuld");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    Sidecar {
        child,
        stdin,
        reader: BufReader::new(stdout),
    }
}

pub fn request(
    sidecar: &mut Sidecar,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(sidecar.stdin, "{}", payload).expect("write request");
    sidecar.stdin.flush().expect("flush request");

    let mut line = String::new();
    sidecar
        .reader
        .read_line(&mut line)
        .expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    sidecar: &mut Sidecar,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(sidecar, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or(serde_json::Value::Null)
}

/// Returns the error code of a failed response, panicking if it succeeded.
pub fn request_err(
    sidecar: &mut Sidecar,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> (String, String) {
    let value = request(sidecar, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    let error = value.get("error").cloned().unwrap_or_default();
    (
        error
            .get("code")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        error
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
    )
}

pub fn open_workspace(sidecar: &mut Sidecar, prefix: &str) -> PathBuf {
    let workspace = temp_dir(prefix);
    request_ok(
        sidecar,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    workspace
}

pub fn create_class(sidecar: &mut Sidecar, name: &str) -> String {
    let res = request_ok(sidecar, "class", "classes.create", json!({ "name": name }));
    res["classId"].as_str().expect("classId").to_string()
}

pub fn create_student(sidecar: &mut Sidecar, name: &str, class_id: &str) -> String {
    let res = request_ok(
        sidecar,
        "student",
        "students.create",
        json!({ "name": name, "classId": class_id }),
    );
    res["studentId"].as_str().expect("studentId").to_string()
}

pub fn create_exam(sidecar: &mut Sidecar, name: &str, exam_type: &str, date: &str) -> serde_json::Value {
    let res = request_ok(
        sidecar,
        "exam",
        "exams.create",
        json!({ "name": name, "type": exam_type, "date": date }),
    );
    res["exam"].clone()
}
