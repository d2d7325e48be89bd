//! Seam to the external narrative report generator.

use crate::error::{EngineError, EngineResult};
use crate::model::{Exam, ExamResult};
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;
use std::process::{Command, Stdio};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoachingInput {
    pub student_name: String,
    /// Oldest exam first.
    pub results: Vec<ExamResult>,
    pub exams: Vec<Exam>,
}

impl CoachingInput {
    /// Collects `student_id`'s results ordered by exam date. Results for
    /// exams that no longer exist are dropped.
    pub fn for_student(student_name: &str, student_id: &str, results: &[ExamResult], exams: &[Exam]) -> Self {
        let exam_by_id: HashMap<&str, &Exam> = exams.iter().map(|e| (e.id.as_str(), e)).collect();
        let mut own: Vec<(&Exam, &ExamResult)> = results
            .iter()
            .filter(|r| r.student_id == student_id)
            .filter_map(|r| exam_by_id.get(r.exam_id.as_str()).map(|e| (*e, r)))
            .collect();
        own.sort_by_key(|(e, _)| e.date);
        Self {
            student_name: student_name.to_string(),
            results: own.into_iter().map(|(_, r)| r.clone()).collect(),
            exams: exams.to_vec(),
        }
    }
}

pub trait Coach {
    fn analyze(&self, input: &CoachingInput) -> EngineResult<String>;
}

pub struct UnconfiguredCoach;

impl Coach for UnconfiguredCoach {
    fn analyze(&self, _input: &CoachingInput) -> EngineResult<String> {
        Err(EngineError::ExternalService(
            "coaching service is not configured".to_string(),
        ))
    }
}

/// Runs an external program: input JSON on stdin, report text on stdout.
pub struct CommandCoach {
    program: String,
    args: Vec<String>,
}

impl CommandCoach {
    /// `command_line` is split on whitespace: program first, then arguments.
    pub fn from_command_line(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl Coach for CommandCoach {
    fn analyze(&self, input: &CoachingInput) -> EngineResult<String> {
        let payload = serde_json::to_vec(input)?;
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| EngineError::ExternalService(format!("failed to start {}: {}", self.program, e)))?;

        // Feed stdin from another thread so a chatty child cannot block on a full stdout pipe.
        let writer = child.stdin.take().map(|mut stdin| {
            std::thread::spawn(move || stdin.write_all(&payload))
        });
        let output = child
            .wait_with_output()
            .map_err(|e| EngineError::ExternalService(e.to_string()))?;
        if let Some(handle) = writer {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                Ok(Err(e)) => {
                    return Err(EngineError::ExternalService(format!("failed to send input: {}", e)))
                }
                Err(_) => {
                    return Err(EngineError::ExternalService("input writer panicked".to_string()))
                }
            }
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("coaching service failed ({})", output.status)
            } else {
                stderr
            };
            return Err(EngineError::ExternalService(message));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

pub fn coach_from_config(command_line: Option<&str>) -> Box<dyn Coach> {
    match command_line.and_then(CommandCoach::from_command_line) {
        Some(c) => Box::new(c),
        None => Box::new(UnconfiguredCoach),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExamType;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn exam(id: &str, month: u32) -> Exam {
        Exam {
            id: id.into(),
            name: id.into(),
            exam_type: ExamType::Tyt,
            date: NaiveDate::from_ymd_opt(2025, month, 1).expect("date"),
            subjects: crate::subjects::subjects_for_type(ExamType::Tyt),
            source_document_name: None,
        }
    }

    fn result(exam_id: &str, student_id: &str) -> ExamResult {
        ExamResult {
            id: format!("{}-{}", exam_id, student_id),
            exam_id: exam_id.into(),
            student_id: student_id.into(),
            results: BTreeMap::new(),
            total_net: 1.0,
        }
    }

    #[test]
    fn input_orders_results_by_exam_date() {
        let exams = vec![exam("dec", 12), exam("oct", 10)];
        let results = vec![result("dec", "s1"), result("oct", "s1"), result("oct", "s2"), result("gone", "s1")];
        let input = CoachingInput::for_student("Ali", "s1", &results, &exams);
        let order: Vec<&str> = input.results.iter().map(|r| r.exam_id.as_str()).collect();
        assert_eq!(order, vec!["oct", "dec"]);
        assert_eq!(input.exams.len(), 2);
    }

    #[test]
    fn unconfigured_coach_fails_with_message() {
        let input = CoachingInput::for_student("Ali", "s1", &[], &[]);
        let e = coach_from_config(None).analyze(&input).unwrap_err();
        assert_eq!(e.code(), "external_service_failed");
        assert_eq!(e.to_string(), "coaching service is not configured");
        assert!(coach_from_config(Some("   ")).analyze(&input).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn command_coach_returns_stdout_or_surfaces_failure() {
        let input = CoachingInput::for_student("Ali", "s1", &[], &[]);
        let echo = CommandCoach::from_command_line("cat").expect("coach");
        let report = echo.analyze(&input).expect("report");
        assert!(report.contains("\"studentName\":\"Ali\""));

        let failing = CommandCoach::from_command_line("false").expect("coach");
        let e = failing.analyze(&input).unwrap_err();
        assert!(e.to_string().contains("coaching service failed"));
    }
}
