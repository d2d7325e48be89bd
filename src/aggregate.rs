//! Time series for the dashboard chart.
//!
//! `build_series` is stateless: everything it needs arrives in the
//! arguments. Two kinds of "nothing" stay distinct:
//! - an average over an empty set is `0.0`, so the chart keeps a baseline;
//! - a student without a result for an exam has no value (`null`), never `0`.

use crate::model::{Exam, ExamResult, ExamType, Student};
use crate::scoring::{mean, round2};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const LABEL_MAX_CHARS: usize = 20;
const LABEL_ELLIPSIS: &str = "...";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesFilter {
    #[serde(rename = "type")]
    pub exam_type: ExamType,
    #[serde(default)]
    pub class_id: Option<String>,
    #[serde(default)]
    pub student_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPoint {
    pub exam_id: String,
    /// Chart label, truncated to `LABEL_MAX_CHARS` characters.
    pub name: String,
    pub full_name: String,
    pub date: chrono::NaiveDate,
    pub school_avg: f64,
    /// Present only with a class filter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_avg: Option<f64>,
    /// Present only with a student filter; the inner `None` serializes as `null`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_net: Option<Option<f64>>,
}

pub fn display_label(name: &str) -> String {
    if name.chars().count() > LABEL_MAX_CHARS {
        let head: String = name.chars().take(LABEL_MAX_CHARS).collect();
        format!("{}{}", head, LABEL_ELLIPSIS)
    } else {
        name.to_string()
    }
}

fn avg_or_zero<'r, I>(results: I) -> f64
where
    I: IntoIterator<Item = &'r ExamResult>,
{
    mean(results.into_iter().map(|r| r.total_net))
        .map(round2)
        .unwrap_or(0.0)
}

/// One point per exam of `filter.exam_type`, oldest first.
///
/// The class filter only drives `class_avg`; `student_net` is reported
/// wherever the student has a result, whatever class they are in.
pub fn build_series(
    exams: &[Exam],
    results: &[ExamResult],
    students: &[Student],
    filter: &SeriesFilter,
) -> Vec<DataPoint> {
    let mut selected: Vec<&Exam> = exams.iter().filter(|e| e.exam_type == filter.exam_type).collect();
    // Stable: same-day exams keep their stored order.
    selected.sort_by_key(|e| e.date);

    let class_members: Option<HashSet<&str>> = filter.class_id.as_deref().map(|cid| {
        students
            .iter()
            .filter(|s| s.class_id == cid)
            .map(|s| s.id.as_str())
            .collect()
    });

    selected
        .into_iter()
        .map(|exam| {
            let exam_results: Vec<&ExamResult> = results.iter().filter(|r| r.exam_id == exam.id).collect();

            let class_avg = class_members.as_ref().map(|members| {
                avg_or_zero(
                    exam_results
                        .iter()
                        .copied()
                        .filter(|r| members.contains(r.student_id.as_str())),
                )
            });
            let student_net = filter.student_id.as_deref().map(|sid| {
                exam_results
                    .iter()
                    .find(|r| r.student_id == sid)
                    .map(|r| r.total_net)
            });

            DataPoint {
                exam_id: exam.id.clone(),
                name: display_label(&exam.name),
                full_name: exam.name.clone(),
                date: exam.date,
                school_avg: avg_or_zero(exam_results.iter().copied()),
                class_avg,
                student_net,
            }
        })
        .collect()
}

/// Dashboard selection state. The student selection depends on the class
/// selection and is cleared when it no longer fits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardFilter {
    #[serde(rename = "type")]
    pub exam_type: ExamType,
    #[serde(default)]
    pub class_id: Option<String>,
    #[serde(default)]
    pub student_id: Option<String>,
}

impl DashboardFilter {
    pub fn new(exam_type: ExamType) -> Self {
        Self {
            exam_type,
            class_id: None,
            student_id: None,
        }
    }

    pub fn select_type(&mut self, exam_type: ExamType) {
        self.exam_type = exam_type;
    }

    /// `None` selects the whole school and keeps the student.
    pub fn select_class(&mut self, class_id: Option<String>, students: &[Student]) {
        if let (Some(cid), Some(sid)) = (class_id.as_deref(), self.student_id.as_deref()) {
            let belongs = students.iter().any(|s| s.id == sid && s.class_id == cid);
            if !belongs {
                self.student_id = None;
            }
        }
        self.class_id = class_id;
    }

    pub fn select_student(&mut self, student_id: Option<String>) {
        self.student_id = student_id;
    }

    pub fn to_series_filter(&self) -> SeriesFilter {
        SeriesFilter {
            exam_type: self.exam_type,
            class_id: self.class_id.clone(),
            student_id: self.student_id.clone(),
        }
    }
}
