use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassGroup {
    pub id: String,
    pub name: String,
}

/// `class_id` is a loose reference: the class may have been deleted since.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub class_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExamType {
    #[serde(rename = "TYT")]
    Tyt,
    #[serde(rename = "AYT")]
    Ayt,
    #[serde(rename = "OTHER", alias = "DIGER")]
    Other,
}

impl ExamType {
    pub const ALL: [ExamType; 3] = [ExamType::Tyt, ExamType::Ayt, ExamType::Other];

    pub fn as_str(self) -> &'static str {
        match self {
            ExamType::Tyt => "TYT",
            ExamType::Ayt => "AYT",
            ExamType::Other => "OTHER",
        }
    }

    /// Anything unrecognized lands on `Other`, matching the registry fallback.
    pub fn parse_lenient(raw: &str) -> ExamType {
        match raw.trim().to_ascii_uppercase().as_str() {
            "TYT" => ExamType::Tyt,
            "AYT" => ExamType::Ayt,
            _ => ExamType::Other,
        }
    }
}

impl fmt::Display for ExamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectConfig {
    pub name: String,
    pub question_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "jsonKey")]
    pub external_key: Option<String>,
}

impl SubjectConfig {
    /// Key looked up in import records for this subject.
    pub fn import_key(&self) -> &str {
        self.external_key.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub exam_type: ExamType,
    pub date: NaiveDate,
    pub subjects: Vec<SubjectConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "pdfName")]
    pub source_document_name: Option<String>,
}

impl Exam {
    pub fn subject(&self, name: &str) -> Option<&SubjectConfig> {
        self.subjects.iter().find(|s| s.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectResult {
    pub correct: f64,
    pub incorrect: f64,
    pub net: f64,
}

/// One student's result for one exam. At most one exists per (exam_id, student_id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamResult {
    pub id: String,
    pub exam_id: String,
    pub student_id: String,
    pub results: BTreeMap<String, SubjectResult>,
    pub total_net: f64,
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
