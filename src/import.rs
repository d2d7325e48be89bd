//! Normalizes externally supplied per-student score records into `ExamResult`s.
//!
//! External subject keys are resolved here, once per exam, through each
//! subject's `import_key()`. Nothing downstream of this module looks at
//! external keys.

use crate::error::{EngineError, EngineResult};
use crate::model::{ClassGroup, Exam, ExamResult, Student, SubjectResult};
use crate::scoring;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Tolerance for the `netTotal` cross-check.
const NET_TOTAL_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedExamData {
    #[serde(default, alias = "exam_id")]
    pub exam_id: String,
    #[serde(alias = "student_name")]
    pub student_name: String,
    #[serde(default, alias = "class_name")]
    pub class_name: String,
    #[serde(default)]
    pub rank: Option<f64>,
    #[serde(default, alias = "net_total")]
    pub net_total: Option<f64>,
    #[serde(default)]
    pub details: BTreeMap<String, serde_json::Value>,
}

/// A single subject value as sent by the source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DetailValue {
    Net(f64),
    Counts { correct: f64, incorrect: f64 },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    pub index: usize,
    pub student_name: Option<String>,
    pub class_name: Option<String>,
    pub reason: String,
    pub record: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportWarning {
    pub index: usize,
    pub student_name: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub accepted: Vec<ExamResult>,
    pub rejected: Vec<Rejection>,
    pub warnings: Vec<ImportWarning>,
    pub created: usize,
    pub updated: usize,
}

pub struct ImportContext<'a> {
    pub exam: &'a Exam,
    pub students: &'a [Student],
    pub classes: &'a [ClassGroup],
    /// Stored results; only entries for `exam` are consulted.
    pub existing: &'a [ExamResult],
}

/// trim, collapse whitespace, lowercase, drop U+0307 so "İ" and "i" compare equal.
pub fn normalize_name(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .chars()
        .filter(|c| *c != '\u{307}')
        .collect()
}

fn parse_number(v: &serde_json::Value) -> Option<f64> {
    let n = match v {
        serde_json::Value::Number(n) => n.as_f64(),
        // Some exports use a decimal comma.
        serde_json::Value::String(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|x| x.is_finite())
}

/// `Ok(None)` means the key is present but null, treated like an absent key.
pub fn parse_detail(v: &serde_json::Value) -> Result<Option<DetailValue>, ()> {
    match v {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::Object(obj) => {
            let correct = obj.get("correct").and_then(parse_number).ok_or(())?;
            let incorrect = match obj.get("incorrect") {
                None | Some(serde_json::Value::Null) => 0.0,
                Some(raw) => parse_number(raw).ok_or(())?,
            };
            if correct < 0.0 || incorrect < 0.0 {
                return Err(());
            }
            Ok(Some(DetailValue::Counts { correct, incorrect }))
        }
        other => parse_number(other).map(|n| Some(DetailValue::Net(n))).ok_or(()),
    }
}

struct Importer<'a> {
    ctx: &'a ImportContext<'a>,
    existing_ids: HashMap<&'a str, &'a str>,
    /// Import keys claimed by more than one subject of the exam.
    shared_keys: HashSet<&'a str>,
}

impl<'a> Importer<'a> {
    fn new(ctx: &'a ImportContext<'a>) -> Self {
        let existing_ids = ctx
            .existing
            .iter()
            .filter(|r| r.exam_id == ctx.exam.id)
            .map(|r| (r.student_id.as_str(), r.id.as_str()))
            .collect();
        let mut seen = HashSet::new();
        let shared_keys = ctx
            .exam
            .subjects
            .iter()
            .map(|s| s.import_key())
            .filter(|key| !seen.insert(*key))
            .collect();
        Self { ctx, existing_ids, shared_keys }
    }

    fn resolve_student(&self, student_name: &str, class_name: &str) -> Result<&'a Student, String> {
        let wanted = normalize_name(student_name);
        if wanted.is_empty() {
            return Err("student not found".to_string());
        }
        let class_key = normalize_name(class_name);
        let candidates: Vec<&'a Student> = if class_key.is_empty() {
            self.ctx.students.iter().collect()
        } else {
            let class_ids: Vec<&str> = self
                .ctx
                .classes
                .iter()
                .filter(|c| normalize_name(&c.name) == class_key)
                .map(|c| c.id.as_str())
                .collect();
            if class_ids.is_empty() {
                return Err("class not found".to_string());
            }
            self.ctx
                .students
                .iter()
                .filter(|s| class_ids.contains(&s.class_id.as_str()))
                .collect()
        };

        let mut matches = candidates
            .into_iter()
            .filter(|s| normalize_name(&s.name) == wanted);
        match (matches.next(), matches.next()) {
            (Some(s), None) => Ok(s),
            (Some(_), Some(_)) => Err("ambiguous student".to_string()),
            (None, _) => Err("student not found".to_string()),
        }
    }

    /// Builds the subject map for one record, plus soft-constraint warnings.
    fn build_subjects(
        &self,
        record: &ImportedExamData,
    ) -> Result<(BTreeMap<String, SubjectResult>, Vec<String>), String> {
        let mut results = BTreeMap::new();
        let mut warnings = Vec::new();
        for subject in &self.ctx.exam.subjects {
            let key = subject.import_key();
            let Some(raw) = record.details.get(key) else {
                continue;
            };
            if self.shared_keys.contains(key) {
                return Err(format!("ambiguous subject key {}", key));
            }
            let value = parse_detail(raw).map_err(|_| format!("malformed value for {}", key))?;
            let Some(value) = value else {
                continue;
            };
            let subject_result = match value {
                DetailValue::Net(net) => scoring::subject_result_from_net(net),
                DetailValue::Counts { correct, incorrect } => {
                    if correct + incorrect > subject.question_count as f64 {
                        warnings.push(format!(
                            "{}: correct + incorrect = {} exceeds {} questions",
                            subject.name,
                            correct + incorrect,
                            subject.question_count
                        ));
                    }
                    scoring::subject_result_from_counts(correct, incorrect)
                }
            };
            results.insert(subject.name.clone(), subject_result);
        }
        if results.is_empty() {
            return Err("no matching subjects".to_string());
        }
        Ok((results, warnings))
    }
}

/// Imports `records` against `ctx.exam`. Each record is accepted or rejected
/// on its own; a rejection never affects other records.
pub fn import_batch<F>(ctx: &ImportContext<'_>, records: &[ImportedExamData], mut new_id: F) -> BatchOutcome
where
    F: FnMut() -> String,
{
    let importer = Importer::new(ctx);
    let mut outcome = BatchOutcome::default();
    // student id -> (slot in `accepted`, index of the record that filled it)
    let mut accepted_by_student: HashMap<String, (usize, usize)> = HashMap::new();

    for (index, record) in records.iter().enumerate() {
        let reject = |reason: String| Rejection {
            index,
            student_name: Some(record.student_name.clone()),
            class_name: Some(record.class_name.clone()),
            reason,
            record: serde_json::to_value(record).unwrap_or(serde_json::Value::Null),
        };

        let student = match importer.resolve_student(&record.student_name, &record.class_name) {
            Ok(s) => s,
            Err(reason) => {
                tracing::warn!(index, student = %record.student_name, %reason, "import record rejected");
                outcome.rejected.push(reject(reason));
                continue;
            }
        };
        let (results, soft) = match importer.build_subjects(record) {
            Ok(v) => v,
            Err(reason) => {
                tracing::warn!(index, student = %record.student_name, %reason, "import record rejected");
                outcome.rejected.push(reject(reason));
                continue;
            }
        };
        let total_net = scoring::compute_total_net(&results);

        for message in soft {
            tracing::warn!(index, student = %record.student_name, %message, "soft constraint violated");
            outcome.warnings.push(ImportWarning {
                index,
                student_name: record.student_name.clone(),
                message,
            });
        }
        if let Some(declared) = record.net_total {
            if (declared - total_net).abs() > NET_TOTAL_TOLERANCE {
                let message = format!(
                    "netTotal {} differs from computed total {}",
                    declared, total_net
                );
                tracing::warn!(index, student = %record.student_name, %message, "net total mismatch");
                outcome.warnings.push(ImportWarning {
                    index,
                    student_name: record.student_name.clone(),
                    message,
                });
            }
        }

        if let Some(entry) = accepted_by_student.get_mut(&student.id) {
            let (slot, replaced) = *entry;
            // The earlier record is never stored, so its warnings no longer apply.
            outcome.warnings.retain(|w| w.index != replaced);
            entry.1 = index;
            let prev = &mut outcome.accepted[slot];
            prev.results = results;
            prev.total_net = total_net;
            continue;
        }
        let id = importer
            .existing_ids
            .get(student.id.as_str())
            .map(|id| id.to_string())
            .unwrap_or_else(&mut new_id);
        accepted_by_student.insert(student.id.clone(), (outcome.accepted.len(), index));
        outcome.accepted.push(ExamResult {
            id,
            exam_id: ctx.exam.id.clone(),
            student_id: student.id.clone(),
            results,
            total_net,
        });
    }

    outcome.updated = outcome
        .accepted
        .iter()
        .filter(|r| importer.existing_ids.contains_key(r.student_id.as_str()))
        .count();
    outcome.created = outcome.accepted.len() - outcome.updated;
    outcome
}

/// Like `import_batch`, but takes untyped records so one malformed record is
/// rejected on its own instead of failing the whole request.
pub fn import_values<F>(ctx: &ImportContext<'_>, values: &[serde_json::Value], new_id: F) -> BatchOutcome
where
    F: FnMut() -> String,
{
    let mut parsed = Vec::with_capacity(values.len());
    let mut positions = Vec::with_capacity(values.len());
    let mut malformed = Vec::new();
    for (index, v) in values.iter().enumerate() {
        match serde_json::from_value::<ImportedExamData>(v.clone()) {
            Ok(rec) => {
                parsed.push(rec);
                positions.push(index);
            }
            Err(e) => {
                tracing::warn!(index, error = %e, "import record is malformed");
                let field = |camel: &str, snake: &str| {
                    v.get(camel)
                        .or_else(|| v.get(snake))
                        .and_then(|s| s.as_str())
                        .map(str::to_string)
                };
                malformed.push(Rejection {
                    index,
                    student_name: field("studentName", "student_name"),
                    class_name: field("className", "class_name"),
                    reason: format!("malformed record: {}", e),
                    record: v.clone(),
                });
            }
        }
    }

    let mut outcome = import_batch(ctx, &parsed, new_id);
    for r in outcome.rejected.iter_mut() {
        r.index = positions[r.index];
    }
    for w in outcome.warnings.iter_mut() {
        w.index = positions[w.index];
    }
    outcome.rejected.extend(malformed);
    outcome.rejected.sort_by_key(|r| r.index);
    outcome
}

/// Raw per-subject values for a stored result, keyed by each subject's import key.
/// Net-only subjects are exported as plain numbers.
pub fn export_details(exam: &Exam, result: &ExamResult) -> BTreeMap<String, serde_json::Value> {
    let mut details = BTreeMap::new();
    for subject in &exam.subjects {
        let Some(r) = result.results.get(&subject.name) else {
            continue;
        };
        let value = if r.correct == 0.0 && r.incorrect == 0.0 && r.net != 0.0 {
            DetailValue::Net(r.net)
        } else {
            DetailValue::Counts {
                correct: r.correct,
                incorrect: r.incorrect,
            }
        };
        details.insert(subject.import_key().to_string(), json!(value));
    }
    details
}

/// Export records for all results of `exam`, in rank order.
pub fn export_records(
    exam: &Exam,
    results: &[ExamResult],
    students: &[Student],
    classes: &[ClassGroup],
) -> Vec<ImportedExamData> {
    let rankings = crate::stats::exam_rankings(exam, results, students, classes, None);
    rankings
        .rows
        .iter()
        .filter_map(|row| {
            let result = results
                .iter()
                .find(|r| r.exam_id == exam.id && r.student_id == row.student_id)?;
            Some(ImportedExamData {
                exam_id: exam.name.clone(),
                student_name: row.student_name.clone(),
                class_name: row.class_name.clone().unwrap_or_default(),
                rank: Some(row.rank as f64),
                net_total: Some(result.total_net),
                details: export_details(exam, result),
            })
        })
        .collect()
}

/// Scores a manual entry keyed by subject *name* (not import key). Unlike a batch
/// import, an unknown subject or a bad value fails the whole entry.
pub fn score_manual_entry(
    exam: &Exam,
    scores: &serde_json::Map<String, serde_json::Value>,
) -> EngineResult<(BTreeMap<String, SubjectResult>, Vec<String>)> {
    let mut results = BTreeMap::new();
    let mut warnings = Vec::new();
    for (name, raw) in scores {
        let subject = exam
            .subject(name)
            .ok_or_else(|| EngineError::Validation(format!("unknown subject: {}", name)))?;
        let value = parse_detail(raw)
            .map_err(|_| EngineError::Validation(format!("malformed value for {}", name)))?;
        let subject_result = match value {
            None => continue,
            Some(DetailValue::Net(net)) => scoring::subject_result_from_net(net),
            Some(DetailValue::Counts { correct, incorrect }) => {
                if correct + incorrect > subject.question_count as f64 {
                    warnings.push(format!(
                        "{}: correct + incorrect = {} exceeds {} questions",
                        subject.name,
                        correct + incorrect,
                        subject.question_count
                    ));
                }
                scoring::subject_result_from_counts(correct, incorrect)
            }
        };
        results.insert(subject.name.clone(), subject_result);
    }
    if results.is_empty() {
        return Err(EngineError::Validation("scores must contain at least one subject".to_string()));
    }
    Ok((results, warnings))
}
