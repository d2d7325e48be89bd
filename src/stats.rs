use crate::model::{ClassGroup, Exam, ExamResult, ExamType, Student};
use crate::scoring::{mean, round2};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub student_count: usize,
    pub class_count: usize,
    pub count_by_type: BTreeMap<ExamType, usize>,
    pub avg_total_net_by_type: BTreeMap<ExamType, f64>,
    /// Same figures formatted with 2 decimals ("0.00" when a type has no results).
    pub avg_total_net_display_by_type: BTreeMap<ExamType, String>,
}

/// Roll-up per exam type. Results whose exam no longer exists are ignored.
pub fn summarize(exams: &[Exam], results: &[ExamResult], students: &[Student], classes: &[ClassGroup]) -> Summary {
    let type_of: HashMap<&str, ExamType> = exams.iter().map(|e| (e.id.as_str(), e.exam_type)).collect();

    let mut count_by_type = BTreeMap::new();
    let mut avg_total_net_by_type = BTreeMap::new();
    let mut avg_total_net_display_by_type = BTreeMap::new();
    for t in ExamType::ALL {
        count_by_type.insert(t, exams.iter().filter(|e| e.exam_type == t).count());
        let avg = mean(
            results
                .iter()
                .filter(|r| type_of.get(r.exam_id.as_str()) == Some(&t))
                .map(|r| r.total_net),
        )
        .map(round2)
        .unwrap_or(0.0);
        avg_total_net_by_type.insert(t, avg);
        avg_total_net_display_by_type.insert(t, format!("{:.2}", avg));
    }

    Summary {
        student_count: students.len(),
        class_count: classes.len(),
        count_by_type,
        avg_total_net_by_type,
        avg_total_net_display_by_type,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingRow {
    pub rank: usize,
    pub student_id: String,
    pub student_name: String,
    pub class_id: String,
    pub class_name: Option<String>,
    pub total_net: f64,
    pub subjects: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamRankings {
    pub exam_id: String,
    pub exam_name: String,
    pub rows: Vec<RankingRow>,
    pub subject_averages: Vec<SubjectAverage>,
    pub average_total_net: f64,
}

/// Ordered like the exam's subjects; `average` is `None` when nobody has the subject.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAverage {
    pub subject: String,
    pub average: Option<f64>,
}

/// Competition ranking ("1224") over values already sorted descending.
pub fn competition_ranks(sorted_desc: &[f64]) -> Vec<usize> {
    let mut ranks = Vec::with_capacity(sorted_desc.len());
    for (i, v) in sorted_desc.iter().enumerate() {
        if i > 0 && sorted_desc[i - 1] == *v {
            let prev = ranks[i - 1];
            ranks.push(prev);
        } else {
            ranks.push(i + 1);
        }
    }
    ranks
}

/// Ranks all results of `exam`. With `class_id` set only that class is ranked.
/// Results of students that no longer exist are skipped.
pub fn exam_rankings(
    exam: &Exam,
    results: &[ExamResult],
    students: &[Student],
    classes: &[ClassGroup],
    class_id: Option<&str>,
) -> ExamRankings {
    let student_by_id: HashMap<&str, &Student> = students.iter().map(|s| (s.id.as_str(), s)).collect();
    let class_name_by_id: HashMap<&str, &str> = classes.iter().map(|c| (c.id.as_str(), c.name.as_str())).collect();

    let mut rows: Vec<RankingRow> = results
        .iter()
        .filter(|r| r.exam_id == exam.id)
        .filter_map(|r| {
            let student = student_by_id.get(r.student_id.as_str())?;
            if let Some(cid) = class_id {
                if student.class_id != cid {
                    return None;
                }
            }
            Some(RankingRow {
                rank: 0,
                student_id: student.id.clone(),
                student_name: student.name.clone(),
                class_id: student.class_id.clone(),
                class_name: class_name_by_id.get(student.class_id.as_str()).map(|n| n.to_string()),
                total_net: r.total_net,
                subjects: r.results.iter().map(|(k, v)| (k.clone(), v.net)).collect(),
            })
        })
        .collect();

    rows.sort_by(|a, b| {
        b.total_net
            .partial_cmp(&a.total_net)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.student_name.cmp(&b.student_name))
    });
    let totals: Vec<f64> = rows.iter().map(|r| r.total_net).collect();
    for (row, rank) in rows.iter_mut().zip(competition_ranks(&totals)) {
        row.rank = rank;
    }

    let subject_averages = exam
        .subjects
        .iter()
        .map(|s| {
            let average = mean(rows.iter().filter_map(|r| r.subjects.get(&s.name).copied())).map(round2);
            SubjectAverage {
                subject: s.name.clone(),
                average,
            }
        })
        .collect();
    let average_total_net = mean(totals.iter().copied()).map(round2).unwrap_or(0.0);

    ExamRankings {
        exam_id: exam.id.clone(),
        exam_name: exam.name.clone(),
        rows,
        subject_averages,
        average_total_net,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SubjectConfig, SubjectResult};
    use chrono::NaiveDate;

    fn exam(id: &str, t: ExamType) -> Exam {
        Exam {
            id: id.into(),
            name: id.to_uppercase(),
            exam_type: t,
            date: NaiveDate::from_ymd_opt(2025, 9, 1).expect("date"),
            subjects: vec![
                SubjectConfig { name: "tr".into(), question_count: 40, external_key: None },
                SubjectConfig { name: "mat".into(), question_count: 40, external_key: None },
            ],
            source_document_name: None,
        }
    }

    fn result(exam_id: &str, student_id: &str, subjects: &[(&str, f64)]) -> ExamResult {
        let results: BTreeMap<String, SubjectResult> = subjects
            .iter()
            .map(|(k, net)| (k.to_string(), SubjectResult { correct: 0.0, incorrect: 0.0, net: *net }))
            .collect();
        let total_net = crate::scoring::compute_total_net(&results);
        ExamResult {
            id: format!("{}-{}", exam_id, student_id),
            exam_id: exam_id.into(),
            student_id: student_id.into(),
            results,
            total_net,
        }
    }

    fn student(id: &str, name: &str, class_id: &str) -> Student {
        Student { id: id.into(), name: name.into(), class_id: class_id.into() }
    }

    #[test]
    fn summary_counts_and_averages_per_type() {
        let exams = vec![exam("t1", ExamType::Tyt), exam("t2", ExamType::Tyt), exam("a1", ExamType::Ayt)];
        let results = vec![
            result("t1", "s1", &[("tr", 30.0)]),
            result("t1", "s2", &[("tr", 20.5)]),
            result("t2", "s1", &[("tr", 10.0)]),
            result("gone", "s1", &[("tr", 99.0)]),
        ];
        let summary = summarize(&exams, &results, &[], &[]);
        assert_eq!(summary.count_by_type[&ExamType::Tyt], 2);
        assert_eq!(summary.count_by_type[&ExamType::Ayt], 1);
        assert_eq!(summary.count_by_type[&ExamType::Other], 0);
        assert_eq!(summary.avg_total_net_by_type[&ExamType::Tyt], 20.17);
        assert_eq!(summary.avg_total_net_by_type[&ExamType::Ayt], 0.0);
        assert_eq!(summary.avg_total_net_display_by_type[&ExamType::Ayt], "0.00");
        assert_eq!(summary.avg_total_net_display_by_type[&ExamType::Tyt], "20.17");
    }

    #[test]
    fn summary_serializes_type_keys() {
        let summary = summarize(&[exam("t1", ExamType::Tyt)], &[], &[], &[]);
        let v = serde_json::to_value(&summary).expect("ser");
        assert_eq!(v["countByType"]["TYT"], serde_json::json!(1));
        assert_eq!(v["avgTotalNetDisplayByType"]["OTHER"], serde_json::json!("0.00"));
    }

    #[test]
    fn ties_share_a_rank() {
        assert_eq!(competition_ranks(&[50.0, 40.0, 40.0, 10.0]), vec![1, 2, 2, 4]);
        assert!(competition_ranks(&[]).is_empty());
    }

    #[test]
    fn rankings_skip_orphans_and_respect_class_filter() {
        let e = exam("t1", ExamType::Tyt);
        let students = vec![student("s1", "Zeynep", "c1"), student("s2", "Ahmet", "c2"), student("s3", "Berk", "gone")];
        let classes = vec![
            ClassGroup { id: "c1".into(), name: "12-A".into() },
            ClassGroup { id: "c2".into(), name: "12-B".into() },
        ];
        let results = vec![
            result("t1", "s1", &[("tr", 30.0), ("mat", 10.0)]),
            result("t1", "s2", &[("tr", 40.0)]),
            result("t1", "s3", &[("tr", 40.0)]),
            result("t1", "deleted", &[("tr", 80.0)]),
            result("t2", "s1", &[("tr", 1.0)]),
        ];

        let all = exam_rankings(&e, &results, &students, &classes, None);
        let order: Vec<(&str, usize)> = all.rows.iter().map(|r| (r.student_id.as_str(), r.rank)).collect();
        assert_eq!(order, vec![("s2", 1), ("s3", 1), ("s1", 1)]);
        assert_eq!(all.rows[1].class_name, None);
        assert_eq!(all.subject_averages[0].subject, "tr");
        assert_eq!(all.subject_averages[0].average, Some(36.67));
        assert_eq!(all.subject_averages[1].average, Some(10.0));
        assert_eq!(all.average_total_net, 40.0);

        let only_b = exam_rankings(&e, &results, &students, &classes, Some("c2"));
        assert_eq!(only_b.rows.len(), 1);
        assert_eq!(only_b.rows[0].class_name.as_deref(), Some("12-B"));
        assert_eq!(only_b.subject_averages[1].average, None);
    }
}
