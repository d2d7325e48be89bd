//! Default subject templates per exam type.
//!
//! Templates are copied onto an exam when it is created; the exam's own
//! subject list is what scoring and import use afterwards.

use crate::model::{ExamType, SubjectConfig};
use std::collections::HashSet;

struct SubjectTemplate {
    name: &'static str,
    question_count: u32,
    external_key: Option<&'static str>,
}

const TYT_SUBJECTS: &[SubjectTemplate] = &[
    SubjectTemplate { name: "Türkçe", question_count: 40, external_key: Some("tr") },
    SubjectTemplate { name: "Sosyal Bilimler", question_count: 20, external_key: Some("sos") },
    SubjectTemplate { name: "Temel Matematik", question_count: 40, external_key: Some("mat") },
    SubjectTemplate { name: "Fen Bilimleri", question_count: 20, external_key: Some("fen") },
];

const AYT_SUBJECTS: &[SubjectTemplate] = &[
    SubjectTemplate { name: "Matematik", question_count: 40, external_key: Some("mat") },
    SubjectTemplate { name: "Fen Bilimleri", question_count: 40, external_key: Some("fen") },
    SubjectTemplate { name: "Türk Dili ve Ed.", question_count: 24, external_key: Some("edb") },
    SubjectTemplate { name: "Sosyal Bilimler-1", question_count: 10, external_key: Some("sos1") },
    SubjectTemplate { name: "Sosyal Bilimler-2", question_count: 46, external_key: Some("sos2") },
];

const GENERIC_SUBJECTS: &[SubjectTemplate] = &[
    SubjectTemplate { name: "Verbal Section", question_count: 50, external_key: None },
    SubjectTemplate { name: "Quantitative Section", question_count: 50, external_key: None },
];

pub fn subjects_for_type(exam_type: ExamType) -> Vec<SubjectConfig> {
    let templates = match exam_type {
        ExamType::Tyt => TYT_SUBJECTS,
        ExamType::Ayt => AYT_SUBJECTS,
        ExamType::Other => GENERIC_SUBJECTS,
    };
    templates
        .iter()
        .map(|t| SubjectConfig {
            name: t.name.to_string(),
            question_count: t.question_count,
            external_key: t.external_key.map(str::to_string),
        })
        .collect()
}

/// Lookup by the raw type string a caller sent; unknown strings get the generic pair.
pub fn subjects_for_type_name(raw: &str) -> Vec<SubjectConfig> {
    subjects_for_type(ExamType::parse_lenient(raw))
}

/// Checks a caller-supplied subject list before it is attached to an exam.
pub fn validate_subjects(subjects: &[SubjectConfig]) -> Result<(), String> {
    if subjects.is_empty() {
        return Err("subjects must not be empty".to_string());
    }
    let mut seen = HashSet::new();
    // Each external key must resolve to exactly one subject, or one imported
    // value would be scored for several subjects.
    let mut keys = HashSet::new();
    for s in subjects {
        let name = s.name.trim();
        if name.is_empty() {
            return Err("subject name must not be empty".to_string());
        }
        if s.question_count == 0 {
            return Err(format!("subject {} must have a positive questionCount", name));
        }
        if !seen.insert(name.to_string()) {
            return Err(format!("duplicate subject name: {}", name));
        }
        if !keys.insert(s.import_key()) {
            return Err(format!("duplicate subject import key: {}", s.import_key()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tyt_template_has_four_keyed_subjects() {
        let subjects = subjects_for_type(ExamType::Tyt);
        let keys: Vec<&str> = subjects.iter().map(|s| s.import_key()).collect();
        assert_eq!(keys, vec!["tr", "sos", "mat", "fen"]);
        let total: u32 = subjects.iter().map(|s| s.question_count).sum();
        assert_eq!(total, 120);
    }

    #[test]
    fn ayt_template_differs_from_tyt() {
        let ayt = subjects_for_type(ExamType::Ayt);
        assert_eq!(ayt.len(), 5);
        assert_eq!(ayt[0].name, "Matematik");
        assert_eq!(ayt[4].import_key(), "sos2");
    }

    #[test]
    fn unknown_type_falls_back_to_generic_pair() {
        let subjects = subjects_for_type_name("LGS");
        assert_eq!(subjects.len(), 2);
        assert_eq!(subjects[0].name, "Verbal Section");
        assert_eq!(subjects[1].name, "Quantitative Section");
        assert!(subjects.iter().all(|s| s.question_count == 50));
        assert_eq!(subjects[1].import_key(), "Quantitative Section");
    }

    #[test]
    fn templates_are_copies() {
        let mut first = subjects_for_type(ExamType::Tyt);
        first[0].question_count = 1;
        assert_eq!(subjects_for_type(ExamType::Tyt)[0].question_count, 40);
    }

    #[test]
    fn validate_rejects_duplicates_and_zero_capacity() {
        assert!(validate_subjects(&[]).is_err());
        let mut dup = subjects_for_type(ExamType::Other);
        dup[1].name = dup[0].name.clone();
        assert!(validate_subjects(&dup).unwrap_err().contains("duplicate"));
        let mut zero = subjects_for_type(ExamType::Other);
        zero[0].question_count = 0;
        assert!(validate_subjects(&zero).is_err());
        assert!(validate_subjects(&subjects_for_type(ExamType::Ayt)).is_ok());
    }

    #[test]
    fn validate_rejects_shared_import_keys() {
        let mut shared = subjects_for_type(ExamType::Ayt);
        shared[1].external_key = Some("mat".to_string());
        let e = validate_subjects(&shared).unwrap_err();
        assert_eq!(e, "duplicate subject import key: mat");

        // A bare name that collides with another subject's alias is the same clash.
        let mut aliased_name = subjects_for_type(ExamType::Other);
        aliased_name[0].external_key = Some("Quantitative Section".to_string());
        assert!(validate_subjects(&aliased_name).unwrap_err().contains("import key"));

        let mut distinct = subjects_for_type(ExamType::Other);
        distinct[0].external_key = Some("verbal".to_string());
        assert!(validate_subjects(&distinct).is_ok());
    }
}
