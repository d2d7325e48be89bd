use crate::error::EngineResult;
use crate::model::{ClassGroup, Exam, ExamResult, ExamType, Student};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use std::path::Path;

pub const DB_FILE_NAME: &str = "netokul.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

#[cfg(test)]
pub fn open_in_memory() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;

    // No foreign key on class_id: deleting a class leaves its students orphaned.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            name TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class ON students(class_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_name ON students(name)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS exams(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            exam_type TEXT NOT NULL,
            date TEXT NOT NULL,
            subjects_json TEXT NOT NULL
        )",
        [],
    )?;
    ensure_exams_source_document_name(conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_exams_type_date ON exams(exam_type, date)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS exam_results(
            id TEXT PRIMARY KEY,
            exam_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            results_json TEXT NOT NULL,
            total_net REAL NOT NULL,
            UNIQUE(exam_id, student_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_exam_results_exam ON exam_results(exam_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_exam_results_student ON exam_results(student_id)",
        [],
    )?;

    Ok(())
}

// Workspaces created before exam source documents were tracked lack this column.
fn ensure_exams_source_document_name(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "exams", "source_document_name")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE exams ADD COLUMN source_document_name TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn class_from_row(r: &Row<'_>) -> rusqlite::Result<ClassGroup> {
    Ok(ClassGroup {
        id: r.get(0)?,
        name: r.get(1)?,
    })
}

fn student_from_row(r: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: r.get(0)?,
        class_id: r.get(1)?,
        name: r.get(2)?,
    })
}

fn exam_from_row(r: &Row<'_>) -> rusqlite::Result<Exam> {
    let exam_type: String = r.get(2)?;
    Ok(Exam {
        id: r.get(0)?,
        name: r.get(1)?,
        exam_type: ExamType::parse_lenient(&exam_type),
        date: r.get(3)?,
        subjects: json_column(r, 4)?,
        source_document_name: r.get(5)?,
    })
}

fn result_from_row(r: &Row<'_>) -> rusqlite::Result<ExamResult> {
    Ok(ExamResult {
        id: r.get(0)?,
        exam_id: r.get(1)?,
        student_id: r.get(2)?,
        results: json_column(r, 3)?,
        total_net: r.get(4)?,
    })
}

const EXAM_COLUMNS: &str = "id, name, exam_type, date, subjects_json, source_document_name";
const RESULT_COLUMNS: &str = "id, exam_id, student_id, results_json, total_net";

// Listing order is insertion order (rowid); callers sort further where needed.

pub fn list_classes(conn: &Connection) -> EngineResult<Vec<ClassGroup>> {
    let mut stmt = conn.prepare("SELECT id, name FROM classes ORDER BY rowid")?;
    let rows = stmt
        .query_map([], class_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn list_students(conn: &Connection) -> EngineResult<Vec<Student>> {
    let mut stmt = conn.prepare("SELECT id, class_id, name FROM students ORDER BY rowid")?;
    let rows = stmt
        .query_map([], student_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn list_exams(conn: &Connection) -> EngineResult<Vec<Exam>> {
    let sql = format!("SELECT {} FROM exams ORDER BY rowid", EXAM_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], exam_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn list_results(conn: &Connection) -> EngineResult<Vec<ExamResult>> {
    let sql = format!("SELECT {} FROM exam_results ORDER BY rowid", RESULT_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], result_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_class(conn: &Connection, id: &str) -> EngineResult<Option<ClassGroup>> {
    Ok(conn
        .query_row("SELECT id, name FROM classes WHERE id = ?", [id], class_from_row)
        .optional()?)
}

pub fn get_student(conn: &Connection, id: &str) -> EngineResult<Option<Student>> {
    Ok(conn
        .query_row(
            "SELECT id, class_id, name FROM students WHERE id = ?",
            [id],
            student_from_row,
        )
        .optional()?)
}

pub fn get_exam(conn: &Connection, id: &str) -> EngineResult<Option<Exam>> {
    let sql = format!("SELECT {} FROM exams WHERE id = ?", EXAM_COLUMNS);
    Ok(conn.query_row(&sql, [id], exam_from_row).optional()?)
}

/// Lookup through the (exam_id, student_id) unique index.
pub fn result_find(conn: &Connection, exam_id: &str, student_id: &str) -> EngineResult<Option<ExamResult>> {
    let sql = format!(
        "SELECT {} FROM exam_results WHERE exam_id = ? AND student_id = ?",
        RESULT_COLUMNS
    );
    Ok(conn
        .query_row(&sql, [exam_id, student_id], result_from_row)
        .optional()?)
}

pub fn results_for_exam(conn: &Connection, exam_id: &str) -> EngineResult<Vec<ExamResult>> {
    let sql = format!(
        "SELECT {} FROM exam_results WHERE exam_id = ? ORDER BY rowid",
        RESULT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([exam_id], result_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn count_results_for_exam(conn: &Connection, exam_id: &str) -> EngineResult<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM exam_results WHERE exam_id = ?",
        [exam_id],
        |r| r.get(0),
    )?)
}

pub fn upsert_class(conn: &Connection, class: &ClassGroup) -> EngineResult<()> {
    conn.execute(
        "INSERT INTO classes(id, name) VALUES(?, ?)
         ON CONFLICT(id) DO UPDATE SET name = excluded.name",
        (&class.id, &class.name),
    )?;
    Ok(())
}

pub fn upsert_student(conn: &Connection, student: &Student) -> EngineResult<()> {
    conn.execute(
        "INSERT INTO students(id, class_id, name) VALUES(?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET class_id = excluded.class_id, name = excluded.name",
        (&student.id, &student.class_id, &student.name),
    )?;
    Ok(())
}

pub fn upsert_exam(conn: &Connection, exam: &Exam) -> EngineResult<()> {
    let subjects_json = serde_json::to_string(&exam.subjects)?;
    conn.execute(
        "INSERT INTO exams(id, name, exam_type, date, subjects_json, source_document_name)
         VALUES(?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           name = excluded.name,
           exam_type = excluded.exam_type,
           date = excluded.date,
           subjects_json = excluded.subjects_json,
           source_document_name = excluded.source_document_name",
        (
            &exam.id,
            &exam.name,
            exam.exam_type.as_str(),
            &exam.date,
            &subjects_json,
            &exam.source_document_name,
        ),
    )?;
    Ok(())
}

/// Writes all results in one transaction. A pair that already exists keeps
/// its stored id and gets its subjects and total replaced.
pub fn results_upsert_batch(conn: &Connection, results: &[ExamResult]) -> EngineResult<()> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO exam_results(id, exam_id, student_id, results_json, total_net)
             VALUES(?, ?, ?, ?, ?)
             ON CONFLICT(exam_id, student_id) DO UPDATE SET
               results_json = excluded.results_json,
               total_net = excluded.total_net",
        )?;
        for r in results {
            let results_json = serde_json::to_string(&r.results)?;
            stmt.execute((&r.id, &r.exam_id, &r.student_id, &results_json, r.total_net))?;
        }
    }
    tx.commit()?;
    Ok(())
}

pub fn upsert_result(conn: &Connection, result: &ExamResult) -> EngineResult<()> {
    results_upsert_batch(conn, std::slice::from_ref(result))
}

/// Deletes only the class row; its students keep a dangling class_id.
/// Returns how many students were orphaned, or `None` if the class did not exist.
pub fn delete_class(conn: &Connection, id: &str) -> EngineResult<Option<i64>> {
    let orphaned: i64 = conn.query_row(
        "SELECT COUNT(*) FROM students WHERE class_id = ?",
        [id],
        |r| r.get(0),
    )?;
    let n = conn.execute("DELETE FROM classes WHERE id = ?", [id])?;
    Ok((n > 0).then_some(orphaned))
}

/// Deletes the student and their results. Returns the number of results removed,
/// or `None` if the student did not exist.
pub fn delete_student_cascade(conn: &Connection, id: &str) -> EngineResult<Option<usize>> {
    let tx = conn.unchecked_transaction()?;
    let removed = tx.execute("DELETE FROM exam_results WHERE student_id = ?", [id])?;
    let n = tx.execute("DELETE FROM students WHERE id = ?", [id])?;
    if n == 0 {
        tx.rollback()?;
        return Ok(None);
    }
    tx.commit()?;
    Ok(Some(removed))
}

/// Deletes the exam and its results. Returns the number of results removed,
/// or `None` if the exam did not exist.
pub fn delete_exam_cascade(conn: &Connection, id: &str) -> EngineResult<Option<usize>> {
    let tx = conn.unchecked_transaction()?;
    let removed = tx.execute("DELETE FROM exam_results WHERE exam_id = ?", [id])?;
    let n = tx.execute("DELETE FROM exams WHERE id = ?", [id])?;
    if n == 0 {
        tx.rollback()?;
        return Ok(None);
    }
    tx.commit()?;
    Ok(Some(removed))
}

/// All four collections, read together. Nothing is returned unless every read succeeds.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub classes: Vec<ClassGroup>,
    pub students: Vec<Student>,
    pub exams: Vec<Exam>,
    pub results: Vec<ExamResult>,
}

impl Snapshot {
    pub fn load(conn: &Connection) -> EngineResult<Self> {
        Ok(Self {
            classes: list_classes(conn)?,
            students: list_students(conn)?,
            exams: list_exams(conn)?,
            results: list_results(conn)?,
        })
    }

    pub fn class_name(&self, class_id: &str) -> Option<&str> {
        self.classes
            .iter()
            .find(|c| c.id == class_id)
            .map(|c| c.name.as_str())
    }
}
