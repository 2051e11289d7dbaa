//! SQLite 持久化
//!
//! 单个连接放在 `Mutex` 里；时间统一存为 RFC3339 字符串（UTC）。

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::error::StorageError;
use crate::models::{
    EvaluationDetail, EvaluationRecord, EvaluationStats, NewEvaluation, NewResult, ResultRecord,
    SavedCriteria, UserId,
};
use crate::storage::gateway::PersistenceGateway;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS exam_criteria (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        criteria_text TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS evaluations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        exam_type TEXT NOT NULL,
        exam_content TEXT,
        evaluation_criteria TEXT NOT NULL,
        total_students INTEGER NOT NULL,
        average_grade REAL NOT NULL,
        created_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS results (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        evaluation_id INTEGER NOT NULL REFERENCES evaluations(id) ON DELETE CASCADE,
        user_id INTEGER NOT NULL,
        student_name TEXT NOT NULL,
        grade REAL NOT NULL,
        feedback TEXT NOT NULL,
        submission_path TEXT,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_criteria_user ON exam_criteria(user_id);
    CREATE INDEX IF NOT EXISTS idx_evaluations_user ON evaluations(user_id, created_at);
    CREATE INDEX IF NOT EXISTS idx_results_evaluation ON results(evaluation_id);
";

const EVALUATION_COLUMNS: &str = "id, user_id, exam_type, exam_content, evaluation_criteria, \
                                  total_students, average_grade, created_at";
const RESULT_COLUMNS: &str = "id, evaluation_id, user_id, student_name, grade, feedback, \
                              submission_path, created_at";

pub struct SqlitePersistence {
    conn: Mutex<Connection>,
}

impl SqlitePersistence {
    /// 打开（必要时创建）数据库文件并初始化表结构
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        info!("📂 数据库: {}", path.display());
        Self::with_connection(conn)
    }

    /// 内存数据库（测试用）
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

impl PersistenceGateway for SqlitePersistence {
    fn record_evaluation(
        &self,
        evaluation: &NewEvaluation,
        results: &[NewResult],
    ) -> Result<i64, StorageError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let now = timestamp(Utc::now());

        tx.execute(
            "INSERT INTO evaluations (user_id, exam_type, exam_content, evaluation_criteria, total_students, average_grade, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                evaluation.user_id.0,
                evaluation.exam_type,
                evaluation.exam_content,
                evaluation.evaluation_criteria,
                evaluation.total_students as i64,
                evaluation.average_grade,
                now,
            ],
        )?;
        let evaluation_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO results (evaluation_id, user_id, student_name, grade, feedback, submission_path, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for result in results {
                stmt.execute(params![
                    evaluation_id,
                    evaluation.user_id.0,
                    result.student_name,
                    result.grade,
                    result.feedback,
                    result.submission_path,
                    now,
                ])?;
            }
        }

        tx.commit()?;
        debug!("已保存评估 #{} 及 {} 条学生结果", evaluation_id, results.len());
        Ok(evaluation_id)
    }

    fn save_criteria(
        &self,
        user_id: UserId,
        name: &str,
        criteria_text: &str,
    ) -> Result<SavedCriteria, StorageError> {
        let conn = self.lock()?;
        let created_at = Utc::now();
        conn.execute(
            "INSERT INTO exam_criteria (user_id, name, criteria_text, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![user_id.0, name, criteria_text, timestamp(created_at)],
        )?;
        Ok(SavedCriteria {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
            criteria_text: criteria_text.to_string(),
            created_at,
        })
    }

    fn list_criteria(&self, user_id: UserId) -> Result<Vec<SavedCriteria>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, criteria_text, created_at FROM exam_criteria
             WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt.query_map(params![user_id.0], row_to_criteria)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn get_criteria(&self, user_id: UserId, id: i64) -> Result<Option<SavedCriteria>, StorageError> {
        let conn = self.lock()?;
        let criteria = conn
            .query_row(
                "SELECT id, name, criteria_text, created_at FROM exam_criteria
                 WHERE user_id = ?1 AND id = ?2",
                params![user_id.0, id],
                row_to_criteria,
            )
            .optional()?;
        Ok(criteria)
    }

    fn evaluation_history(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<EvaluationRecord>, StorageError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {EVALUATION_COLUMNS} FROM evaluations
             WHERE user_id = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id.0, limit as i64], row_to_evaluation)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn get_evaluation(
        &self,
        user_id: UserId,
        evaluation_id: i64,
    ) -> Result<Option<EvaluationRecord>, StorageError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {EVALUATION_COLUMNS} FROM evaluations WHERE user_id = ?1 AND id = ?2");
        let evaluation = conn
            .query_row(&sql, params![user_id.0, evaluation_id], row_to_evaluation)
            .optional()?;
        Ok(evaluation)
    }

    fn evaluation_stats(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<EvaluationStats, StorageError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {EVALUATION_COLUMNS} FROM evaluations WHERE user_id = ?1");
        let mut stmt = conn.prepare(&sql)?;
        let evaluations = stmt
            .query_map(params![user_id.0], row_to_evaluation)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(EvaluationStats::from_evaluations(&evaluations, now))
    }

    fn evaluation_results(
        &self,
        user_id: UserId,
        evaluation_id: i64,
    ) -> Result<Option<EvaluationDetail>, StorageError> {
        let Some(evaluation) = self.get_evaluation(user_id, evaluation_id)? else {
            return Ok(None);
        };

        let conn = self.lock()?;
        let sql = format!(
            "SELECT {RESULT_COLUMNS} FROM results
             WHERE evaluation_id = ?1 AND user_id = ?2 ORDER BY grade DESC, id ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let results = stmt
            .query_map(params![evaluation_id, user_id.0], row_to_result)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(EvaluationDetail { evaluation, results }))
    }

    fn get_result(&self, user_id: UserId, result_id: i64) -> Result<Option<ResultRecord>, StorageError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {RESULT_COLUMNS} FROM results WHERE user_id = ?1 AND id = ?2");
        let result = conn
            .query_row(&sql, params![user_id.0, result_id], row_to_result)
            .optional()?;
        Ok(result)
    }

    fn delete_evaluation(&self, user_id: UserId, evaluation_id: i64) -> Result<bool, StorageError> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM evaluations WHERE user_id = ?1 AND id = ?2",
            params![user_id.0, evaluation_id],
        )?;
        Ok(deleted > 0)
    }
}

// ========== 行映射 ==========

fn timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(row: &Row<'_>, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(index)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))
}

fn count(row: &Row<'_>, index: usize) -> rusqlite::Result<usize> {
    let value: i64 = row.get(index)?;
    usize::try_from(value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Integer, Box::new(e)))
}

fn row_to_criteria(row: &Row<'_>) -> rusqlite::Result<SavedCriteria> {
    Ok(SavedCriteria {
        id: row.get(0)?,
        name: row.get(1)?,
        criteria_text: row.get(2)?,
        created_at: parse_timestamp(row, 3)?,
    })
}

fn row_to_evaluation(row: &Row<'_>) -> rusqlite::Result<EvaluationRecord> {
    Ok(EvaluationRecord {
        id: row.get(0)?,
        user_id: UserId(row.get(1)?),
        exam_type: row.get(2)?,
        exam_content: row.get(3)?,
        evaluation_criteria: row.get(4)?,
        total_students: count(row, 5)?,
        average_grade: row.get(6)?,
        created_at: parse_timestamp(row, 7)?,
    })
}

fn row_to_result(row: &Row<'_>) -> rusqlite::Result<ResultRecord> {
    Ok(ResultRecord {
        id: row.get(0)?,
        evaluation_id: row.get(1)?,
        user_id: UserId(row.get(2)?),
        student_name: row.get(3)?,
        grade: row.get(4)?,
        feedback: row.get(5)?,
        submission_path: row.get(6)?,
        graded_at: parse_timestamp(row, 7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const INSTRUCTOR: UserId = UserId(7);
    const OTHER: UserId = UserId(8);

    fn new_evaluation(user_id: UserId, students: usize, average: f64) -> NewEvaluation {
        NewEvaluation {
            user_id,
            exam_type: "manual".to_string(),
            exam_content: None,
            evaluation_criteria: "Q1: 50 points, Q2: 50 points".to_string(),
            total_students: students,
            average_grade: average,
        }
    }

    fn new_result(name: &str, grade: f64) -> NewResult {
        NewResult {
            student_name: name.to_string(),
            grade,
            feedback: format!("Well done, {}", name),
            submission_path: Some(format!("abc-{}.pdf", name)),
        }
    }

    #[test]
    fn test_record_evaluation_and_read_results_by_grade() {
        let store = SqlitePersistence::open_in_memory().unwrap();
        let id = store
            .record_evaluation(
                &new_evaluation(INSTRUCTOR, 3, 70.0),
                &[new_result("Ana", 60.0), new_result("Bruno", 90.0), new_result("Carla", 60.0)],
            )
            .unwrap();

        let detail = store.evaluation_results(INSTRUCTOR, id).unwrap().unwrap();
        assert_eq!(detail.evaluation.total_students, 3);
        let names: Vec<&str> = detail.results.iter().map(|r| r.student_name.as_str()).collect();
        assert_eq!(names, vec!["Bruno", "Ana", "Carla"]);
        assert_eq!(detail.results[0].submission_path.as_deref(), Some("abc-Bruno.pdf"));
    }

    #[test]
    fn test_records_are_scoped_to_user() {
        let store = SqlitePersistence::open_in_memory().unwrap();
        let id = store
            .record_evaluation(&new_evaluation(INSTRUCTOR, 1, 80.0), &[new_result("Ana", 80.0)])
            .unwrap();
        let result_id = store.evaluation_results(INSTRUCTOR, id).unwrap().unwrap().results[0].id;

        assert!(store.evaluation_results(OTHER, id).unwrap().is_none());
        assert!(store.get_result(OTHER, result_id).unwrap().is_none());
        assert!(store.get_result(INSTRUCTOR, result_id).unwrap().is_some());
        assert!(!store.delete_evaluation(OTHER, id).unwrap());
        assert!(store.evaluation_history(OTHER, 20).unwrap().is_empty());
    }

    #[test]
    fn test_delete_cascades_to_results() {
        let store = SqlitePersistence::open_in_memory().unwrap();
        let id = store
            .record_evaluation(&new_evaluation(INSTRUCTOR, 1, 80.0), &[new_result("Ana", 80.0)])
            .unwrap();
        let result_id = store.evaluation_results(INSTRUCTOR, id).unwrap().unwrap().results[0].id;

        assert!(store.delete_evaluation(INSTRUCTOR, id).unwrap());
        assert!(store.get_evaluation(INSTRUCTOR, id).unwrap().is_none());
        assert!(store.get_result(INSTRUCTOR, result_id).unwrap().is_none());
    }

    #[test]
    fn test_failed_result_insert_rolls_back_evaluation() {
        let store = SqlitePersistence::open_in_memory().unwrap();
        // NaN 绑定为 NULL，违反 results.grade 的 NOT NULL 约束
        let err = store
            .record_evaluation(
                &new_evaluation(INSTRUCTOR, 2, 80.0),
                &[new_result("Ana", 80.0), new_result("Bruno", f64::NAN)],
            )
            .unwrap_err();

        assert!(matches!(err, StorageError::Database(_)));
        assert!(store.evaluation_history(INSTRUCTOR, 20).unwrap().is_empty());
        let stats = store.evaluation_stats(INSTRUCTOR, Utc::now()).unwrap();
        assert_eq!(stats.total_students, 0);
    }

    #[test]
    fn test_history_is_newest_first_and_limited() {
        let store = SqlitePersistence::open_in_memory().unwrap();
        let ids: Vec<i64> = (0..3)
            .map(|i| {
                store
                    .record_evaluation(&new_evaluation(INSTRUCTOR, 1, i as f64), &[])
                    .unwrap()
            })
            .collect();

        let history = store.evaluation_history(INSTRUCTOR, 2).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, ids[2]);
        assert_eq!(history[1].id, ids[1]);
    }

    #[test]
    fn test_stats_use_current_month() {
        let store = SqlitePersistence::open_in_memory().unwrap();
        store.record_evaluation(&new_evaluation(INSTRUCTOR, 2, 70.0), &[]).unwrap();
        store.record_evaluation(&new_evaluation(INSTRUCTOR, 3, 75.0), &[]).unwrap();

        let stats = store.evaluation_stats(INSTRUCTOR, Utc::now()).unwrap();
        assert_eq!(stats.total_evaluations, 2);
        assert_eq!(stats.this_month, 2);
        assert_eq!(stats.total_students, 5);
        assert_eq!(stats.average_grade, 72.5);

        let empty = store.evaluation_stats(OTHER, Utc::now()).unwrap();
        assert_eq!(empty.total_evaluations, 0);
    }

    #[test]
    fn test_saved_criteria_round_trip() {
        let store = SqlitePersistence::open_in_memory().unwrap();
        let first = store.save_criteria(INSTRUCTOR, "Midterm", "Q1: 10 points").unwrap();
        let second = store.save_criteria(INSTRUCTOR, "Final", "Q1: 20 points").unwrap();

        let list = store.list_criteria(INSTRUCTOR).unwrap();
        assert_eq!(list.iter().map(|c| c.id).collect::<Vec<_>>(), vec![second.id, first.id]);
        assert_eq!(
            store.get_criteria(INSTRUCTOR, first.id).unwrap().unwrap().criteria_text,
            "Q1: 10 points"
        );
        assert!(store.get_criteria(OTHER, first.id).unwrap().is_none());
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("grader.db");
        let store = SqlitePersistence::open(&path).unwrap();
        store.save_criteria(INSTRUCTOR, "Quiz", "Q1: 5 points").unwrap();
        assert!(path.exists());
    }
}
