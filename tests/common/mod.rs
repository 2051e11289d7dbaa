//! 集成测试共用的替身实现
#![allow(dead_code)]

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tempfile::TempDir;

use chrono::{DateTime, Utc};
use exam_grader::error::{ExtractionError, GenerationError, StorageError};
use exam_grader::infrastructure::{LlmBackend, LocalDocumentStore, StaticIdentity, TextExtractor};
use exam_grader::services::StructuredGenerationClient;
use exam_grader::models::{
    EvaluationDetail, EvaluationRecord, EvaluationStats, NewEvaluation, NewResult, ResultRecord,
    SavedCriteria, UserId,
};
use exam_grader::storage::{PersistenceGateway, SqlitePersistence};
use exam_grader::{Config, ExamActions, UploadedDocument};

pub const PDF_HEADER: &[u8] = b"%PDF-1.4\n";

static SUBMISSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)Submission ID: (S\d+)\nExam Submission:\n(.*?)\n---").unwrap()
});
static NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Name: ([^\n]+)").unwrap());

// ========== 模型替身 ==========

type Responder = Box<dyn Fn(&str, &str) -> Result<String, GenerationError> + Send + Sync>;

/// 按脚本返回原始文本的模型，记录调用次数
pub struct ScriptedBackend {
    responder: Responder,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(
        responder: impl Fn(&str, &str) -> Result<String, GenerationError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            responder: Box::new(responder),
            calls: AtomicUsize::new(0),
        })
    }

    /// 根据提示词类型给出合理回答的模型
    pub fn classroom() -> Arc<Self> {
        Self::new(classroom_reply)
    }

    /// 总是返回同一段文本
    pub fn fixed(reply: &str) -> Arc<Self> {
        let reply = reply.to_string();
        Self::new(move |_, _| Ok(reply.clone()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    async fn complete(&self, system_message: &str, user_message: &str) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.responder)(system_message, user_message)
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// 评分：逐份读取提交，按倒序返回（检验关联标记还原顺序）
/// 出题、反馈：返回固定内容
pub fn classroom_reply(system: &str, user: &str) -> Result<String, GenerationError> {
    if user.contains("Submission ID:") {
        return Ok(grading_reply(user, |_| true).to_string());
    }
    if system.contains("educational materials") {
        return Ok(json!({
            "examContent": "# Photosynthesis essay\n1. Explain the light reactions.",
            "evaluationCriteria": "- Light reactions explained (40 points)\n- Calvin cycle (60 points)"
        })
        .to_string());
    }
    if system.contains("expert educator") {
        return Ok(json!({"feedback": "## Feedback\nRevisit the Calvin cycle."}).to_string());
    }
    Err(GenerationError::ApiCallFailed {
        model: "scripted".to_string(),
        message: "unexpected prompt".to_string(),
    })
}

/// 为用户消息中的每份提交生成一条结果（倒序），`keep` 决定保留哪些
pub fn grading_reply(user: &str, keep: impl Fn(usize) -> bool) -> Value {
    let mut items: Vec<Value> = SUBMISSION
        .captures_iter(user)
        .enumerate()
        .filter(|(index, _)| keep(*index))
        .map(|(_, caps)| {
            let text = &caps[2];
            let name = NAME.captures(text).map(|n| n[1].trim().to_string());
            let grade = if text.contains("42") { 95.0 } else { 55.0 };
            json!({
                "submissionId": &caps[1],
                "studentId": name,
                "grade": grade,
                "feedback": format!("Feedback for: {}", text.lines().last().unwrap_or_default()),
            })
        })
        .collect();
    items.reverse();
    Value::Array(items)
}

// ========== 提取替身 ==========

/// 去掉 PDF 文件头后按 UTF-8 读取；包含 CORRUPT 的文件视为损坏
///
/// 每份文档按长度休眠不同时间，使并发任务乱序完成。
pub struct FakeExtractor;

impl TextExtractor for FakeExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        std::thread::sleep(Duration::from_millis((bytes.len() % 7) as u64 * 3));
        let body = bytes.strip_prefix(PDF_HEADER).ok_or(ExtractionError::NotPdf)?;
        let text = String::from_utf8(body.to_vec()).map_err(|e| ExtractionError::Corrupt(e.to_string()))?;
        if text.contains("CORRUPT") {
            return Err(ExtractionError::Corrupt("broken xref table".to_string()));
        }
        Ok(text)
    }
}

/// 伪造的 PDF 文档
pub fn pdf(name: &str, text: &str) -> UploadedDocument {
    let mut bytes = PDF_HEADER.to_vec();
    bytes.extend_from_slice(text.as_bytes());
    UploadedDocument::new(name, bytes)
}

// ========== 存储替身 ==========

/// 写入评估时总是失败，其余操作交给内部的 SQLite
pub struct RejectingStore {
    inner: Arc<SqlitePersistence>,
}

impl PersistenceGateway for RejectingStore {
    fn record_evaluation(&self, _: &NewEvaluation, _: &[NewResult]) -> Result<i64, StorageError> {
        Err(StorageError::CorruptRow("disk full".to_string()))
    }

    fn save_criteria(&self, user_id: UserId, name: &str, text: &str) -> Result<SavedCriteria, StorageError> {
        self.inner.save_criteria(user_id, name, text)
    }

    fn list_criteria(&self, user_id: UserId) -> Result<Vec<SavedCriteria>, StorageError> {
        self.inner.list_criteria(user_id)
    }

    fn get_criteria(&self, user_id: UserId, id: i64) -> Result<Option<SavedCriteria>, StorageError> {
        self.inner.get_criteria(user_id, id)
    }

    fn evaluation_history(&self, user_id: UserId, limit: usize) -> Result<Vec<EvaluationRecord>, StorageError> {
        self.inner.evaluation_history(user_id, limit)
    }

    fn get_evaluation(&self, user_id: UserId, id: i64) -> Result<Option<EvaluationRecord>, StorageError> {
        self.inner.get_evaluation(user_id, id)
    }

    fn evaluation_stats(&self, user_id: UserId, now: DateTime<Utc>) -> Result<EvaluationStats, StorageError> {
        self.inner.evaluation_stats(user_id, now)
    }

    fn evaluation_results(&self, user_id: UserId, id: i64) -> Result<Option<EvaluationDetail>, StorageError> {
        self.inner.evaluation_results(user_id, id)
    }

    fn get_result(&self, user_id: UserId, id: i64) -> Result<Option<ResultRecord>, StorageError> {
        self.inner.get_result(user_id, id)
    }

    fn delete_evaluation(&self, user_id: UserId, id: i64) -> Result<bool, StorageError> {
        self.inner.delete_evaluation(user_id, id)
    }
}

// ========== 完整装配 ==========

pub struct Harness {
    pub actions: ExamActions,
    pub backend: Arc<ScriptedBackend>,
    pub store: Arc<SqlitePersistence>,
    pub upload_dir: TempDir,
    pub config: Config,
}

impl Harness {
    pub fn new(backend: Arc<ScriptedBackend>, user: Option<i64>) -> Self {
        Self::build(backend, user, false)
    }

    /// 保存评估总是失败的装配
    pub fn with_failing_persistence(backend: Arc<ScriptedBackend>, user: Option<i64>) -> Self {
        Self::build(backend, user, true)
    }

    fn build(backend: Arc<ScriptedBackend>, user: Option<i64>, failing_persistence: bool) -> Self {
        let upload_dir = tempfile::tempdir().unwrap();
        let config = Config {
            llm_timeout_secs: 5,
            upload_dir: upload_dir.path().display().to_string(),
            ..Config::default()
        };
        let store = Arc::new(SqlitePersistence::open_in_memory().unwrap());
        let generator = Arc::new(StructuredGenerationClient::from_config(backend.clone(), &config));
        let gateway: Arc<dyn PersistenceGateway> = if failing_persistence {
            Arc::new(RejectingStore {
                inner: store.clone(),
            })
        } else {
            store.clone()
        };

        let actions = ExamActions::new(
            &config,
            generator,
            Arc::new(FakeExtractor),
            Arc::new(LocalDocumentStore::new(upload_dir.path())),
            gateway,
            Arc::new(StaticIdentity::from(user)),
        );

        Self {
            actions,
            backend,
            store,
            upload_dir,
            config,
        }
    }

    /// 上传目录中的文件数量
    pub fn stored_files(&self) -> usize {
        std::fs::read_dir(self.upload_dir.path())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}
