use serde::Serialize;
use std::sync::Arc;

/// 上传的原始文档
///
/// 内容用 `Arc<[u8]>` 保存，提取任务和文档存储可以共享同一份字节。
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    /// 原始文件名（用于日志和存储命名）
    pub file_name: String,
    pub bytes: Arc<[u8]>,
}

impl UploadedDocument {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// 一份已提取文本的学生试卷
///
/// 提取完成后不再修改；`storage_ref` 在原始文件保存后才有值。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExamSubmission {
    /// 来源标识（通常是文件名）
    pub label: String,
    /// 提取出的纯文本
    pub text: String,
    /// 原始文件的存储引用
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_ref: Option<String>,
}

impl ExamSubmission {
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
            storage_ref: None,
        }
    }

    /// 设置原始文件的存储引用
    pub fn with_storage_ref(mut self, storage_ref: String) -> Self {
        self.storage_ref = Some(storage_ref);
        self
    }
}
