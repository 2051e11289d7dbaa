//! 上传校验
//!
//! 在任何提取或模型调用之前执行：文件数量、大小、PDF 文件头、评分标准长度。

use crate::config::Config;
use crate::error::ValidationError;
use crate::infrastructure::pdf_extractor::looks_like_pdf;
use crate::models::{EvaluationCriteria, UploadedDocument};

/// 上传限制
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_files: usize,
    pub max_file_size_bytes: u64,
    pub min_criteria_chars: usize,
}

impl UploadLimits {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_files: config.max_files,
            max_file_size_bytes: config.max_file_size_bytes,
            min_criteria_chars: config.min_criteria_chars,
        }
    }

    /// 校验一批学生试卷
    pub fn check_documents(&self, documents: &[UploadedDocument]) -> Result<(), ValidationError> {
        if documents.is_empty() {
            return Err(ValidationError::EmptyBatch);
        }
        if documents.len() > self.max_files {
            return Err(ValidationError::TooManyFiles {
                max: self.max_files,
                actual: documents.len(),
            });
        }
        documents.iter().try_for_each(|d| self.check_document(d))
    }

    /// 校验单个文件
    pub fn check_document(&self, document: &UploadedDocument) -> Result<(), ValidationError> {
        let name = || document.file_name.clone();
        if document.bytes.is_empty() {
            return Err(ValidationError::EmptyFile { name: name() });
        }
        if document.size() > self.max_file_size_bytes {
            return Err(ValidationError::FileTooLarge {
                name: name(),
                max_bytes: self.max_file_size_bytes,
            });
        }
        if !looks_like_pdf(&document.bytes) {
            return Err(ValidationError::NotPdf { name: name() });
        }
        Ok(())
    }

    /// 校验评分标准，返回去掉首尾空白后的文本
    pub fn check_criteria(&self, criteria: &str) -> Result<EvaluationCriteria, ValidationError> {
        let trimmed = criteria.trim();
        if trimmed.chars().count() < self.min_criteria_chars {
            return Err(ValidationError::CriteriaTooShort {
                min: self.min_criteria_chars,
            });
        }
        Ok(EvaluationCriteria::new(trimmed))
    }
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
