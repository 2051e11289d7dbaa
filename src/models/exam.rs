use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// 试卷类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExamType {
    /// 选择题
    MultipleChoice,
    /// 开放问答
    OpenQuestions,
    /// 论述
    Essay,
    /// 基于文档的实践作业
    PracticalWorkFromDocument,
}

impl ExamType {
    pub const ALL: [ExamType; 4] = [
        ExamType::MultipleChoice,
        ExamType::OpenQuestions,
        ExamType::Essay,
        ExamType::PracticalWorkFromDocument,
    ];

    /// 获取标准名称（与提示词和 schema 中的枚举值一致）
    pub fn as_str(self) -> &'static str {
        match self {
            ExamType::MultipleChoice => "multiple-choice",
            ExamType::OpenQuestions => "open-questions",
            ExamType::Essay => "essay",
            ExamType::PracticalWorkFromDocument => "practical-work-from-document",
        }
    }

    /// 是否需要主题
    pub fn requires_topic(self) -> bool {
        self != ExamType::PracticalWorkFromDocument
    }
}

impl fmt::Display for ExamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExamType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExamType::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| {
                let names: Vec<&str> = ExamType::ALL.iter().map(|t| t.as_str()).collect();
                format!("未知的试卷类型 '{}'，可选: {}", s, names.join(", "))
            })
    }
}

/// 出题请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamGenerationRequest {
    pub topic: Option<String>,
    #[serde(rename = "type")]
    pub exam_type: ExamType,
    pub source_text: Option<String>,
    pub instructions: Option<String>,
}

impl ExamGenerationRequest {
    pub fn new(exam_type: ExamType) -> Self {
        Self {
            topic: None,
            exam_type,
            source_text: None,
            instructions: None,
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn with_source_text(mut self, source_text: impl Into<String>) -> Self {
        self.source_text = Some(source_text.into());
        self
    }

    /// 校验前置条件
    ///
    /// 实践作业需要源文本、主题或说明之一（`has_source_document` 表示
    /// 还有一份待提取的源文档）；其他类型必须有主题。空白字符串视为未提供。
    pub fn validate(&self, has_source_document: bool) -> Result<(), ValidationError> {
        let topic = present(&self.topic);
        if self.exam_type.requires_topic() {
            if !topic {
                return Err(ValidationError::TopicRequired);
            }
            return Ok(());
        }

        let has_source = has_source_document || present(&self.source_text);
        if has_source || topic || present(&self.instructions) {
            Ok(())
        } else {
            Err(ValidationError::TopicOrInstructionsRequired)
        }
    }

    /// 去掉空白的可选字段
    pub fn normalized(mut self) -> Self {
        self.topic = non_blank(self.topic);
        self.source_text = non_blank(self.source_text);
        self.instructions = non_blank(self.instructions);
        self
    }
}

/// 生成的试卷及配套评分标准（均为 Markdown）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedExam {
    pub exam_content: String,
    /// 可直接作为后续评分请求的评分标准
    pub evaluation_criteria: String,
}

impl GeneratedExam {
    /// 返回为空的必填字段
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.exam_content.trim().is_empty() {
            missing.push("examContent");
        }
        if self.evaluation_criteria.trim().is_empty() {
            missing.push("evaluationCriteria");
        }
        missing
    }
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
