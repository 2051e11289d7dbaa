//! 个性化反馈编排 - 编排层
//!
//! 针对一位已评分学生重新生成反馈，不修改任何已保存的数据。

use std::sync::Arc;
use tracing::info;

use crate::error::{AppResult, ValidationError};
use crate::models::EvaluationCriteria;
use crate::services::prompts::{FeedbackInput, FeedbackOutput};
use crate::services::{invoke_typed, PromptCatalog, StructuredGeneration};

/// 反馈生成器
pub struct FeedbackGenerator {
    generator: Arc<dyn StructuredGeneration>,
    prompts: Arc<PromptCatalog>,
}

impl FeedbackGenerator {
    pub fn new(generator: Arc<dyn StructuredGeneration>, prompts: Arc<PromptCatalog>) -> Self {
        Self { generator, prompts }
    }

    /// 根据试卷文本、评分标准和分数生成反馈（Markdown）
    pub async fn regenerate(
        &self,
        student_exam: &str,
        criteria: &EvaluationCriteria,
        grade: f64,
    ) -> AppResult<String> {
        if criteria.is_blank() {
            return Err(ValidationError::CriteriaTooShort { min: 1 }.into());
        }

        let input = FeedbackInput {
            student_exam: student_exam.to_string(),
            evaluation_criteria: criteria.as_str().to_string(),
            student_grade: format_grade(grade),
        };
        let output: FeedbackOutput =
            invoke_typed(self.generator.as_ref(), &self.prompts.feedback, &input).await?;

        info!("✓ 已生成个性化反馈 ({} 字符)", output.feedback.chars().count());
        Ok(output.feedback)
    }
}

/// 整数分数不带小数部分
fn format_grade(grade: f64) -> String {
    if grade.fract() == 0.0 {
        format!("{:.0}", grade)
    } else {
        grade.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::PromptSpec;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    struct Echo {
        seen: Mutex<Option<Value>>,
    }

    #[async_trait]
    impl StructuredGeneration for Echo {
        async fn invoke(&self, _prompt: &PromptSpec, input: &Value) -> AppResult<Value> {
            *self.seen.lock().unwrap() = Some(input.clone());
            Ok(json!({"feedback": "Keep practising **fractions**."}))
        }
    }

    #[test]
    fn test_format_grade() {
        assert_eq!(format_grade(85.0), "85");
        assert_eq!(format_grade(72.5), "72.5");
    }

    #[tokio::test]
    async fn test_regenerate_sends_grade_as_text() {
        let echo = Arc::new(Echo {
            seen: Mutex::new(None),
        });
        let generator = FeedbackGenerator::new(echo.clone(), Arc::new(PromptCatalog::default()));

        let feedback = generator
            .regenerate("1/2 + 1/4 = 2/6", &EvaluationCriteria::new("Fractions, 10 points"), 40.0)
            .await
            .unwrap();

        assert_eq!(feedback, "Keep practising **fractions**.");
        let seen = echo.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen["studentGrade"], "40");
        assert_eq!(seen["studentExam"], "1/2 + 1/4 = 2/6");
    }
}
