//! 提示词目录 - 业务能力层
//!
//! 每种调用（评分、出题、个性化反馈）对应一个 [`PromptSpec`]：
//! 系统消息、Tera 模板、输入 schema、输出 schema。
//! 提示词面向模型，统一使用英文。

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::error::Error as _;
use tera::{Context, Tera};

use crate::config::Config;
use crate::error::GenerationError;
use crate::models::ExamType;

pub const GRADING_PROMPT: &str = "grading";
pub const EXAM_GENERATION_PROMPT: &str = "exam-generation";
pub const FEEDBACK_PROMPT: &str = "personalized-feedback";

// ========== 提示词定义 ==========

/// 一种结构化生成调用的完整定义
#[derive(Debug, Clone)]
pub struct PromptSpec {
    pub name: &'static str,
    pub system: &'static str,
    pub template: &'static str,
    pub input_schema: Value,
    pub output_schema: Value,
    /// 模板中可用的附加常量（如评分上限）
    constants: Vec<(&'static str, Value)>,
}

impl PromptSpec {
    /// 渲染用户消息
    pub fn render(&self, input: &Value) -> Result<String, GenerationError> {
        let template_error = |e: tera::Error| GenerationError::Template {
            prompt: self.name.to_string(),
            message: error_chain(&e),
        };

        let mut context = Context::from_value(input.clone()).map_err(template_error)?;
        for (key, value) in &self.constants {
            context.insert(*key, value);
        }
        Tera::one_off(self.template, &context, false).map_err(template_error)
    }

    /// 系统消息，附带输出 schema
    pub fn system_message(&self) -> String {
        let schema = serde_json::to_string_pretty(&self.output_schema).unwrap_or_default();
        format!(
            "{}\n\nRespond ONLY with a JSON value that conforms to this JSON Schema. \
             Do not wrap it in Markdown and do not add any commentary.\n{}",
            self.system, schema
        )
    }
}

fn error_chain(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// 全部提示词
#[derive(Debug, Clone)]
pub struct PromptCatalog {
    pub grading: PromptSpec,
    pub exam_generation: PromptSpec,
    pub feedback: PromptSpec,
}

impl PromptCatalog {
    pub fn new(max_grade: f64, unknown_student_label: &str) -> Self {
        Self {
            grading: grading_prompt(max_grade, unknown_student_label),
            exam_generation: exam_generation_prompt(),
            feedback: feedback_prompt(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.max_grade, &config.unknown_student_label)
    }
}

impl Default for PromptCatalog {
    fn default() -> Self {
        Self::new(100.0, "Unknown Student")
    }
}

// ========== 评分 ==========

/// 评分输入
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingInput {
    pub exams: Vec<ExamInput>,
    pub evaluation_criteria: CriteriaInput,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamInput {
    /// 关联标记，模型需原样返回
    pub submission_id: String,
    pub exam_submission: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CriteriaInput {
    pub criteria: String,
}

/// 模型返回的单个评分条目
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradedExam {
    pub submission_id: String,
    #[serde(default)]
    pub student_id: Option<String>,
    pub grade: f64,
    pub feedback: String,
}

const GRADING_SYSTEM: &str = "You are an AI-powered grading assistant. You grade student exams \
strictly against the evaluation criteria you are given and write feedback in Markdown.";

const GRADING_TEMPLATE: &str = r#"For each exam submission provided, you must first identify and extract the student's full name from the text. If you cannot find a name, use "{{ unknownStudent }}". Then grade the exam based on the evaluation criteria, on a scale from 0 to {{ maxGrade }}. Provide a grade, the extracted student name, and personalized feedback for each student.

Return exactly one result per submission and copy each submission's ID into "submissionId" unchanged.

Evaluation Criteria:
{{ evaluationCriteria.criteria }}

Student Exams:
{% for exam in exams %}
---
Submission ID: {{ exam.submissionId }}
Exam Submission:
{{ exam.examSubmission }}
---
{% endfor %}"#;

fn grading_prompt(max_grade: f64, unknown_student_label: &str) -> PromptSpec {
    PromptSpec {
        name: GRADING_PROMPT,
        system: GRADING_SYSTEM,
        template: GRADING_TEMPLATE,
        input_schema: json!({
            "type": "object",
            "properties": {
                "exams": {
                    "type": "array",
                    "minItems": 1,
                    "items": {
                        "type": "object",
                        "properties": {
                            "submissionId": { "type": "string" },
                            "examSubmission": { "type": "string" }
                        },
                        "required": ["submissionId", "examSubmission"]
                    }
                },
                "evaluationCriteria": {
                    "type": "object",
                    "properties": { "criteria": { "type": "string", "minLength": 1 } },
                    "required": ["criteria"]
                }
            },
            "required": ["exams", "evaluationCriteria"]
        }),
        output_schema: json!({
            "type": "array",
            "items": {
                "type": "object",
                "properties": {
                    "submissionId": {
                        "type": "string",
                        "description": "The submission ID exactly as given in the input."
                    },
                    "studentId": {
                        "type": ["string", "null"],
                        "description": format!(
                            "The student's full name extracted from the exam, or \"{}\".",
                            unknown_student_label
                        )
                    },
                    "grade": {
                        "type": "number",
                        "minimum": 0,
                        "maximum": max_grade,
                        "description": "The grade assigned to the student."
                    },
                    "feedback": {
                        "type": "string",
                        "description": "Personalized feedback in Markdown format."
                    }
                },
                "required": ["submissionId", "grade", "feedback"]
            }
        }),
        constants: vec![
            ("maxGrade", grade_value(max_grade)),
            ("unknownStudent", json!(unknown_student_label)),
        ],
    }
}

/// 整数上限按整数渲染（100 而不是 100.0）
fn grade_value(max_grade: f64) -> Value {
    if max_grade.fract() == 0.0 && max_grade.abs() < i64::MAX as f64 {
        json!(max_grade as i64)
    } else {
        json!(max_grade)
    }
}

// ========== 出题 ==========

const EXAM_GENERATION_SYSTEM: &str = "You are an AI assistant for creating educational materials. \
Your task is to generate an exam OR a practical work assignment AND a detailed set of evaluation \
criteria based on the provided inputs. The entire output must be in Markdown format.";

const EXAM_GENERATION_TEMPLATE: &str = r#"Exam Type: {{ type }}
{% if topic %}Topic: {{ topic }}
{% endif %}
Instructions for Generation:
- If 'type' is 'multiple-choice', provide 10 questions on the given 'topic', each with 4 options (A, B, C, D) and clearly indicate the correct answer.
- If 'type' is 'open-questions', provide 10 thought-provoking questions on the given 'topic' that require detailed answers.
- If 'type' is 'essay', provide 3 essay prompts on the given 'topic' that require in-depth analysis and argumentation.
- If 'type' is 'practical-work-from-document', generate a practical work assignment. Use the provided source text if available, otherwise generate it based on the 'topic' and 'instructions'.
{% if instructions %}- Follow these specific instructions: {{ instructions }}
{% endif %}
Instructions for Evaluation Criteria:
- Generate detailed evaluation criteria that can be used by an AI to grade the assignment you just created.
- For each question or task, specify the points awarded and what constitutes a correct or high-quality answer.
- Include keywords, concepts, or specific points that should be mentioned.
- For essays or open questions, define a rubric (e.g., clarity, use of evidence, structure, understanding of the source text).
- The criteria must be comprehensive enough for a separate grading process.
{% if sourceText %}
Source Text for Practical Work:
---
{{ sourceText }}
---
{% endif %}
Put the exam in "examContent" and the criteria in "evaluationCriteria". Generate both now."#;

fn exam_generation_prompt() -> PromptSpec {
    let types: Vec<&str> = ExamType::ALL.iter().map(|t| t.as_str()).collect();
    PromptSpec {
        name: EXAM_GENERATION_PROMPT,
        system: EXAM_GENERATION_SYSTEM,
        template: EXAM_GENERATION_TEMPLATE,
        input_schema: json!({
            "type": "object",
            "properties": {
                "topic": { "type": ["string", "null"] },
                "type": { "type": "string", "enum": types },
                "sourceText": { "type": ["string", "null"] },
                "instructions": { "type": ["string", "null"] }
            },
            "required": ["type"]
        }),
        output_schema: json!({
            "type": "object",
            "properties": {
                "examContent": {
                    "type": "string",
                    "description": "The generated exam or practical work content in Markdown format."
                },
                "evaluationCriteria": {
                    "type": "string",
                    "description": "The detailed evaluation criteria for grading the generated content, in Markdown format."
                }
            },
            "required": ["examContent", "evaluationCriteria"]
        }),
        constants: Vec::new(),
    }
}

// ========== 个性化反馈 ==========

/// 反馈输入
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackInput {
    pub student_exam: String,
    pub evaluation_criteria: String,
    pub student_grade: String,
}

/// 反馈输出
#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackOutput {
    pub feedback: String,
}

const FEEDBACK_SYSTEM: &str = "You are an expert educator providing personalized feedback to \
students based on their exam performance and the evaluation criteria.";

const FEEDBACK_TEMPLATE: &str = r#"Student Grade: {{ studentGrade }}
Student Exam:
{{ studentExam }}

Evaluation Criteria:
{{ evaluationCriteria }}

Provide constructive feedback to the student, explaining the rationale behind the grade received and areas for improvement.
The feedback should be encouraging and guide the student toward better understanding and performance.
Focus on specific aspects of the exam and relate them to the evaluation criteria.
The feedback must be in Markdown format."#;

fn feedback_prompt() -> PromptSpec {
    PromptSpec {
        name: FEEDBACK_PROMPT,
        system: FEEDBACK_SYSTEM,
        template: FEEDBACK_TEMPLATE,
        input_schema: json!({
            "type": "object",
            "properties": {
                "studentExam": { "type": "string" },
                "evaluationCriteria": { "type": "string" },
                "studentGrade": { "type": "string" }
            },
            "required": ["studentExam", "evaluationCriteria", "studentGrade"]
        }),
        output_schema: json!({
            "type": "object",
            "properties": {
                "feedback": {
                    "type": "string",
                    "description": "Personalized feedback for the student in Markdown format."
                }
            },
            "required": ["feedback"]
        }),
        constants: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExamGenerationRequest;
    use crate::services::schema_validator::validate;

    #[test]
    fn test_grading_prompt_lists_every_submission() {
        let catalog = PromptCatalog::default();
        let input = serde_json::to_value(GradingInput {
            exams: vec![
                ExamInput {
                    submission_id: "S1".to_string(),
                    exam_submission: "Name: Ana Pérez. Answer: 42".to_string(),
                },
                ExamInput {
                    submission_id: "S2".to_string(),
                    exam_submission: "Answer: 41".to_string(),
                },
            ],
            evaluation_criteria: CriteriaInput {
                criteria: "Correct answer is 42".to_string(),
            },
        })
        .unwrap();

        assert!(validate(&catalog.grading.input_schema, &input).is_ok());
        let text = catalog.grading.render(&input).unwrap();
        assert!(text.contains("Submission ID: S1"));
        assert!(text.contains("Submission ID: S2"));
        assert!(text.contains("Ana Pérez"));
        assert!(text.contains("Correct answer is 42"));
        assert!(text.contains("\"Unknown Student\""));
        assert!(text.contains("from 0 to 100"));
    }

    #[test]
    fn test_grading_output_schema_enforces_scale() {
        let catalog = PromptCatalog::new(10.0, "Unknown Student");
        let schema = &catalog.grading.output_schema;
        let ok = json!([{"submissionId": "S1", "studentId": null, "grade": 10, "feedback": "ok"}]);
        let too_high = json!([{"submissionId": "S1", "grade": 11, "feedback": "ok"}]);
        let no_token = json!([{"studentId": "Ana", "grade": 5, "feedback": "ok"}]);

        assert!(validate(schema, &ok).is_ok());
        assert!(validate(schema, &too_high).is_err());
        assert!(validate(schema, &no_token).is_err());
    }

    #[test]
    fn test_exam_generation_prompt_omits_absent_fields() {
        let catalog = PromptCatalog::default();
        let request = ExamGenerationRequest::new(ExamType::Essay).with_topic("Photosynthesis");
        let input = serde_json::to_value(&request).unwrap();

        assert!(validate(&catalog.exam_generation.input_schema, &input).is_ok());
        let text = catalog.exam_generation.render(&input).unwrap();
        assert!(text.starts_with("Exam Type: essay"));
        assert!(text.contains("Topic: Photosynthesis"));
        assert!(!text.contains("Source Text for Practical Work"));
        assert!(!text.contains("Follow these specific instructions"));
    }

    #[test]
    fn test_exam_generation_prompt_includes_source_text() {
        let catalog = PromptCatalog::default();
        let request = ExamGenerationRequest::new(ExamType::PracticalWorkFromDocument)
            .with_source_text("Chapter 3: Volcanoes")
            .with_instructions("Work in pairs");
        let text = catalog
            .exam_generation
            .render(&serde_json::to_value(&request).unwrap())
            .unwrap();

        assert!(text.contains("Chapter 3: Volcanoes"));
        assert!(text.contains("Follow these specific instructions: Work in pairs"));
        assert!(!text.contains("Topic:"));
    }

    #[test]
    fn test_exam_generation_input_rejects_unknown_type() {
        let catalog = PromptCatalog::default();
        let input = json!({"type": "quiz", "topic": "x"});
        assert!(validate(&catalog.exam_generation.input_schema, &input).is_err());
    }

    #[test]
    fn test_feedback_prompt_renders_grade() {
        let catalog = PromptCatalog::default();
        let input = serde_json::to_value(FeedbackInput {
            student_exam: "My answers".to_string(),
            evaluation_criteria: "Be precise".to_string(),
            student_grade: "85".to_string(),
        })
        .unwrap();
        let text = catalog.feedback.render(&input).unwrap();
        assert!(text.starts_with("Student Grade: 85"));
    }

    #[test]
    fn test_system_message_embeds_output_schema() {
        let catalog = PromptCatalog::default();
        let message = catalog.feedback.system_message();
        assert!(message.contains("expert educator"));
        assert!(message.contains("\"required\""));
    }
}
