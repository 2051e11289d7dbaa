//! 命令行参数
//!
//! `exam-grader` 的每个子命令对应一个工作流入口，输出为 JSON 格式的 `ActionOutcome`。

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::models::ExamType;

#[derive(Debug, Parser)]
#[command(name = "exam-grader")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "AI 辅助的试卷批改与出题工具", long_about = None)]
pub struct Cli {
    /// TOML 配置文件
    #[arg(short, long, global = true, env = "EXAM_GRADER_CONFIG")]
    pub config: Option<PathBuf>,

    /// 当前用户 ID
    #[arg(short, long, global = true, env = "EXAM_GRADER_USER_ID")]
    pub user: Option<i64>,

    /// 显示详细日志
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// 批改一批学生试卷（PDF）
    Grade {
        /// 学生试卷
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        criteria: CriteriaSource,
    },

    /// 用 `generate` 生成的试卷批改学生试卷
    GradeExam {
        /// 生成的试卷（`generate` 输出中 `data` 部分的 JSON 文件）
        #[arg(short, long)]
        exam: PathBuf,

        /// 试卷题型
        #[arg(short = 't', long = "type", value_parser = parse_exam_type)]
        exam_type: ExamType,

        /// 学生试卷
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// 生成试卷和评分标准
    Generate {
        /// 题型
        #[arg(short = 't', long = "type", value_parser = parse_exam_type)]
        exam_type: ExamType,

        /// 主题
        #[arg(long)]
        topic: Option<String>,

        /// 附加说明
        #[arg(short, long)]
        instructions: Option<String>,

        /// 实践作业的源文档（PDF）
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// 把生成的评分标准以该名称保存
        #[arg(long)]
        save_criteria: Option<String>,
    },

    /// 为一条学生结果重新生成反馈
    Feedback {
        /// 学生结果 ID
        result_id: i64,
    },

    /// 管理保存的评分标准
    Criteria {
        #[command(subcommand)]
        action: CriteriaAction,
    },

    /// 最近的评估记录
    History,

    /// 统计信息
    Stats,

    /// 查看一次评估的全部结果
    Show {
        evaluation_id: i64,
    },

    /// 删除一次评估
    Delete {
        evaluation_id: i64,
    },
}

#[derive(Debug, Subcommand)]
pub enum CriteriaAction {
    /// 保存评分标准
    Save {
        /// 名称
        name: String,

        #[command(flatten)]
        criteria: CriteriaSource,
    },

    /// 列出保存的评分标准
    List,
}

/// 评分标准来源（三选一）
#[derive(Debug, Clone, clap::Args)]
#[group(required = true, multiple = false)]
pub struct CriteriaSource {
    /// 直接给出评分标准文本
    #[arg(long)]
    pub criteria: Option<String>,

    /// 从文件读取评分标准
    #[arg(long)]
    pub criteria_file: Option<PathBuf>,

    /// 使用已保存的评分标准
    #[arg(long)]
    pub saved_criteria: Option<i64>,
}

fn parse_exam_type(value: &str) -> Result<ExamType, String> {
    value.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_grade_command() {
        let cli = Cli::try_parse_from([
            "exam-grader",
            "--user",
            "3",
            "grade",
            "a.pdf",
            "b.pdf",
            "--criteria",
            "Q1: 10 points",
        ])
        .unwrap();

        assert_eq!(cli.user, Some(3));
        match cli.command {
            Command::Grade { files, criteria } => {
                assert_eq!(files.len(), 2);
                assert_eq!(criteria.criteria.as_deref(), Some("Q1: 10 points"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_generate_command() {
        let cli = Cli::try_parse_from([
            "exam-grader",
            "generate",
            "--type",
            "practical-work-from-document",
            "--source",
            "chapter.pdf",
        ])
        .unwrap();

        match cli.command {
            Command::Generate {
                exam_type, source, ..
            } => {
                assert_eq!(exam_type, ExamType::PracticalWorkFromDocument);
                assert_eq!(source, Some(PathBuf::from("chapter.pdf")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_grade_exam_command() {
        let cli = Cli::try_parse_from([
            "exam-grader",
            "grade-exam",
            "--exam",
            "essay.json",
            "-t",
            "essay",
            "a.pdf",
        ])
        .unwrap();

        match cli.command {
            Command::GradeExam {
                exam,
                exam_type,
                files,
            } => {
                assert_eq!(exam, PathBuf::from("essay.json"));
                assert_eq!(exam_type, ExamType::Essay);
                assert_eq!(files, vec![PathBuf::from("a.pdf")]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_criteria_sources_are_exclusive() {
        let result = Cli::try_parse_from([
            "exam-grader",
            "grade",
            "a.pdf",
            "--criteria",
            "x",
            "--saved-criteria",
            "1",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_exam_type_is_rejected() {
        let result = Cli::try_parse_from(["exam-grader", "generate", "--type", "quiz"]);
        assert!(result.is_err());
    }
}
