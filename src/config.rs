use serde::Deserialize;
use std::path::Path;

use crate::error::ConfigError;

/// 程序配置
///
/// 启动时构造一次，然后显式传给各个组件，不使用全局状态。
/// 加载顺序：默认值 → TOML 配置文件 → 环境变量。
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,
    /// 单次结构化生成调用的超时（秒）
    pub llm_timeout_secs: u64,
    /// 同时提取文本的文档数量
    pub max_concurrent_extractions: usize,
    // --- 上传限制 ---
    pub max_file_size_bytes: u64,
    pub max_files: usize,
    pub min_criteria_chars: usize,
    // --- 评分 ---
    /// 分数上限（分数范围为 0..=max_grade）
    pub max_grade: f64,
    /// 无法识别学生姓名时使用的名称
    pub unknown_student_label: String,
    // --- 存储 ---
    pub upload_dir: String,
    pub database_path: String,
    /// 历史记录返回的最大条数
    pub history_limit: usize,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
            llm_temperature: 0.3,
            llm_max_tokens: 8192,
            llm_timeout_secs: 120,
            max_concurrent_extractions: 8,
            max_file_size_bytes: 10 * 1024 * 1024,
            max_files: 50,
            min_criteria_chars: 10,
            max_grade: 100.0,
            unknown_student_label: "Unknown Student".to_string(),
            upload_dir: "uploads".to_string(),
            database_path: "exam_grader.db".to_string(),
            history_limit: 20,
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 只从环境变量加载（未设置的项使用默认值）
    pub fn from_env() -> Self {
        Self::default().apply_env()
    }

    /// 加载配置：可选的 TOML 文件，再叠加环境变量
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        Ok(base.apply_env())
    }

    /// 从 TOML 文件加载，文件中没有的项使用默认值
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::TomlParseFailed {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 用环境变量覆盖当前配置
    pub fn apply_env(self) -> Self {
        Self {
            llm_api_key: env_string("LLM_API_KEY").unwrap_or(self.llm_api_key),
            llm_api_base_url: env_string("LLM_API_BASE_URL").unwrap_or(self.llm_api_base_url),
            llm_model_name: env_string("LLM_MODEL_NAME").unwrap_or(self.llm_model_name),
            llm_temperature: env_parse("LLM_TEMPERATURE").unwrap_or(self.llm_temperature),
            llm_max_tokens: env_parse("LLM_MAX_TOKENS").unwrap_or(self.llm_max_tokens),
            llm_timeout_secs: env_parse("LLM_TIMEOUT_SECS").unwrap_or(self.llm_timeout_secs),
            max_concurrent_extractions: env_parse("EXAM_GRADER_MAX_CONCURRENT_EXTRACTIONS")
                .unwrap_or(self.max_concurrent_extractions),
            max_file_size_bytes: env_parse("EXAM_GRADER_MAX_FILE_SIZE_BYTES")
                .unwrap_or(self.max_file_size_bytes),
            max_files: env_parse("EXAM_GRADER_MAX_FILES").unwrap_or(self.max_files),
            min_criteria_chars: env_parse("EXAM_GRADER_MIN_CRITERIA_CHARS")
                .unwrap_or(self.min_criteria_chars),
            max_grade: env_parse("EXAM_GRADER_MAX_GRADE").unwrap_or(self.max_grade),
            unknown_student_label: env_string("EXAM_GRADER_UNKNOWN_STUDENT_LABEL")
                .unwrap_or(self.unknown_student_label),
            upload_dir: env_string("EXAM_GRADER_UPLOAD_DIR").unwrap_or(self.upload_dir),
            database_path: env_string("EXAM_GRADER_DATABASE_PATH").unwrap_or(self.database_path),
            history_limit: env_parse("EXAM_GRADER_HISTORY_LIMIT").unwrap_or(self.history_limit),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(self.verbose_logging),
        }
    }

    /// 调用模型前检查凭据
    pub fn require_llm_credentials(&self) -> Result<(), ConfigError> {
        if self.llm_api_key.trim().is_empty() {
            return Err(ConfigError::Missing("LLM_API_KEY"));
        }
        Ok(())
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
