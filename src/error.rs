use serde::Serialize;
use thiserror::Error;

/// 应用程序错误类型
///
/// 每个变体对应一类失败，`kind()` 把它们归到用户能理解的几个大类：
/// 文档问题（重新上传）、AI 服务问题（重试或修改评分标准）、校验问题。
#[derive(Debug, Error)]
pub enum AppError {
    /// 文档文本提取失败
    #[error("无法读取文档 {document}: {source}")]
    Extraction {
        document: String,
        #[source]
        source: ExtractionError,
    },
    /// 结构化生成（AI 服务）错误
    #[error("AI 服务错误: {0}")]
    Generation(#[from] GenerationError),
    /// 评分结果校验错误
    #[error("评分结果校验失败: {0}")]
    Grading(#[from] GradingError),
    /// 输入校验错误
    #[error("输入无效: {0}")]
    Validation(#[from] ValidationError),
    /// 缺少用户身份
    #[error("未登录: 缺少有效的用户身份")]
    Unauthenticated,
    /// 持久化错误
    #[error("存储错误: {0}")]
    Storage(#[from] StorageError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// 文本提取错误
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// 文件为空
    #[error("文件内容为空")]
    Empty,
    /// 不是 PDF（缺少 %PDF- 文件头）
    #[error("不是有效的 PDF 文件")]
    NotPdf,
    /// 加密的 PDF
    #[error("PDF 已加密，请先解除密码保护")]
    Encrypted,
    /// 解析失败
    #[error("PDF 解析失败: {0}")]
    Corrupt(String),
    /// 提取任务异常退出
    #[error("提取任务异常终止: {0}")]
    TaskFailed(String),
}

/// 结构化生成错误
#[derive(Debug, Error)]
pub enum GenerationError {
    /// API 调用失败
    #[error("调用模型失败 (模型: {model}): {message}")]
    ApiCallFailed { model: String, message: String },
    /// 返回内容为空
    #[error("模型返回内容为空 (模型: {model})")]
    EmptyResponse { model: String },
    /// 调用超时
    #[error("调用 {prompt} 超时 ({seconds} 秒)")]
    Timeout { prompt: String, seconds: u64 },
    /// 返回内容不是 JSON
    #[error("{prompt} 的返回内容无法解析为 JSON: {message}")]
    InvalidJson { prompt: String, message: String },
    /// 返回内容不符合输出 schema
    #[error("{prompt} 的返回内容不符合输出结构: {}", .details.join("; "))]
    SchemaViolation { prompt: String, details: Vec<String> },
    /// 输入数据不符合输入 schema
    #[error("{prompt} 的输入数据不符合输入结构: {}", .details.join("; "))]
    InvalidInput { prompt: String, details: Vec<String> },
    /// 提示词模板渲染失败
    #[error("{prompt} 的提示词模板渲染失败: {message}")]
    Template { prompt: String, message: String },
    /// 生成的试卷缺少必填内容
    #[error("生成结果不完整，缺少: {}", .missing.join(", "))]
    Incomplete { missing: Vec<&'static str> },
}

/// 评分结果校验错误
#[derive(Debug, Error)]
pub enum GradingError {
    /// 返回的结果数量与提交数量不一致
    #[error("模型返回了 {actual} 条评分结果，但提交了 {expected} 份试卷")]
    CountMismatch { expected: usize, actual: usize },
    /// 返回结果无法与提交一一对应
    #[error("评分结果无法与提交对应: {0}")]
    Correlation(String),
}

/// 输入校验错误
#[derive(Debug, Error)]
pub enum ValidationError {
    /// 没有任何提交
    #[error("至少需要一份试卷")]
    EmptyBatch,
    /// 文件数量超限
    #[error("最多允许 {max} 个文件，当前选择了 {actual} 个")]
    TooManyFiles { max: usize, actual: usize },
    /// 文件过大
    #[error("文件 \"{name}\" 超过了 {max_bytes} 字节的大小限制")]
    FileTooLarge { name: String, max_bytes: u64 },
    /// 文件为空
    #[error("文件 \"{name}\" 为空")]
    EmptyFile { name: String },
    /// 文件不是 PDF
    #[error("文件 \"{name}\" 不是有效的 PDF")]
    NotPdf { name: String },
    /// 评分标准太短
    #[error("评分标准至少需要 {min} 个字符")]
    CriteriaTooShort { min: usize },
    /// 缺少主题
    #[error("该题型需要提供主题")]
    TopicRequired,
    /// 实践作业缺少主题、说明和源文档
    #[error("需要提供主题、说明或源文档")]
    TopicOrInstructionsRequired,
    /// 名称为空
    #[error("评分标准名称不能为空")]
    EmptyCriteriaName,
    /// 找不到保存的评分标准
    #[error("找不到评分标准 #{0}")]
    CriteriaNotFound(i64),
    /// 找不到评估记录
    #[error("找不到评估记录 #{0}")]
    EvaluationNotFound(i64),
    /// 找不到学生结果
    #[error("找不到学生结果 #{0}")]
    ResultNotFound(i64),
    /// 学生结果没有关联原始文件
    #[error("学生结果 #{0} 没有保存原始试卷")]
    SubmissionMissing(i64),
}

/// 存储错误
#[derive(Debug, Error)]
pub enum StorageError {
    /// SQLite 错误
    #[error("数据库操作失败: {0}")]
    Database(#[from] rusqlite::Error),
    /// 文件读写错误
    #[error("文件操作失败 ({path}): {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 连接锁被污染
    #[error("数据库连接不可用")]
    LockPoisoned,
    /// 数据库任务异常退出
    #[error("数据库任务异常终止: {0}")]
    TaskFailed(String),
    /// 数据行内容无效
    #[error("数据记录无效: {0}")]
    CorruptRow(String),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 读取配置文件失败
    #[error("读取配置文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("配置文件解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 缺少必填配置
    #[error("缺少配置项 {0}")]
    Missing(&'static str),
}

/// 失败分类
///
/// 展示层根据它告诉用户下一步该做什么
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// 文档问题
    Extraction,
    /// AI 服务问题
    Service,
    /// 输入或结果数量校验问题
    Validation,
    /// 身份问题
    Authorization,
    /// 存储问题
    Storage,
    /// 配置问题
    Config,
}

impl AppError {
    /// 获取失败分类
    pub fn kind(&self) -> FailureKind {
        match self {
            AppError::Extraction { .. } => FailureKind::Extraction,
            AppError::Generation(GenerationError::InvalidInput { .. })
            | AppError::Generation(GenerationError::Template { .. }) => FailureKind::Config,
            AppError::Generation(_) => FailureKind::Service,
            AppError::Grading(_) | AppError::Validation(_) => FailureKind::Validation,
            AppError::Unauthenticated => FailureKind::Authorization,
            AppError::Storage(_) => FailureKind::Storage,
            AppError::Config(_) => FailureKind::Config,
        }
    }

    /// 给用户的处理建议
    pub fn user_hint(&self) -> &'static str {
        match self {
            AppError::Extraction { .. } => "请检查并重新上传无法读取的 PDF 文件",
            AppError::Generation(GenerationError::SchemaViolation { .. })
            | AppError::Generation(GenerationError::InvalidJson { .. })
            | AppError::Generation(GenerationError::Incomplete { .. }) => {
                "AI 返回的内容格式不正确，请重试，或调整评分标准/说明后再试"
            }
            AppError::Generation(GenerationError::InvalidInput { .. })
            | AppError::Generation(GenerationError::Template { .. }) => "内部提示词配置有误，请联系管理员",
            AppError::Generation(_) => "AI 服务暂时不可用，请稍后重试",
            AppError::Grading(_) => "AI 返回的评分结果与试卷数量不一致，请重新评分",
            AppError::Validation(_) => "请根据提示修改输入后重试",
            AppError::Unauthenticated => "请先登录",
            AppError::Storage(_) => "保存数据失败，请稍后重试",
            AppError::Config(_) => "服务配置不完整，请联系管理员",
        }
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建文档提取错误
    pub fn extraction(document: impl Into<String>, source: ExtractionError) -> Self {
        AppError::Extraction {
            document: document.into(),
            source,
        }
    }

    /// 创建 schema 校验错误
    pub fn schema_violation(prompt: impl Into<String>, details: Vec<String>) -> Self {
        AppError::Generation(GenerationError::SchemaViolation {
            prompt: prompt.into(),
            details,
        })
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io {
            path: String::new(),
            source: err,
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
