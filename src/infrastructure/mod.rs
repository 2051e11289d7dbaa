//! 基础设施层（Infrastructure）
//!
//! 持有稀缺资源（模型连接、上传目录），只暴露能力，不认识评分流程

pub mod document_store;
pub mod identity;
pub mod llm_client;
pub mod pdf_extractor;

pub use document_store::{DocumentStore, LocalDocumentStore};
pub use identity::{IdentityProvider, StaticIdentity};
pub use llm_client::{LlmBackend, LlmClient};
pub use pdf_extractor::{extract_text, PdfTextExtractor, TextExtractor};
