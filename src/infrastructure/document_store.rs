//! 原始文档存储 - 基础设施层
//!
//! 保存上传的 PDF 原件，返回之后可以再次读取的存储引用

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::error::StorageError;

/// 文档存储能力
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// 保存文档，返回存储引用
    async fn save(&self, bytes: &[u8], suggested_name: &str) -> Result<String, StorageError>;

    /// 按存储引用读取文档
    async fn load(&self, storage_ref: &str) -> Result<Vec<u8>, StorageError>;

    /// 删除文档
    async fn delete(&self, storage_ref: &str) -> Result<(), StorageError>;
}

/// 本地目录存储
///
/// 文件名为 `<随机 ID>-<清理后的原文件名>`，存储引用是相对于根目录的文件名。
pub struct LocalDocumentStore {
    root: PathBuf,
}

impl LocalDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, storage_ref: &str) -> Result<PathBuf, StorageError> {
        let name = Path::new(storage_ref)
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| *n == storage_ref)
            .ok_or_else(|| StorageError::CorruptRow(format!("无效的存储引用: {}", storage_ref)))?;
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl DocumentStore for LocalDocumentStore {
    async fn save(&self, bytes: &[u8], suggested_name: &str) -> Result<String, StorageError> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|source| StorageError::Io {
                path: self.root.display().to_string(),
                source,
            })?;

        let file_name = format!("{}-{}", nanoid::nanoid!(12), sanitize_file_name(suggested_name));
        let path = self.root.join(&file_name);
        fs::write(&path, bytes).await.map_err(|source| StorageError::Io {
            path: path.display().to_string(),
            source,
        })?;

        debug!("已保存原始文档: {} ({} 字节)", path.display(), bytes.len());
        Ok(file_name)
    }

    async fn load(&self, storage_ref: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(storage_ref)?;
        fs::read(&path).await.map_err(|source| StorageError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    async fn delete(&self, storage_ref: &str) -> Result<(), StorageError> {
        let path = self.resolve(storage_ref)?;
        fs::remove_file(&path).await.map_err(|source| StorageError::Io {
            path: path.display().to_string(),
            source,
        })?;
        debug!("已删除原始文档: {}", path.display());
        Ok(())
    }
}

/// 只保留字母、数字、`.`、`-`、`_`，其他字符替换为 `_`
fn sanitize_file_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document.pdf");
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches(|c| c == '.' || c == '_').is_empty() {
        "document.pdf".to_string()
    } else {
        cleaned
    }
}
