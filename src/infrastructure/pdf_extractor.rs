//! PDF 文本提取 - 基础设施层
//!
//! 把上传的二进制文档转换为纯文本，不保留版面、表格和图片。
//! 纯 CPU 计算，调用方负责放到阻塞线程池里执行。

use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, warn};

use crate::error::ExtractionError;

/// PDF 文件头
pub const PDF_MAGIC: &[u8] = b"%PDF-";

/// 加密标记的扫描窗口
const ENCRYPT_SCAN_WINDOW: usize = 4096;

/// 文本提取能力
///
/// 编排层只依赖这个 trait，测试时可以替换为确定性的实现。
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractionError>;
}

/// 基于 `pdf-extract` 的 PDF 文本提取器
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTextExtractor;

impl PdfTextExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl TextExtractor for PdfTextExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        extract_text(bytes)
    }
}

/// 从 PDF 字节中提取文本
///
/// 文件为空、不是 PDF、已加密或无法解析时返回错误。
pub fn extract_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    if bytes.is_empty() {
        return Err(ExtractionError::Empty);
    }
    if !looks_like_pdf(bytes) {
        return Err(ExtractionError::NotPdf);
    }
    if is_encrypted(bytes) {
        return Err(ExtractionError::Encrypted);
    }

    // pdf-extract 遇到部分畸形文件会 panic，这里统一转成解析错误
    let text = panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(bytes)))
        .map_err(|payload| ExtractionError::Corrupt(panic_message(payload.as_ref())))?
        .map_err(|e| ExtractionError::Corrupt(e.to_string()))?;

    let text = normalize_whitespace(&text);
    if text.is_empty() {
        warn!("PDF 中没有可提取的文本（可能是扫描件）");
    }
    debug!("提取完成: {} 字节 → {} 字符", bytes.len(), text.chars().count());
    Ok(text)
}

/// 检查 PDF 文件头（允许前面有少量空白或 BOM）
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(1024)];
    head.windows(PDF_MAGIC.len()).any(|w| w == PDF_MAGIC)
}

/// 检查文件头部、尾部（trailer）以及中间区域是否有 /Encrypt 字典
fn is_encrypted(bytes: &[u8]) -> bool {
    let len = bytes.len();
    let head = &bytes[..len.min(ENCRYPT_SCAN_WINDOW)];
    if contains_encrypt(head) {
        return true;
    }
    if len > ENCRYPT_SCAN_WINDOW {
        let tail = &bytes[len - ENCRYPT_SCAN_WINDOW..];
        if contains_encrypt(tail) {
            return true;
        }
    }
    if len > ENCRYPT_SCAN_WINDOW * 2 {
        let mid_start = len / 2 - ENCRYPT_SCAN_WINDOW;
        let mid_end = (mid_start + ENCRYPT_SCAN_WINDOW * 2).min(len);
        if contains_encrypt(&bytes[mid_start..mid_end]) {
            return true;
        }
    }
    false
}

fn contains_encrypt(window: &[u8]) -> bool {
    window.windows(8).any(|w| w == b"/Encrypt")
}

/// 去掉每行行尾空白，并把连续的空行合并为一个
fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "解析器异常退出".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 手工拼出只有一页、一行 Helvetica 文字的 PDF（含正确的 xref 偏移）
    fn single_page_pdf(text: &str) -> Vec<u8> {
        let content = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text);
        let objects = [
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R \
             /Resources << /Font << /F1 5 0 R >> >> >>"
                .to_string(),
            format!("<< /Length {} >>\nstream\n{}\nendstream", content.len(), content),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        ];

        let mut pdf = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::with_capacity(objects.len());
        for (index, body) in objects.iter().enumerate() {
            offsets.push(pdf.len());
            pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", index + 1, body).as_bytes());
        }

        let xref_start = pdf.len();
        let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
        for offset in offsets {
            xref.push_str(&format!("{:010} 00000 n \n", offset));
        }
        pdf.extend_from_slice(xref.as_bytes());
        pdf.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                objects.len() + 1,
                xref_start
            )
            .as_bytes(),
        );
        pdf
    }

    #[test]
    fn test_extracts_text_from_valid_pdf() {
        let bytes = single_page_pdf("Name: Ana Perez");
        let text = PdfTextExtractor::new().extract(&bytes).unwrap();
        assert!(text.contains("Name: Ana Perez"), "extracted: {text:?}");
    }

    #[test]
    fn test_garbage_body_is_corrupt() {
        let bytes = b"%PDF-1.4\n garbage that is not a pdf body";
        assert!(matches!(extract_text(bytes), Err(ExtractionError::Corrupt(_))));
    }

    #[test]
    fn test_empty_bytes_are_rejected() {
        assert!(matches!(extract_text(&[]), Err(ExtractionError::Empty)));
    }

    #[test]
    fn test_non_pdf_bytes_are_rejected() {
        let bytes = b"PK\x03\x04 this is a zip archive";
        assert!(matches!(extract_text(bytes), Err(ExtractionError::NotPdf)));
    }

    #[test]
    fn test_encrypted_marker_in_header_is_rejected() {
        let mut bytes = b"%PDF-1.4\n".to_vec();
        bytes.extend_from_slice(b"1 0 obj << /Filter /Standard >> endobj\n");
        bytes.extend_from_slice(b"trailer << /Root 2 0 R /Encrypt 1 0 R >>\n%%EOF");
        assert!(matches!(extract_text(&bytes), Err(ExtractionError::Encrypted)));
    }

    #[test]
    fn test_encrypted_marker_in_trailer_is_rejected() {
        let mut bytes = b"%PDF-1.7\n".to_vec();
        bytes.extend(std::iter::repeat(b'x').take(10_000));
        bytes.extend_from_slice(b"\ntrailer << /Encrypt 5 0 R >>\n%%EOF");
        assert!(matches!(extract_text(&bytes), Err(ExtractionError::Encrypted)));
    }

    #[test]
    fn test_looks_like_pdf_tolerates_leading_bytes() {
        assert!(looks_like_pdf(b"\xEF\xBB\xBF%PDF-1.5"));
        assert!(!looks_like_pdf(b"%PD"));
    }

    #[test]
    fn test_normalize_whitespace_collapses_blank_runs() {
        let text = "Name: Ana  \n\n\n\nQ1: 42\n";
        assert_eq!(normalize_whitespace(text), "Name: Ana\n\nQ1: 42");
    }
}
