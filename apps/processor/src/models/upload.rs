use std::path::Path;

use bytes::Bytes;
use serde::Serialize;

use crate::errors::PipelineError;

/// A resume file as submitted by the host. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ResumeUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl ResumeUpload {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Reads a resume from disk, guessing the content type from the extension.
    pub async fn from_path(path: &Path) -> Result<Self, PipelineError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("resume")
            .to_string();
        Ok(Self::new(file_name, content_type_for(path), bytes))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("pdf") => "application/pdf",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("doc") => "application/msword",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Where in the product the upload originated. Sent with every multipart stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPoint {
    pub entry_point: String,
    pub page_url: String,
}

impl Default for EntryPoint {
    fn default() -> Self {
        Self {
            entry_point: "upload-resume".to_string(),
            page_url: "/upload-resume".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_content_type_by_extension() {
        assert_eq!(content_type_for(Path::new("cv.PDF")), "application/pdf");
        assert_eq!(content_type_for(Path::new("cv.txt")), "text/plain");
        assert_eq!(
            content_type_for(Path::new("cv")),
            "application/octet-stream"
        );
    }

    #[tokio::test]
    async fn test_from_path_reads_bytes_and_name() {
        let mut file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        file.write_all(b"%PDF-1.4 fake").unwrap();

        let upload = ResumeUpload::from_path(file.path()).await.unwrap();
        assert_eq!(upload.content_type, "application/pdf");
        assert_eq!(upload.len(), 13);
        assert!(upload.file_name.ends_with(".pdf"));
    }

    #[tokio::test]
    async fn test_from_path_missing_file_is_io_error() {
        let err = ResumeUpload::from_path(Path::new("/definitely/not/here.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
    }

    #[test]
    fn test_default_entry_point() {
        let entry = EntryPoint::default();
        assert_eq!(entry.entry_point, "upload-resume");
        assert_eq!(entry.page_url, "/upload-resume");
    }
}
