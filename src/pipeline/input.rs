//! Input resolution: turn a user-supplied path or URL into a [`SourceFile`].
//!
//! The library core works on in-memory bytes; this stage is the only one that
//! touches the file system or the network. Local files keep their name and
//! get a declared type from their extension. URLs are downloaded in one go
//! and take their declared type from the `Content-Type` header, falling back
//! to the extension in the URL path.

use crate::dispatch::mime_for_name;
use crate::error::IngestError;
use crate::model::SourceFile;
use std::path::Path;
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve a path or URL into a [`SourceFile`].
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<SourceFile, IngestError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(Path::new(input)).await
    }
}

/// Read a local file, keeping its file name as the user-visible name.
pub async fn read_local(path: &Path) -> Result<SourceFile, IngestError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => IngestError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => IngestError::FileNotFound {
            path: path.to_path_buf(),
        },
    })?;

    let name = display_name(path);
    let declared_type = mime_for_name(&name).unwrap_or_default().to_string();
    debug!(
        "Read local file: {} ({} bytes, type {:?})",
        path.display(),
        bytes.len(),
        declared_type
    );
    Ok(SourceFile::new(name, declared_type, bytes))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<SourceFile, IngestError> {
    info!("Downloading: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| IngestError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            IngestError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            IngestError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(IngestError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let name = filename_from_url(url);
    let header_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
        .filter(|v| !v.is_empty() && v != "application/octet-stream");
    let declared_type =
        header_type.unwrap_or_else(|| mime_for_name(&name).unwrap_or_default().to_string());

    let bytes = response
        .bytes()
        .await
        .map_err(|e| IngestError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes as '{}'", bytes.len(), name);
    Ok(SourceFile::new(name, declared_type, bytes.to_vec()))
}

/// Last non-empty URL path segment, or `"download"`.
fn filename_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|last| !last.is_empty())
        .unwrap_or_else(|| "download".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn filename_from_url_path() {
        assert_eq!(filename_from_url("https://x.org/a/b/scan.png"), "scan.png");
        assert_eq!(filename_from_url("https://x.org/"), "download");
        assert_eq!(filename_from_url("not a url"), "download");
    }

    #[tokio::test]
    async fn local_file_gets_name_and_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.docx");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"PK\x03\x04")
            .unwrap();

        let src = read_local(&path).await.unwrap();
        assert_eq!(src.name, "notes.docx");
        assert_eq!(
            src.declared_type,
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        );
        assert_eq!(src.bytes.as_slice(), b"PK\x03\x04");
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let err = resolve_input("/definitely/not/here.pdf", 5).await.unwrap_err();
        assert!(matches!(err, IngestError::FileNotFound { .. }));
    }
}
