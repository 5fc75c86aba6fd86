//! Upload validation and storage of the original document

use crate::error::PipelineError;
use crate::services::DocumentStore;

/// Largest accepted upload (20 MiB)
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Final path component of a client-supplied filename, trimmed
pub fn sanitize_file_name(raw: &str) -> Option<String> {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim();
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}

/// Validate an upload before anything leaves the process.
///
/// Returns the sanitized filename.
pub fn check_upload(file_name: &str, size: usize, limit: usize) -> Result<String, PipelineError> {
    if size > limit {
        return Err(PipelineError::PayloadTooLarge { size, limit });
    }
    if size == 0 {
        return Err(PipelineError::InvalidInput("Uploaded file is empty".into()));
    }
    sanitize_file_name(file_name)
        .ok_or_else(|| PipelineError::InvalidInput("Uploaded file has no name".into()))
}

/// Per-user object path
pub fn storage_path(owner: &str, file_name: &str) -> String {
    format!("{}/{}", owner, file_name)
}

/// Store the document and return its public URL.
pub async fn store_original(
    store: &dyn DocumentStore,
    owner: &str,
    file_name: &str,
    bytes: &[u8],
) -> Result<String, PipelineError> {
    let path = storage_path(owner, file_name);
    let public_url = store
        .upload_object(&path, bytes.to_vec(), PDF_CONTENT_TYPE)
        .await?;
    tracing::info!("Stored {} ({} bytes) at {}", file_name, bytes.len(), path);
    Ok(public_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_directories() {
        assert_eq!(
            sanitize_file_name("../../etc/permit.pdf").as_deref(),
            Some("permit.pdf")
        );
        assert_eq!(
            sanitize_file_name(r"C:\Users\me\deck permit.pdf").as_deref(),
            Some("deck permit.pdf")
        );
        assert_eq!(sanitize_file_name("  "), None);
        assert_eq!(sanitize_file_name("uploads/"), None);
    }

    #[test]
    fn test_check_upload_rejects_oversized_first() {
        let err = check_upload("", MAX_UPLOAD_BYTES + 1, MAX_UPLOAD_BYTES).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::PayloadTooLarge {
                size,
                limit: MAX_UPLOAD_BYTES
            } if size == MAX_UPLOAD_BYTES + 1
        ));
    }

    #[test]
    fn test_check_upload_accepts_exact_limit() {
        let name = check_upload("permit.pdf", MAX_UPLOAD_BYTES, MAX_UPLOAD_BYTES).unwrap();
        assert_eq!(name, "permit.pdf");
    }

    #[test]
    fn test_check_upload_rejects_empty_file() {
        let err = check_upload("permit.pdf", 0, MAX_UPLOAD_BYTES).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }

    #[test]
    fn test_storage_path_is_namespaced_by_owner() {
        assert_eq!(storage_path("user-1", "a.pdf"), "user-1/a.pdf");
    }
}
