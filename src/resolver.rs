//! Resource resolver (C4): maps a validated request path to an open
//! file handle under the document root.
//!
//! Grounded on the original C++ implementation's `io/file_resolver.cpp`
//! (`original_source/`): join document root and path textually (no URL
//! decoding at this layer), try to open it, retry against `index.html`
//! if it turned out to be a directory, and classify the failure if
//! neither exists. The canonicalize-and-prefix-check jail (step 5) has
//! no counterpart in the original — it never guarded against
//! `../../etc/passwd` beyond what the textual join already blocks — and
//! is added per spec.md §4.4.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::File;

use crate::errors::RequestError;

/// An opened, jail-checked file ready to be streamed by C5/C1.
pub struct ResolvedFile {
    pub file: File,
    pub size: u64,
    pub canonical_path: PathBuf,
}

/// Resolves `request_path` (already validated, origin-form, leading
/// `/`) against `document_root`.
pub async fn resolve(document_root: &Path, request_path: &str) -> Result<ResolvedFile, RequestError> {
    let relative = request_path.trim_start_matches('/');
    let joined = document_root.join(relative);

    let (file, metadata) = open_with_metadata(&joined).await?;

    let (file, metadata, final_path) = if metadata.is_dir() {
        let index_path = joined.join("index.html");
        let (file, metadata) = open_with_metadata(&index_path).await?;
        (file, metadata, index_path)
    } else {
        (file, metadata, joined)
    };

    let canonical_root = tokio::fs::canonicalize(document_root)
        .await
        .map_err(|_| RequestError::FileNotFound)?;
    let canonical_path = tokio::fs::canonicalize(&final_path)
        .await
        .map_err(|_| RequestError::FileNotFound)?;

    if !canonical_path.starts_with(&canonical_root) {
        // Escaped the document root via a symlink or `..` component;
        // treated identically to a missing file so the jail is not
        // distinguishable from the ordinary 404 path (spec.md §4.4).
        return Err(RequestError::FileNotFound);
    }

    Ok(ResolvedFile {
        file,
        size: metadata.len(),
        canonical_path,
    })
}

async fn open_with_metadata(path: &Path) -> Result<(File, std::fs::Metadata), RequestError> {
    let file = File::open(path).await.map_err(classify_open_error)?;
    let metadata = file.metadata().await.map_err(classify_open_error)?;
    Ok((file, metadata))
}

fn classify_open_error(error: io::Error) -> RequestError {
    if error.kind() == io::ErrorKind::PermissionDenied {
        return RequestError::FileReadInsufficientPermissions;
    }
    #[cfg(unix)]
    {
        if matches!(error.raw_os_error(), Some(libc::EMFILE) | Some(libc::ENFILE)) {
            return RequestError::FileSystemOverload;
        }
    }
    RequestError::FileNotFound
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hello").unwrap();

        let resolved = resolve(dir.path(), "/a.txt").await.unwrap();
        assert_eq!(resolved.size, 5);
    }

    #[tokio::test]
    async fn directory_falls_back_to_index() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/index.html"), b"hi\n").unwrap();

        let resolved = resolve(dir.path(), "/sub").await.unwrap();
        assert_eq!(resolved.size, 3);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve(dir.path(), "/missing.txt").await.unwrap_err();
        assert_eq!(err, RequestError::FileNotFound);
    }

    #[tokio::test]
    async fn path_escape_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.txt"), b"nope").unwrap();

        let escape_path = format!(
            "/../{}/secret.txt",
            outside.path().file_name().unwrap().to_str().unwrap()
        );
        let err = resolve(dir.path(), &escape_path).await.unwrap_err();
        assert_eq!(err, RequestError::FileNotFound);
    }
}
