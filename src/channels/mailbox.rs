//! Directory import: loads `*.eml` files into the message store.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::channels::email::parse_raw_email;
use crate::error::IngestError;
use crate::store::Database;

/// Outcome of one directory import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    /// Files whose external ID was already stored.
    pub duplicates: usize,
    /// Files that could not be read or parsed.
    pub failed: usize,
}

/// Import every `.eml` file directly inside `dir`, in file-name order.
///
/// The external ID is the `Message-ID` header, falling back to the file
/// stem. Already-stored messages are counted as duplicates and left
/// untouched. Unreadable files are logged and counted; only a missing
/// directory or a store error aborts the import.
pub async fn import_directory(dir: &Path, db: &dyn Database) -> Result<ImportReport, IngestError> {
    let files = list_eml_files(dir).await?;
    info!(dir = %dir.display(), files = files.len(), "Importing messages");

    let mut report = ImportReport::default();
    for path in files {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read message file");
                report.failed += 1;
                continue;
            }
        };

        let message = match parse_raw_email(&raw, &stem) {
            Ok(message) => message,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to parse message file");
                report.failed += 1;
                continue;
            }
        };

        if db
            .get_message_by_external_id(&message.external_id)
            .await?
            .is_some()
        {
            debug!(external_id = %message.external_id, "Message already stored");
            report.duplicates += 1;
            continue;
        }

        let id = db.insert_message(&message).await?;
        debug!(id = %id, external_id = %message.external_id, "Stored message");
        report.imported += 1;
    }

    info!(
        imported = report.imported,
        duplicates = report.duplicates,
        failed = report.failed,
        "Import complete"
    );
    Ok(report)
}

async fn list_eml_files(dir: &Path) -> Result<Vec<PathBuf>, IngestError> {
    let io_error = |source: std::io::Error| IngestError::Io {
        path: dir.display().to_string(),
        source,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(io_error)?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
        let path = entry.path();
        let is_eml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("eml"));
        if is_eml && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LibSqlBackend;

    async fn test_db() -> LibSqlBackend {
        let db = LibSqlBackend::new_memory().await.unwrap();
        db.init_schema().await.unwrap();
        db
    }

    fn write(dir: &Path, name: &str, contents: &str) {
        std::fs::write(dir.join(name), contents).unwrap();
    }

    #[tokio::test]
    async fn imports_eml_files_and_skips_others() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "a.eml",
            "Message-ID: <a@x>\r\nFrom: a@example.com\r\nSubject: A\r\n\r\nbody a\r\n",
        );
        write(
            dir.path(),
            "b.EML",
            "From: b@example.com\r\nSubject: B\r\n\r\nbody b\r\n",
        );
        write(dir.path(), "notes.txt", "not an email");

        let db = test_db().await;
        let report = import_directory(dir.path(), &db).await.unwrap();
        assert_eq!(
            report,
            ImportReport {
                imported: 2,
                duplicates: 0,
                failed: 0,
            }
        );

        let a = db.get_message_by_external_id("a@x").await.unwrap().unwrap();
        assert_eq!(a.subject.as_deref(), Some("A"));
        let b = db.get_message_by_external_id("b").await.unwrap().unwrap();
        assert_eq!(b.sender.as_deref(), Some("b@example.com"));
    }

    #[tokio::test]
    async fn reimport_counts_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "a.eml",
            "Message-ID: <a@x>\r\nFrom: a@example.com\r\nSubject: A\r\n\r\nbody\r\n",
        );

        let db = test_db().await;
        import_directory(dir.path(), &db).await.unwrap();
        let report = import_directory(dir.path(), &db).await.unwrap();
        assert_eq!(report.imported, 0);
        assert_eq!(report.duplicates, 1);
        assert_eq!(db.fetch_messages().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unparseable_file_is_counted_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "empty.eml", "");
        write(
            dir.path(),
            "ok.eml",
            "From: a@example.com\r\nSubject: ok\r\n\r\nbody\r\n",
        );

        let db = test_db().await;
        let report = import_directory(dir.path(), &db).await.unwrap();
        assert_eq!(report.imported, 1);
        assert_eq!(report.failed, 1);
    }

    #[tokio::test]
    async fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db().await;
        let err = import_directory(&dir.path().join("nope"), &db)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Io { .. }));
    }
}
