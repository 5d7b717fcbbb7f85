//! Artifact Writer (C6): atomic file write of a published model's JSON artifact.
//!
//! Writers never write to the final path directly: a unique temp file is created
//! with an exclusive-create flag, then `rename()`d onto the final path, which is
//! atomic on POSIX filesystems. Readers (the Dynamic Route Fabric's watcher and
//! startup build) therefore never observe a half-written file.

use engine_core::ApiError;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactBody<'a> {
    pub id: String,
    pub name: &'a str,
    pub table_name: Option<&'a str>,
    pub owner_field: Option<&'a str>,
    pub version: i32,
    pub published_at: String,
    pub is_system: bool,
    pub definition: serde_json::Value,
}

/// Sanitizes a model name into a filesystem-safe stem by replacing whitespace with
/// underscores, per `SPEC_FULL.md` §4.6.
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join("_")
}

#[must_use]
pub fn artifact_path(models_dir: &Path, model_name: &str) -> PathBuf {
    models_dir.join(format!("{}.json", sanitize_name(model_name)))
}

/// Serializes and writes an artifact body to a uniquely-named temp file inside
/// `models_dir`, without renaming it onto the final path yet. The Model Registry
/// calls this before opening its publish transaction, so a serialization or
/// filesystem failure aborts before any database write happens; `finalize` performs
/// the atomic rename once the transaction has committed.
pub fn write_temp(models_dir: &Path, body: &ArtifactBody<'_>) -> Result<(PathBuf, PathBuf), ApiError> {
    std::fs::create_dir_all(models_dir)
        .map_err(|e| ApiError::storage("failed to prepare models directory", e.to_string()))?;

    let final_path = artifact_path(models_dir, body.name);
    let temp_path = models_dir.join(format!("{}.{}.tmp", sanitize_name(body.name), Uuid::new_v4()));

    let json = serde_json::to_string_pretty(body)
        .map_err(|e| ApiError::storage("failed to serialize model artifact", e.to_string()))?;

    let write_result = (|| -> std::io::Result<()> {
        let mut file = std::fs::OpenOptions::new().write(true).create_new(true).open(&temp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        Ok(())
    })();

    if let Err(e) = write_result {
        let _ = std::fs::remove_file(&temp_path);
        return Err(ApiError::storage("failed to write model artifact", e.to_string()));
    }

    Ok((temp_path, final_path))
}

/// Renames a temp artifact onto its final path. Called after the publish
/// transaction commits; a failure here is reported as `PartialFailure` by the
/// caller, since the database state is already authoritative and committed.
pub fn finalize(temp_path: &Path, final_path: &Path) -> std::io::Result<()> {
    let result = std::fs::rename(temp_path, final_path);
    if result.is_err() {
        let _ = std::fs::remove_file(temp_path);
    }
    result
}

/// Best-effort delete used by unpublish/delete; failures are logged, not propagated,
/// since the artifact is a rebuildable cache of database state.
pub fn remove_best_effort(models_dir: &Path, model_name: &str) {
    let path = artifact_path(models_dir, model_name);
    if let Err(e) = std::fs::remove_file(&path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove model artifact");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_whitespace_in_name() {
        assert_eq!(sanitize_name("Customer Order"), "Customer_Order");
        assert_eq!(sanitize_name("Product"), "Product");
    }

}
