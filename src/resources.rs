//! # Stack Resource Materialization
//!
//! Resolves the working directory holding the compose definition and its
//! auxiliary files (broker configuration, SQL init scripts).
//!
//! Resolution is disk-first: an explicit override directory, then the crate
//! source tree. When neither is addressable on disk - the harness runs from
//! an installed artifact - the embedded copies of the resource set are
//! written out to a fresh temporary directory instead.
//!
//! Resolution happens at most once per process; the resolved handle is
//! cached and the backing temporary tree, when there is one, lives for the
//! process lifetime.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::StackConfig;
use crate::error::{Result, TestkitError};

/// Compose definition file name, relative to the stack directory
pub const COMPOSE_FILE_NAME: &str = "podman-compose.yml";

/// Required stack files as `(relative path, embedded contents)`
const REQUIRED_RESOURCES: &[(&str, &str)] = &[
    (COMPOSE_FILE_NAME, include_str!("../podman/podman-compose.yml")),
    (
        "rabbitmq/rabbitmq.conf",
        include_str!("../podman/rabbitmq/rabbitmq.conf"),
    ),
    ("script/init.sql", include_str!("../podman/script/init.sql")),
];

/// Optional auxiliary files; entries without embedded contents are skipped
const OPTIONAL_RESOURCES: &[(&str, Option<&str>)] = &[(
    "rabbitmq/definitions.json",
    Some(include_str!("../podman/rabbitmq/definitions.json")),
)];

/// Resolved stack working directory.
///
/// Owns the backing temporary directory when the resources were
/// materialized, so the tree outlives every `up()`/`down()` cycle in the
/// process.
#[derive(Debug)]
pub struct StackHandle {
    dir: PathBuf,
    _temp: Option<TempDir>,
}

impl StackHandle {
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

static STACK: OnceCell<StackHandle> = OnceCell::const_new();

/// Resolve the stack working directory, at most once per process.
///
/// The first caller's configuration wins; later calls return the cached
/// handle without touching the filesystem again.
pub async fn resolve(config: &StackConfig) -> Result<&'static StackHandle> {
    STACK
        .get_or_try_init(|| async { resolve_uncached(config) })
        .await
}

fn resolve_uncached(config: &StackConfig) -> Result<StackHandle> {
    if let Some(dir) = &config.stack_dir {
        let dir = validate_stack_dir(dir)?;
        info!(dir = %dir.display(), "Using configured stack directory");
        return Ok(StackHandle { dir, _temp: None });
    }

    let source_tree = Path::new(env!("CARGO_MANIFEST_DIR")).join("podman");
    if source_tree.join(COMPOSE_FILE_NAME).is_file() {
        let dir = validate_stack_dir(&source_tree)?;
        info!(dir = %dir.display(), "Using source-tree stack directory");
        return Ok(StackHandle { dir, _temp: None });
    }

    materialize_to_temp()
}

/// Check that `dir` is a directory holding every required stack file.
fn validate_stack_dir(dir: &Path) -> Result<PathBuf> {
    if !dir.is_dir() {
        return Err(TestkitError::InvalidStackDir {
            path: dir.display().to_string(),
        });
    }

    for &(rel_path, _) in REQUIRED_RESOURCES {
        let file = dir.join(rel_path);
        if !file.is_file() {
            return Err(TestkitError::ResourceNotFound {
                path: file.display().to_string(),
            });
        }
    }

    for &(rel_path, _) in OPTIONAL_RESOURCES {
        if !dir.join(rel_path).is_file() {
            debug!(resource = rel_path, "Optional stack resource absent, skipping");
        }
    }

    Ok(dir.to_path_buf())
}

/// Write the embedded resource set into a fresh temporary directory.
fn materialize_to_temp() -> Result<StackHandle> {
    let temp =
        TempDir::with_prefix("crypto-scout-podman-").map_err(|e| TestkitError::Materialization {
            path: std::env::temp_dir().display().to_string(),
            message: e.to_string(),
        })?;

    for &(rel_path, contents) in REQUIRED_RESOURCES {
        write_resource(temp.path(), rel_path, contents)?;
    }

    for &(rel_path, contents) in OPTIONAL_RESOURCES {
        match contents {
            Some(contents) => write_resource(temp.path(), rel_path, contents)?,
            None => debug!(resource = rel_path, "Optional stack resource not bundled, skipping"),
        }
    }

    let dir = temp.path().to_path_buf();
    info!(dir = %dir.display(), "Materialized stack resources to temporary directory");
    Ok(StackHandle {
        dir,
        _temp: Some(temp),
    })
}

fn write_resource(root: &Path, rel_path: &str, contents: &str) -> Result<()> {
    let target = root.join(rel_path);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| materialization_error(parent, e))?;
    }
    fs::write(&target, contents).map_err(|e| materialization_error(&target, e))
}

fn materialization_error(path: &Path, source: std::io::Error) -> TestkitError {
    TestkitError::Materialization {
        path: path.display().to_string(),
        message: source.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn materialization_writes_every_bundled_file() {
        let handle = materialize_to_temp().expect("Materialization should succeed");

        assert!(handle.dir().join(COMPOSE_FILE_NAME).is_file());
        assert!(handle.dir().join("rabbitmq/rabbitmq.conf").is_file());
        assert!(handle.dir().join("rabbitmq/definitions.json").is_file());
        assert!(handle.dir().join("script/init.sql").is_file());
    }

    #[test]
    fn missing_required_file_fails_validation() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        fs::write(dir.path().join(COMPOSE_FILE_NAME), "services: {}")
            .expect("Failed to write compose file");

        let err = validate_stack_dir(dir.path()).expect_err("Validation should fail");
        assert!(matches!(err, TestkitError::ResourceNotFound { .. }));
    }

    #[test]
    fn non_directory_fails_validation() {
        let file = tempfile::NamedTempFile::new().expect("Failed to create temp file");

        let err = validate_stack_dir(file.path()).expect_err("Validation should fail");
        assert!(matches!(err, TestkitError::InvalidStackDir { .. }));
    }

    #[test]
    fn complete_directory_passes_validation() {
        let handle = materialize_to_temp().expect("Materialization should succeed");

        let dir = validate_stack_dir(handle.dir()).expect("Validation should pass");
        assert_eq!(dir, handle.dir());
    }

    #[tokio::test]
    async fn resolution_is_cached_per_process() {
        let config = StackConfig::default();

        let first = resolve(&config).await.expect("First resolve should succeed");
        let second = resolve(&config).await.expect("Second resolve should succeed");

        assert!(std::ptr::eq(first, second));
        assert_eq!(first.dir(), second.dir());
    }
}
