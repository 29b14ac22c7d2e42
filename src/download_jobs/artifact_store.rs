//! Filesystem locations of generated artifacts and their sources.

use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::models::{ArtifactType, DownloadJob};

/// Resolves where artifacts live on disk.
///
/// Each artifact type gets its own folder under `downloads_dir`; the file is named after
/// the job identifier plus the type's extension.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    downloads_dir: PathBuf,
    sources_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(downloads_dir: impl Into<PathBuf>, sources_dir: impl Into<PathBuf>) -> Self {
        Self {
            downloads_dir: downloads_dir.into(),
            sources_dir: sources_dir.into(),
        }
    }

    pub fn downloads_dir(&self) -> &Path {
        &self.downloads_dir
    }

    /// Folder shared by every artifact of `artifact_type`.
    pub fn output_dir(&self, artifact_type: ArtifactType) -> PathBuf {
        self.downloads_dir.join(artifact_type.as_str())
    }

    pub fn resolve_path(
        &self,
        identifier: &str,
        artifact_type: ArtifactType,
        extension: &str,
    ) -> PathBuf {
        self.output_dir(artifact_type)
            .join(format!("{}{}", identifier, extension))
    }

    pub fn artifact_path(&self, job: &DownloadJob) -> PathBuf {
        self.resolve_path(
            &job.identifier,
            job.artifact_type,
            job.artifact_type.spec().extension,
        )
    }

    /// Source record the backend renders from.
    pub fn source_path(&self, source_id: &str) -> PathBuf {
        self.sources_dir.join(format!("{}.xml", source_id))
    }

    pub fn exists(&self, job: &DownloadJob) -> bool {
        self.artifact_path(job).is_file()
    }

    /// Size in bytes of the artifact, if it exists.
    pub fn size(&self, job: &DownloadJob) -> Option<u64> {
        std::fs::metadata(self.artifact_path(job))
            .ok()
            .filter(|m| m.is_file())
            .map(|m| m.len())
    }

    /// Remove the artifact. Returns false when there was nothing to remove.
    pub fn delete(&self, job: &DownloadJob) -> io::Result<bool> {
        let path = self.artifact_path(job);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!("Deleted artifact {:?}", path);
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_resolve_path_layout() {
        let store = ArtifactStore::new("/data/downloads", "/data/sources");

        assert_eq!(
            store.resolve_path("abc", ArtifactType::Pdf, ".pdf"),
            PathBuf::from("/data/downloads/pdf/abc.pdf")
        );
        assert_eq!(
            store.source_path("REC1"),
            PathBuf::from("/data/sources/REC1.xml")
        );
    }

    #[test]
    fn test_exists_size_and_delete() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("downloads"), dir.path().join("sources"));
        let job = DownloadJob::new(ArtifactType::Epub, "REC1", "", 60_000, 0);

        assert!(!store.exists(&job));
        assert_eq!(store.size(&job), None);
        assert!(!store.delete(&job).unwrap());

        std::fs::create_dir_all(store.output_dir(ArtifactType::Epub)).unwrap();
        std::fs::write(store.artifact_path(&job), b"epub bytes").unwrap();

        assert!(store.exists(&job));
        assert_eq!(store.size(&job), Some(10));
        assert!(store.delete(&job).unwrap());
        assert!(!store.exists(&job));
    }
}
