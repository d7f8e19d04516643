use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::warn;

/// Answers whether a previously produced artifact is already on disk.
///
/// Probes are best-effort: an implementation that cannot tell must answer
/// `false` so the sub-step is recomputed.
pub trait ArtifactExistenceChecker: fmt::Debug {
    /// True when `path` exists.
    fn exists(&self, path: &Path) -> bool;
}

/// Probes the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FilesystemChecker;

impl ArtifactExistenceChecker for FilesystemChecker {
    fn exists(&self, path: &Path) -> bool {
        match path.try_exists() {
            Ok(found) => found,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "artifact probe failed, recomputing");
                false
            }
        }
    }
}

/// Never finds anything; disables resume.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoArtifacts;

impl ArtifactExistenceChecker for NoArtifacts {
    fn exists(&self, _path: &Path) -> bool {
        false
    }
}

/// A fixed set of artifacts, for dry runs and tests.
#[derive(Debug, Default, Clone)]
pub struct KnownArtifacts {
    paths: HashSet<PathBuf>,
}

impl KnownArtifacts {
    /// Record an artifact.
    pub fn insert<P: Into<PathBuf>>(&mut self, path: P) {
        self.paths.insert(path.into());
    }
}

impl<P: Into<PathBuf>> FromIterator<P> for KnownArtifacts {
    fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
        Self {
            paths: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl ArtifactExistenceChecker for KnownArtifacts {
    fn exists(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filesystem_checker_sees_real_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("S1.bam");
        assert!(!FilesystemChecker.exists(&file));
        std::fs::write(&file, b"").unwrap();
        assert!(FilesystemChecker.exists(&file));
        assert!(!NoArtifacts.exists(&file));
    }

    #[test]
    fn known_artifacts_match_exact_paths() {
        let known: KnownArtifacts = ["results/fq2bam/S1/S1.bam"].into_iter().collect();
        assert!(known.exists(Path::new("results/fq2bam/S1/S1.bam")));
        assert!(!known.exists(Path::new("results/fq2bam/S2/S2.bam")));
    }
}
