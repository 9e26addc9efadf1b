//! Media path validation
//!
//! Client-supplied paths are only used after they resolve to an existing
//! file below the configured media root.

use std::path::{Path, PathBuf};

use crate::error::{PlaybackError, Result};

/// Turns a client-supplied path into a trusted absolute path
pub trait PathValidator: Send + Sync {
    fn validate(&self, requested: &str) -> Result<PathBuf>;
}

/// Confines media access to one directory tree
#[derive(Debug, Clone)]
pub struct MediaRoot {
    root: PathBuf,
}

impl MediaRoot {
    /// `root` may start with `~`. A root that cannot be resolved yet is kept
    /// as given; every lookup then fails until it exists.
    pub fn new(root: &str) -> Self {
        let expanded = PathBuf::from(shellexpand::tilde(root).as_ref());
        let root = match expanded.canonicalize() {
            Ok(root) => root,
            Err(e) => {
                tracing::warn!(root = %expanded.display(), "Media root unavailable: {}", e);
                expanded
            }
        };
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl PathValidator for MediaRoot {
    fn validate(&self, requested: &str) -> Result<PathBuf> {
        if requested.trim().is_empty() {
            return Err(PlaybackError::invalid("'path' parameter is required"));
        }

        let expanded = PathBuf::from(shellexpand::tilde(requested).as_ref());
        let candidate = if expanded.is_absolute() {
            expanded
        } else {
            self.root.join(expanded)
        };

        // Resolves `..` and symlinks, and fails for missing files
        let resolved = candidate
            .canonicalize()
            .map_err(|_| PlaybackError::MediaNotFound(requested.to_string()))?;

        if !resolved.starts_with(&self.root) {
            tracing::warn!(requested, "Path outside media root rejected");
            return Err(PlaybackError::AccessDenied(requested.to_string()));
        }
        Ok(resolved)
    }
}
