//! Artifact handling for the unit being deployed.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::DeployError;

/// Packaging kind of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Packaging {
    Application,
    Domain,
}

/// A file handle plus the logical name it deploys under.
#[derive(Debug, Clone)]
pub struct Artifact {
    path: PathBuf,
    name: String,
    packaging: Packaging,
}

impl Artifact {
    pub fn application(path: PathBuf, name: impl Into<String>) -> Self {
        Self {
            path,
            name: name.into(),
            packaging: Packaging::Application,
        }
    }

    /// A domain artifact deploys under its own file stem.
    pub fn domain(path: PathBuf) -> Self {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            name,
            packaging: Packaging::Domain,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn packaging(&self) -> Packaging {
        self.packaging
    }

    /// File name the artifact deploys under: `<name>.<ext>`.
    pub fn target_file_name(&self) -> String {
        match self.path.extension() {
            Some(ext) => format!("{}.{}", self.name, ext.to_string_lossy()),
            None => self.name.clone(),
        }
    }

    /// Fails unless the artifact file is present on disk.
    pub fn ensure_exists(&self) -> anyhow::Result<()> {
        if !self.path.is_file() {
            return Err(DeployError::MissingArtifact(self.path.clone()).into());
        }
        Ok(())
    }

    /// Return a path whose base name matches the configured name, copying
    /// the file beside the original when the names differ.
    ///
    /// The original file is never moved or modified.
    pub fn staged_path(&self) -> anyhow::Result<PathBuf> {
        self.ensure_exists()?;
        let current_stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        if current_stem == self.name {
            return Ok(self.path.clone());
        }
        let staged = self.path.with_file_name(self.target_file_name());
        std::fs::copy(&self.path, &staged).with_context(|| {
            format!(
                "Failed to copy artifact {} to {}",
                self.path.display(),
                staged.display()
            )
        })?;
        tracing::debug!(
            from = %self.path.display(),
            to = %staged.display(),
            "renamed artifact to configured application name"
        );
        Ok(staged)
    }
}
