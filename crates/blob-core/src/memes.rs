//! Random meme selection from a local directory.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{messaging::types::OutgoingPhoto, Error, Result};

/// Extensions (lower-case) eligible for sending.
pub const MEME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

/// An image file in the memes directory.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct MemeFile(PathBuf);

impl MemeFile {
    pub fn path(&self) -> &Path {
        &self.0
    }

    pub fn file_name(&self) -> String {
        self.0
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "meme".to_string())
    }

    /// Read the file into an upload.
    pub async fn read(&self) -> Result<OutgoingPhoto> {
        let bytes = tokio::fs::read(&self.0).await?;
        Ok(OutgoingPhoto {
            file_name: self.file_name(),
            bytes,
        })
    }
}

pub fn is_meme_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| MEME_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Picks memes from a single directory (no recursion).
#[derive(Clone, Debug)]
pub struct MemeSelector {
    dir: PathBuf,
}

impl MemeSelector {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Fails with `InvalidPath` if the directory is missing or not a directory.
    pub fn check_dir(&self) -> Result<()> {
        match fs::metadata(&self.dir) {
            Ok(md) if md.is_dir() => Ok(()),
            Ok(_) => Err(Error::InvalidPath {
                path: self.dir.clone(),
                reason: "not a directory".to_string(),
            }),
            Err(e) => Err(Error::InvalidPath {
                path: self.dir.clone(),
                reason: e.to_string(),
            }),
        }
    }

    /// All eligible memes, sorted by path.
    pub fn list(&self) -> Result<Vec<MemeFile>> {
        let mut out = Vec::new();
        for ent in fs::read_dir(&self.dir)? {
            let path = ent?.path();
            if !is_meme_path(&path) {
                continue;
            }
            // Follows symlinks; directories named `x.png` are skipped.
            if !fs::metadata(&path).map(|md| md.is_file()).unwrap_or(false) {
                continue;
            }
            out.push(MemeFile(path));
        }
        out.sort();
        Ok(out)
    }

    /// A uniformly random meme, or `None` when the directory holds no eligible file.
    pub fn pick_random(&self) -> Result<Option<MemeFile>> {
        self.pick_random_with(&mut fastrand::Rng::new())
    }

    pub fn pick_random_with(&self, rng: &mut fastrand::Rng) -> Result<Option<MemeFile>> {
        let mut memes = self.list()?;
        if memes.is_empty() {
            return Ok(None);
        }
        let idx = rng.usize(..memes.len());
        Ok(Some(memes.swap_remove(idx)))
    }
}
