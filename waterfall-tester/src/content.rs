use std::fs;
use std::path::PathBuf;

use thiserror::Error;
use waterfall_engine::{ContentError, ContentPack, ContentSource};

#[derive(Debug, Error)]
pub enum PackLoadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ContentError,
    },
    #[error("no content packs found under {}", .0.display())]
    Empty(PathBuf),
}

/// Content packs on disk: a single `.json` file, or every `.json` file in a
/// directory, loaded in file-name order.
#[derive(Debug, Clone)]
pub struct PackDirectory {
    root: PathBuf,
}

impl PackDirectory {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn pack_files(&self) -> Result<Vec<PathBuf>, PackLoadError> {
        if self.root.is_file() {
            return Ok(vec![self.root.clone()]);
        }
        let entries = fs::read_dir(&self.root).map_err(|source| PackLoadError::Io {
            path: self.root.clone(),
            source,
        })?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| PackLoadError::Io {
                path: self.root.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

impl ContentSource for PackDirectory {
    type Error = PackLoadError;

    fn load_packs(&self) -> Result<Vec<ContentPack>, Self::Error> {
        let files = self.pack_files()?;
        if files.is_empty() {
            return Err(PackLoadError::Empty(self.root.clone()));
        }
        let mut packs = Vec::with_capacity(files.len());
        for path in files {
            let raw = fs::read_to_string(&path).map_err(|source| PackLoadError::Io {
                path: path.clone(),
                source,
            })?;
            let pack = ContentPack::from_json(&raw)
                .map_err(|source| PackLoadError::Parse { path: path.clone(), source })?;
            log::debug!(
                "loaded {} challenges for {} from {}",
                pack.challenge_count(),
                pack.game_version,
                path.display()
            );
            packs.push(pack);
        }
        Ok(packs)
    }
}
