use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum PhotoError {
    #[error("photo '{0}' is missing")]
    Missing(String),

    #[error("invalid photo name '{0}'")]
    InvalidName(String),

    #[error("could not remove photo '{name}': {source}")]
    RemovalFailed {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("IO error on photo '{name}': {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("could not list photo directory: {0}")]
    Listing(#[from] walkdir::Error),
}

/// What `remove` found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Removed,
    Missing,
}

#[derive(Debug, Clone)]
pub struct StoredPhoto {
    pub name: String,
    pub modified: SystemTime,
}

/// Flat directory of uploaded images, addressed by generated filename.
#[derive(Debug, Clone)]
pub struct PhotoStore {
    root: PathBuf,
}

impl PhotoStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        PhotoStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ensure_root(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root)
    }

    /// Names come from clients, so only a single plain path component is
    /// accepted.
    fn resolve(&self, name: &str) -> Result<PathBuf, PhotoError> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) if !name.contains('\\') => Ok(self.root.join(name)),
            _ => Err(PhotoError::InvalidName(name.to_string())),
        }
    }

    pub fn exists(&self, name: &str) -> bool {
        self.resolve(name).map(|path| path.is_file()).unwrap_or(false)
    }

    pub fn read_bytes(&self, name: &str) -> Result<Vec<u8>, PhotoError> {
        let path = self.resolve(name)?;
        fs::read(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => PhotoError::Missing(name.to_string()),
            _ => PhotoError::Io {
                name: name.to_string(),
                source,
            },
        })
    }

    pub fn write(&self, name: &str, bytes: &[u8]) -> Result<(), PhotoError> {
        let path = self.resolve(name)?;
        fs::write(&path, bytes).map_err(|source| PhotoError::Io {
            name: name.to_string(),
            source,
        })
    }

    /// Remove a photo. A photo that is already gone is not an error.
    pub fn remove(&self, name: &str) -> Result<Removal, PhotoError> {
        let path = self.resolve(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(Removal::Removed),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Removal::Missing),
            Err(source) => Err(PhotoError::RemovalFailed {
                name: name.to_string(),
                source,
            }),
        }
    }

    /// Byte-for-byte comparison of two stored photos, reading both fully.
    pub fn same_content(&self, a: &str, b: &str) -> Result<bool, PhotoError> {
        let a_bytes = self.read_bytes(a)?;
        let b_bytes = self.read_bytes(b)?;
        Ok(a_bytes == b_bytes)
    }

    /// Regular files directly under the root.
    pub fn list(&self) -> Result<Vec<StoredPhoto>, PhotoError> {
        let mut photos = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let modified = entry
                .metadata()?
                .modified()
                .unwrap_or(SystemTime::UNIX_EPOCH);
            photos.push(StoredPhoto {
                name: entry.file_name().to_string_lossy().into_owned(),
                modified,
            });
        }
        Ok(photos)
    }
}
