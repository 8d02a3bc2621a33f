// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! On-disk layout shared by the file-based backends.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    time::SystemTime,
};

use stowage_pool::{Error, Result};
use xxhash_rust::xxh3::xxh3_64;

use crate::{DEFAULT_DIRECTORY, validate_namespace};

/// One file per key under `<root>/<namespace>/<kind>/ab/cd/<hash>`.
///
/// Each backend passes its own `kind`, so backends of different drivers
/// sharing a root and namespace never touch each other's files.
///
/// Writes go to a temporary file in the target directory and are renamed
/// into place, so readers never see a partially written file.
#[derive(Debug, Clone)]
pub(crate) struct FileLayout {
    directory: PathBuf,
}

impl FileLayout {
    /// The directory is not created until the first write.
    pub(crate) fn new(root: Option<&Path>, namespace: &str, kind: &str) -> Result<Self> {
        validate_namespace(namespace)?;
        if !namespace.is_empty() && namespace.chars().all(|c| c == '.') {
            return Err(Error::from_message(format!(
                "namespace `{namespace}` cannot be used as a directory name"
            )));
        }

        let root = root.map_or_else(|| std::env::temp_dir().join(DEFAULT_DIRECTORY), Path::to_path_buf);
        let namespace = if namespace.is_empty() { "@" } else { namespace };

        Ok(Self {
            directory: root.join(namespace).join(kind),
        })
    }

    pub(crate) fn directory(&self) -> &Path {
        &self.directory
    }

    pub(crate) fn path_for(&self, key: &str) -> PathBuf {
        let hash = format!("{:016x}", xxh3_64(key.as_bytes()));
        self.directory.join(&hash[..2]).join(&hash[2..4]).join(hash)
    }

    pub(crate) fn read(path: &Path) -> Result<Option<Vec<u8>>> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::from_source(e)),
        }
    }

    pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| Error::from_message(format!("`{}` has no parent directory", path.display())))?;
        fs::create_dir_all(parent).map_err(Error::from_source)?;

        let mut file = tempfile::NamedTempFile::new_in(parent).map_err(Error::from_source)?;
        file.write_all(bytes).map_err(Error::from_source)?;
        file.persist(path).map_err(|e| Error::from_source(e.error))?;
        Ok(())
    }

    pub(crate) fn remove(path: &Path) -> Result<bool> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(Error::from_source(e)),
        }
    }

    pub(crate) fn purge(&self) -> Result<bool> {
        match fs::remove_dir_all(&self.directory) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(Error::from_source(e)),
        }
    }
}

/// Identifies one version of a file on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Fingerprint {
    modified: SystemTime,
    len: u64,
}

impl Fingerprint {
    /// Returns `None` if the file does not exist.
    pub(crate) fn of(path: &Path) -> Result<Option<Self>> {
        match fs::metadata(path) {
            Ok(meta) => Ok(Some(Self {
                modified: meta.modified().map_err(Error::from_source)?,
                len: meta.len(),
            })),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::from_source(e)),
        }
    }
}
