// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Binary per-key files with an in-process decoded copy.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use stowage_pool::Result;

use crate::{
    Backend, CacheValue, Record, codec,
    layout::{FileLayout, Fingerprint},
};

#[derive(Serialize, Deserialize)]
struct Compiled<V> {
    key: String,
    record: Record<V>,
}

/// Backend for the `phpfiles` driver.
///
/// Uses the same directory layout as [`FilesystemBackend`](crate::FilesystemBackend)
/// with compact binary files, under a `compiled` subdirectory of the
/// namespace. Decoded files are kept in memory and reused until the file on
/// disk changes, so hot keys are served without decoding. A file that does
/// not decode reads as a miss and is replaced by the next write.
#[derive(Debug, Clone)]
pub struct CompiledFilesBackend<V> {
    layout: FileLayout,
    loaded: Arc<Mutex<HashMap<PathBuf, (Fingerprint, Record<V>)>>>,
}

impl<V> CompiledFilesBackend<V> {
    /// Creates a backend rooted at `root`, or at the temp directory.
    ///
    /// # Errors
    ///
    /// Returns an error if `namespace` contains characters outside `-+_.A-Za-z0-9`
    /// or only dots.
    pub fn new(root: Option<&Path>, namespace: &str) -> Result<Self> {
        Ok(Self {
            layout: FileLayout::new(root, namespace, "compiled")?,
            loaded: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Returns the directory holding this backend's files.
    #[must_use]
    pub fn directory(&self) -> &Path {
        self.layout.directory()
    }

    /// Returns the number of decoded files held in memory.
    #[must_use]
    pub fn loaded_count(&self) -> usize {
        self.loaded.lock().len()
    }
}

impl<V> Backend<V> for CompiledFilesBackend<V>
where
    V: CacheValue,
{
    fn fetch(&self, key: &str) -> Result<Option<Record<V>>> {
        let path = self.layout.path_for(key);
        let Some(fingerprint) = Fingerprint::of(&path)? else {
            self.loaded.lock().remove(&path);
            return Ok(None);
        };

        if let Some((seen, record)) = self.loaded.lock().get(&path)
            && *seen == fingerprint
        {
            return Ok(Some(record.clone()));
        }

        let Some(bytes) = FileLayout::read(&path)? else {
            return Ok(None);
        };
        let Some(compiled) = codec::decode::<Compiled<V>>(&bytes).ok().filter(|compiled| compiled.key == key) else {
            return Ok(None);
        };

        self.loaded.lock().insert(path, (fingerprint, compiled.record.clone()));
        Ok(Some(compiled.record))
    }

    fn store(&self, key: &str, record: Record<V>, _ttl: Option<Duration>) -> Result<bool> {
        let path = self.layout.path_for(key);
        let compiled = Compiled {
            key: key.to_owned(),
            record,
        };
        FileLayout::write_atomic(&path, &codec::encode(&compiled)?)?;

        match Fingerprint::of(&path)? {
            Some(fingerprint) => {
                self.loaded.lock().insert(path, (fingerprint, compiled.record));
            }
            None => {
                self.loaded.lock().remove(&path);
            }
        }
        Ok(true)
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let path = self.layout.path_for(key);
        self.loaded.lock().remove(&path);
        FileLayout::remove(&path)
    }

    fn purge(&self) -> Result<bool> {
        self.loaded.lock().clear();
        self.layout.purge()
    }
}
