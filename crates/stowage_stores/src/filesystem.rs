// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! One JSON document per key on the local filesystem.

use std::{marker::PhantomData, path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use stowage_pool::{Error, Result};

use crate::{Backend, CacheValue, Record, layout::FileLayout};

#[derive(Serialize, Deserialize)]
struct Document<V> {
    key: String,
    record: Record<V>,
}

/// Backend for the `file` driver.
///
/// Each key is written as a JSON document holding the key itself, so two
/// keys whose hashes collide never read each other's value. A file that is
/// not such a document reads as a miss.
///
/// Without an explicit root the files live under
/// `<temp dir>/stowage/<namespace>/files`.
#[derive(Debug, Clone)]
pub struct FilesystemBackend<V> {
    layout: FileLayout,
    _phantom: PhantomData<fn() -> V>,
}

impl<V> FilesystemBackend<V> {
    /// Creates a backend rooted at `root`, or at the temp directory.
    ///
    /// # Errors
    ///
    /// Returns an error if `namespace` contains characters outside `-+_.A-Za-z0-9`
    /// or only dots.
    pub fn new(root: Option<&Path>, namespace: &str) -> Result<Self> {
        Ok(Self {
            layout: FileLayout::new(root, namespace, "files")?,
            _phantom: PhantomData,
        })
    }

    /// Returns the directory holding this backend's files.
    #[must_use]
    pub fn directory(&self) -> &Path {
        self.layout.directory()
    }
}

impl<V> Backend<V> for FilesystemBackend<V>
where
    V: CacheValue,
{
    fn fetch(&self, key: &str) -> Result<Option<Record<V>>> {
        let Some(bytes) = FileLayout::read(&self.layout.path_for(key))? else {
            return Ok(None);
        };
        Ok(serde_json::from_slice::<Document<V>>(&bytes)
            .ok()
            .filter(|document| document.key == key)
            .map(|document| document.record))
    }

    fn store(&self, key: &str, record: Record<V>, _ttl: Option<Duration>) -> Result<bool> {
        let document = Document {
            key: key.to_owned(),
            record,
        };
        let bytes = serde_json::to_vec(&document).map_err(Error::from_source)?;
        FileLayout::write_atomic(&self.layout.path_for(key), &bytes)?;
        Ok(true)
    }

    fn remove(&self, key: &str) -> Result<bool> {
        FileLayout::remove(&self.layout.path_for(key))
    }

    fn purge(&self) -> Result<bool> {
        self.layout.purge()
    }
}
