// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A media file living in its own temporary directory
///
/// The directory is removed by [`TempMedia::close`] or, failing that, on drop.
#[derive(Debug)]
pub struct TempMedia {
    dir: TempDir,
    path: PathBuf,
}

impl TempMedia {
    /// Allocate a fresh directory under the system temp dir for a file called `file_name`
    pub fn allocate(prefix: &str, file_name: &str) -> io::Result<Self> {
        Self::allocate_in(&std::env::temp_dir(), prefix, file_name)
    }

    /// Allocate a fresh directory below `root`
    pub fn allocate_in(root: &Path, prefix: &str, file_name: &str) -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix(prefix).tempdir_in(root)?;
        let path = dir.path().join(file_name);
        Ok(Self { dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the temporary directory, reporting failures
    pub fn close(self) -> io::Result<()> {
        self.dir.close()
    }
}
