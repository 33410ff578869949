use std::{
    fs,
    fs::File,
    io::Write,
    path::{Path, PathBuf},
};

use crate::{db::state::States, prelude::*};

pub mod lock;
pub mod state;

/// File-backed storage in the data directory.
#[must_use]
#[derive(Clone, Debug)]
pub struct Db(PathBuf);

impl Db {
    /// Open the data directory, creating it if needed.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create `{}`", path.display()))?;
        Ok(Self(path.to_path_buf()))
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    pub fn states(&self) -> States<'_> {
        States(&self.0)
    }
}

/// Replace the file contents so that readers never observe a partial write.
pub fn write_atomically(path: &Path, contents: &[u8]) -> Result {
    let temporary_path = path.with_extension("tmp");
    let mut file = File::create(&temporary_path)
        .with_context(|| format!("failed to create `{}`", temporary_path.display()))?;
    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);
    fs::rename(&temporary_path, path)
        .with_context(|| format!("failed to replace `{}`", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_atomically_replaces_contents() -> Result {
        let directory = tempfile::tempdir()?;
        let path = directory.path().join("status.json");
        write_atomically(&path, b"first")?;
        write_atomically(&path, b"second")?;
        assert_eq!(fs::read_to_string(&path)?, "second");
        assert!(!path.with_extension("tmp").exists());
        Ok(())
    }
}
