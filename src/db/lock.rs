use std::{
    fs,
    fs::OpenOptions,
    io,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use humantime::format_duration;

use crate::{db::Db, prelude::*};

/// Serializes the invocations: only one process may drive the inverter at a time.
///
/// The lock file is removed on drop. A lock older than the expiration is considered
/// left over by a crashed process and gets taken over.
#[must_use]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    const FILE_NAME: &'static str = "nightjar.lock";

    #[instrument(skip_all)]
    pub fn acquire(db: &Db, expiration: Duration) -> Result<Self> {
        let path = db.path().join(Self::FILE_NAME);
        match Self::create(&path) {
            Ok(()) => {}
            Err(error) if error.kind() == ErrorKind::AlreadyExists => {
                let age = fs::metadata(&path)?.modified()?.elapsed().unwrap_or_default();
                let age = Duration::from_secs(age.as_secs());
                ensure!(
                    age >= expiration,
                    "another invocation is holding `{}` for {}",
                    path.display(),
                    format_duration(age),
                );
                warn!(age = %format_duration(age), "taking over the stale lock…");
                fs::remove_file(&path)?;
                Self::create(&path)
                    .with_context(|| format!("failed to take over `{}`", path.display()))?;
            }
            Err(error) => {
                return Err(error).with_context(|| format!("failed to create `{}`", path.display()));
            }
        }
        debug!("acquired");
        Ok(Self { path })
    }

    fn create(path: &Path) -> io::Result<()> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        writeln!(file, "{}", std::process::id())
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(error) = fs::remove_file(&self.path) {
            warn!("failed to release `{}`: {error:#}", self.path.display());
        }
    }
}
