use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;

use fs2::FileExt;

use super::{KeyValueAccess, LockMode, LockedChannel, lock_error};

/// [KeyValueAccess] over the local filesystem, with keys interpreted as OS paths.
///
/// Locks are `flock`-style advisory locks: they exclude other cooperating handles,
/// including other handles opened by this process.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSystemKeyValueAccess;

impl FileSystemKeyValueAccess {
    pub fn new() -> Self {
        Self
    }

    fn open_for_reading(key: &str) -> io::Result<File> {
        OpenOptions::new().read(true).open(key)
    }

    fn open_for_writing(key: &str) -> io::Result<File> {
        if let Some(parent) = Path::new(key).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(key)
    }

    fn lock(key: &str, mode: LockMode) -> crate::Result<LockedChannel> {
        let file = match mode {
            LockMode::Shared => Self::open_for_reading(key)?,
            LockMode::Exclusive => Self::open_for_writing(key)?,
        };
        log::trace!("waiting for {mode:?} lock on {key}");
        let locked = match mode {
            LockMode::Shared => FileExt::lock_shared(&file),
            LockMode::Exclusive => FileExt::lock_exclusive(&file),
        };
        // on failure the file is dropped here, so no half-acquired lock survives
        locked.map_err(|e| lock_error(key, e))?;
        log::debug!("acquired {mode:?} lock on {key}");
        Ok(LockedChannel::new(key, mode, file))
    }

    fn try_lock(key: &str, mode: LockMode) -> crate::Result<Option<LockedChannel>> {
        let file = match mode {
            LockMode::Shared => Self::open_for_reading(key)?,
            LockMode::Exclusive => Self::open_for_writing(key)?,
        };
        let locked = match mode {
            LockMode::Shared => FileExt::try_lock_shared(&file),
            LockMode::Exclusive => FileExt::try_lock_exclusive(&file),
        };
        match locked {
            Ok(()) => {
                log::debug!("acquired {mode:?} lock on {key}");
                Ok(Some(LockedChannel::new(key, mode, file)))
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(e) => Err(lock_error(key, e)),
        }
    }

    fn delete_recursive(path: &Path) -> crate::Result<()> {
        if path.is_dir() {
            for entry in fs::read_dir(path)? {
                Self::delete_recursive(&entry?.path())?;
            }
            fs::remove_dir(path)?;
        } else {
            // hold the exclusive lock so no reader sees a half-deleted value
            let file = OpenOptions::new().write(true).open(path)?;
            FileExt::lock_exclusive(&file).map_err(|e| lock_error(path, e))?;
            fs::remove_file(path)?;
            drop(file);
        }
        Ok(())
    }
}

impl KeyValueAccess for FileSystemKeyValueAccess {
    fn exists(&self, key: &str) -> bool {
        Path::new(key).exists()
    }

    fn is_directory(&self, key: &str) -> bool {
        Path::new(key).is_dir()
    }

    fn is_file(&self, key: &str) -> bool {
        Path::new(key).is_file()
    }

    fn list(&self, key: &str) -> crate::Result<Vec<String>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(key)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                out.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        out.sort();
        Ok(out)
    }

    fn size(&self, key: &str) -> crate::Result<u64> {
        Ok(fs::metadata(key)?.len())
    }

    fn delete(&self, key: &str) -> crate::Result<()> {
        let path = Path::new(key);
        if !path.exists() {
            return Ok(());
        }
        log::debug!("deleting {key}");
        Self::delete_recursive(path)
    }

    fn create_directories(&self, key: &str) -> crate::Result<()> {
        fs::create_dir_all(key)?;
        Ok(())
    }

    fn lock_for_reading(&self, key: &str) -> crate::Result<LockedChannel> {
        Self::lock(key, LockMode::Shared)
    }

    fn lock_for_writing(&self, key: &str) -> crate::Result<LockedChannel> {
        Self::lock(key, LockMode::Exclusive)
    }

    fn try_lock_for_reading(&self, key: &str) -> crate::Result<Option<LockedChannel>> {
        Self::try_lock(key, LockMode::Shared)
    }

    fn try_lock_for_writing(&self, key: &str) -> crate::Result<Option<LockedChannel>> {
        Self::try_lock(key, LockMode::Exclusive)
    }
}
