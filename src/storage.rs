//! Key-value access to the backing store of a container.

use std::path::Path;

mod channel;
mod filesystem;

pub use channel::{
    ChannelInputStream, ChannelOutputStream, ChannelReader, ChannelWriter, LockMode, LockedChannel,
};
pub use filesystem::FileSystemKeyValueAccess;

use crate::path;

/// Capabilities required of a store backing an N5 container.
///
/// Keys are `/`-separated paths as understood by [crate::path].
/// Locking calls block the calling thread until the lock is compatible with its current holders.
pub trait KeyValueAccess {
    fn exists(&self, key: &str) -> bool;

    fn is_directory(&self, key: &str) -> bool;

    fn is_file(&self, key: &str) -> bool;

    /// Names of the child directories of `key`, sorted.
    fn list(&self, key: &str) -> crate::Result<Vec<String>>;

    /// Size of the value at `key` in bytes.
    fn size(&self, key: &str) -> crate::Result<u64>;

    /// Recursively delete `key`; deleting a missing key is not an error.
    fn delete(&self, key: &str) -> crate::Result<()>;

    fn create_directories(&self, key: &str) -> crate::Result<()>;

    fn components(&self, key: &str) -> Vec<String> {
        path::components(key)
    }

    fn normalize(&self, key: &str) -> String {
        path::normalize(key)
    }

    fn compose(&self, components: &[&str]) -> String {
        path::compose(components)
    }

    /// Acquire a shared lock on an existing key.
    fn lock_for_reading(&self, key: &str) -> crate::Result<LockedChannel>;

    /// Acquire an exclusive lock on a key, creating it (and its parents) if necessary.
    fn lock_for_writing(&self, key: &str) -> crate::Result<LockedChannel>;

    /// As [KeyValueAccess::lock_for_reading], but returns `None` instead of waiting.
    fn try_lock_for_reading(&self, key: &str) -> crate::Result<Option<LockedChannel>>;

    /// As [KeyValueAccess::lock_for_writing], but returns `None` instead of waiting.
    fn try_lock_for_writing(&self, key: &str) -> crate::Result<Option<LockedChannel>>;
}

impl<A: KeyValueAccess + ?Sized> KeyValueAccess for &A {
    fn exists(&self, key: &str) -> bool {
        (**self).exists(key)
    }

    fn is_directory(&self, key: &str) -> bool {
        (**self).is_directory(key)
    }

    fn is_file(&self, key: &str) -> bool {
        (**self).is_file(key)
    }

    fn list(&self, key: &str) -> crate::Result<Vec<String>> {
        (**self).list(key)
    }

    fn size(&self, key: &str) -> crate::Result<u64> {
        (**self).size(key)
    }

    fn delete(&self, key: &str) -> crate::Result<()> {
        (**self).delete(key)
    }

    fn create_directories(&self, key: &str) -> crate::Result<()> {
        (**self).create_directories(key)
    }

    fn components(&self, key: &str) -> Vec<String> {
        (**self).components(key)
    }

    fn normalize(&self, key: &str) -> String {
        (**self).normalize(key)
    }

    fn compose(&self, components: &[&str]) -> String {
        (**self).compose(components)
    }

    fn lock_for_reading(&self, key: &str) -> crate::Result<LockedChannel> {
        (**self).lock_for_reading(key)
    }

    fn lock_for_writing(&self, key: &str) -> crate::Result<LockedChannel> {
        (**self).lock_for_writing(key)
    }

    fn try_lock_for_reading(&self, key: &str) -> crate::Result<Option<LockedChannel>> {
        (**self).try_lock_for_reading(key)
    }

    fn try_lock_for_writing(&self, key: &str) -> crate::Result<Option<LockedChannel>> {
        (**self).try_lock_for_writing(key)
    }
}

/// Map an I/O error raised while waiting for a lock.
pub(crate) fn lock_error(key: impl AsRef<Path>, error: std::io::Error) -> crate::Error {
    if error.kind() == std::io::ErrorKind::Interrupted {
        crate::Error::LockInterrupted(key.as_ref().to_path_buf())
    } else {
        crate::Error::Io(error)
    }
}
