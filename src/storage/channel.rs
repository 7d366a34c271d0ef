use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use fs2::FileExt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Any number of readers.
    Shared,
    /// A single writer, excluding readers.
    Exclusive,
}

/// The one OS handle behind a [LockedChannel] and every view derived from it.
///
/// Closing is guarded by taking the file out of the mutex, so it happens at most once
/// regardless of which view triggers it.
#[derive(Debug)]
struct SharedHandle {
    path: PathBuf,
    mode: LockMode,
    file: Mutex<Option<File>>,
}

impl SharedHandle {
    fn with_file<T>(&self, f: impl FnOnce(&mut File) -> io::Result<T>) -> io::Result<T> {
        let mut guard = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_mut() {
            Some(file) => f(file),
            None => Err(io::Error::other(format!(
                "channel on {} is closed",
                self.path.display()
            ))),
        }
    }

    fn is_open(&self) -> bool {
        self.file
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn close(&self) -> io::Result<()> {
        let taken = self
            .file
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(file) = taken else {
            return Ok(());
        };
        // dropping the handle releases the lock even if the explicit unlock fails
        let unlocked = FileExt::unlock(&file);
        drop(file);
        log::debug!("released {:?} lock on {}", self.mode, self.path.display());
        unlocked
    }
}

/// A locked handle on a single key.
///
/// Readers, writers and streams derived from the channel all share its handle:
/// closing or dropping any of them closes the handle and releases the lock for all of them.
#[derive(Debug)]
pub struct LockedChannel {
    handle: Arc<SharedHandle>,
}

impl LockedChannel {
    /// Wrap a file on which `mode` is already locked.
    pub(crate) fn new(path: impl Into<PathBuf>, mode: LockMode, file: File) -> Self {
        Self {
            handle: Arc::new(SharedHandle {
                path: path.into(),
                mode,
                file: Mutex::new(Some(file)),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.handle.path
    }

    pub fn mode(&self) -> LockMode {
        self.handle.mode
    }

    /// False once the channel or any of its views has been closed.
    pub fn is_open(&self) -> bool {
        self.handle.is_open()
    }

    /// Buffered reader over the channel.
    pub fn new_reader(&self) -> ChannelReader {
        ChannelReader {
            inner: BufReader::new(self.new_input_stream()),
        }
    }

    /// Buffered writer over the channel; flushed before the handle is closed.
    pub fn new_writer(&self) -> ChannelWriter {
        ChannelWriter {
            inner: BufWriter::new(self.new_output_stream()),
        }
    }

    pub fn new_input_stream(&self) -> ChannelInputStream {
        ChannelInputStream {
            handle: Arc::clone(&self.handle),
        }
    }

    pub fn new_output_stream(&self) -> ChannelOutputStream {
        ChannelOutputStream {
            handle: Arc::clone(&self.handle),
        }
    }

    /// Truncate or extend the underlying file.
    pub fn set_len(&self, len: u64) -> io::Result<()> {
        self.handle.with_file(|f| f.set_len(len))
    }

    /// Close the handle and release the lock.
    pub fn close(self) -> io::Result<()> {
        self.handle.close()
    }
}

impl Read for LockedChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.handle.with_file(|f| f.read(buf))
    }
}

impl Write for LockedChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.handle.with_file(|f| f.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.handle.with_file(|f| f.flush())
    }
}

impl Seek for LockedChannel {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.handle.with_file(|f| f.seek(pos))
    }
}

impl Drop for LockedChannel {
    fn drop(&mut self) {
        if let Err(e) = self.handle.close() {
            log::warn!("failed to release lock on {}: {e}", self.handle.path.display());
        }
    }
}

/// Unbuffered byte source over a [LockedChannel]'s handle.
#[derive(Debug)]
pub struct ChannelInputStream {
    handle: Arc<SharedHandle>,
}

impl ChannelInputStream {
    /// Close the shared handle, releasing the parent channel's lock.
    pub fn close(self) -> io::Result<()> {
        self.handle.close()
    }
}

impl Read for ChannelInputStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.handle.with_file(|f| f.read(buf))
    }
}

impl Drop for ChannelInputStream {
    fn drop(&mut self) {
        if let Err(e) = self.handle.close() {
            log::warn!("failed to release lock on {}: {e}", self.handle.path.display());
        }
    }
}

/// Unbuffered byte sink over a [LockedChannel]'s handle.
#[derive(Debug)]
pub struct ChannelOutputStream {
    handle: Arc<SharedHandle>,
}

impl ChannelOutputStream {
    /// Close the shared handle, releasing the parent channel's lock.
    pub fn close(self) -> io::Result<()> {
        self.handle.close()
    }
}

impl Write for ChannelOutputStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.handle.with_file(|f| f.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.handle.with_file(|f| f.flush())
    }
}

impl Drop for ChannelOutputStream {
    fn drop(&mut self) {
        if let Err(e) = self.handle.close() {
            log::warn!("failed to release lock on {}: {e}", self.handle.path.display());
        }
    }
}

#[derive(Debug)]
pub struct ChannelReader {
    inner: BufReader<ChannelInputStream>,
}

impl ChannelReader {
    pub fn close(self) -> io::Result<()> {
        self.inner.get_ref().handle.close()
    }
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl BufRead for ChannelReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.inner.consume(amt)
    }
}

#[derive(Debug)]
pub struct ChannelWriter {
    inner: BufWriter<ChannelOutputStream>,
}

impl ChannelWriter {
    /// Flush buffered output, then close the shared handle.
    pub fn close(mut self) -> io::Result<()> {
        self.inner.flush()?;
        self.inner.get_ref().handle.close()
    }
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
