//! A file system byte source.

use std::fs::File;
use std::path::{Path, PathBuf};

use bytes::BytesMut;

use crate::byte_range::{ByteLength, ByteOffset, ByteRange, InvalidByteRangeError};
use crate::{Bytes, ReadableStorageTraits, StorageError};

/// A read-only file byte source.
///
/// Reads are positioned (`pread` on unix), so a single [`FileStore`] can serve concurrent requests.
/// On other platforms reads are serialised through a lock around the file cursor.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    size: u64,
    #[cfg(unix)]
    file: File,
    #[cfg(not(unix))]
    file: parking_lot::Mutex<File>,
}

impl FileStore {
    /// Open the file at `path` for reading.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the file cannot be opened or its metadata cannot be read.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            path,
            size,
            #[cfg(unix)]
            file,
            #[cfg(not(unix))]
            file: parking_lot::Mutex::new(file),
        })
    }

    /// Return the path of the file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(unix)]
    fn read_exact_at(&self, offset: ByteOffset, buf: &mut [u8]) -> std::io::Result<()> {
        use std::os::unix::fs::FileExt;
        self.file.read_exact_at(buf, offset)
    }

    #[cfg(not(unix))]
    fn read_exact_at(&self, offset: ByteOffset, buf: &mut [u8]) -> std::io::Result<()> {
        use std::io::{Read, Seek, SeekFrom};
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)
    }

    fn check_range(&self, offset: ByteOffset, length: ByteLength) -> Result<(), StorageError> {
        let byte_range = ByteRange::new_with_offset_length(offset, length);
        if byte_range.end() > self.size {
            Err(InvalidByteRangeError::new(byte_range, self.size).into())
        } else {
            Ok(())
        }
    }
}

impl ReadableStorageTraits for FileStore {
    fn read_at(&self, offset: ByteOffset, length: ByteLength) -> Result<Bytes, StorageError> {
        self.check_range(offset, length)?;
        let length = usize::try_from(length)
            .map_err(|_| StorageError::Other(format!("read of {length} bytes exceeds usize")))?;
        let mut buf = BytesMut::zeroed(length);
        self.read_exact_at(offset, &mut buf)?;
        Ok(buf.freeze())
    }

    fn size(&self) -> Result<u64, StorageError> {
        Ok(self.size)
    }

    fn read_at_into(&self, offset: ByteOffset, out: &mut [u8]) -> Result<(), StorageError> {
        self.check_range(offset, out.len() as u64)?;
        self.read_exact_at(offset, out)?;
        Ok(())
    }
}
