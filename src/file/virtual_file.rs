// A window over a byte range of a physical file.
//
// Many archive entries share one physical file. Cursor positions reported
// by a VirtualFile are relative to the window start, reads stop at the
// window end, and writes that would cross it are refused so an entry can
// never spill into its neighbour's payload.

use std::path::Path;

use super::{Direction, File, OpenFlags, PhysicalFile, resolve_seek};
use crate::error::WrapError;

/// A [`File`] confined to `[offset, offset + size)` of an underlying file.
#[derive(Debug, Default)]
pub struct VirtualFile {
    inner: PhysicalFile,
    virtual_offset: u64,
    virtual_size: u64,
}

impl VirtualFile {
    /// A closed handle with an empty window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `path` and window it to `[offset, offset + size)`.
    pub fn from_path(
        path: &Path,
        flags: OpenFlags,
        offset: u64,
        size: u64,
    ) -> Result<Self, WrapError> {
        let mut file = Self::new();
        file.open_window(path, flags, offset, size)?;
        Ok(file)
    }

    /// Open `path` and set the window; both cursors start at the window
    /// beginning.
    pub fn open_window(
        &mut self,
        path: &Path,
        flags: OpenFlags,
        offset: u64,
        size: u64,
    ) -> Result<(), WrapError> {
        self.inner.open(path, flags)?;
        self.virtual_offset = offset;
        self.virtual_size = size;
        self.seek(0, Direction::Begin)
    }

    fn window_end(&self) -> u64 {
        self.virtual_offset + self.virtual_size
    }

    fn remaining(&self) -> u64 {
        self.virtual_size.saturating_sub(self.tell_read())
    }

    // Current passes through to the physical cursor unchanged.
    fn physical_target(
        &self,
        offset: i64,
        direction: Direction,
        current: u64,
    ) -> Result<u64, WrapError> {
        match direction {
            Direction::Begin => resolve_seek(self.virtual_offset, offset),
            Direction::Current => resolve_seek(current, offset),
            Direction::End => resolve_seek(self.window_end(), offset),
        }
    }
}

impl File for VirtualFile {
    /// Open without a window. Use [`VirtualFile::open_window`] to set one.
    fn open(&mut self, path: &Path, flags: OpenFlags) -> Result<(), WrapError> {
        self.open_window(path, flags, 0, 0)
    }

    fn close(&mut self) {
        self.inner.close();
        self.virtual_offset = 0;
        self.virtual_size = 0;
    }

    fn flush(&mut self) -> Result<(), WrapError> {
        self.inner.flush()
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    fn seek_read(&mut self, offset: i64, direction: Direction) -> Result<(), WrapError> {
        let target = self.physical_target(offset, direction, self.inner.tell_read())?;
        self.inner.seek_read(target as i64, Direction::Begin)
    }

    fn seek_write(&mut self, offset: i64, direction: Direction) -> Result<(), WrapError> {
        let target = self.physical_target(offset, direction, self.inner.tell_write())?;
        self.inner.seek_write(target as i64, Direction::Begin)
    }

    fn end_of_file(&mut self) -> bool {
        self.inner.end_of_file() || self.tell_read() >= self.virtual_size
    }

    fn tell_read(&self) -> u64 {
        self.inner.tell_read().wrapping_sub(self.virtual_offset)
    }

    fn tell_write(&self) -> u64 {
        self.inner.tell_write().wrapping_sub(self.virtual_offset)
    }

    fn size(&self) -> Result<u64, WrapError> {
        Ok(self.virtual_size)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, WrapError> {
        if self.end_of_file() {
            log::error!("Cannot read from virtual file: end of file.");
            return Err(WrapError::EndOfFile);
        }

        let len = buf.len().min(self.remaining() as usize);
        self.inner.read(&mut buf[..len])
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), WrapError> {
        let position = self.tell_write();
        let len = buf.len() as u64;
        if position > self.virtual_size || position + len > self.virtual_size {
            log::error!(
                "Failed to write to virtual file: {len} bytes at {position} is out of bounds (size {}).",
                self.virtual_size
            );
            return Err(WrapError::OutOfBounds {
                position,
                len,
                size: self.virtual_size,
            });
        }

        self.inner.write(buf)
    }
}
