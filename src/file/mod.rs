// Byte-stream file abstraction with independent read and write cursors.
//
// - `physical`    : PhysicalFile: backed directly by an OS file
// - `virtual_file`: VirtualFile: a window `[offset, offset + size)` over a
//                    PhysicalFile, used to expose one archive entry

pub mod physical;
pub mod virtual_file;

pub use physical::PhysicalFile;
pub use virtual_file::VirtualFile;

use std::path::Path;

use bitflags::bitflags;

use crate::error::WrapError;

bitflags! {
    /// How a file is opened. Flags compose: `READ | WRITE | TRUNCATE`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct OpenFlags: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const READ_WRITE = Self::READ.bits() | Self::WRITE.bits();
        /// Accepted for compatibility; all I/O is binary.
        const BINARY = 1 << 2;
        const TRUNCATE = 1 << 3;
    }
}

/// Origin of a seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Begin,
    Current,
    End,
}

/// Resolve `offset` relative to `origin` into an absolute position.
pub(crate) fn resolve_seek(origin: u64, offset: i64) -> Result<u64, WrapError> {
    let target = origin as i128 + offset as i128;
    if target < 0 {
        log::error!("Cannot seek to {target}: position before start of file.");
        return Err(WrapError::InvalidSeek(target as i64));
    }
    Ok(target as u64)
}

/// Read/write/seek contract shared by physical and virtual files.
///
/// Reads advance only the read cursor and writes only the write cursor.
pub trait File {
    /// Open the file at `path`, closing any file already open.
    fn open(&mut self, path: &Path, flags: OpenFlags) -> Result<(), WrapError>;

    /// Flush and close. Closing a closed file is a no-op.
    fn close(&mut self);

    fn flush(&mut self) -> Result<(), WrapError>;

    fn is_open(&self) -> bool;

    /// Move both cursors.
    fn seek(&mut self, offset: i64, direction: Direction) -> Result<(), WrapError> {
        self.seek_read(offset, direction)?;
        self.seek_write(offset, direction)
    }

    fn seek_read(&mut self, offset: i64, direction: Direction) -> Result<(), WrapError>;

    fn seek_write(&mut self, offset: i64, direction: Direction) -> Result<(), WrapError>;

    /// True once the read cursor has reached the end of the readable data.
    fn end_of_file(&mut self) -> bool;

    fn tell_read(&self) -> u64;

    fn tell_write(&self) -> u64;

    /// Size in bytes of the readable data.
    fn size(&self) -> Result<u64, WrapError>;

    /// Read up to `buf.len()` bytes at the read cursor. Returns the number of
    /// bytes read.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, WrapError>;

    /// Fill `buf` completely or fail with [`WrapError::EndOfFile`].
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), WrapError> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.read(&mut buf[filled..])? {
                0 => {
                    log::error!(
                        "Cannot read {} bytes: end of file after {filled}.",
                        buf.len()
                    );
                    return Err(WrapError::EndOfFile);
                }
                n => filled += n,
            }
        }
        Ok(())
    }

    /// Write all of `buf` at the write cursor.
    fn write(&mut self, buf: &[u8]) -> Result<(), WrapError>;

    /// Read one byte, advancing the read cursor. `None` at end of file.
    fn get(&mut self) -> Result<Option<u8>, WrapError> {
        if self.end_of_file() {
            return Ok(None);
        }
        let mut byte = [0u8; 1];
        match self.read(&mut byte)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    /// Read one byte without advancing the read cursor.
    fn peek(&mut self) -> Result<Option<u8>, WrapError> {
        let byte = self.get()?;
        if byte.is_some() {
            self.seek_read(-1, Direction::Current)?;
        }
        Ok(byte)
    }

    /// Read up to the next `\n`. Carriage returns are dropped. `None` when no
    /// bytes remain.
    fn read_line(&mut self) -> Result<Option<String>, WrapError> {
        let mut line = Vec::new();
        let mut any = false;
        while let Some(byte) = self.get()? {
            any = true;
            match byte {
                b'\n' => break,
                b'\r' => {}
                _ => line.push(byte),
            }
        }
        if !any {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&line).into_owned()))
    }

    /// Rewind the read cursor and read the whole file.
    fn read_all(&mut self) -> Result<Vec<u8>, WrapError> {
        self.seek_read(0, Direction::Begin)?;
        let size = self.size()? as usize;
        let mut data = vec![0u8; size];
        let mut filled = 0;
        while filled < size {
            let n = self.read(&mut data[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        data.truncate(filled);
        Ok(data)
    }

    /// Read at most `count` lines from the read cursor.
    fn read_lines(&mut self, count: usize) -> Result<Vec<String>, WrapError> {
        let mut lines = Vec::with_capacity(count);
        while lines.len() < count && !self.end_of_file() {
            match self.read_line()? {
                Some(line) => lines.push(line),
                None => break,
            }
        }
        Ok(lines)
    }

    /// Read every remaining line from the read cursor.
    fn read_all_lines(&mut self) -> Result<Vec<String>, WrapError> {
        let mut lines = Vec::new();
        while !self.end_of_file() {
            match self.read_line()? {
                Some(line) => lines.push(line),
                None => break,
            }
        }
        Ok(lines)
    }
}
