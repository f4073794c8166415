// File backed directly by an OS file handle.
//
// `std::fs::File` has a single OS cursor, so the read and write cursors are
// tracked here and the OS cursor is repositioned before every transfer.

use std::fs::{self, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::{Direction, File, OpenFlags, resolve_seek};
use crate::error::WrapError;

/// A [`File`] over an OS file.
#[derive(Debug, Default)]
pub struct PhysicalFile {
    file: Option<fs::File>,
    path: PathBuf,
    read_pos: u64,
    write_pos: u64,
}

impl PhysicalFile {
    /// A closed handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `path` with `flags` in one step.
    pub fn from_path(path: &Path, flags: OpenFlags) -> Result<Self, WrapError> {
        let mut file = Self::new();
        file.open(path, flags)?;
        Ok(file)
    }

    /// Path of the open file (empty when closed).
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn handle(&mut self) -> Result<&mut fs::File, WrapError> {
        self.file.as_mut().ok_or_else(|| {
            log::error!("Cannot access file: no file is open.");
            WrapError::NotOpen
        })
    }

    fn origin(&self, direction: Direction, cursor: u64) -> Result<u64, WrapError> {
        Ok(match direction {
            Direction::Begin => 0,
            Direction::Current => cursor,
            Direction::End => self.size()?,
        })
    }
}

impl File for PhysicalFile {
    fn open(&mut self, path: &Path, flags: OpenFlags) -> Result<(), WrapError> {
        self.close();

        let write = flags.contains(OpenFlags::WRITE);
        let read = flags.contains(OpenFlags::READ) || !write;

        let mut options = OpenOptions::new();
        options
            .read(read)
            .write(write)
            .create(write)
            .truncate(write && flags.contains(OpenFlags::TRUNCATE));

        let file = options.open(path).map_err(|e| {
            log::error!("Cannot open file at path: \"{}\": {e}", path.display());
            if e.kind() == io::ErrorKind::NotFound {
                WrapError::FileNotFound(path.to_path_buf())
            } else {
                WrapError::Io(e)
            }
        })?;

        self.file = Some(file);
        self.path = path.to_path_buf();
        self.read_pos = 0;
        self.write_pos = 0;
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut file) = self.file.take() {
            if let Err(e) = file.flush() {
                log::warn!("Flush on close failed for \"{}\": {e}", self.path.display());
            }
        }
        self.path = PathBuf::new();
        self.read_pos = 0;
        self.write_pos = 0;
    }

    fn flush(&mut self) -> Result<(), WrapError> {
        self.handle()?.flush()?;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.file.is_some()
    }

    fn seek_read(&mut self, offset: i64, direction: Direction) -> Result<(), WrapError> {
        let origin = self.origin(direction, self.read_pos)?;
        self.read_pos = resolve_seek(origin, offset)?;
        Ok(())
    }

    fn seek_write(&mut self, offset: i64, direction: Direction) -> Result<(), WrapError> {
        let origin = self.origin(direction, self.write_pos)?;
        self.write_pos = resolve_seek(origin, offset)?;
        Ok(())
    }

    fn end_of_file(&mut self) -> bool {
        match self.size() {
            Ok(size) => self.read_pos >= size,
            Err(_) => true,
        }
    }

    fn tell_read(&self) -> u64 {
        self.read_pos
    }

    fn tell_write(&self) -> u64 {
        self.write_pos
    }

    fn size(&self) -> Result<u64, WrapError> {
        match &self.file {
            Some(file) => Ok(file.metadata()?.len()),
            None => Err(WrapError::NotOpen),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, WrapError> {
        let pos = self.read_pos;
        let file = self.handle()?;
        file.seek(SeekFrom::Start(pos))?;

        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }

        self.read_pos += filled as u64;
        Ok(filled)
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), WrapError> {
        let pos = self.write_pos;
        let file = self.handle()?;
        file.seek(SeekFrom::Start(pos))?;
        file.write_all(buf)?;
        self.write_pos += buf.len() as u64;
        Ok(())
    }
}
