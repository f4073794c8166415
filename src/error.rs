// Error taxonomy for the archive engine and its file layer.
//
// Every variant is logged where it is detected; callers only need to
// decide whether to continue.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Error type shared by the file layer, the compression binding and the
/// archive engine.
#[derive(Debug, Error)]
pub enum WrapError {
    /// Underlying OS I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A source file or archive file does not exist.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The path exists but is a directory or special file.
    #[error("not a regular file: {}", .0.display())]
    NotRegularFile(PathBuf),

    /// The archive path does not carry the `.wrap` extension.
    #[error("missing .wrap extension: {}", .0.display())]
    InvalidExtension(PathBuf),

    /// The archive header does not start with `WRAP`.
    #[error("invalid magic {found:?} in {}", path.display())]
    InvalidMagic { path: PathBuf, found: [u8; 4] },

    /// No free slot in the fixed entry table can hold the new entry.
    #[error("entry table full: {entry_count} slots, none fits {reserved_size} bytes")]
    CapacityExceeded {
        entry_count: u32,
        reserved_size: u32,
    },

    /// The codec returned a nonzero status while compressing.
    #[error("compression failed at level {level} (status {status})")]
    Compression { level: u8, status: i32 },

    /// The codec returned a nonzero status, or the wrong size, while expanding.
    #[error("decompression failed for {path} (status {status})")]
    Decompression { path: String, status: i32 },

    /// Lookup miss for a virtual path.
    #[error("no entry for virtual path {0}")]
    NotFound(String),

    /// A payload or archive larger than the 32-bit fields can describe.
    #[error("{} is too large for a .wrap archive ({size} bytes)", path.display())]
    TooLarge { path: PathBuf, size: u64 },

    /// A virtual path or base path does not fit its fixed-size field.
    #[error("path {path} is {len} bytes, field holds at most {max}")]
    PathTooLong { path: String, len: usize, max: usize },

    /// The archive ends before its header, entry table or a payload does.
    #[error("{} is truncated: need {expected} bytes, found {actual}", path.display())]
    Truncated {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    /// Zero-length sources cannot be stored: an empty entry is a free slot.
    #[error("source file is empty: {}", .0.display())]
    EmptySource(PathBuf),

    /// Operation on a file handle that is not open.
    #[error("file is not open")]
    NotOpen,

    /// Read attempted once the (virtual) end of file was reached.
    #[error("end of file")]
    EndOfFile,

    /// A virtual file write would cross the window boundary.
    #[error("write of {len} bytes at {position} exceeds virtual size {size}")]
    OutOfBounds { position: u64, len: u64, size: u64 },

    /// A seek resolved to a negative position.
    #[error("seek to negative position {0}")]
    InvalidSeek(i64),
}
