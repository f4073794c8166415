// Zlib binding for entry payloads.
//
// The archive engine consumes a zlib-style contract: a bound for sizing the
// destination, and compress/uncompress calls that report the produced size
// through an out-parameter and return a status code (0 = success).
// Level 0 is never passed to `compress`; callers store those bytes verbatim.

use std::fmt;

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

/// Success.
pub const Z_OK: i32 = 0;
/// Invalid level or codec state.
pub const Z_STREAM_ERROR: i32 = -2;
/// Corrupt or truncated input.
pub const Z_DATA_ERROR: i32 = -3;
/// Destination too small.
pub const Z_BUF_ERROR: i32 = -5;

/// Compression effort, 0 (store) through 9 (smallest output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompressionLevel(u8);

impl CompressionLevel {
    /// Store bytes verbatim.
    pub const NONE: Self = Self(0);
    pub const FAST: Self = Self(1);
    pub const LOW: Self = Self(1);
    pub const DEFAULT: Self = Self(6);
    pub const SLOW: Self = Self(9);
    pub const HIGH: Self = Self(9);

    /// `None` unless `level` is in `0..=9`.
    pub fn new(level: u8) -> Option<Self> {
        (level <= 9).then_some(Self(level))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Upper bound on the compressed size of `source_len` bytes (zlib's
/// `compressBound`).
pub fn compress_bound(source_len: usize) -> usize {
    source_len + (source_len >> 12) + (source_len >> 14) + (source_len >> 25) + 13
}

/// Compress `source` into `dest` as a zlib stream.
///
/// On success `dest_len` holds the number of bytes written. `dest` should be
/// at least [`compress_bound`] bytes.
pub fn compress(
    dest: &mut [u8],
    dest_len: &mut usize,
    source: &[u8],
    level: CompressionLevel,
) -> i32 {
    let mut stream = Compress::new(Compression::new(u32::from(level.get())), true);
    match stream.compress(source, dest, FlushCompress::Finish) {
        Ok(Status::StreamEnd) => {
            *dest_len = stream.total_out() as usize;
            Z_OK
        }
        Ok(_) => Z_BUF_ERROR,
        Err(_) => Z_STREAM_ERROR,
    }
}

/// Expand the zlib stream in `source` into `dest`.
///
/// On success `dest_len` holds the number of bytes produced and `source_len`
/// the number of input bytes consumed.
pub fn uncompress(
    dest: &mut [u8],
    dest_len: &mut usize,
    source: &[u8],
    source_len: &mut usize,
) -> i32 {
    let mut stream = Decompress::new(true);
    let status = stream.decompress(source, dest, FlushDecompress::Finish);
    *dest_len = stream.total_out() as usize;
    *source_len = stream.total_in() as usize;
    match status {
        Ok(Status::StreamEnd) => Z_OK,
        Ok(_) if *dest_len == dest.len() => Z_BUF_ERROR,
        Ok(_) | Err(_) => Z_DATA_ERROR,
    }
}
