// On-disk layout of a .wrap archive.
//
// File: `[Header] [Entry 0] .. [Entry n-1] [payload bytes ...]`
//
// Header and Entry are fixed-stride records with little-endian integers and
// NUL-padded string fields. Offsets follow natural 4-byte alignment, which
// leaves two padding bytes before `entry_count`.

use std::io::{self, Read, Write};

/// Archive magic.
pub const WRAP_MAGIC: [u8; 4] = *b"WRAP";
/// Format version written into new archives.
pub const WRAP_VERSION: u16 = 0;
/// File extension of archives, including the dot.
pub const WRAP_EXTENSION: &str = ".wrap";

pub const HEADER_BASE_PATH_SIZE: usize = 100;
pub const HEADER_NAME_SIZE: usize = 50;
pub const ENTRY_PATH_SIZE: usize = 255;

/// Encoded header size:
/// magic(4) + type(2) + wrap_version(2) + content_version(4)
/// + base_path(100) + name(50) + pad(2) + entry_count(4) = 168
pub const HEADER_SIZE: usize = 168;

/// Encoded entry size:
/// path(255) + level(1) + reserved(4) + compressed(4) + uncompressed(4)
/// + offset(4) = 272
pub const ENTRY_SIZE: usize = 272;

/// Absolute file position of entry row `index`.
pub fn entry_position(index: u32) -> u64 {
    HEADER_SIZE as u64 + ENTRY_SIZE as u64 * u64::from(index)
}

// ---------------------------------------------------------------------------
// Bounded strings
// ---------------------------------------------------------------------------

/// Copy `text` into a NUL-padded field of `N` bytes, truncating on a
/// character boundary so at least one NUL remains.
fn encode_str<const N: usize>(text: &str) -> [u8; N] {
    let mut field = [0u8; N];
    let mut end = text.len().min(N - 1);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    field[..end].copy_from_slice(&text.as_bytes()[..end]);
    field
}

fn decode_str(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Truncate `text` the way it will be stored in a field of `N` bytes.
pub fn bounded<const N: usize>(text: &str) -> String {
    decode_str(&encode_str::<N>(text))
}

fn le_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn le_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

// ---------------------------------------------------------------------------
// Wrap type
// ---------------------------------------------------------------------------

/// What an archive is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WrapType {
    /// No type; ignored by loaders.
    #[default]
    None,
    /// Base content.
    File,
    /// Overrides content from a base archive.
    Update,
}

impl WrapType {
    pub fn to_u16(self) -> u16 {
        match self {
            Self::None => 0,
            Self::File => 1,
            Self::Update => 2,
        }
    }

    /// Unknown values decode as `None`.
    pub fn from_u16(value: u16) -> Self {
        match value {
            1 => Self::File,
            2 => Self::Update,
            _ => Self::None,
        }
    }
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// Archive header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub magic: [u8; 4],
    pub wrap_type: WrapType,
    pub wrap_version: u16,
    pub content_version: u32,
    /// Virtual paths of all entries are relative to this.
    pub base_path: String,
    pub name: String,
    /// Fixed at creation.
    pub entry_count: u32,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            magic: WRAP_MAGIC,
            wrap_type: WrapType::None,
            wrap_version: WRAP_VERSION,
            content_version: 0,
            base_path: String::new(),
            name: String::new(),
            entry_count: 0,
        }
    }
}

impl Header {
    pub fn is_valid(&self) -> bool {
        self.magic == WRAP_MAGIC
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.magic);
        buf[4..6].copy_from_slice(&self.wrap_type.to_u16().to_le_bytes());
        buf[6..8].copy_from_slice(&self.wrap_version.to_le_bytes());
        buf[8..12].copy_from_slice(&self.content_version.to_le_bytes());
        buf[12..112].copy_from_slice(&encode_str::<HEADER_BASE_PATH_SIZE>(&self.base_path));
        buf[112..162].copy_from_slice(&encode_str::<HEADER_NAME_SIZE>(&self.name));
        // 162..164: padding
        buf[164..168].copy_from_slice(&self.entry_count.to_le_bytes());
        buf
    }

    /// Decode without validating the magic; see [`Header::is_valid`].
    pub fn from_bytes(buf: &[u8; HEADER_SIZE]) -> Self {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&buf[0..4]);
        Self {
            magic,
            wrap_type: WrapType::from_u16(le_u16(buf, 4)),
            wrap_version: le_u16(buf, 6),
            content_version: le_u32(buf, 8),
            base_path: decode_str(&buf[12..112]),
            name: decode_str(&buf[112..162]),
            entry_count: le_u32(buf, 164),
        }
    }

    pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.to_bytes())
    }

    pub fn decode<R: Read>(r: &mut R) -> io::Result<Self> {
        let mut buf = [0u8; HEADER_SIZE];
        r.read_exact(&mut buf)?;
        Ok(Self::from_bytes(&buf))
    }
}

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

/// One row of the entry table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entry {
    /// Virtual path relative to the header's base path, `/`-separated.
    pub path: String,
    /// 0 means stored verbatim.
    pub compression_level: u8,
    /// Capacity of the payload slot in bytes.
    pub reserved_size: u32,
    /// Bytes currently stored in the slot.
    pub compressed_size: u32,
    /// Logical size; 0 marks the row as free.
    pub uncompressed_size: u32,
    /// Absolute position of the payload in the archive file.
    pub offset: u32,
}

impl Entry {
    /// A free row.
    pub fn is_empty(&self) -> bool {
        self.uncompressed_size == 0
    }

    /// A row that has never held a payload slot.
    pub fn is_virgin(&self) -> bool {
        self.reserved_size == 0
    }

    pub fn to_bytes(&self) -> [u8; ENTRY_SIZE] {
        let mut buf = [0u8; ENTRY_SIZE];
        buf[0..255].copy_from_slice(&encode_str::<ENTRY_PATH_SIZE>(&self.path));
        buf[255] = self.compression_level;
        buf[256..260].copy_from_slice(&self.reserved_size.to_le_bytes());
        buf[260..264].copy_from_slice(&self.compressed_size.to_le_bytes());
        buf[264..268].copy_from_slice(&self.uncompressed_size.to_le_bytes());
        buf[268..272].copy_from_slice(&self.offset.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; ENTRY_SIZE]) -> Self {
        Self {
            path: decode_str(&buf[0..255]),
            compression_level: buf[255],
            reserved_size: le_u32(buf, 256),
            compressed_size: le_u32(buf, 260),
            uncompressed_size: le_u32(buf, 264),
            offset: le_u32(buf, 268),
        }
    }

    pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.to_bytes())
    }

    pub fn decode<R: Read>(r: &mut R) -> io::Result<Self> {
        let mut buf = [0u8; ENTRY_SIZE];
        r.read_exact(&mut buf)?;
        Ok(Self::from_bytes(&buf))
    }
}
