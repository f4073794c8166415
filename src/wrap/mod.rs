// .wrap archive engine.
//
// - `format`: bit-exact Header/Entry records and constants
// - `table` : entry rows, free-set, path index, best-fit row allocation
//
// A Wrap never holds a file handle between calls: every operation opens the
// archive, does its work and closes it again.

pub mod format;
pub mod table;

pub use format::{
    ENTRY_SIZE, Entry, HEADER_SIZE, Header, WRAP_EXTENSION, WRAP_MAGIC, WRAP_VERSION, WrapType,
};
pub use table::{EntryTable, SlotPlan};

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::compression::{self, CompressionLevel, Z_OK};
use crate::error::WrapError;
use crate::file::{Direction, File, OpenFlags, PhysicalFile, VirtualFile};
use format::{ENTRY_PATH_SIZE, HEADER_BASE_PATH_SIZE, HEADER_NAME_SIZE, bounded, entry_position};

// Deflate cannot expand input by more than about 1032:1.
const MAX_DEFLATE_RATIO: u64 = 1032;

/// Render a path as a `/`-separated virtual path, dropping `.` and roots.
pub fn virtual_path_string(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Fail unless `path` exists and is a regular file.
fn check_regular_file(path: &Path, action: &str) -> Result<(), WrapError> {
    match fs::metadata(path) {
        Err(_) => {
            log::error!(
                "Cannot {action} \"{}\": file does not exist.",
                path.display()
            );
            Err(WrapError::FileNotFound(path.to_path_buf()))
        }
        Ok(meta) if !meta.is_file() => {
            log::error!(
                "Cannot {action} \"{}\": not a regular file.",
                path.display()
            );
            Err(WrapError::NotRegularFile(path.to_path_buf()))
        }
        Ok(_) => Ok(()),
    }
}

/// Fail unless `text` fits a NUL-terminated field of `N` bytes.
fn fitted<const N: usize>(text: String, what: &str) -> Result<String, WrapError> {
    if text.len() < N {
        return Ok(text);
    }
    log::error!(
        "Cannot store {what} \"{text}\": {} bytes, at most {} fit.",
        text.len(),
        N - 1
    );
    Err(WrapError::PathTooLong {
        len: text.len(),
        path: text,
        max: N - 1,
    })
}

fn has_wrap_extension(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext == WRAP_EXTENSION.trim_start_matches('.'))
}

/// One .wrap archive on disk.
#[derive(Debug, Clone)]
pub struct Wrap {
    path: PathBuf,
    header: Header,
    table: EntryTable,
}

impl Wrap {
    /// Create a new archive at `path`, replacing any file already there.
    ///
    /// The header and `entry_count` empty rows are written immediately.
    pub fn create(
        path: &Path,
        name: &str,
        entry_count: u32,
        base_path: &Path,
        content_version: u32,
    ) -> Result<Self, WrapError> {
        if !has_wrap_extension(path) {
            log::warn!(
                "Creating Wrap file \"{}\" without a {WRAP_EXTENSION} extension; it will not load.",
                path.display()
            );
        }

        let base =
            fitted::<HEADER_BASE_PATH_SIZE>(virtual_path_string(base_path), "base path")?;
        let header = Header {
            wrap_type: WrapType::File,
            wrap_version: WRAP_VERSION,
            content_version,
            base_path: base.clone(),
            name: bounded::<HEADER_NAME_SIZE>(name),
            entry_count,
            ..Header::default()
        };

        let wrap = Self {
            path: path.to_path_buf(),
            header,
            table: EntryTable::with_capacity(Path::new(&base), entry_count),
        };

        let mut file = PhysicalFile::from_path(
            path,
            OpenFlags::WRITE | OpenFlags::BINARY | OpenFlags::TRUNCATE,
        )?;
        let mut image = Vec::with_capacity(entry_position(entry_count) as usize);
        wrap.header.encode(&mut image)?;
        for entry in wrap.table.entries() {
            entry.encode(&mut image)?;
        }
        file.write(&image)?;
        file.close();

        log::debug!(
            "Created Wrap file \"{}\" ({} entries).",
            path.display(),
            entry_count
        );
        Ok(wrap)
    }

    /// Load an existing archive.
    pub fn load(path: &Path) -> Result<Self, WrapError> {
        check_regular_file(path, "load Wrap file")?;
        if !has_wrap_extension(path) {
            log::error!(
                "Cannot load \"{}\" Wrap file: missing {WRAP_EXTENSION} file extension.",
                path.display()
            );
            return Err(WrapError::InvalidExtension(path.to_path_buf()));
        }

        let mut file = PhysicalFile::from_path(path, OpenFlags::READ | OpenFlags::BINARY)?;
        let actual = file.size()?;

        let truncated = |expected: u64| {
            log::error!(
                "Cannot load \"{}\" Wrap file: {actual} bytes, expected at least {expected}.",
                path.display()
            );
            WrapError::Truncated {
                path: path.to_path_buf(),
                expected,
                actual,
            }
        };

        if actual < HEADER_SIZE as u64 {
            return Err(truncated(HEADER_SIZE as u64));
        }

        let mut head = [0u8; HEADER_SIZE];
        file.read_exact(&mut head)?;
        let header = Header::decode(&mut head.as_slice())?;
        if !header.is_valid() {
            log::error!(
                "Cannot load \"{}\" Wrap file: invalid data.",
                path.display()
            );
            return Err(WrapError::InvalidMagic {
                path: path.to_path_buf(),
                found: header.magic,
            });
        }

        let table_end = entry_position(header.entry_count);
        if actual < table_end {
            return Err(truncated(table_end));
        }

        // table_end fits in the file, so this stays bounded by its size
        let mut rows = vec![0u8; (table_end - HEADER_SIZE as u64) as usize];
        file.read_exact(&mut rows)?;
        file.close();
        let mut reader = rows.as_slice();
        let entries = (0..header.entry_count)
            .map(|_| Entry::decode(&mut reader))
            .collect::<io::Result<Vec<_>>>()?;

        let table = EntryTable::from_entries(Path::new(&header.base_path), entries);
        log::debug!(
            "Loaded Wrap file \"{}\": \"{}\", {} entries, {} free.",
            path.display(),
            header.name,
            header.entry_count,
            table.free_count()
        );

        Ok(Self {
            path: path.to_path_buf(),
            header,
            table,
        })
    }

    /// Load `path` if it exists, otherwise create it.
    pub fn load_or_create(
        path: &Path,
        name: &str,
        entry_count: u32,
        base_path: &Path,
        content_version: u32,
    ) -> Result<Self, WrapError> {
        if path.exists() {
            Self::load(path)
        } else {
            Self::create(path, name, entry_count, base_path, content_version)
        }
    }

    fn write_header(&self, file: &mut PhysicalFile) -> Result<(), WrapError> {
        file.seek_write(0, Direction::Begin)?;
        file.write(&self.header.to_bytes())
    }

    fn persist_header(&self) -> Result<(), WrapError> {
        let mut file =
            PhysicalFile::from_path(&self.path, OpenFlags::READ_WRITE | OpenFlags::BINARY)?;
        self.write_header(&mut file)?;
        file.close();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Paths
    // -----------------------------------------------------------------------

    /// Prefix the base path onto `path` unless it already starts with it.
    pub fn fix_path(&self, path: &Path) -> PathBuf {
        let base = Path::new(&self.header.base_path);
        if path.as_os_str().is_empty() || self.header.base_path.is_empty() || path.starts_with(base)
        {
            path.to_path_buf()
        } else {
            base.join(path)
        }
    }

    /// Strip the base path from `path` if present.
    pub fn relative_path(&self, path: &Path) -> PathBuf {
        let base = Path::new(&self.header.base_path);
        if self.header.base_path.is_empty() {
            return path.to_path_buf();
        }
        match path.strip_prefix(base) {
            Ok(rest) => rest.to_path_buf(),
            Err(_) => path.to_path_buf(),
        }
    }

    fn lookup(&self, path: &Path) -> Option<u32> {
        let key = PathBuf::from(virtual_path_string(&self.fix_path(path)));
        self.table.index_of(&key)
    }

    // -----------------------------------------------------------------------
    // Entries
    // -----------------------------------------------------------------------

    /// Pack the file at `physical_path` into the archive under
    /// `virtual_path`. Returns the row it was stored in.
    ///
    /// `reserved_size` of 0 reserves exactly the stored size. Failures before
    /// the write phase leave the archive untouched; these include a virtual
    /// path that does not fit the 255-byte entry field.
    pub fn emplace(
        &mut self,
        physical_path: &Path,
        virtual_path: &Path,
        level: CompressionLevel,
        reserved_size: u32,
    ) -> Result<u32, WrapError> {
        check_regular_file(physical_path, "emplace into Wrap file")?;
        let relative = fitted::<ENTRY_PATH_SIZE>(
            virtual_path_string(&self.relative_path(virtual_path)),
            "virtual path",
        )?;

        let mut source = PhysicalFile::from_path(physical_path, OpenFlags::READ | OpenFlags::BINARY)?;
        let data = source.read_all()?;
        source.close();

        if data.is_empty() {
            log::error!(
                "Cannot emplace \"{}\" into Wrap file: file is empty.",
                physical_path.display()
            );
            return Err(WrapError::EmptySource(physical_path.to_path_buf()));
        }
        let uncompressed_size = u32::try_from(data.len()).map_err(|_| {
            log::error!(
                "Cannot emplace \"{}\" into Wrap file: file is too large.",
                physical_path.display()
            );
            WrapError::TooLarge {
                path: physical_path.to_path_buf(),
                size: data.len() as u64,
            }
        })?;

        let payload = if level.is_none() {
            data
        } else {
            let mut packed = vec![0u8; compression::compress_bound(data.len())];
            let mut packed_len = packed.len();
            let status = compression::compress(&mut packed, &mut packed_len, &data, level);
            if status != Z_OK {
                log::error!(
                    "Cannot emplace \"{}\" into Wrap file: failed to compress file with compression level {level}.",
                    physical_path.display()
                );
                return Err(WrapError::Compression {
                    level: level.get(),
                    status,
                });
            }
            packed.truncate(packed_len);
            packed
        };
        // compress_bound keeps this within u32 for any u32-sized source
        let compressed_size = payload.len() as u32;

        let mut archive =
            PhysicalFile::from_path(&self.path, OpenFlags::READ_WRITE | OpenFlags::BINARY)?;
        let end = archive.size()?;
        let offset = u32::try_from(end).map_err(|_| {
            log::error!(
                "Cannot emplace into Wrap file \"{}\": archive exceeds 4 GiB.",
                self.path.display()
            );
            WrapError::TooLarge {
                path: self.path.clone(),
                size: end,
            }
        })?;

        let entry = Entry {
            path: relative,
            compression_level: level.get(),
            reserved_size: reserved_size.max(compressed_size),
            compressed_size,
            uncompressed_size,
            offset,
        };

        let plan = self.table.plan(&entry)?;

        // Phase one: payload bytes, padded out to the reserved size when the
        // slot is new.
        archive.seek_write(i64::from(plan.entry.offset), Direction::Begin)?;
        archive.write(&payload)?;
        if !plan.reuses_range {
            let padding = (plan.entry.reserved_size - compressed_size) as usize;
            if padding > 0 {
                archive.write(&vec![0u8; padding])?;
            }
        }
        archive.flush()?;

        // Phase two: table rows.
        if let Some(released) = plan.released {
            write_row(&mut archive, released, &self.table.released_entry(released))?;
        }
        write_row(&mut archive, plan.index, &plan.entry)?;
        archive.flush()?;
        archive.close();

        self.table.commit(&plan);

        log::debug!(
            "Emplaced \"{}\" as \"{}\" in row {} ({} -> {} bytes{}).",
            physical_path.display(),
            plan.entry.path,
            plan.index,
            uncompressed_size,
            compressed_size,
            if plan.reuses_range { ", reused slot" } else { "" }
        );
        Ok(plan.index)
    }

    /// Whether `path` names a stored entry. Accepts paths with or without the
    /// base path.
    pub fn contains(&self, path: &Path) -> bool {
        self.lookup(path).is_some()
    }

    /// Alias of [`Wrap::contains`].
    pub fn exists(&self, path: &Path) -> bool {
        self.contains(path)
    }

    fn require(&self, path: &Path) -> Result<&Entry, WrapError> {
        self.entry_by_path(path).ok_or_else(|| {
            log::error!(
                "Cannot find \"{}\" in Wrap file \"{}\".",
                path.display(),
                self.path.display()
            );
            WrapError::NotFound(virtual_path_string(path))
        })
    }

    /// Open a read-only window onto the stored (possibly compressed) bytes of
    /// `path`.
    pub fn open(&self, path: &Path) -> Result<VirtualFile, WrapError> {
        let entry = self.require(path)?;
        VirtualFile::from_path(
            &self.path,
            OpenFlags::READ | OpenFlags::BINARY,
            u64::from(entry.offset),
            u64::from(entry.compressed_size),
        )
    }

    /// Read and, if needed, decompress the contents of `path`.
    pub fn read(&self, path: &Path) -> Result<Vec<u8>, WrapError> {
        let entry = self.require(path)?;

        let end = u64::from(entry.offset) + u64::from(entry.compressed_size);
        let actual = self.size()?;
        if end > actual {
            log::error!(
                "Cannot read \"{}\" from Wrap file \"{}\": payload ends at {end}, file is {actual} bytes.",
                path.display(),
                self.path.display()
            );
            return Err(WrapError::Truncated {
                path: self.path.clone(),
                expected: end,
                actual,
            });
        }

        let mut file = self.open(path)?;
        let mut stored = vec![0u8; entry.compressed_size as usize];
        file.read_exact(&mut stored)?;
        file.close();

        if entry.compression_level == 0 {
            return Ok(stored);
        }

        let limit = u64::from(entry.compressed_size) * MAX_DEFLATE_RATIO;
        if u64::from(entry.uncompressed_size) > limit {
            log::error!(
                "Cannot uncompress \"{}\" in Wrap file: {} bytes cannot expand to {}.",
                path.display(),
                entry.compressed_size,
                entry.uncompressed_size
            );
            return Err(WrapError::Decompression {
                path: virtual_path_string(path),
                status: compression::Z_DATA_ERROR,
            });
        }

        let mut data = vec![0u8; entry.uncompressed_size as usize];
        let mut data_len = data.len();
        let mut stored_len = stored.len();
        let mut status = compression::uncompress(&mut data, &mut data_len, &stored, &mut stored_len);
        if status == Z_OK && data_len != data.len() {
            status = compression::Z_DATA_ERROR;
        }
        if status != Z_OK {
            log::error!(
                "Failed to uncompress file \"{}\" in Wrap file.",
                path.display()
            );
            return Err(WrapError::Decompression {
                path: virtual_path_string(path),
                status,
            });
        }

        Ok(data)
    }

    /// Row `index` of the entry table.
    pub fn entry(&self, index: usize) -> Option<&Entry> {
        self.table.get(index)
    }

    /// Row holding `path`.
    pub fn entry_by_path(&self, path: &Path) -> Option<&Entry> {
        self.lookup(path)
            .and_then(|index| self.table.get(index as usize))
    }

    /// Index of the row holding `path`.
    pub fn index_of(&self, path: &Path) -> Option<u32> {
        self.lookup(path)
    }

    pub fn entries(&self) -> &[Entry] {
        self.table.entries()
    }

    /// Occupied rows with their full virtual paths.
    pub fn files(&self) -> impl Iterator<Item = (PathBuf, &Entry)> + '_ {
        let base = Path::new(&self.header.base_path);
        self.table
            .entries()
            .iter()
            .filter(|entry| !entry.is_empty())
            .map(move |entry| (base.join(&entry.path), entry))
    }

    /// Number of rows, fixed at creation.
    pub fn entry_count(&self) -> usize {
        self.table.len()
    }

    /// Number of rows that hold no entry.
    pub fn free_count(&self) -> usize {
        self.table.free_count()
    }

    // -----------------------------------------------------------------------
    // Header
    // -----------------------------------------------------------------------

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Location of the archive on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current archive file length in bytes.
    pub fn size(&self) -> Result<u64, WrapError> {
        Ok(fs::metadata(&self.path)?.len())
    }

    pub fn base_path(&self) -> &str {
        &self.header.base_path
    }

    /// Change the base path, rebuild the index and rewrite the header.
    pub fn set_base_path(&mut self, base_path: &Path) -> Result<(), WrapError> {
        self.header.base_path =
            fitted::<HEADER_BASE_PATH_SIZE>(virtual_path_string(base_path), "base path")?;
        self.table.set_base_path(Path::new(&self.header.base_path));
        self.persist_header()
    }

    pub fn name(&self) -> &str {
        &self.header.name
    }

    pub fn set_name(&mut self, name: &str) -> Result<(), WrapError> {
        self.header.name = bounded::<HEADER_NAME_SIZE>(name);
        self.persist_header()
    }

    pub fn wrap_version(&self) -> u16 {
        self.header.wrap_version
    }

    pub fn content_version(&self) -> u32 {
        self.header.content_version
    }

    pub fn wrap_type(&self) -> WrapType {
        self.header.wrap_type
    }

    pub fn set_wrap_type(&mut self, wrap_type: WrapType) -> Result<(), WrapError> {
        self.header.wrap_type = wrap_type;
        self.persist_header()
    }
}

fn write_row(file: &mut PhysicalFile, index: u32, entry: &Entry) -> Result<(), WrapError> {
    file.seek_write(entry_position(index) as i64, Direction::Begin)?;
    file.write(&entry.to_bytes())
}
