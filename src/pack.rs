// Directory packer: build one .wrap archive from a directory tree.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::compression::CompressionLevel;
use crate::error::WrapError;
use crate::wrap::format::HEADER_BASE_PATH_SIZE;
use crate::wrap::{WRAP_EXTENSION, Wrap, virtual_path_string};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Settings for [`pack_directory`].
#[derive(Debug, Clone, Default)]
pub struct PackOptions {
    /// Archive name. Defaults to the directory's file name.
    pub name: Option<String>,
    /// Base virtual path stored in the header. Defaults to the directory path.
    pub base_path: Option<PathBuf>,
    pub content_version: u32,
    pub level: CompressionLevel,
    /// Reserved slot size requested for every entry; 0 reserves exactly the
    /// stored size.
    pub reserve: u32,
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Summary of one [`pack_directory`] run.
#[derive(Debug, Clone)]
pub struct PackReport {
    /// Archive written.
    pub file: PathBuf,
    pub name: String,
    pub elapsed: Duration,
    pub content_version: u32,
    /// Number of rows in the archive (one per packed file).
    pub entry_count: u32,
    pub base_path: String,
    pub level: CompressionLevel,
    /// Sum of stored payload sizes.
    pub compressed_size: u64,
    /// Sum of source file sizes.
    pub uncompressed_size: u64,
    /// Zero-length files that were left out.
    pub skipped: Vec<PathBuf>,
}

impl PackReport {
    /// Space saved, in percent of the uncompressed total. Never negative.
    pub fn compression_percent(&self) -> f64 {
        if self.uncompressed_size == 0 {
            return 0.0;
        }
        let ratio = self.compressed_size as f64 / self.uncompressed_size as f64;
        (100.0 - 100.0 * ratio).max(0.0)
    }
}

// ---------------------------------------------------------------------------
// pack_directory
// ---------------------------------------------------------------------------

/// Pack every regular file under `dir` into a new archive.
///
/// The archive goes to `output`, or next to `dir` as `<name>.wrap`. Each file
/// is stored under its path relative to `dir`. Empty files are skipped since
/// a zero-length entry marks a free row.
pub fn pack_directory(
    dir: &Path,
    opts: &PackOptions,
    output: Option<&Path>,
) -> Result<PackReport, WrapError> {
    if !dir.exists() {
        log::error!("Cannot pack \"{}\": path does not exist.", dir.display());
        return Err(WrapError::FileNotFound(dir.to_path_buf()));
    }
    if !dir.is_dir() {
        log::error!("Cannot pack \"{}\": not a directory.", dir.display());
        return Err(WrapError::NotRegularFile(dir.to_path_buf()));
    }

    let mut files = Vec::new();
    collect_files(dir, &mut files)?;
    files.sort();

    let mut packable = Vec::with_capacity(files.len());
    let mut skipped = Vec::new();
    let mut uncompressed_size = 0u64;
    for (path, len) in files {
        if len == 0 {
            log::warn!("Skipping empty file \"{}\".", path.display());
            skipped.push(path);
        } else {
            uncompressed_size += len;
            packable.push(path);
        }
    }

    let entry_count = u32::try_from(packable.len()).map_err(|_| {
        log::error!("Cannot pack \"{}\": too many files.", dir.display());
        WrapError::TooLarge {
            path: dir.to_path_buf(),
            size: packable.len() as u64,
        }
    })?;

    let name = match &opts.name {
        Some(name) => name.clone(),
        None => dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "wrap".to_string()),
    };
    let file = match output {
        Some(path) => path.to_path_buf(),
        None => dir
            .parent()
            .unwrap_or(Path::new(""))
            .join(format!("{name}{WRAP_EXTENSION}")),
    };
    let base = match &opts.base_path {
        Some(base) => base.clone(),
        None => default_base(dir, &name),
    };

    log::info!(
        "Wrapping {} into {}",
        dir.display(),
        file.display()
    );
    let start = Instant::now();

    let mut wrap = Wrap::create(&file, &name, entry_count, &base, opts.content_version)?;
    let mut compressed_size = 0u64;
    for path in &packable {
        let relative = path.strip_prefix(dir).unwrap_or(path);
        log::info!("{}", virtual_path_string(relative));

        let index = wrap.emplace(path, relative, opts.level, opts.reserve)?;
        if let Some(entry) = wrap.entry(index as usize) {
            compressed_size += u64::from(entry.compressed_size);
        }
    }

    Ok(PackReport {
        file,
        name: wrap.name().to_string(),
        elapsed: start.elapsed(),
        content_version: opts.content_version,
        entry_count,
        base_path: wrap.base_path().to_string(),
        level: opts.level,
        compressed_size,
        uncompressed_size,
        skipped,
    })
}

/// The packed directory itself, or just its name when the full path does not
/// fit the header.
fn default_base(dir: &Path, name: &str) -> PathBuf {
    if virtual_path_string(dir).len() < HEADER_BASE_PATH_SIZE {
        return dir.to_path_buf();
    }
    let short = dir
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(name));
    log::warn!(
        "Base path \"{}\" is too long for the header; using \"{}\".",
        dir.display(),
        short.display()
    );
    short
}

fn collect_files(dir: &Path, out: &mut Vec<(PathBuf, u64)>) -> Result<(), WrapError> {
    for item in fs::read_dir(dir)? {
        let item = item?;
        let meta = item.metadata()?;
        if meta.is_dir() {
            collect_files(&item.path(), out)?;
        } else if meta.is_file() {
            out.push((item.path(), meta.len()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn packs_nested_tree() {
        let root = tempdir().unwrap();
        let assets = root.path().join("assets");
        fs::create_dir_all(assets.join("sub")).unwrap();
        fs::write(assets.join("a.txt"), "alpha ".repeat(100)).unwrap();
        fs::write(assets.join("sub/b.txt"), b"beta").unwrap();

        let opts = PackOptions {
            base_path: Some(PathBuf::from("Game")),
            content_version: 4,
            ..Default::default()
        };
        let report = pack_directory(&assets, &opts, None).unwrap();

        assert_eq!(report.file, root.path().join("assets.wrap"));
        assert_eq!(report.name, "assets");
        assert_eq!(report.entry_count, 2);
        assert_eq!(report.base_path, "Game");
        assert_eq!(report.uncompressed_size, 604);
        assert!(report.compression_percent() > 50.0);

        let wrap = Wrap::load(&report.file).unwrap();
        assert_eq!(wrap.free_count(), 0);
        assert_eq!(wrap.content_version(), 4);
        assert_eq!(wrap.read(Path::new("sub/b.txt")).unwrap(), b"beta");
        assert!(wrap.contains(Path::new("Game/a.txt")));
    }

    #[test]
    fn empty_files_are_skipped() {
        let root = tempdir().unwrap();
        let dir = root.path().join("data");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("empty.bin"), b"").unwrap();
        fs::write(dir.join("full.bin"), b"x").unwrap();

        let out = root.path().join("custom.wrap");
        let opts = PackOptions {
            name: Some("Custom".into()),
            level: CompressionLevel::NONE,
            ..Default::default()
        };
        let report = pack_directory(&dir, &opts, Some(&out)).unwrap();

        assert_eq!(report.file, out);
        assert_eq!(report.entry_count, 1);
        assert_eq!(report.skipped, vec![dir.join("empty.bin")]);
        assert_eq!(report.compressed_size, 1);
        assert_eq!(report.compression_percent(), 0.0);
    }

    #[test]
    fn deep_directory_falls_back_to_its_name() {
        let root = tempdir().unwrap();
        let dir = root
            .path()
            .join("d".repeat(60))
            .join("e".repeat(40))
            .join("Assets");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("x.txt"), b"deep").unwrap();

        let out = root.path().join("deep.wrap");
        let report = pack_directory(&dir, &PackOptions::default(), Some(&out)).unwrap();
        assert_eq!(report.base_path, "Assets");

        let wrap = Wrap::load(&out).unwrap();
        assert!(wrap.contains(Path::new("Assets/x.txt")));
        assert_eq!(wrap.read(Path::new("x.txt")).unwrap(), b"deep");
    }

    #[test]
    fn rejects_non_directories() {
        let root = tempdir().unwrap();
        let file = root.path().join("plain.txt");
        fs::write(&file, b"x").unwrap();

        assert!(matches!(
            pack_directory(&file, &PackOptions::default(), None),
            Err(WrapError::NotRegularFile(_))
        ));
        assert!(matches!(
            pack_directory(&root.path().join("missing"), &PackOptions::default(), None),
            Err(WrapError::FileNotFound(_))
        ));
    }
}
