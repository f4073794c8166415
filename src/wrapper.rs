// Several Wrap archives behind one lookup namespace.
//
// Archives are probed in insertion order; the first archive that contains a
// virtual path answers for it.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::WrapError;
use crate::file::VirtualFile;
use crate::wrap::{WRAP_EXTENSION, Wrap};

#[derive(Debug, Clone, Default)]
pub struct Wrapper {
    wraps: Vec<Wrap>,
}

impl Wrapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an already loaded archive. Returns its index.
    pub fn emplace(&mut self, wrap: Wrap) -> usize {
        log::debug!(
            "Wrapper: added \"{}\" ({}).",
            wrap.name(),
            wrap.path().display()
        );
        self.wraps.push(wrap);
        self.wraps.len() - 1
    }

    /// Load the archive at `path` and add it.
    pub fn emplace_path(&mut self, path: &Path) -> Result<usize, WrapError> {
        let wrap = Wrap::load(path)?;
        Ok(self.emplace(wrap))
    }

    /// Load `path`: a single archive, or every `.wrap` file in a directory
    /// (descending into subdirectories when `recursive`). Directory entries
    /// that fail to load are logged and skipped. Returns the number of
    /// archives added.
    pub fn load(&mut self, path: &Path, recursive: bool) -> Result<usize, WrapError> {
        if !path.is_dir() {
            self.emplace_path(path)?;
            return Ok(1);
        }

        let mut found = Vec::new();
        collect_wraps(path, recursive, &mut found)?;
        found.sort();

        let mut loaded = 0;
        for file in found {
            match Wrap::load(&file) {
                Ok(wrap) => {
                    self.emplace(wrap);
                    loaded += 1;
                }
                Err(e) => log::warn!("Skipping \"{}\": {e}", file.display()),
            }
        }

        log::debug!(
            "Wrapper: loaded {loaded} archive(s) from \"{}\".",
            path.display()
        );
        Ok(loaded)
    }

    pub fn wrap_count(&self) -> usize {
        self.wraps.len()
    }

    pub fn wrap(&self, index: usize) -> Option<&Wrap> {
        self.wraps.get(index)
    }

    pub fn wrap_mut(&mut self, index: usize) -> Option<&mut Wrap> {
        self.wraps.get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Wrap> {
        self.wraps.iter()
    }

    /// Archive loaded from `path`.
    pub fn find_by_path(&self, path: &Path) -> Option<&Wrap> {
        self.wraps.iter().find(|wrap| wrap.path() == path)
    }

    /// Archive whose header name is `name`.
    pub fn find_by_name(&self, name: &str) -> Option<&Wrap> {
        self.wraps.iter().find(|wrap| wrap.name() == name)
    }

    /// First archive holding `path`.
    pub fn find_containing(&self, path: &Path) -> Option<&Wrap> {
        self.wraps.iter().find(|wrap| wrap.contains(path))
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.find_containing(path).is_some()
    }

    pub fn exists(&self, path: &Path) -> bool {
        self.contains(path)
    }

    fn require(&self, path: &Path) -> Result<&Wrap, WrapError> {
        self.find_containing(path).ok_or_else(|| {
            log::error!(
                "Cannot find \"{}\" in any of {} Wrap file(s).",
                path.display(),
                self.wraps.len()
            );
            WrapError::NotFound(path.display().to_string())
        })
    }

    pub fn open(&self, path: &Path) -> Result<VirtualFile, WrapError> {
        self.require(path)?.open(path)
    }

    pub fn read(&self, path: &Path) -> Result<Vec<u8>, WrapError> {
        self.require(path)?.read(path)
    }
}

impl<'a> IntoIterator for &'a Wrapper {
    type Item = &'a Wrap;
    type IntoIter = std::slice::Iter<'a, Wrap>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn collect_wraps(dir: &Path, recursive: bool, out: &mut Vec<PathBuf>) -> Result<(), WrapError> {
    let ext = WRAP_EXTENSION.trim_start_matches('.');
    for item in fs::read_dir(dir)? {
        let path = item?.path();
        if path.is_dir() {
            if recursive {
                collect_wraps(&path, recursive, out)?;
            }
        } else if path.extension().is_some_and(|e| e == ext) {
            out.push(path);
        }
    }
    Ok(())
}
