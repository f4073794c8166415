// In-memory entry table: the fixed rows, the set of free rows and the
// virtual path index.
//
// Allocation is best-fit over table rows. A free row qualifies when it has
// never held a slot or its slot is at least as large as the request; rows
// that already own a byte range are preferred over virgin rows, the
// smallest range wins and ties go to the lowest index.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use super::format::Entry;
use crate::error::WrapError;

/// Where a new entry will land, computed before anything is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotPlan {
    /// Row receiving the entry.
    pub index: u32,
    /// The entry as it will be stored, with any inherited offset/size.
    pub entry: Entry,
    /// True when the row's existing byte range is reused in place.
    pub reuses_range: bool,
    /// Row previously holding the same virtual path, released by this plan.
    pub released: Option<u32>,
}

/// Rows, free-set and path index of one archive.
#[derive(Debug, Clone, Default)]
pub struct EntryTable {
    base_path: PathBuf,
    entries: Vec<Entry>,
    empties: BTreeSet<u32>,
    indexed: HashMap<PathBuf, u32>,
}

impl EntryTable {
    /// `count` virgin rows, all free.
    pub fn with_capacity(base_path: &Path, count: u32) -> Self {
        Self::from_entries(base_path, vec![Entry::default(); count as usize])
    }

    /// Rebuild the free-set and index from loaded rows.
    pub fn from_entries(base_path: &Path, entries: Vec<Entry>) -> Self {
        let mut table = Self {
            base_path: base_path.to_path_buf(),
            entries,
            empties: BTreeSet::new(),
            indexed: HashMap::new(),
        };
        table.reindex();
        table
    }

    fn reindex(&mut self) {
        self.empties.clear();
        self.indexed.clear();
        for (i, entry) in self.entries.iter().enumerate() {
            let index = i as u32;
            if entry.is_empty() {
                self.empties.insert(index);
            } else {
                let key = self.base_path.join(&entry.path);
                if let Some(previous) = self.indexed.insert(key, index) {
                    log::warn!(
                        "Duplicate virtual path \"{}\" in rows {previous} and {index}; using row {index}.",
                        entry.path
                    );
                }
            }
        }
    }

    /// Change the base path and rebuild the index.
    pub fn set_base_path(&mut self, base_path: &Path) {
        self.base_path = base_path.to_path_buf();
        self.reindex();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&Entry> {
        self.entries.get(index)
    }

    /// Row index of a full (base-prefixed) virtual path.
    pub fn index_of(&self, path: &Path) -> Option<u32> {
        self.indexed.get(path).copied()
    }

    pub fn is_free(&self, index: u32) -> bool {
        self.empties.contains(&index)
    }

    pub fn free_count(&self) -> usize {
        self.empties.len()
    }

    /// Choose a row for `new_entry` without changing the table.
    ///
    /// Candidates are the free rows plus the row currently holding the same
    /// virtual path, which wins whenever it fits.
    pub fn plan(&self, new_entry: &Entry) -> Result<SlotPlan, WrapError> {
        let current = self.index_of(&self.base_path.join(&new_entry.path));
        let fits = |entry: &Entry| entry.is_virgin() || entry.reserved_size >= new_entry.reserved_size;

        let own = current.filter(|&index| fits(&self.entries[index as usize]));

        let best = own.or_else(|| {
            let mut best: Option<u32> = None;
            for &index in &self.empties {
                let entry = &self.entries[index as usize];
                if !fits(entry) {
                    continue;
                }
                let Some(chosen) = best else {
                    best = Some(index);
                    continue;
                };
                let chosen = &self.entries[chosen as usize];
                let tighter = !entry.is_virgin()
                    && (chosen.is_virgin() || entry.reserved_size < chosen.reserved_size);
                if tighter {
                    best = Some(index);
                }
            }
            best
        });

        let Some(index) = best else {
            log::error!(
                "Cannot emplace entry \"{}\" to Wrap file. Entry count surpassed.",
                new_entry.path
            );
            return Err(WrapError::CapacityExceeded {
                entry_count: self.entries.len() as u32,
                reserved_size: new_entry.reserved_size,
            });
        };

        let old = &self.entries[index as usize];
        let mut entry = new_entry.clone();
        let reuses_range = !old.is_virgin();
        if reuses_range {
            entry.offset = old.offset;
            entry.reserved_size = old.reserved_size;
        }

        Ok(SlotPlan {
            index,
            entry,
            reuses_range,
            released: current.filter(|&c| c != index),
        })
    }

    /// Row `index` after release: free, but keeping its byte range.
    pub fn released_entry(&self, index: u32) -> Entry {
        let old = &self.entries[index as usize];
        Entry {
            offset: old.offset,
            reserved_size: old.reserved_size,
            ..Entry::default()
        }
    }

    /// Install a plan made by [`EntryTable::plan`].
    pub fn commit(&mut self, plan: &SlotPlan) {
        if let Some(released) = plan.released {
            let row = self.released_entry(released);
            let old_key = self.base_path.join(&self.entries[released as usize].path);
            self.indexed.remove(&old_key);
            self.entries[released as usize] = row;
            self.empties.insert(released);
        }

        let index = plan.index;
        self.empties.remove(&index);
        let old_key = self.base_path.join(&self.entries[index as usize].path);
        if self.indexed.get(&old_key) == Some(&index) {
            self.indexed.remove(&old_key);
        }

        self.entries[index as usize] = plan.entry.clone();
        self.indexed
            .insert(self.base_path.join(&plan.entry.path), index);
    }

    /// Best-fit allocate a row for `new_entry` and install it.
    ///
    /// On success the entry may have inherited the chosen row's offset and
    /// reserved size.
    pub fn emplace_entry(&mut self, new_entry: &mut Entry) -> Result<u32, WrapError> {
        let plan = self.plan(new_entry)?;
        self.commit(&plan);
        *new_entry = plan.entry;
        Ok(plan.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str, reserved: u32) -> Entry {
        Entry {
            path: path.into(),
            reserved_size: reserved,
            compressed_size: reserved,
            uncompressed_size: reserved,
            offset: 1000,
            ..Default::default()
        }
    }

    fn freed(reserved: u32, offset: u32) -> Entry {
        Entry {
            reserved_size: reserved,
            offset,
            ..Default::default()
        }
    }

    #[test]
    fn virgin_rows_fill_in_order() {
        let mut table = EntryTable::with_capacity(Path::new(""), 3);
        assert_eq!(table.free_count(), 3);

        assert_eq!(table.emplace_entry(&mut entry("a", 5)).unwrap(), 0);
        assert_eq!(table.emplace_entry(&mut entry("b", 5)).unwrap(), 1);
        assert_eq!(table.index_of(Path::new("b")), Some(1));
        assert!(!table.is_free(1));
        assert_eq!(table.free_count(), 1);
    }

    #[test]
    fn full_table_rejects() {
        let mut table = EntryTable::with_capacity(Path::new(""), 1);
        table.emplace_entry(&mut entry("a", 5)).unwrap();
        let err = table.emplace_entry(&mut entry("b", 5)).unwrap_err();
        assert!(matches!(
            err,
            WrapError::CapacityExceeded {
                entry_count: 1,
                ..
            }
        ));
        assert_eq!(table.get(0).unwrap().path, "a");
    }

    #[test]
    fn tightest_freed_range_wins() {
        let rows = vec![
            Entry::default(),
            freed(64, 100),
            freed(16, 200),
            freed(8, 300),
            freed(16, 400),
        ];
        let mut table = EntryTable::from_entries(Path::new(""), rows);

        let mut new = entry("n", 10);
        let index = table.emplace_entry(&mut new).unwrap();
        assert_eq!(index, 2);
        assert_eq!(new.offset, 200);
        assert_eq!(new.reserved_size, 16);
    }

    #[test]
    fn virgin_used_when_no_range_fits() {
        let rows = vec![freed(4, 100), Entry::default(), Entry::default()];
        let mut table = EntryTable::from_entries(Path::new(""), rows);

        let mut new = entry("n", 10);
        assert_eq!(table.emplace_entry(&mut new).unwrap(), 1);
        assert_eq!(new.offset, 1000);
        assert_eq!(new.reserved_size, 10);
    }

    #[test]
    fn same_path_reuses_own_row() {
        let mut table = EntryTable::with_capacity(Path::new(""), 3);
        table.emplace_entry(&mut entry("a", 32)).unwrap();

        let plan = table.plan(&entry("a", 20)).unwrap();
        assert_eq!(plan.index, 0);
        assert!(plan.reuses_range);
        assert_eq!(plan.released, None);
        assert_eq!(plan.entry.reserved_size, 32);
    }

    #[test]
    fn growing_path_moves_and_releases_row() {
        let mut table = EntryTable::with_capacity(Path::new(""), 3);
        table.emplace_entry(&mut entry("a", 8)).unwrap();

        let index = table.emplace_entry(&mut entry("a", 50)).unwrap();
        assert_eq!(index, 1);
        assert!(table.is_free(0));
        assert_eq!(table.get(0).unwrap().reserved_size, 8);
        assert!(table.get(0).unwrap().path.is_empty());
        assert_eq!(table.index_of(Path::new("a")), Some(1));

        // The released range is now the preferred home for small entries.
        assert_eq!(table.emplace_entry(&mut entry("b", 4)).unwrap(), 0);
    }

    #[test]
    fn index_is_base_prefixed() {
        let mut table = EntryTable::with_capacity(Path::new("Assets"), 2);
        table.emplace_entry(&mut entry("x.txt", 1)).unwrap();
        assert_eq!(table.index_of(Path::new("Assets/x.txt")), Some(0));
        assert_eq!(table.index_of(Path::new("x.txt")), None);

        table.set_base_path(Path::new("Data"));
        assert_eq!(table.index_of(Path::new("Data/x.txt")), Some(0));
    }

    #[test]
    fn loaded_rows_rebuild_free_set() {
        let rows = vec![entry("a", 3), Entry::default(), entry("b", 3)];
        let table = EntryTable::from_entries(Path::new(""), rows);
        assert!(table.is_free(1));
        assert!(!table.is_free(0));
        assert_eq!(table.index_of(Path::new("b")), Some(2));
    }
}
