//! Merging several packages into one namespace.

use std::borrow::Cow;

use rustc_hash::FxHashSet;
use scs_common::Diagnostics;

use crate::entry::{DirectoryEntry, Entries, EntryLookup, FileEntry};
use crate::{HashFsArchive, Result};

/// Entries of several packages, later packages overriding earlier ones.
///
/// Packages that fail [`HashFsArchive::is_valid`] are dropped at construction
/// with a warning and their handles are released.
pub struct CompositeEntries {
    archives: Vec<HashFsArchive>,
}

impl CompositeEntries {
    /// Merge `archives` in registration order (base game first, then DLC).
    pub fn new(archives: Vec<HashFsArchive>, diagnostics: &mut Diagnostics) -> Result<Self> {
        let mut kept = Vec::with_capacity(archives.len());
        for archive in archives {
            if !archive.is_valid() {
                diagnostics.warn(format!(
                    "skipping {}: not a HashFS v2 package",
                    archive.path().display()
                ));
                archive.dispose();
                continue;
            }
            archive.parse_entries()?;
            kept.push(archive);
        }
        tracing::info!(packages = kept.len(), "merged packages");
        Ok(Self { archives: kept })
    }

    /// The packages that made it in, in registration order.
    pub fn archives(&self) -> &[HashFsArchive] {
        &self.archives
    }

    fn entries(&self) -> impl DoubleEndedIterator<Item = &Entries> {
        self.archives.iter().filter_map(|a| a.parse_entries().ok())
    }

    pub fn directories(&self) -> CompositeDirectories<'_> {
        CompositeDirectories { composite: self }
    }

    pub fn files(&self) -> CompositeFiles<'_> {
        CompositeFiles { composite: self }
    }

    /// Release every package handle.
    pub fn dispose(&self) {
        for archive in &self.archives {
            archive.dispose();
        }
    }
}

/// Directory lookups across all packages.
#[derive(Clone, Copy)]
pub struct CompositeDirectories<'a> {
    composite: &'a CompositeEntries,
}

impl CompositeDirectories<'_> {
    /// Union of every package's listing for `path`, first-seen order, no duplicates.
    pub fn get(&self, path: &str) -> Option<DirectoryEntry> {
        let mut merged: Option<DirectoryEntry> = None;
        let mut seen_files = FxHashSet::default();
        let mut seen_dirs = FxHashSet::default();

        for entries in self.composite.entries() {
            let Some(dir) = entries.directories().get(path) else {
                continue;
            };
            let out = merged.get_or_insert_with(|| DirectoryEntry {
                hash: dir.hash,
                ..Default::default()
            });
            for name in &dir.files {
                if seen_files.insert(name.as_str()) {
                    out.files.push(name.clone());
                }
            }
            for name in &dir.subdirectories {
                if seen_dirs.insert(name.as_str()) {
                    out.subdirectories.push(name.clone());
                }
            }
        }
        merged
    }
}

/// File lookups across all packages.
#[derive(Clone, Copy)]
pub struct CompositeFiles<'a> {
    composite: &'a CompositeEntries,
}

impl<'a> CompositeFiles<'a> {
    /// The file from the last registered package that has `path`.
    pub fn get(&self, path: &str) -> Option<&'a FileEntry> {
        self.composite
            .entries()
            .rev()
            .find_map(|entries| entries.files().get(path))
    }
}

impl EntryLookup for CompositeEntries {
    fn directory(&self, path: &str) -> Option<Cow<'_, DirectoryEntry>> {
        self.directories().get(path).map(Cow::Owned)
    }

    fn file(&self, path: &str) -> Option<&FileEntry> {
        self.files().get(path)
    }
}

impl std::fmt::Debug for CompositeEntries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeEntries")
            .field("archives", &self.archives)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::entry::list_files;
    use crate::fixture::PackageBuilder;
    use crate::Compression;

    #[test]
    fn test_later_package_overrides_files() {
        let base = PackageBuilder::new()
            .directory("def", &[], &["city.sii"])
            .file("def/city.sii", b"base", Compression::None)
            .write_temp();
        let dlc = PackageBuilder::new()
            .directory("def", &[], &["city.sii"])
            .file("def/city.sii", b"dlc", Compression::Zlib)
            .write_temp();

        let mut diagnostics = Diagnostics::new();
        let composite = CompositeEntries::new(
            vec![
                HashFsArchive::open(base.path()).unwrap(),
                HashFsArchive::open(dlc.path()).unwrap(),
            ],
            &mut diagnostics,
        )
        .unwrap();

        assert!(diagnostics.is_empty());
        let file = composite.files().get("def/city.sii").unwrap();
        assert_eq!(file.read().unwrap(), b"dlc");
    }

    #[test]
    fn test_directory_listings_are_unioned() {
        let base = PackageBuilder::new()
            .directory("", &["def"], &[])
            .directory("def", &["world"], &["city.sii", "country.sii"])
            .file("def/city.sii", b"c", Compression::None)
            .file("def/country.sii", b"k", Compression::None)
            .write_temp();
        let dlc = PackageBuilder::new()
            .directory("def", &["world", "ferry"], &["country.sii", "city.dlc_east.sii"])
            .file("def/city.dlc_east.sii", b"e", Compression::None)
            .write_temp();

        let mut diagnostics = Diagnostics::new();
        let composite = CompositeEntries::new(
            vec![
                HashFsArchive::open(base.path()).unwrap(),
                HashFsArchive::open(dlc.path()).unwrap(),
            ],
            &mut diagnostics,
        )
        .unwrap();

        let def = composite.directories().get("def").unwrap();
        assert_eq!(def.files, ["city.sii", "country.sii", "city.dlc_east.sii"]);
        assert_eq!(def.subdirectories, ["world", "ferry"]);

        assert_eq!(
            list_files(&composite, ""),
            ["def/city.sii", "def/country.sii", "def/city.dlc_east.sii"]
        );
    }

    #[test]
    fn test_invalid_packages_are_dropped_with_warning() {
        let good = PackageBuilder::new()
            .file("a.txt", b"a", Compression::None)
            .write_temp();
        let mut bad = tempfile::NamedTempFile::new().unwrap();
        bad.write_all(b"ZIP?").unwrap();

        let mut diagnostics = Diagnostics::new();
        let composite = CompositeEntries::new(
            vec![
                HashFsArchive::open(bad.path()).unwrap(),
                HashFsArchive::open(good.path()).unwrap(),
            ],
            &mut diagnostics,
        )
        .unwrap();

        assert_eq!(composite.archives().len(), 1);
        assert_eq!(diagnostics.warnings().count(), 1);
        assert!(composite.files().get("a.txt").is_some());
    }
}
