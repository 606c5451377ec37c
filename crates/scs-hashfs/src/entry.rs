//! Resolved package entries.

use std::borrow::Cow;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use scs_common::city::hash_path;
use scs_common::BinaryReader;

use crate::archive::Source;
use crate::schema::{ImageMeta, PlainData, PmaInfo, PmgInfo, SampleMeta};
use crate::tobj;
use crate::{Compression, Result};

/// A directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DirectoryEntry {
    pub hash: u64,
    /// File names relative to this directory.
    pub files: Vec<String>,
    /// Subdirectory names, without the leading separator.
    pub subdirectories: Vec<String>,
}

impl DirectoryEntry {
    /// Decode a listing payload: u32 count, `count` u8 lengths, then the names.
    pub fn from_listing(hash: u64, payload: &[u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(payload);
        let count = reader.read_u32()? as usize;
        let lengths = reader.read_bytes(count)?;

        let mut entry = DirectoryEntry {
            hash,
            ..Default::default()
        };
        for &len in lengths {
            let name = reader.read_string(len as usize)?;
            match name.strip_prefix('/') {
                Some(dir) => entry.subdirectories.push(dir.to_string()),
                None => entry.files.push(name.to_string()),
            }
        }
        Ok(entry)
    }
}

/// Metadata a plain file carries alongside its payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileInfo {
    None,
    Pma(PmaInfo),
    Pmg(PmgInfo),
}

/// What a file entry decodes to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileKind {
    /// The payload is the file.
    Plain(FileInfo),
    /// A header-less texture; reading rebuilds a complete DDS file.
    Tobj { image: ImageMeta, sample: SampleMeta },
}

/// A file inside a package.
#[derive(Clone)]
pub struct FileEntry {
    hash: u64,
    kind: FileKind,
    data: PlainData,
    source: Rc<Source>,
}

impl FileEntry {
    pub(crate) fn new(hash: u64, kind: FileKind, data: PlainData, source: Rc<Source>) -> Self {
        Self {
            hash,
            kind,
            data,
            source,
        }
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn kind(&self) -> &FileKind {
        &self.kind
    }

    pub fn is_tobj(&self) -> bool {
        matches!(self.kind, FileKind::Tobj { .. })
    }

    /// Declared payload size after decompression.
    pub fn size(&self) -> u32 {
        self.data.size
    }

    pub fn compressed_size(&self) -> u32 {
        self.data.compressed_size
    }

    pub fn compression(&self) -> Compression {
        self.data.compression
    }

    /// Read and decompress the file. Texture objects come back as DDS files.
    pub fn read(&self) -> Result<Vec<u8>> {
        let payload = self.source.read_payload(&self.data)?;
        match &self.kind {
            FileKind::Plain(_) => Ok(payload),
            FileKind::Tobj { image, .. } => tobj::build_dds(image, &payload),
        }
    }

    /// Read a text file, replacing invalid UTF-8.
    pub fn read_to_string(&self) -> Result<String> {
        let bytes = self.read()?;
        Ok(match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        })
    }
}

impl std::fmt::Debug for FileEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileEntry")
            .field("hash", &format_args!("{:016x}", self.hash))
            .field("kind", &self.kind)
            .field("data", &self.data)
            .finish()
    }
}

/// Directory entries of one package, looked up by path.
#[derive(Debug, Default)]
pub struct Directories {
    salt: u16,
    map: FxHashMap<u64, DirectoryEntry>,
}

impl Directories {
    pub fn get(&self, path: &str) -> Option<&DirectoryEntry> {
        self.map.get(&hash_path(path, self.salt))
    }

    pub fn get_hash(&self, hash: u64) -> Option<&DirectoryEntry> {
        self.map.get(&hash)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DirectoryEntry> {
        self.map.values()
    }
}

/// File entries of one package, looked up by path.
#[derive(Debug, Default)]
pub struct Files {
    salt: u16,
    map: FxHashMap<u64, FileEntry>,
}

impl Files {
    pub fn get(&self, path: &str) -> Option<&FileEntry> {
        self.map.get(&hash_path(path, self.salt))
    }

    pub fn get_hash(&self, hash: u64) -> Option<&FileEntry> {
        self.map.get(&hash)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileEntry> {
        self.map.values()
    }
}

/// All entries of one package.
#[derive(Debug, Default)]
pub struct Entries {
    directories: Directories,
    files: Files,
}

impl Entries {
    pub(crate) fn new(salt: u16) -> Self {
        Self {
            directories: Directories {
                salt,
                map: FxHashMap::default(),
            },
            files: Files {
                salt,
                map: FxHashMap::default(),
            },
        }
    }

    pub(crate) fn insert_directory(&mut self, entry: DirectoryEntry) {
        self.directories.map.insert(entry.hash, entry);
    }

    pub(crate) fn insert_file(&mut self, entry: FileEntry) {
        self.files.map.insert(entry.hash, entry);
    }

    pub fn directories(&self) -> &Directories {
        &self.directories
    }

    pub fn files(&self) -> &Files {
        &self.files
    }
}

/// Path-based lookup shared by single packages and merged views.
pub trait EntryLookup {
    fn directory(&self, path: &str) -> Option<Cow<'_, DirectoryEntry>>;
    fn file(&self, path: &str) -> Option<&FileEntry>;
}

impl EntryLookup for Entries {
    fn directory(&self, path: &str) -> Option<Cow<'_, DirectoryEntry>> {
        self.directories.get(path).map(Cow::Borrowed)
    }

    fn file(&self, path: &str) -> Option<&FileEntry> {
        self.files.get(path)
    }
}

/// Join a directory path and a child name the way packages store them.
pub fn join_path(parent: &str, name: &str) -> String {
    let parent = parent.trim_matches('/');
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

/// Every file path reachable from `root`, depth first, in listing order.
///
/// Listed names without a file entry are skipped.
pub fn list_files(view: &impl EntryLookup, root: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut stack = vec![root.trim_matches('/').to_string()];
    while let Some(dir) = stack.pop() {
        let Some(entry) = view.directory(&dir) else {
            continue;
        };
        for name in &entry.files {
            let path = join_path(&dir, name);
            if view.file(&path).is_some() {
                out.push(path);
            }
        }
        for sub in entry.subdirectories.iter().rev() {
            stack.push(join_path(&dir, sub));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(names: &[&str]) -> Vec<u8> {
        let mut out = (names.len() as u32).to_le_bytes().to_vec();
        out.extend(names.iter().map(|n| n.len() as u8));
        for name in names {
            out.extend_from_slice(name.as_bytes());
        }
        out
    }

    #[test]
    fn test_listing_splits_subdirectories() {
        let entry = DirectoryEntry::from_listing(1, &listing(&["/def", "manifest.sii", "/map"]))
            .unwrap();
        assert_eq!(entry.files, ["manifest.sii"]);
        assert_eq!(entry.subdirectories, ["def", "map"]);
    }

    #[test]
    fn test_truncated_listing_is_an_error() {
        let mut bytes = listing(&["abc"]);
        bytes.pop();
        assert!(DirectoryEntry::from_listing(1, &bytes).is_err());
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("", "def"), "def");
        assert_eq!(join_path("/def/", "city.sii"), "def/city.sii");
    }
}
