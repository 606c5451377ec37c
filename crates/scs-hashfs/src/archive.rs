//! HashFS package reader.

use std::cell::{OnceCell, RefCell};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use memmap2::Mmap;
use scs_common::BinaryReader;
use scs_struct::{DecodeError, Schema};

use crate::decompress::{decompress, decompress_zlib_sized};
use crate::entry::{DirectoryEntry, Entries, FileEntry, FileInfo, FileKind};
use crate::schema::{
    tag, EntryRecord, ImageMeta, MetadataHeader, MetadataRecord, PackageHeader, PlainData,
    PmaInfo, PmgInfo, SampleMeta,
};
use crate::{Error, ReaderOptions, Result};

struct Mapped {
    _file: File,
    mmap: Mmap,
}

/// The open file behind a package, shared with its entries.
pub(crate) struct Source {
    path: PathBuf,
    mapped: RefCell<Option<Mapped>>,
    options: ReaderOptions,
}

impl Source {
    fn with_bytes<T>(&self, f: impl FnOnce(&[u8]) -> Result<T>) -> Result<T> {
        let mapped = self.mapped.borrow();
        let mapped = mapped.as_ref().ok_or(Error::Disposed)?;
        f(&mapped.mmap[..])
    }

    fn slice(&self, offset: u64, len: usize, what: &str) -> Result<Vec<u8>> {
        self.with_bytes(|bytes| {
            let start = usize::try_from(offset).unwrap_or(usize::MAX);
            start
                .checked_add(len)
                .and_then(|end| bytes.get(start..end))
                .map(<[u8]>::to_vec)
                .ok_or_else(|| {
                    Error::Format(format!(
                        "{what} at {offset}+{len} lies outside the {}-byte file",
                        bytes.len()
                    ))
                })
        })
    }

    /// Read and decompress one payload.
    pub(crate) fn read_payload(&self, data: &PlainData) -> Result<Vec<u8>> {
        let raw = self.slice(data.offset, data.compressed_size as usize, "payload")?;
        decompress(data.compression, &raw, data.size as usize, &self.options)
    }

    fn release(&self) {
        if self.mapped.borrow_mut().take().is_some() {
            tracing::debug!(path = %self.path.display(), "released package");
        }
    }
}

/// A HashFS v2 package (`.scs`).
///
/// The file stays open and mapped until [`HashFsArchive::dispose`] is called
/// or the archive is dropped. Entries share the handle, so a disposed archive
/// makes every later read fail with [`Error::Disposed`].
pub struct HashFsArchive {
    source: Rc<Source>,
    header: Option<PackageHeader>,
    entries: OnceCell<Entries>,
}

impl HashFsArchive {
    /// Open a package with default options.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, ReaderOptions::default())
    }

    /// Open a package. Only I/O failures are errors here; check
    /// [`HashFsArchive::is_valid`] before parsing entries.
    pub fn open_with<P: AsRef<Path>>(path: P, options: ReaderOptions) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };

        let header = PackageHeader::decode(&mmap[..]).ok();
        let valid = header.as_ref().is_some_and(PackageHeader::is_valid);
        tracing::debug!(path = %path.display(), valid, "opened package");

        Ok(Self {
            source: Rc::new(Source {
                path: path.to_path_buf(),
                mapped: RefCell::new(Some(Mapped { _file: file, mmap })),
                options,
            }),
            header,
            entries: OnceCell::new(),
        })
    }

    /// Package file path.
    pub fn path(&self) -> &Path {
        &self.source.path
    }

    /// Whether magic, hash method and version match a HashFS v2 package.
    pub fn is_valid(&self) -> bool {
        self.header.as_ref().is_some_and(PackageHeader::is_valid)
    }

    /// The decoded header, if the file was long enough to hold one.
    pub fn header(&self) -> Option<&PackageHeader> {
        self.header.as_ref()
    }

    pub fn salt(&self) -> u16 {
        self.header.as_ref().map_or(0, |h| h.salt)
    }

    pub fn is_disposed(&self) -> bool {
        self.source.mapped.borrow().is_none()
    }

    /// Whether [`HashFsArchive::parse_entries`] has run.
    pub fn is_parsed(&self) -> bool {
        self.entries.get().is_some()
    }

    /// Decode the entry and metadata tables. Computed once.
    pub fn parse_entries(&self) -> Result<&Entries> {
        if let Some(entries) = self.entries.get() {
            return Ok(entries);
        }
        let header = match &self.header {
            Some(header) if header.is_valid() => header,
            _ => {
                return Err(Error::Format(format!(
                    "{} is not a HashFS v2 package",
                    self.source.path.display()
                )))
            }
        };

        let entries = self.build_entries(header)?;
        tracing::debug!(
            path = %self.source.path.display(),
            directories = entries.directories().len(),
            files = entries.files().len(),
            "parsed entries"
        );
        Ok(self.entries.get_or_init(|| entries))
    }

    /// Release the file handle. Further reads fail with [`Error::Disposed`].
    pub fn dispose(&self) {
        self.source.release();
    }

    fn table(&self, offset: u64, compressed: u32, size: usize, what: &str) -> Result<Vec<u8>> {
        let raw = self.source.slice(offset, compressed as usize, what)?;
        if compressed as usize == size {
            return Ok(raw);
        }
        let table = decompress_zlib_sized(&raw, size)?;
        if table.len() != size {
            return Err(Error::Format(format!(
                "{what} inflated to {} bytes, expected {size}",
                table.len()
            )));
        }
        Ok(table)
    }

    fn build_entries(&self, header: &PackageHeader) -> Result<Entries> {
        let entry_table = self.table(
            header.entry_table_offset,
            header.entry_table_compressed_size,
            header.entry_table_size(),
            "entry table",
        )?;
        let metadata = self.table(
            header.metadata_table_offset,
            header.metadata_table_compressed_size,
            header.metadata_table_size as usize,
            "metadata table",
        )?;

        let mut entries = Entries::new(header.salt);
        let mut reader = BinaryReader::new(&entry_table);
        for _ in 0..header.entry_table_count {
            let record = EntryRecord::decode_from(&mut reader)?;
            let records = self.metadata_records(&metadata, &record)?;
            if record.is_directory {
                entries.insert_directory(self.directory(&record, &records)?);
            } else {
                entries.insert_file(self.file(&record, &records)?);
            }
        }
        Ok(entries)
    }

    fn metadata_records(&self, table: &[u8], record: &EntryRecord) -> Result<Vec<MetadataRecord>> {
        (0..record.metadata_count as usize)
            .map(|i| -> Result<MetadataRecord> {
                let mut words = BinaryReader::new_at(table, (record.metadata_index as usize + i) * 4);
                let header = MetadataHeader::from_word(words.read_u32()?);
                let mut body = BinaryReader::new_at(table, header.body_offset());
                Ok(match header.tag {
                    tag::IMAGE => MetadataRecord::Image(ImageMeta::decode_from(&mut body)?),
                    tag::SAMPLE => MetadataRecord::Sample(SampleMeta::decode_from(&mut body)?),
                    tag::MIP_PROXY => MetadataRecord::MipProxy,
                    tag::INLINE_DIRECTORY => MetadataRecord::InlineDirectory,
                    tag::PMA_INFO => MetadataRecord::PmaInfo(PmaInfo::decode_from(&mut body)?),
                    tag::PMG_INFO => MetadataRecord::PmgInfo(PmgInfo::decode_from(&mut body)?),
                    tag::PLAIN => MetadataRecord::Plain(PlainData::decode_from(&mut body)?),
                    tag::DIRECTORY => MetadataRecord::Directory(PlainData::decode_from(&mut body)?),
                    tag::MIP_0 => MetadataRecord::Mip0(PlainData::decode_from(&mut body)?),
                    tag::MIP_1 => MetadataRecord::Mip1(PlainData::decode_from(&mut body)?),
                    tag::MIP_TAIL => MetadataRecord::MipTail(PlainData::decode_from(&mut body)?),
                    other => {
                        return Err(Error::UnknownMetadataType {
                            tag: other,
                            hash: record.hash,
                        })
                    }
                })
            })
            .collect()
    }

    fn directory(&self, record: &EntryRecord, metadata: &[MetadataRecord]) -> Result<DirectoryEntry> {
        match metadata {
            [MetadataRecord::Directory(data)] => {
                let payload = self.source.read_payload(data)?;
                DirectoryEntry::from_listing(record.hash, &payload)
            }
            _ => Err(kind_mismatch(record, metadata, "one directory record")),
        }
    }

    fn file(&self, record: &EntryRecord, metadata: &[MetadataRecord]) -> Result<FileEntry> {
        let source = Rc::clone(&self.source);
        if metadata.len() == 3 {
            let mut image = None;
            let mut sample = None;
            let mut tail = None;
            for m in metadata {
                match m {
                    MetadataRecord::Image(i) => image = Some(*i),
                    MetadataRecord::Sample(s) => sample = Some(*s),
                    MetadataRecord::MipTail(d) => tail = Some(*d),
                    _ => {}
                }
            }
            return match (image, sample, tail) {
                (Some(image), Some(sample), Some(data)) => Ok(FileEntry::new(
                    record.hash,
                    FileKind::Tobj { image, sample },
                    data,
                    source,
                )),
                _ => Err(kind_mismatch(
                    record,
                    metadata,
                    "image, sample and mip tail records",
                )),
            };
        }

        let mut info = FileInfo::None;
        let mut plain = None;
        for m in metadata {
            match m {
                MetadataRecord::Plain(d) => plain = Some(*d),
                MetadataRecord::PmaInfo(p) => info = FileInfo::Pma(*p),
                MetadataRecord::PmgInfo(p) => info = FileInfo::Pmg(*p),
                _ => {}
            }
        }
        let data = plain.ok_or_else(|| {
            Error::Format(format!(
                "file entry {:016x} has no plain data in [{}]",
                record.hash,
                names(metadata)
            ))
        })?;
        Ok(FileEntry::new(record.hash, FileKind::Plain(info), data, source))
    }
}

/// The offset is that of the entry's first word in the metadata table.
fn kind_mismatch(
    record: &EntryRecord,
    metadata: &[MetadataRecord],
    expected: &'static str,
) -> Error {
    tracing::debug!(
        hash = %format_args!("{:016x}", record.hash),
        metadata = %names(metadata),
        "entry metadata does not match its kind"
    );
    Error::Entry {
        hash: record.hash,
        source: DecodeError::type_mismatch(
            record.metadata_index as usize * 4,
            "metadata",
            expected,
        ),
    }
}

fn names(metadata: &[MetadataRecord]) -> String {
    metadata
        .iter()
        .map(MetadataRecord::name)
        .collect::<Vec<_>>()
        .join(", ")
}

impl std::fmt::Debug for HashFsArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashFsArchive")
            .field("path", &self.source.path)
            .field("header", &self.header)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use scs_common::city::hash_path;
    use scs_struct::DecodeErrorKind;

    use super::*;
    use crate::fixture::PackageBuilder;
    use crate::Compression;

    #[test]
    fn test_store_and_zlib_entries() {
        let package = PackageBuilder::new()
            .directory("", &["def"], &[])
            .directory("def", &[], &["city.sii", "country.sii"])
            .file("def/city.sii", b"SiiNunit { }", Compression::None)
            .file("def/country.sii", b"SiiNunit { country_data : x { } }", Compression::Zlib)
            .write_temp();

        let archive = HashFsArchive::open(package.path()).unwrap();
        assert!(archive.is_valid());
        let entries = archive.parse_entries().unwrap();

        let def = entries.directories().get("def").unwrap();
        assert_eq!(def.files, ["city.sii", "country.sii"]);
        let root = entries.directories().get("/").unwrap();
        assert_eq!(root.subdirectories, ["def"]);

        let city = entries.files().get("/def/city.sii").unwrap();
        assert_eq!(city.read().unwrap(), b"SiiNunit { }");
        let country = entries.files().get("def/country.sii").unwrap();
        assert_eq!(country.compression(), Compression::Zlib);
        assert_eq!(
            country.read_to_string().unwrap(),
            "SiiNunit { country_data : x { } }"
        );
        // memoized
        assert!(std::ptr::eq(entries, archive.parse_entries().unwrap()));
    }

    #[test]
    fn test_compressed_tables() {
        let package = PackageBuilder::new()
            .compress_tables()
            .file("version.sii", b"1.50", Compression::Zlib)
            .write_temp();

        let archive = HashFsArchive::open(package.path()).unwrap();
        let entries = archive.parse_entries().unwrap();
        let file = entries.files().get("version.sii").unwrap();
        assert_eq!(file.read().unwrap(), b"1.50");
    }

    #[test]
    fn test_salted_paths() {
        let package = PackageBuilder::new()
            .salt(42)
            .file("manifest.sii", b"salted", Compression::None)
            .write_temp();

        let archive = HashFsArchive::open(package.path()).unwrap();
        assert_eq!(archive.salt(), 42);
        let entries = archive.parse_entries().unwrap();
        assert!(entries.files().get("manifest.sii").is_some());
    }

    #[test]
    fn test_invalid_package_is_never_parsed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"PK\x03\x04 not a hashfs package at all, padded out past the header size")
            .unwrap();

        let archive = HashFsArchive::open(file.path()).unwrap();
        assert!(!archive.is_valid());
        assert!(matches!(archive.parse_entries(), Err(Error::Format(_))));
        assert!(!archive.is_parsed());

        archive.dispose();
        assert!(archive.is_disposed());
    }

    #[test]
    fn test_reads_after_dispose_fail() {
        let package = PackageBuilder::new()
            .file("a.txt", b"alpha", Compression::None)
            .write_temp();
        let archive = HashFsArchive::open(package.path()).unwrap();
        let file = archive.parse_entries().unwrap().files().get("a.txt").unwrap().clone();

        archive.dispose();
        assert!(matches!(file.read(), Err(Error::Disposed)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = HashFsArchive::open("/nonexistent/base.scs").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[cfg(feature = "gdeflate")]
    #[test]
    fn test_gdeflate_entry() {
        let text: Vec<u8> = b"city_data : city.berlin { }\n".repeat(4000);
        let package = PackageBuilder::new()
            .file("def/big.sii", &text, Compression::GDeflate)
            .write_temp();
        let archive = HashFsArchive::open(package.path()).unwrap();
        let file = archive.parse_entries().unwrap().files().get("def/big.sii").unwrap();
        assert_eq!(file.compression(), Compression::GDeflate);
        assert_eq!(file.read().unwrap(), text);
    }

    #[test]
    fn test_unsupported_payload_codec() {
        let package = PackageBuilder::new()
            .raw_file("blob.bin", b"0123456789", Compression::Zstd)
            .write_temp();
        let archive = HashFsArchive::open(package.path()).unwrap();
        let file = archive.parse_entries().unwrap().files().get("blob.bin").unwrap();
        assert!(matches!(
            file.read(),
            Err(Error::UnsupportedCompression(Compression::Zstd))
        ));
    }

    #[test]
    fn test_unknown_metadata_tag() {
        let package = PackageBuilder::new()
            .file_with_tag("odd.bin", b"x", 0x7F)
            .write_temp();
        let archive = HashFsArchive::open(package.path()).unwrap();
        assert!(matches!(
            archive.parse_entries(),
            Err(Error::UnknownMetadataType { tag: 0x7F, .. })
        ));
    }

    #[test]
    fn test_directory_with_plain_metadata_is_rejected() {
        let package = PackageBuilder::new()
            .file_with_tag("dir", b"", tag::PLAIN)
            .mark_last_as_directory()
            .write_temp();
        let archive = HashFsArchive::open(package.path()).unwrap();
        match archive.parse_entries() {
            Err(Error::Entry { hash, source }) => {
                assert_eq!(hash, hash_path("dir", 0));
                assert!(matches!(
                    source.kind,
                    DecodeErrorKind::TypeMismatch { name: "metadata", .. }
                ));
            }
            other => panic!("expected an entry decode error, got {other:?}"),
        }
    }

    #[test]
    fn test_texture_object_becomes_dds() {
        let image = ImageMeta {
            width: 4,
            height: 4,
            mipmap_count: 1,
            format: scs_dds::dxgi::BC1_UNORM,
            cube: 0,
            count: 1,
            pitch_alignment: 1,
            image_alignment: 1,
        };
        let package = PackageBuilder::new()
            .tobj("material/sign.tobj", image, &[0x00, 0xF8, 0x00, 0xF8, 0, 0, 0, 0])
            .write_temp();
        let archive = HashFsArchive::open(package.path()).unwrap();
        let file = archive
            .parse_entries()
            .unwrap()
            .files()
            .get("material/sign.tobj")
            .unwrap();
        assert!(file.is_tobj());

        let texture = scs_dds::Texture::decode(&file.read().unwrap()).unwrap();
        assert_eq!((texture.width, texture.height), (4, 4));
        assert_eq!(&texture.rgba[..4], [255, 0, 0, 255]);
    }
}
