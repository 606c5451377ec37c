//! Synthetic packages for tests.

use std::io::Write;

use flate2::write::ZlibEncoder;
use scs_common::city::hash_path;
use tempfile::NamedTempFile;

use crate::schema::{tag, ImageMeta, MetadataHeader, PackageHeader};
use crate::Compression;

enum Body {
    Words(Vec<u32>),
    Payload {
        stored: Vec<u8>,
        size: u32,
        codec: Compression,
    },
}

struct Pending {
    path: String,
    is_directory: bool,
    records: Vec<(u8, Body)>,
}

fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn listing(subdirectories: &[&str], files: &[&str]) -> Vec<u8> {
    let names: Vec<String> = subdirectories
        .iter()
        .map(|d| format!("/{d}"))
        .chain(files.iter().map(|f| f.to_string()))
        .collect();
    let mut out = (names.len() as u32).to_le_bytes().to_vec();
    out.extend(names.iter().map(|n| n.len() as u8));
    for name in &names {
        out.extend_from_slice(name.as_bytes());
    }
    out
}

/// Builds a HashFS v2 package in memory.
pub(crate) struct PackageBuilder {
    salt: u16,
    compress_tables: bool,
    entries: Vec<Pending>,
}

impl PackageBuilder {
    pub fn new() -> Self {
        Self {
            salt: 0,
            compress_tables: false,
            entries: Vec::new(),
        }
    }

    pub fn salt(mut self, salt: u16) -> Self {
        self.salt = salt;
        self
    }

    pub fn compress_tables(mut self) -> Self {
        self.compress_tables = true;
        self
    }

    pub fn directory(mut self, path: &str, subdirectories: &[&str], files: &[&str]) -> Self {
        let payload = listing(subdirectories, files);
        self.entries.push(Pending {
            path: path.to_string(),
            is_directory: true,
            records: vec![(
                tag::DIRECTORY,
                Body::Payload {
                    size: payload.len() as u32,
                    stored: payload,
                    codec: Compression::None,
                },
            )],
        });
        self
    }

    /// A plain file, compressed with `codec` (store, zlib or GDEFLATE).
    pub fn file(self, path: &str, data: &[u8], codec: Compression) -> Self {
        let stored = match codec {
            Compression::Zlib => zlib(data),
            #[cfg(feature = "gdeflate")]
            Compression::GDeflate => {
                crate::gdeflate::encode(&[0; crate::TILE_STREAM_HEADER_SIZE], data)
            }
            _ => data.to_vec(),
        };
        self.push_plain(path, tag::PLAIN, stored, data.len() as u32, codec)
    }

    /// A plain file whose bytes are stored as given but labelled with `codec`.
    pub fn raw_file(self, path: &str, data: &[u8], codec: Compression) -> Self {
        self.push_plain(path, tag::PLAIN, data.to_vec(), data.len() as u32, codec)
    }

    /// A stored file whose single metadata record carries an arbitrary tag.
    pub fn file_with_tag(self, path: &str, data: &[u8], tag: u8) -> Self {
        self.push_plain(path, tag, data.to_vec(), data.len() as u32, Compression::None)
    }

    pub fn mark_last_as_directory(mut self) -> Self {
        if let Some(last) = self.entries.last_mut() {
            last.is_directory = true;
        }
        self
    }

    pub fn tobj(mut self, path: &str, image: ImageMeta, payload: &[u8]) -> Self {
        let dims = (image.width - 1) | ((image.height - 1) << 16);
        self.entries.push(Pending {
            path: path.to_string(),
            is_directory: false,
            records: vec![
                (tag::IMAGE, Body::Words(vec![dims, image.flags()])),
                (tag::SAMPLE, Body::Words(vec![0])),
                (
                    tag::MIP_TAIL,
                    Body::Payload {
                        stored: payload.to_vec(),
                        size: payload.len() as u32,
                        codec: Compression::None,
                    },
                ),
            ],
        });
        self
    }

    fn push_plain(mut self, path: &str, tag: u8, stored: Vec<u8>, size: u32, codec: Compression) -> Self {
        self.entries.push(Pending {
            path: path.to_string(),
            is_directory: false,
            records: vec![(tag, Body::Payload { stored, size, codec })],
        });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = vec![0u8; PackageHeader::SIZE];
        let mut words: Vec<u32> = Vec::new();
        let mut rows: Vec<u8> = Vec::new();

        for entry in &self.entries {
            let index = words.len() as u32;
            words.resize(words.len() + entry.records.len(), 0);
            for (i, (tag, body)) in entry.records.iter().enumerate() {
                let body_index = words.len() as u32;
                match body {
                    Body::Words(w) => words.extend_from_slice(w),
                    Body::Payload {
                        stored,
                        size,
                        codec,
                    } => {
                        out.resize(out.len().div_ceil(16) * 16, 0);
                        let block = (out.len() / 16) as u32;
                        out.extend_from_slice(stored);
                        words.extend_from_slice(&[
                            stored.len() as u32 | ((codec.bits() as u32) << 28),
                            *size,
                            0,
                            block,
                        ]);
                    }
                }
                words[index as usize + i] = MetadataHeader {
                    index: body_index,
                    tag: *tag,
                }
                .to_word();
            }

            rows.extend_from_slice(&hash_path(&entry.path, self.salt).to_le_bytes());
            rows.extend_from_slice(&index.to_le_bytes());
            rows.extend_from_slice(&(entry.records.len() as u16).to_le_bytes());
            rows.push(entry.is_directory as u8);
            rows.push(0);
        }

        let metadata: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        let (entry_table, metadata_table) = if self.compress_tables {
            (zlib(&rows), zlib(&metadata))
        } else {
            (rows.clone(), metadata.clone())
        };

        let entry_offset = out.len() as u64;
        out.extend_from_slice(&entry_table);
        let metadata_offset = out.len() as u64;
        out.extend_from_slice(&metadata_table);

        let mut header = Vec::with_capacity(PackageHeader::SIZE);
        header.extend_from_slice(&PackageHeader::MAGIC);
        header.extend_from_slice(&PackageHeader::VERSION.to_le_bytes());
        header.extend_from_slice(&self.salt.to_le_bytes());
        header.extend_from_slice(&PackageHeader::HASH_METHOD);
        header.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
        header.extend_from_slice(&(entry_table.len() as u32).to_le_bytes());
        header.extend_from_slice(&(metadata.len() as u32).to_le_bytes());
        header.extend_from_slice(&(metadata_table.len() as u32).to_le_bytes());
        header.extend_from_slice(&entry_offset.to_le_bytes());
        header.extend_from_slice(&metadata_offset.to_le_bytes());
        header.extend_from_slice(&0u64.to_le_bytes());
        header.push(0);
        out[..PackageHeader::SIZE].copy_from_slice(&header);
        out
    }

    pub fn write_temp(&self) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&self.build()).unwrap();
        file.flush().unwrap();
        file
    }
}
