use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use hdc_store::{MemoryStore, Storage};
use hdc_types::{AttributeValue, Dtype, MaxShape, Selection, Shape, Value};

use crate::error::{FileError, FileResult};

/// Container file magic.
pub const MAGIC: &[u8; 4] = b"HDCF";

/// Current container format version.
pub const FORMAT_VERSION: u32 = 1;

const TYPE_GROUP: u8 = 1;
const TYPE_DATASET: u8 = 2;
const TYPE_SOFT_LINK: u8 = 3;
const TYPE_EXTERNAL_LINK: u8 = 4;

/// Fixed zstd level for dataset payloads.
const ZSTD_LEVEL: i32 = 3;

#[derive(Serialize, Deserialize)]
struct GroupRecord {
    attributes: BTreeMap<String, AttributeValue>,
}

#[derive(Serialize, Deserialize)]
struct DatasetRecord {
    attributes: BTreeMap<String, AttributeValue>,
    dtype: Dtype,
    shape: Shape,
    maxshape: MaxShape,
    chunk_shape: Option<Shape>,
}

#[derive(Serialize, Deserialize)]
struct SoftLinkRecord {
    attributes: BTreeMap<String, AttributeValue>,
    target: String,
}

#[derive(Serialize, Deserialize)]
struct ExternalLinkRecord {
    attributes: BTreeMap<String, AttributeValue>,
    file: String,
    target: String,
}

/// Written cells of one dataset, sorted by index tuple.
type CellPayload = Vec<(Vec<u64>, Value)>;

/// Encode a store into container file bytes.
pub fn encode_store(store: &MemoryStore) -> FileResult<Vec<u8>> {
    let paths = store.paths();

    let mut data = Vec::new();
    data.extend_from_slice(MAGIC);
    data.extend_from_slice(&FORMAT_VERSION.to_be_bytes());
    data.extend_from_slice(&(paths.len() as u32).to_be_bytes());

    for path in &paths {
        let kind = store.kind(path)?;
        let attributes = store.attributes(path)?;
        match kind {
            hdc_store::EntryKind::Group => {
                push_record_header(&mut data, TYPE_GROUP, path);
                push_framed(&mut data, &encode_meta(&GroupRecord { attributes })?);
            }
            hdc_store::EntryKind::Dataset => {
                let meta = store.dataset_meta(path)?;
                push_record_header(&mut data, TYPE_DATASET, path);
                push_framed(
                    &mut data,
                    &encode_meta(&DatasetRecord {
                        attributes,
                        dtype: meta.dtype,
                        shape: meta.shape,
                        maxshape: meta.maxshape,
                        chunk_shape: meta.chunk_shape,
                    })?,
                );
                let cells: CellPayload = store.written_cells(path)?;
                push_payload(&mut data, &encode_meta(&cells)?)?;
            }
            hdc_store::EntryKind::SoftLink { target } => {
                push_record_header(&mut data, TYPE_SOFT_LINK, path);
                push_framed(&mut data, &encode_meta(&SoftLinkRecord { attributes, target })?);
            }
            hdc_store::EntryKind::ExternalLink { file, target } => {
                push_record_header(&mut data, TYPE_EXTERNAL_LINK, path);
                push_framed(
                    &mut data,
                    &encode_meta(&ExternalLinkRecord {
                        attributes,
                        file,
                        target,
                    })?,
                );
            }
        }
    }

    // Trailer: checksum of everything so far.
    let checksum = *blake3::hash(&data).as_bytes();
    data.extend_from_slice(&checksum);
    Ok(data)
}

/// Decode container file bytes into a store with the given file id.
pub fn decode_store(data: &[u8], file_id: &str) -> FileResult<MemoryStore> {
    if data.len() < 12 + 32 {
        return Err(FileError::CorruptRecord {
            offset: 0,
            reason: "container data too short".into(),
        });
    }
    if &data[0..4] != MAGIC {
        return Err(FileError::InvalidMagic {
            expected: String::from_utf8_lossy(MAGIC).into(),
            actual: String::from_utf8_lossy(&data[0..4]).into(),
        });
    }
    let version = u32::from_be_bytes(data[4..8].try_into().unwrap());
    if version != FORMAT_VERSION {
        return Err(FileError::UnsupportedVersion(version));
    }

    let body_end = data.len() - 32;
    let expected: [u8; 32] = data[body_end..].try_into().unwrap();
    let actual = *blake3::hash(&data[..body_end]).as_bytes();
    if expected != actual {
        return Err(FileError::ChecksumMismatch);
    }

    let record_count = u32::from_be_bytes(data[8..12].try_into().unwrap()) as usize;
    let mut records = Vec::with_capacity(record_count);
    let mut pos = 12usize;
    for _ in 0..record_count {
        let record = parse_record(&data[..body_end], &mut pos)?;
        records.push(record);
    }
    if pos != body_end {
        return Err(FileError::CorruptRecord {
            offset: pos as u64,
            reason: "trailing bytes after final record".into(),
        });
    }

    // Pass 1: create the structure, parents before children (records are
    // written in sorted path order, so a parent always precedes its
    // children).
    let mut store = MemoryStore::new(file_id);
    for record in &records {
        match &record.body {
            RecordBody::Group { .. } => {
                if record.path != "/" {
                    store.create_group(&record.path)?;
                }
            }
            RecordBody::Dataset { meta, .. } => {
                store.create_dataset(
                    &record.path,
                    meta.dtype.clone(),
                    &meta.shape,
                    Some(&meta.maxshape),
                    meta.chunk_shape.as_ref(),
                )?;
            }
            RecordBody::SoftLink { target, .. } => {
                store.create_soft_link(&record.path, target)?;
            }
            RecordBody::ExternalLink { file, target, .. } => {
                store.create_external_link(&record.path, file, target)?;
            }
        }
    }

    // Pass 2: attributes and cell values. Deferred so that reference
    // values always find their targets already created.
    for record in records {
        for (name, value) in record.body.attributes() {
            store.set_attribute(&record.path, name, value.clone())?;
        }
        if let RecordBody::Dataset { meta, cells } = record.body {
            for (tuple, value) in cells {
                if meta.shape.is_scalar() {
                    store.write_scalar(&record.path, value)?;
                } else {
                    let selection =
                        Selection::Multi(tuple.into_iter().map(Selection::Index).collect());
                    store.write_selection(&record.path, &selection, &[value])?;
                }
            }
        }
    }

    Ok(store)
}

struct ParsedRecord {
    path: String,
    body: RecordBody,
}

enum RecordBody {
    Group {
        attributes: BTreeMap<String, AttributeValue>,
    },
    Dataset {
        meta: DatasetRecord,
        cells: CellPayload,
    },
    SoftLink {
        attributes: BTreeMap<String, AttributeValue>,
        target: String,
    },
    ExternalLink {
        attributes: BTreeMap<String, AttributeValue>,
        file: String,
        target: String,
    },
}

impl RecordBody {
    fn attributes(&self) -> &BTreeMap<String, AttributeValue> {
        match self {
            RecordBody::Group { attributes } => attributes,
            RecordBody::Dataset { meta, .. } => &meta.attributes,
            RecordBody::SoftLink { attributes, .. } => attributes,
            RecordBody::ExternalLink { attributes, .. } => attributes,
        }
    }
}

fn parse_record(data: &[u8], pos: &mut usize) -> FileResult<ParsedRecord> {
    let offset = *pos as u64;
    let type_byte = *data.get(*pos).ok_or_else(|| FileError::CorruptRecord {
        offset,
        reason: "record truncated at type byte".into(),
    })?;
    *pos += 1;

    let path_bytes = take_framed(data, pos, offset)?;
    let path = String::from_utf8(path_bytes.to_vec()).map_err(|_| FileError::CorruptRecord {
        offset,
        reason: "record path is not UTF-8".into(),
    })?;
    let meta_bytes = take_framed(data, pos, offset)?;

    let body = match type_byte {
        TYPE_GROUP => {
            let meta: GroupRecord = decode_meta(meta_bytes)?;
            RecordBody::Group {
                attributes: meta.attributes,
            }
        }
        TYPE_DATASET => {
            let meta: DatasetRecord = decode_meta(meta_bytes)?;
            let cells = take_payload(data, pos, offset, &path)?;
            RecordBody::Dataset { meta, cells }
        }
        TYPE_SOFT_LINK => {
            let meta: SoftLinkRecord = decode_meta(meta_bytes)?;
            RecordBody::SoftLink {
                attributes: meta.attributes,
                target: meta.target,
            }
        }
        TYPE_EXTERNAL_LINK => {
            let meta: ExternalLinkRecord = decode_meta(meta_bytes)?;
            RecordBody::ExternalLink {
                attributes: meta.attributes,
                file: meta.file,
                target: meta.target,
            }
        }
        other => {
            return Err(FileError::CorruptRecord {
                offset,
                reason: format!("unknown record type byte: {other}"),
            })
        }
    };

    Ok(ParsedRecord { path, body })
}

fn push_record_header(data: &mut Vec<u8>, type_byte: u8, path: &str) {
    data.push(type_byte);
    push_framed(data, path.as_bytes());
}

fn push_framed(data: &mut Vec<u8>, bytes: &[u8]) {
    encode_varint(data, bytes.len() as u64);
    data.extend_from_slice(bytes);
}

fn push_payload(data: &mut Vec<u8>, raw: &[u8]) -> FileResult<()> {
    let compressed =
        zstd::encode_all(raw, ZSTD_LEVEL).map_err(|e| FileError::CompressionFailed(e.to_string()))?;
    encode_varint(data, raw.len() as u64);
    encode_varint(data, compressed.len() as u64);
    data.extend_from_slice(&crc32fast::hash(&compressed).to_be_bytes());
    data.extend_from_slice(&compressed);
    Ok(())
}

fn take_framed<'a>(data: &'a [u8], pos: &mut usize, offset: u64) -> FileResult<&'a [u8]> {
    let (len, consumed) = decode_varint(&data[*pos..], offset)?;
    *pos += consumed;
    let end = *pos + len as usize;
    if end > data.len() {
        return Err(FileError::CorruptRecord {
            offset,
            reason: "framed bytes extend beyond container".into(),
        });
    }
    let bytes = &data[*pos..end];
    *pos = end;
    Ok(bytes)
}

fn take_payload(
    data: &[u8],
    pos: &mut usize,
    offset: u64,
    path: &str,
) -> FileResult<CellPayload> {
    let (uncompressed_len, consumed) = decode_varint(&data[*pos..], offset)?;
    *pos += consumed;
    let (compressed_len, consumed) = decode_varint(&data[*pos..], offset)?;
    *pos += consumed;

    if *pos + 4 > data.len() {
        return Err(FileError::CorruptRecord {
            offset,
            reason: "payload truncated at CRC".into(),
        });
    }
    let expected_crc =
        u32::from_be_bytes(data[*pos..*pos + 4].try_into().unwrap());
    *pos += 4;

    let end = *pos + compressed_len as usize;
    if end > data.len() {
        return Err(FileError::CorruptRecord {
            offset,
            reason: "payload extends beyond container".into(),
        });
    }
    let compressed = &data[*pos..end];
    *pos = end;

    if crc32fast::hash(compressed) != expected_crc {
        return Err(FileError::CrcMismatch {
            path: path.to_string(),
        });
    }
    let raw =
        zstd::decode_all(compressed).map_err(|e| FileError::DecompressionFailed(e.to_string()))?;
    if raw.len() as u64 != uncompressed_len {
        return Err(FileError::CorruptRecord {
            offset,
            reason: format!(
                "payload size mismatch: expected {uncompressed_len}, got {}",
                raw.len()
            ),
        });
    }
    decode_meta(&raw)
}

fn encode_meta<T: Serialize>(value: &T) -> FileResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| FileError::Serialization(e.to_string()))
}

fn decode_meta<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> FileResult<T> {
    bincode::deserialize(bytes).map_err(|e| FileError::Serialization(e.to_string()))
}

/// Encode a u64 as a variable-length integer.
fn encode_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value > 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Decode a variable-length integer. Returns (value, bytes consumed).
fn decode_varint(data: &[u8], offset: u64) -> FileResult<(u64, usize)> {
    let mut value: u64 = 0;
    let mut shift = 0;
    for (i, &byte) in data.iter().enumerate() {
        value |= ((byte & 0x7F) as u64) << shift;
        shift += 7;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
        if shift >= 64 {
            return Err(FileError::CorruptRecord {
                offset,
                reason: "varint overflow".into(),
            });
        }
    }
    Err(FileError::CorruptRecord {
        offset,
        reason: "truncated varint".into(),
    })
}
