use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher;
use std::io::{self, Read, Write};

use crate::error::{Error, Result};

pub const BLOCK_MAGIC: u32 = 0x4B4C_4244; // "DBLK"
/// Payload is zstd-compressed on disk.
pub const FLAG_ZSTD: u32 = 1;

/// Payloads below this size are always stored verbatim.
const COMPRESS_MIN: usize = 512;
const ZSTD_LEVEL: i32 = 3;

/// Fixed little-endian header preceding every block payload.  The checksum
/// covers the stored (possibly compressed) payload bytes.
#[derive(Debug, Clone)]
pub struct BlockHeader {
    pub flags: u32,
    pub stored_len: u64,
    pub raw_len: u64,
    pub checksum: u32,
}

impl BlockHeader {
    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(BLOCK_MAGIC)?;
        writer.write_u32::<LittleEndian>(self.flags)?;
        writer.write_u64::<LittleEndian>(self.stored_len)?;
        writer.write_u64::<LittleEndian>(self.raw_len)?;
        writer.write_u32::<LittleEndian>(self.checksum)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let magic = reader.read_u32::<LittleEndian>()?;
        if magic != BLOCK_MAGIC {
            return Err(Error::Format("invalid block magic".into()));
        }
        Ok(Self {
            flags: reader.read_u32::<LittleEndian>()?,
            stored_len: reader.read_u64::<LittleEndian>()?,
            raw_len: reader.read_u64::<LittleEndian>()?,
            checksum: reader.read_u32::<LittleEndian>()?,
        })
    }
}

/// Frame a raw payload for writing.  The payload is compressed when that
/// actually shrinks it; a compression failure falls back to verbatim storage.
pub fn encode_block(raw: &[u8]) -> (BlockHeader, Vec<u8>) {
    let (flags, payload) = if raw.len() >= COMPRESS_MIN {
        match zstd::encode_all(raw, ZSTD_LEVEL) {
            Ok(compressed) if compressed.len() < raw.len() => (FLAG_ZSTD, compressed),
            _ => (0, raw.to_vec()),
        }
    } else {
        (0, raw.to_vec())
    };

    let mut hasher = Hasher::new();
    hasher.update(&payload);
    let header = BlockHeader {
        flags,
        stored_len: payload.len() as u64,
        raw_len: raw.len() as u64,
        checksum: hasher.finalize(),
    };
    (header, payload)
}

/// Verify and unframe a stored payload back to its raw bytes.
pub fn decode_block(header: &BlockHeader, payload: &[u8]) -> Result<Vec<u8>> {
    let mut hasher = Hasher::new();
    hasher.update(payload);
    if hasher.finalize() != header.checksum {
        return Err(Error::Format("block checksum mismatch".into()));
    }
    let raw = if header.flags & FLAG_ZSTD != 0 {
        zstd::decode_all(payload).map_err(|e| Error::Format(format!("zstd decode failed: {e}")))?
    } else {
        payload.to_vec()
    };
    if raw.len() as u64 != header.raw_len {
        return Err(Error::Format(format!(
            "block length mismatch: header says {}, payload decodes to {}",
            header.raw_len,
            raw.len()
        )));
    }
    Ok(raw)
}

pub fn values_to_bytes(values: &[f64]) -> Vec<u8> {
    let mut buf = vec![0u8; values.len() * std::mem::size_of::<f64>()];
    LittleEndian::write_f64_into(values, &mut buf);
    buf
}

pub fn bytes_to_values(bytes: &[u8]) -> Result<Vec<f64>> {
    if bytes.len() % std::mem::size_of::<f64>() != 0 {
        return Err(Error::Format(format!(
            "payload length {} is not a whole number of f64 values",
            bytes.len()
        )));
    }
    let mut values = vec![0f64; bytes.len() / std::mem::size_of::<f64>()];
    LittleEndian::read_f64_into(bytes, &mut values);
    Ok(values)
}
