use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};
use uuid::Uuid;

use crate::error::{Error, Result};

pub const MAGIC: &[u8; 4] = b"HDS1";
pub const VERSION: u32 = 1;
/// On-disk size: magic + version + uuid + index offset + index size + flags.
pub const SUPERBLOCK_SIZE: usize = 4 + 4 + 16 + 8 + 8 + 8;

#[derive(Debug, Clone)]
pub struct Superblock {
    pub version: u32,
    pub container_uuid: Uuid,
    /// Absolute offset of the index block, 0 while unwritten.
    pub index_offset: u64,
    pub index_size: u64,
    pub flags: u64,
}

impl Superblock {
    pub fn new() -> Self {
        Self {
            version: VERSION,
            container_uuid: Uuid::new_v4(),
            index_offset: 0,
            index_size: 0,
            flags: 0,
        }
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_u32::<LittleEndian>(self.version)?;
        writer.write_all(self.container_uuid.as_bytes())?;
        writer.write_u64::<LittleEndian>(self.index_offset)?;
        writer.write_u64::<LittleEndian>(self.index_size)?;
        writer.write_u64::<LittleEndian>(self.flags)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(Error::Format("invalid container magic".into()));
        }
        let version = reader.read_u32::<LittleEndian>()?;
        if version != VERSION {
            return Err(Error::Format(format!("unsupported container version {version}")));
        }
        let mut uuid_bytes = [0u8; 16];
        reader.read_exact(&mut uuid_bytes)?;
        let container_uuid = Uuid::from_bytes(uuid_bytes);
        let index_offset = reader.read_u64::<LittleEndian>()?;
        let index_size = reader.read_u64::<LittleEndian>()?;
        let flags = reader.read_u64::<LittleEndian>()?;
        Ok(Self { version, container_uuid, index_offset, index_size, flags })
    }
}

impl Default for Superblock {
    fn default() -> Self {
        Self::new()
    }
}
