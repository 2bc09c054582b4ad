use crate::constant::pool::ConstantPool;
use crate::error::ClassFileError;
use crate::reader::ClassReader;

pub mod annotation;
pub mod class;
pub mod field;
pub mod method;

/// An attribute the loader captures verbatim without interpreting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAttribute {
    pub name_index: u16,
    pub data: Vec<u8>,
}

pub(crate) struct AttributeHeader<'data, 'pool> {
    pub name_index: u16,
    pub name: &'pool str,
    pub data: &'data [u8],
}

/// Reads one `attribute_info` header and hands back the body slice.
pub(crate) fn read_attribute<'data, 'pool>(
    reader: &mut ClassReader<'data>,
    pool: &'pool ConstantPool,
) -> Result<AttributeHeader<'data, 'pool>, ClassFileError> {
    let name_index = reader.read_u16()?;
    let length = reader.read_u32()? as usize;
    let data = reader.read_bytes(length)?;
    Ok(AttributeHeader {
        name_index,
        name: pool.utf8(name_index)?,
        data,
    })
}
