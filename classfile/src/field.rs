use crate::attribute::field::{parse_field_attributes, FieldAttr};
use crate::constant::pool::ConstantPool;
use crate::error::ClassFileError;
use crate::flags::FieldFlags;
use crate::reader::ClassReader;

#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub access_flags: FieldFlags,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<FieldAttr>,
}

impl FieldInfo {
    pub(crate) fn parse(
        reader: &mut ClassReader,
        pool: &ConstantPool,
    ) -> Result<Self, ClassFileError> {
        let access_flags = FieldFlags::from_raw(reader.read_u16()?);
        let name_index = reader.read_u16()?;
        let descriptor_index = reader.read_u16()?;
        let attributes = parse_field_attributes(reader, pool)?;
        Ok(Self {
            access_flags,
            name_index,
            descriptor_index,
            attributes,
        })
    }

    pub fn constant_value_index(&self) -> Option<u16> {
        self.attributes.iter().find_map(|attr| match attr {
            FieldAttr::ConstantValue(index) => Some(*index),
            FieldAttr::Raw(_) => None,
        })
    }
}
