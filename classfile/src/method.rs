use crate::attribute::method::{parse_method_attributes, CodeAttribute, MethodAttribute};
use crate::constant::pool::ConstantPool;
use crate::error::ClassFileError;
use crate::flags::MethodFlags;
use crate::reader::ClassReader;

#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub access_flags: MethodFlags,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<MethodAttribute>,
}

impl MethodInfo {
    pub(crate) fn parse(
        reader: &mut ClassReader,
        pool: &ConstantPool,
    ) -> Result<Self, ClassFileError> {
        let access_flags = MethodFlags::from_raw(reader.read_u16()?);
        let name_index = reader.read_u16()?;
        let descriptor_index = reader.read_u16()?;
        let attributes = parse_method_attributes(reader, pool)?;
        Ok(Self {
            access_flags,
            name_index,
            descriptor_index,
            attributes,
        })
    }

    pub fn code(&self) -> Option<&CodeAttribute> {
        self.attributes.iter().find_map(|attr| match attr {
            MethodAttribute::Code(code) => Some(code),
            _ => None,
        })
    }

    pub fn annotation_descriptors(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .iter()
            .filter_map(|attr| match attr {
                MethodAttribute::RuntimeVisibleAnnotations(annotations) => Some(annotations),
                _ => None,
            })
            .flatten()
            .map(|annotation| annotation.type_descriptor.as_str())
    }
}
