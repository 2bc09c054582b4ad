use crate::attribute::{read_attribute, RawAttribute};
use crate::constant::pool::ConstantPool;
use crate::error::ClassFileError;
use crate::reader::ClassReader;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldAttr {
    /// Pool index of the initial value of a static final field.
    ConstantValue(u16),
    Raw(RawAttribute),
}

pub(crate) fn parse_field_attributes(
    reader: &mut ClassReader,
    pool: &ConstantPool,
) -> Result<Vec<FieldAttr>, ClassFileError> {
    let count = reader.read_u16()?;
    let mut attributes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let header = read_attribute(reader, pool)?;
        let attr = match header.name {
            "ConstantValue" => {
                let mut body = ClassReader::new(header.data);
                FieldAttr::ConstantValue(body.read_u16()?)
            }
            _ => FieldAttr::Raw(RawAttribute {
                name_index: header.name_index,
                data: header.data.to_vec(),
            }),
        };
        attributes.push(attr);
    }
    Ok(attributes)
}
