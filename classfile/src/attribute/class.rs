use crate::attribute::{read_attribute, RawAttribute};
use crate::constant::pool::ConstantPool;
use crate::error::ClassFileError;
use crate::reader::ClassReader;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassAttr {
    SourceFile(u16),
    Raw(RawAttribute),
}

pub(crate) fn parse_class_attributes(
    reader: &mut ClassReader,
    pool: &ConstantPool,
) -> Result<Vec<ClassAttr>, ClassFileError> {
    let count = reader.read_u16()?;
    let mut attributes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let header = read_attribute(reader, pool)?;
        let attr = match header.name {
            "SourceFile" => {
                let mut body = ClassReader::new(header.data);
                ClassAttr::SourceFile(body.read_u16()?)
            }
            _ => ClassAttr::Raw(RawAttribute {
                name_index: header.name_index,
                data: header.data.to_vec(),
            }),
        };
        attributes.push(attr);
    }
    Ok(attributes)
}
