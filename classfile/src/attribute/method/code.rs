use crate::attribute::{read_attribute, RawAttribute};
use crate::constant::pool::ConstantPool;
use crate::error::ClassFileError;
use crate::reader::ClassReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineNumberEntry {
    pub start_pc: u16,
    pub line_number: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeAttributeInfo {
    LineNumberTable(Vec<LineNumberEntry>),
    Raw(RawAttribute),
}

pub(crate) fn parse_code_attributes(
    reader: &mut ClassReader,
    pool: &ConstantPool,
) -> Result<Vec<CodeAttributeInfo>, ClassFileError> {
    let count = reader.read_u16()?;
    let mut attributes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let header = read_attribute(reader, pool)?;
        let attr = match header.name {
            "LineNumberTable" => {
                let mut body = ClassReader::new(header.data);
                let entry_count = body.read_u16()?;
                let mut entries = Vec::with_capacity(entry_count as usize);
                for _ in 0..entry_count {
                    entries.push(LineNumberEntry {
                        start_pc: body.read_u16()?,
                        line_number: body.read_u16()?,
                    });
                }
                CodeAttributeInfo::LineNumberTable(entries)
            }
            _ => CodeAttributeInfo::Raw(RawAttribute {
                name_index: header.name_index,
                data: header.data.to_vec(),
            }),
        };
        attributes.push(attr);
    }
    Ok(attributes)
}
