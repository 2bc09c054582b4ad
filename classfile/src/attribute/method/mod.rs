use crate::attribute::annotation::{parse_annotations, Annotation};
use crate::attribute::method::code::{parse_code_attributes, CodeAttributeInfo};
use crate::attribute::{read_attribute, RawAttribute};
use crate::constant::pool::ConstantPool;
use crate::error::ClassFileError;
use crate::reader::ClassReader;

pub mod code;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionTableEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    /// Pool index of the catch class; 0 means catch-any (finally).
    pub catch_type: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionTableEntry>,
    pub attributes: Vec<CodeAttributeInfo>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MethodAttribute {
    Code(CodeAttribute),
    RuntimeVisibleAnnotations(Vec<Annotation>),
    Raw(RawAttribute),
}

pub(crate) fn parse_method_attributes(
    reader: &mut ClassReader,
    pool: &ConstantPool,
) -> Result<Vec<MethodAttribute>, ClassFileError> {
    let count = reader.read_u16()?;
    let mut attributes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let header = read_attribute(reader, pool)?;
        let attr = match header.name {
            "Code" => MethodAttribute::Code(parse_code(header.data, pool)?),
            "RuntimeVisibleAnnotations" => {
                MethodAttribute::RuntimeVisibleAnnotations(parse_annotations(header.data, pool)?)
            }
            _ => MethodAttribute::Raw(RawAttribute {
                name_index: header.name_index,
                data: header.data.to_vec(),
            }),
        };
        attributes.push(attr);
    }
    Ok(attributes)
}

fn parse_code(data: &[u8], pool: &ConstantPool) -> Result<CodeAttribute, ClassFileError> {
    let mut reader = ClassReader::new(data);
    let max_stack = reader.read_u16()?;
    let max_locals = reader.read_u16()?;
    let code_length = reader.read_u32()? as usize;
    let code = reader.read_bytes(code_length)?.to_vec();

    let entry_count = reader.read_u16()?;
    let mut exception_table = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        exception_table.push(ExceptionTableEntry {
            start_pc: reader.read_u16()?,
            end_pc: reader.read_u16()?,
            handler_pc: reader.read_u16()?,
            catch_type: reader.read_u16()?,
        });
    }

    let attributes = parse_code_attributes(&mut reader, pool)?;

    Ok(CodeAttribute {
        max_stack,
        max_locals,
        code,
        exception_table,
        attributes,
    })
}
