use crate::constant::pool::ConstantPool;
use crate::error::ClassFileError;
use crate::reader::ClassReader;

/// A runtime-visible annotation. Only the type descriptor is resolved;
/// element values are decoded far enough to be skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub type_descriptor: String,
}

pub(crate) fn parse_annotations(
    data: &[u8],
    pool: &ConstantPool,
) -> Result<Vec<Annotation>, ClassFileError> {
    let mut reader = ClassReader::new(data);
    let count = reader.read_u16()?;
    let mut annotations = Vec::with_capacity(count as usize);
    for _ in 0..count {
        annotations.push(parse_annotation(&mut reader, pool)?);
    }
    Ok(annotations)
}

fn parse_annotation(
    reader: &mut ClassReader,
    pool: &ConstantPool,
) -> Result<Annotation, ClassFileError> {
    let type_index = reader.read_u16()?;
    let pair_count = reader.read_u16()?;
    for _ in 0..pair_count {
        let _element_name_index = reader.read_u16()?;
        skip_element_value(reader, pool)?;
    }
    Ok(Annotation {
        type_descriptor: pool.utf8(type_index)?.to_owned(),
    })
}

fn skip_element_value(reader: &mut ClassReader, pool: &ConstantPool) -> Result<(), ClassFileError> {
    let tag = reader.read_u8()?;
    match tag {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' | b'c' => {
            reader.read_u16()?;
        }
        b'e' => {
            reader.read_u16()?;
            reader.read_u16()?;
        }
        b'@' => {
            parse_annotation(reader, pool)?;
        }
        b'[' => {
            let count = reader.read_u16()?;
            for _ in 0..count {
                skip_element_value(reader, pool)?;
            }
        }
        other => {
            return Err(ClassFileError::BadDescriptor(format!(
                "annotation element tag {:?}",
                other as char
            )))
        }
    }
    Ok(())
}
