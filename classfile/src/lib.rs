//! Decoder for the JVM `.class` binary format: constant pool, fields,
//! methods, and the attributes the runtime actually consumes (`Code`,
//! `LineNumberTable`, `SourceFile`, `ConstantValue`,
//! `RuntimeVisibleAnnotations`); everything else is captured raw.

use crate::attribute::class::{parse_class_attributes, ClassAttr};
use crate::constant::pool::ConstantPool;
use crate::error::ClassFileError;
use crate::field::FieldInfo;
use crate::flags::ClassFlags;
use crate::method::MethodInfo;
use crate::reader::ClassReader;

pub mod attribute;
pub mod constant;
pub mod descriptor;
pub mod error;
pub mod field;
pub mod flags;
pub mod method;
pub mod opcode;
pub mod reader;

pub const MAGIC: u32 = 0xCAFE_BABE;

pub const JAVA_LANG_OBJECT: &str = "java/lang/Object";

#[derive(Debug)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub cp: ConstantPool,
    pub access_flags: ClassFlags,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    pub attributes: Vec<ClassAttr>,
}

impl ClassFile {
    pub fn parse(data: &[u8]) -> Result<Self, ClassFileError> {
        let mut reader = ClassReader::new(data);

        let magic = reader.read_u32()?;
        if magic != MAGIC {
            return Err(ClassFileError::BadMagic(magic));
        }
        let minor_version = reader.read_u16()?;
        let major_version = reader.read_u16()?;

        let cp = ConstantPool::parse(&mut reader)?;

        let access_flags = ClassFlags::from_raw(reader.read_u16()?);
        let this_class = reader.read_u16()?;
        let super_class = reader.read_u16()?;

        let interface_count = reader.read_u16()?;
        let mut interfaces = Vec::with_capacity(interface_count as usize);
        for _ in 0..interface_count {
            interfaces.push(reader.read_u16()?);
        }

        let field_count = reader.read_u16()?;
        let mut fields = Vec::with_capacity(field_count as usize);
        for _ in 0..field_count {
            fields.push(FieldInfo::parse(&mut reader, &cp)?);
        }

        let method_count = reader.read_u16()?;
        let mut methods = Vec::with_capacity(method_count as usize);
        for _ in 0..method_count {
            methods.push(MethodInfo::parse(&mut reader, &cp)?);
        }

        let attributes = parse_class_attributes(&mut reader, &cp)?;

        if reader.remaining() != 0 {
            return Err(ClassFileError::TrailingBytes);
        }

        let cf = Self {
            minor_version,
            major_version,
            cp,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        };

        if cf.super_class == 0 && cf.this_class_name()? != JAVA_LANG_OBJECT {
            return Err(ClassFileError::MissingSuperClass(
                cf.this_class_name()?.to_owned(),
            ));
        }
        Ok(cf)
    }

    pub fn this_class_name(&self) -> Result<&str, ClassFileError> {
        self.cp.class_name(self.this_class)
    }

    /// `None` only for `java/lang/Object`.
    pub fn super_class_name(&self) -> Result<Option<&str>, ClassFileError> {
        if self.super_class == 0 {
            return Ok(None);
        }
        self.cp.class_name(self.super_class).map(Some)
    }

    pub fn interface_names(&self) -> Result<Vec<&str>, ClassFileError> {
        self.interfaces
            .iter()
            .map(|index| self.cp.class_name(*index))
            .collect()
    }

    pub fn source_file(&self) -> Result<Option<&str>, ClassFileError> {
        for attr in &self.attributes {
            if let ClassAttr::SourceFile(index) = attr {
                return self.cp.utf8(*index).map(Some);
            }
        }
        Ok(None)
    }
}

impl TryFrom<&[u8]> for ClassFile {
    type Error = ClassFileError;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        Self::parse(data)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rejects_bad_magic() {
        let data = [0xDE, 0xAD, 0xBE, 0xEF, 0, 0, 0, 52];
        assert!(matches!(
            ClassFile::parse(&data),
            Err(ClassFileError::BadMagic(0xDEAD_BEEF))
        ));
    }

    #[test]
    fn rejects_truncated_input() {
        let data = [0xCA, 0xFE, 0xBA, 0xBE, 0, 0];
        assert!(matches!(
            ClassFile::parse(&data),
            Err(ClassFileError::UnexpectedEof { .. })
        ));
    }
}
