use crate::error::ClassFileError;
use crate::reader::ClassReader;

pub mod pool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefInfo {
    pub class_index: u16,
    pub name_and_type_index: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameAndTypeInfo {
    pub name_index: u16,
    pub descriptor_index: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodHandleInfo {
    pub reference_kind: u8,
    pub reference_index: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvokeDynamicInfo {
    pub bootstrap_method_attr_index: u16,
    pub name_and_type_index: u16,
}

/// One parsed constant pool record. Slot 0 and the trailing slot of every
/// long/double entry are `Unused`.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantInfo {
    Unused,
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(u16),
    String(u16),
    FieldRef(RefInfo),
    MethodRef(RefInfo),
    InterfaceMethodRef(RefInfo),
    NameAndType(NameAndTypeInfo),
    MethodHandle(MethodHandleInfo),
    MethodType(u16),
    InvokeDynamic(InvokeDynamicInfo),
}

impl ConstantInfo {
    pub const TAG_UTF8: u8 = 1;
    pub const TAG_INTEGER: u8 = 3;
    pub const TAG_FLOAT: u8 = 4;
    pub const TAG_LONG: u8 = 5;
    pub const TAG_DOUBLE: u8 = 6;
    pub const TAG_CLASS: u8 = 7;
    pub const TAG_STRING: u8 = 8;
    pub const TAG_FIELD_REF: u8 = 9;
    pub const TAG_METHOD_REF: u8 = 10;
    pub const TAG_INTERFACE_METHOD_REF: u8 = 11;
    pub const TAG_NAME_AND_TYPE: u8 = 12;
    pub const TAG_METHOD_HANDLE: u8 = 15;
    pub const TAG_METHOD_TYPE: u8 = 16;
    pub const TAG_INVOKE_DYNAMIC: u8 = 18;

    /// Long and double entries take up the following pool slot as well.
    pub fn is_wide(&self) -> bool {
        matches!(self, ConstantInfo::Long(_) | ConstantInfo::Double(_))
    }

    pub fn tag_name(&self) -> &'static str {
        match self {
            ConstantInfo::Unused => "Unused",
            ConstantInfo::Utf8(_) => "Utf8",
            ConstantInfo::Integer(_) => "Integer",
            ConstantInfo::Float(_) => "Float",
            ConstantInfo::Long(_) => "Long",
            ConstantInfo::Double(_) => "Double",
            ConstantInfo::Class(_) => "Class",
            ConstantInfo::String(_) => "String",
            ConstantInfo::FieldRef(_) => "FieldRef",
            ConstantInfo::MethodRef(_) => "MethodRef",
            ConstantInfo::InterfaceMethodRef(_) => "InterfaceMethodRef",
            ConstantInfo::NameAndType(_) => "NameAndType",
            ConstantInfo::MethodHandle(_) => "MethodHandle",
            ConstantInfo::MethodType(_) => "MethodType",
            ConstantInfo::InvokeDynamic(_) => "InvokeDynamic",
        }
    }

    pub(crate) fn parse(reader: &mut ClassReader, index: u16) -> Result<Self, ClassFileError> {
        let tag = reader.read_u8()?;
        let entry = match tag {
            Self::TAG_UTF8 => {
                let length = reader.read_u16()? as usize;
                let bytes = reader.read_bytes(length)?;
                let value = cesu8::from_java_cesu8(bytes)
                    .map_err(|_| ClassFileError::BadUtf8(index))?;
                ConstantInfo::Utf8(value.into_owned())
            }
            Self::TAG_INTEGER => ConstantInfo::Integer(reader.read_i32()?),
            Self::TAG_FLOAT => ConstantInfo::Float(reader.read_f32()?),
            Self::TAG_LONG => ConstantInfo::Long(reader.read_i64()?),
            Self::TAG_DOUBLE => ConstantInfo::Double(reader.read_f64()?),
            Self::TAG_CLASS => ConstantInfo::Class(reader.read_u16()?),
            Self::TAG_STRING => ConstantInfo::String(reader.read_u16()?),
            Self::TAG_FIELD_REF => ConstantInfo::FieldRef(RefInfo {
                class_index: reader.read_u16()?,
                name_and_type_index: reader.read_u16()?,
            }),
            Self::TAG_METHOD_REF => ConstantInfo::MethodRef(RefInfo {
                class_index: reader.read_u16()?,
                name_and_type_index: reader.read_u16()?,
            }),
            Self::TAG_INTERFACE_METHOD_REF => ConstantInfo::InterfaceMethodRef(RefInfo {
                class_index: reader.read_u16()?,
                name_and_type_index: reader.read_u16()?,
            }),
            Self::TAG_NAME_AND_TYPE => ConstantInfo::NameAndType(NameAndTypeInfo {
                name_index: reader.read_u16()?,
                descriptor_index: reader.read_u16()?,
            }),
            Self::TAG_METHOD_HANDLE => ConstantInfo::MethodHandle(MethodHandleInfo {
                reference_kind: reader.read_u8()?,
                reference_index: reader.read_u16()?,
            }),
            Self::TAG_METHOD_TYPE => ConstantInfo::MethodType(reader.read_u16()?),
            Self::TAG_INVOKE_DYNAMIC => ConstantInfo::InvokeDynamic(InvokeDynamicInfo {
                bootstrap_method_attr_index: reader.read_u16()?,
                name_and_type_index: reader.read_u16()?,
            }),
            other => return Err(ClassFileError::UnknownPoolTag { tag: other, index }),
        };
        Ok(entry)
    }
}
