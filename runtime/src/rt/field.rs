use crate::keys::{FieldKey, Symbol};
use crate::value::{Value, ValueKind};
use norn_classfile::descriptor::JavaType;
use norn_classfile::flags::FieldFlags;

#[derive(Debug, Clone)]
pub struct FieldType {
    pub name: Symbol,
    pub desc: Symbol,
    pub flags: FieldFlags,
    pub ty: JavaType,
    /// Pool index of a static final initial value, applied at preparation.
    pub constant_value_index: Option<u16>,
}

impl FieldType {
    pub fn key(&self) -> FieldKey {
        FieldKey {
            name: self.name,
            desc: self.desc,
        }
    }

    pub fn is_static(&self) -> bool {
        self.flags.is_static()
    }

    pub fn kind(&self) -> ValueKind {
        ValueKind::from_type(&self.ty)
    }

    pub fn default_value(&self) -> Value {
        Value::default_for_type(&self.ty)
    }
}
