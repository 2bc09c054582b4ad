use crate::error::VmError;
use crate::keys::Symbol;
use crate::rt::constant_pool::entry::{
    ClassEntry, MemberEntry, MemberView, NameAndTypeEntry, NameAndTypeView, StringEntry, Utf8Entry,
};
use crate::{build_exception, throw_exception};
use lasso::ThreadedRodeo;
use norn_classfile::constant::{ConstantInfo, InvokeDynamicInfo, MethodHandleInfo};
use std::fmt::Display;

pub mod entry;

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum RuntimeConstantType {
    Unused,
    Utf8,
    Integer,
    Float,
    Long,
    Double,
    Class,
    String,
    Field,
    Method,
    InterfaceMethod,
    NameAndType,
    MethodHandle,
    MethodType,
    InvokeDynamic,
}

impl Display for RuntimeConstantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let type_str = match self {
            RuntimeConstantType::Unused => "Unused",
            RuntimeConstantType::Utf8 => "Utf8",
            RuntimeConstantType::Integer => "Integer",
            RuntimeConstantType::Float => "Float",
            RuntimeConstantType::Long => "Long",
            RuntimeConstantType::Double => "Double",
            RuntimeConstantType::Class => "Class",
            RuntimeConstantType::String => "String",
            RuntimeConstantType::Field => "Field",
            RuntimeConstantType::Method => "Method",
            RuntimeConstantType::InterfaceMethod => "InterfaceMethod",
            RuntimeConstantType::NameAndType => "NameAndType",
            RuntimeConstantType::MethodHandle => "MethodHandle",
            RuntimeConstantType::MethodType => "MethodType",
            RuntimeConstantType::InvokeDynamic => "InvokeDynamic",
        };
        write!(f, "{}", type_str)
    }
}

pub enum RuntimeConstant {
    Unused,
    Utf8(Utf8Entry),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(ClassEntry),
    String(StringEntry),
    Field(MemberEntry),
    Method(MemberEntry),
    InterfaceMethod(MemberEntry),
    NameAndType(NameAndTypeEntry),
    MethodHandle(MethodHandleInfo),
    MethodType(u16),
    InvokeDynamic(InvokeDynamicInfo),
}

impl RuntimeConstant {
    pub fn get_type(&self) -> RuntimeConstantType {
        match self {
            RuntimeConstant::Unused => RuntimeConstantType::Unused,
            RuntimeConstant::Utf8(_) => RuntimeConstantType::Utf8,
            RuntimeConstant::Integer(_) => RuntimeConstantType::Integer,
            RuntimeConstant::Float(_) => RuntimeConstantType::Float,
            RuntimeConstant::Long(_) => RuntimeConstantType::Long,
            RuntimeConstant::Double(_) => RuntimeConstantType::Double,
            RuntimeConstant::Class(_) => RuntimeConstantType::Class,
            RuntimeConstant::String(_) => RuntimeConstantType::String,
            RuntimeConstant::Field(_) => RuntimeConstantType::Field,
            RuntimeConstant::Method(_) => RuntimeConstantType::Method,
            RuntimeConstant::InterfaceMethod(_) => RuntimeConstantType::InterfaceMethod,
            RuntimeConstant::NameAndType(_) => RuntimeConstantType::NameAndType,
            RuntimeConstant::MethodHandle(_) => RuntimeConstantType::MethodHandle,
            RuntimeConstant::MethodType(_) => RuntimeConstantType::MethodType,
            RuntimeConstant::InvokeDynamic(_) => RuntimeConstantType::InvokeDynamic,
        }
    }
}

/// A constant pushed by `ldc`/`ldc_w`/`ldc2_w`.
#[derive(Debug, Clone, Copy)]
pub enum LoadableConstant {
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    String(Symbol),
    Class(Symbol),
}

/// Per-class-type constant pool. UTF-8 payloads intern lazily on first
/// request; the interned symbols are cached per entry.
pub struct RuntimeConstantPool {
    entries: Vec<RuntimeConstant>,
}

impl RuntimeConstantPool {
    pub fn new(raw: Vec<ConstantInfo>) -> Self {
        let entries = raw
            .into_iter()
            .map(|entry| match entry {
                ConstantInfo::Unused => RuntimeConstant::Unused,
                ConstantInfo::Utf8(value) => RuntimeConstant::Utf8(Utf8Entry::new(value)),
                ConstantInfo::Integer(v) => RuntimeConstant::Integer(v),
                ConstantInfo::Float(v) => RuntimeConstant::Float(v),
                ConstantInfo::Long(v) => RuntimeConstant::Long(v),
                ConstantInfo::Double(v) => RuntimeConstant::Double(v),
                ConstantInfo::Class(idx) => RuntimeConstant::Class(ClassEntry::new(idx)),
                ConstantInfo::String(idx) => RuntimeConstant::String(StringEntry::new(idx)),
                ConstantInfo::FieldRef(info) => RuntimeConstant::Field(MemberEntry::new(
                    info.class_index,
                    info.name_and_type_index,
                )),
                ConstantInfo::MethodRef(info) => RuntimeConstant::Method(MemberEntry::new(
                    info.class_index,
                    info.name_and_type_index,
                )),
                ConstantInfo::InterfaceMethodRef(info) => RuntimeConstant::InterfaceMethod(
                    MemberEntry::new(info.class_index, info.name_and_type_index),
                ),
                ConstantInfo::NameAndType(info) => RuntimeConstant::NameAndType(
                    NameAndTypeEntry::new(info.name_index, info.descriptor_index),
                ),
                ConstantInfo::MethodHandle(info) => RuntimeConstant::MethodHandle(info),
                ConstantInfo::MethodType(idx) => RuntimeConstant::MethodType(idx),
                ConstantInfo::InvokeDynamic(info) => RuntimeConstant::InvokeDynamic(info),
            })
            .collect();
        Self { entries }
    }

    fn entry(&self, idx: u16) -> Result<&RuntimeConstant, VmError> {
        self.entries.get(idx as usize).ok_or(build_exception!(
            ClassFormatError,
            "Invalid constant pool index: {}",
            idx
        ))
    }

    fn mismatch(
        idx: u16,
        expected: RuntimeConstantType,
        actual: &RuntimeConstant,
    ) -> VmError {
        build_exception!(
            IncompatibleClassChangeError,
            "constant pool index {}: expected {}, found {}",
            idx,
            expected,
            actual.get_type()
        )
    }

    pub fn get_utf8_sym(&self, idx: u16, interner: &ThreadedRodeo) -> Result<Symbol, VmError> {
        match self.entry(idx)? {
            RuntimeConstant::Utf8(entry) => Ok(*entry
                .utf8_sym
                .get_or_init(|| interner.get_or_intern(&entry.value))),
            other => Err(Self::mismatch(idx, RuntimeConstantType::Utf8, other)),
        }
    }

    pub fn get_class_sym(&self, idx: u16, interner: &ThreadedRodeo) -> Result<Symbol, VmError> {
        match self.entry(idx)? {
            RuntimeConstant::Class(entry) => entry
                .name_sym
                .get_or_try_init(|| self.get_utf8_sym(entry.name_idx, interner))
                .copied(),
            other => Err(Self::mismatch(idx, RuntimeConstantType::Class, other)),
        }
    }

    pub fn get_string_sym(&self, idx: u16, interner: &ThreadedRodeo) -> Result<Symbol, VmError> {
        match self.entry(idx)? {
            RuntimeConstant::String(entry) => entry
                .string_sym
                .get_or_try_init(|| self.get_utf8_sym(entry.string_idx, interner))
                .copied(),
            other => Err(Self::mismatch(idx, RuntimeConstantType::String, other)),
        }
    }

    pub fn get_nat_view(
        &self,
        idx: u16,
        interner: &ThreadedRodeo,
    ) -> Result<NameAndTypeView, VmError> {
        match self.entry(idx)? {
            RuntimeConstant::NameAndType(entry) => {
                let name = *entry
                    .name_sym
                    .get_or_try_init(|| self.get_utf8_sym(entry.name_idx, interner))?;
                let desc = *entry
                    .descriptor_sym
                    .get_or_try_init(|| self.get_utf8_sym(entry.descriptor_idx, interner))?;
                Ok(NameAndTypeView { name, desc })
            }
            other => Err(Self::mismatch(idx, RuntimeConstantType::NameAndType, other)),
        }
    }

    fn member_view(
        &self,
        entry: &MemberEntry,
        interner: &ThreadedRodeo,
    ) -> Result<MemberView, VmError> {
        let class = *entry
            .class_sym
            .get_or_try_init(|| self.get_class_sym(entry.class_idx, interner))?;
        let nat = self.get_nat_view(entry.nat_idx, interner)?;
        Ok(MemberView { class, nat })
    }

    pub fn get_field_view(
        &self,
        idx: u16,
        interner: &ThreadedRodeo,
    ) -> Result<MemberView, VmError> {
        match self.entry(idx)? {
            RuntimeConstant::Field(entry) => self.member_view(entry, interner),
            other => Err(Self::mismatch(idx, RuntimeConstantType::Field, other)),
        }
    }

    pub fn get_method_view(
        &self,
        idx: u16,
        interner: &ThreadedRodeo,
    ) -> Result<MemberView, VmError> {
        match self.entry(idx)? {
            RuntimeConstant::Method(entry) => self.member_view(entry, interner),
            other => Err(Self::mismatch(idx, RuntimeConstantType::Method, other)),
        }
    }

    pub fn get_interface_method_view(
        &self,
        idx: u16,
        interner: &ThreadedRodeo,
    ) -> Result<MemberView, VmError> {
        match self.entry(idx)? {
            RuntimeConstant::InterfaceMethod(entry) => self.member_view(entry, interner),
            other => Err(Self::mismatch(
                idx,
                RuntimeConstantType::InterfaceMethod,
                other,
            )),
        }
    }

    /// `invokespecial`/`invokestatic` refs may use either tag.
    pub fn get_method_or_interface_method_view(
        &self,
        idx: u16,
        interner: &ThreadedRodeo,
    ) -> Result<MemberView, VmError> {
        match self.entry(idx)? {
            RuntimeConstant::Method(entry) | RuntimeConstant::InterfaceMethod(entry) => {
                self.member_view(entry, interner)
            }
            other => Err(Self::mismatch(idx, RuntimeConstantType::Method, other)),
        }
    }

    pub fn get_invoke_dynamic_nat(
        &self,
        idx: u16,
        interner: &ThreadedRodeo,
    ) -> Result<NameAndTypeView, VmError> {
        match self.entry(idx)? {
            RuntimeConstant::InvokeDynamic(info) => {
                self.get_nat_view(info.name_and_type_index, interner)
            }
            other => Err(Self::mismatch(
                idx,
                RuntimeConstantType::InvokeDynamic,
                other,
            )),
        }
    }

    pub fn get_loadable(
        &self,
        idx: u16,
        interner: &ThreadedRodeo,
    ) -> Result<LoadableConstant, VmError> {
        match self.entry(idx)? {
            RuntimeConstant::Integer(v) => Ok(LoadableConstant::Integer(*v)),
            RuntimeConstant::Float(v) => Ok(LoadableConstant::Float(*v)),
            RuntimeConstant::Long(v) => Ok(LoadableConstant::Long(*v)),
            RuntimeConstant::Double(v) => Ok(LoadableConstant::Double(*v)),
            RuntimeConstant::String(_) => Ok(LoadableConstant::String(
                self.get_string_sym(idx, interner)?,
            )),
            RuntimeConstant::Class(_) => {
                Ok(LoadableConstant::Class(self.get_class_sym(idx, interner)?))
            }
            other => throw_exception!(
                IncompatibleClassChangeError,
                "constant pool index {} is not loadable: {}",
                idx,
                other.get_type()
            ),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use norn_classfile::constant::{NameAndTypeInfo, RefInfo};

    fn pool() -> RuntimeConstantPool {
        RuntimeConstantPool::new(vec![
            ConstantInfo::Unused,
            ConstantInfo::Utf8("java/lang/Object".to_owned()),
            ConstantInfo::Class(1),
            ConstantInfo::Utf8("hashCode".to_owned()),
            ConstantInfo::Utf8("()I".to_owned()),
            ConstantInfo::NameAndType(NameAndTypeInfo {
                name_index: 3,
                descriptor_index: 4,
            }),
            ConstantInfo::MethodRef(RefInfo {
                class_index: 2,
                name_and_type_index: 5,
            }),
            ConstantInfo::Long(99),
            ConstantInfo::Unused,
        ])
    }

    #[test]
    fn method_view_resolves_through_the_chain() {
        let interner = ThreadedRodeo::new();
        let pool = pool();
        let view = pool.get_method_view(6, &interner).unwrap();
        assert_eq!(interner.resolve(&view.class), "java/lang/Object");
        assert_eq!(interner.resolve(&view.nat.name), "hashCode");
        assert_eq!(interner.resolve(&view.nat.desc), "()I");
    }

    #[test]
    fn utf8_interning_is_stable() {
        let interner = ThreadedRodeo::new();
        let pool = pool();
        let a = pool.get_utf8_sym(1, &interner).unwrap();
        let b = pool.get_utf8_sym(1, &interner).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn tag_mismatch_is_incompatible_class_change() {
        let interner = ThreadedRodeo::new();
        let pool = pool();
        assert!(matches!(
            pool.get_class_sym(3, &interner),
            Err(VmError::Synthetic(ex))
                if ex.kind == crate::error::JavaExceptionKind::IncompatibleClassChangeError
        ));
    }

    #[test]
    fn loadable_covers_wide_constants() {
        let interner = ThreadedRodeo::new();
        let pool = pool();
        assert!(matches!(
            pool.get_loadable(7, &interner).unwrap(),
            LoadableConstant::Long(99)
        ));
        assert!(pool.get_loadable(8, &interner).is_err());
    }
}
