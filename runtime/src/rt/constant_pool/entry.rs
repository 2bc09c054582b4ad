use crate::keys::Symbol;
use once_cell::sync::OnceCell;

pub struct Utf8Entry {
    pub value: String,
    pub utf8_sym: OnceCell<Symbol>,
}

impl Utf8Entry {
    pub fn new(value: String) -> Self {
        Self {
            value,
            utf8_sym: OnceCell::new(),
        }
    }
}

pub struct ClassEntry {
    pub name_idx: u16,
    pub name_sym: OnceCell<Symbol>,
}

impl ClassEntry {
    pub fn new(name_idx: u16) -> Self {
        Self {
            name_idx,
            name_sym: OnceCell::new(),
        }
    }
}

pub struct StringEntry {
    pub string_idx: u16,
    pub string_sym: OnceCell<Symbol>,
}

impl StringEntry {
    pub fn new(string_idx: u16) -> Self {
        Self {
            string_idx,
            string_sym: OnceCell::new(),
        }
    }
}

/// Field, method, and interface-method references share this layout.
pub struct MemberEntry {
    pub class_idx: u16,
    pub nat_idx: u16,
    pub class_sym: OnceCell<Symbol>,
}

impl MemberEntry {
    pub fn new(class_idx: u16, nat_idx: u16) -> Self {
        Self {
            class_idx,
            nat_idx,
            class_sym: OnceCell::new(),
        }
    }
}

pub struct NameAndTypeEntry {
    pub name_idx: u16,
    pub descriptor_idx: u16,
    pub name_sym: OnceCell<Symbol>,
    pub descriptor_sym: OnceCell<Symbol>,
}

impl NameAndTypeEntry {
    pub fn new(name_idx: u16, descriptor_idx: u16) -> Self {
        Self {
            name_idx,
            descriptor_idx,
            name_sym: OnceCell::new(),
            descriptor_sym: OnceCell::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NameAndTypeView {
    pub name: Symbol,
    pub desc: Symbol,
}

#[derive(Debug, Clone, Copy)]
pub struct MemberView {
    pub class: Symbol,
    pub nat: NameAndTypeView,
}
