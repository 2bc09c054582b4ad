//! Hand-rolled class-file assembler plus the minimal core classes the
//! runtime needs to materialize exceptions, so interpreter tests run the
//! full parse → link → execute pipeline without a host JDK.

use norn_runtime::class_loader::memory::MemorySource;
use norn_runtime::{VirtualMachine, VmConfig};
use std::collections::HashMap;
use std::sync::Arc;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;
pub const ACC_SUPER: u16 = 0x0020;
pub const ACC_SYNCHRONIZED: u16 = 0x0020;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;

enum Const {
    Utf8(String),
    Integer(i32),
    Long(i64),
    Class(u16),
    String(u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
    InterfaceMethodRef(u16, u16),
    NameAndType(u16, u16),
    Padding,
}

pub struct ExEntry {
    pub start: u16,
    pub end: u16,
    pub handler: u16,
    /// `None` is the catch-any (finally) entry.
    pub catch: Option<&'static str>,
}

struct MethodDef {
    flags: u16,
    name_index: u16,
    desc_index: u16,
    max_stack: u16,
    max_locals: u16,
    code: Vec<u8>,
    exceptions: Vec<(u16, u16, u16, u16)>,
}

struct FieldDef {
    flags: u16,
    name_index: u16,
    desc_index: u16,
}

pub struct ClassBuilder {
    constants: Vec<Const>,
    utf8_index: HashMap<String, u16>,
    class_index: HashMap<String, u16>,
    nat_index: HashMap<(u16, u16), u16>,
    access_flags: u16,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    fields: Vec<FieldDef>,
    methods: Vec<MethodDef>,
    code_attr_name: u16,
}

impl ClassBuilder {
    pub fn new(name: &str, super_name: Option<&str>) -> Self {
        let mut builder = Self {
            constants: Vec::new(),
            utf8_index: HashMap::new(),
            class_index: HashMap::new(),
            nat_index: HashMap::new(),
            access_flags: ACC_PUBLIC | ACC_SUPER,
            this_class: 0,
            super_class: 0,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            code_attr_name: 0,
        };
        builder.this_class = builder.class(name);
        builder.super_class = match super_name {
            Some(super_name) => builder.class(super_name),
            None => 0,
        };
        builder.code_attr_name = builder.utf8("Code");
        builder
    }

    fn push(&mut self, constant: Const) -> u16 {
        let wide = matches!(constant, Const::Long(_));
        self.constants.push(constant);
        let index = self.constants.len() as u16;
        if wide {
            self.constants.push(Const::Padding);
        }
        index
    }

    pub fn utf8(&mut self, value: &str) -> u16 {
        if let Some(index) = self.utf8_index.get(value) {
            return *index;
        }
        let index = self.push(Const::Utf8(value.to_owned()));
        self.utf8_index.insert(value.to_owned(), index);
        index
    }

    pub fn class(&mut self, name: &str) -> u16 {
        if let Some(index) = self.class_index.get(name) {
            return *index;
        }
        let name_index = self.utf8(name);
        let index = self.push(Const::Class(name_index));
        self.class_index.insert(name.to_owned(), index);
        index
    }

    fn nat(&mut self, name: &str, desc: &str) -> u16 {
        let name_index = self.utf8(name);
        let desc_index = self.utf8(desc);
        if let Some(index) = self.nat_index.get(&(name_index, desc_index)) {
            return *index;
        }
        let index = self.push(Const::NameAndType(name_index, desc_index));
        self.nat_index.insert((name_index, desc_index), index);
        index
    }

    pub fn method_ref(&mut self, class: &str, name: &str, desc: &str) -> u16 {
        let class_index = self.class(class);
        let nat_index = self.nat(name, desc);
        self.push(Const::MethodRef(class_index, nat_index))
    }

    pub fn interface_method_ref(&mut self, class: &str, name: &str, desc: &str) -> u16 {
        let class_index = self.class(class);
        let nat_index = self.nat(name, desc);
        self.push(Const::InterfaceMethodRef(class_index, nat_index))
    }

    pub fn set_access_flags(&mut self, flags: u16) {
        self.access_flags = flags;
    }

    pub fn implement(&mut self, name: &str) {
        let index = self.class(name);
        self.interfaces.push(index);
    }

    pub fn field_ref(&mut self, class: &str, name: &str, desc: &str) -> u16 {
        let class_index = self.class(class);
        let nat_index = self.nat(name, desc);
        self.push(Const::FieldRef(class_index, nat_index))
    }

    pub fn string_const(&mut self, value: &str) -> u16 {
        let value_index = self.utf8(value);
        self.push(Const::String(value_index))
    }

    pub fn int_const(&mut self, value: i32) -> u16 {
        self.push(Const::Integer(value))
    }

    pub fn long_const(&mut self, value: i64) -> u16 {
        self.push(Const::Long(value))
    }

    pub fn add_field(&mut self, flags: u16, name: &str, desc: &str) {
        let name_index = self.utf8(name);
        let desc_index = self.utf8(desc);
        self.fields.push(FieldDef {
            flags,
            name_index,
            desc_index,
        });
    }

    pub fn add_abstract_method(&mut self, flags: u16, name: &str, desc: &str) {
        let name_index = self.utf8(name);
        let desc_index = self.utf8(desc);
        self.methods.push(MethodDef {
            flags: flags | ACC_ABSTRACT,
            name_index,
            desc_index,
            max_stack: 0,
            max_locals: 0,
            code: Vec::new(),
            exceptions: Vec::new(),
        });
    }

    pub fn add_method(
        &mut self,
        flags: u16,
        name: &str,
        desc: &str,
        max_stack: u16,
        max_locals: u16,
        code: Vec<u8>,
        exceptions: Vec<ExEntry>,
    ) {
        let name_index = self.utf8(name);
        let desc_index = self.utf8(desc);
        let exceptions = exceptions
            .into_iter()
            .map(|entry| {
                let catch_index = entry.catch.map(|name| self.class(name)).unwrap_or(0);
                (entry.start, entry.end, entry.handler, catch_index)
            })
            .collect();
        self.methods.push(MethodDef {
            flags,
            name_index,
            desc_index,
            max_stack,
            max_locals,
            code,
            exceptions,
        });
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes()); // minor
        out.extend_from_slice(&52u16.to_be_bytes()); // major: Java 8

        out.extend_from_slice(&(self.constants.len() as u16 + 1).to_be_bytes());
        for constant in &self.constants {
            match constant {
                Const::Utf8(value) => {
                    out.push(1);
                    out.extend_from_slice(&(value.len() as u16).to_be_bytes());
                    out.extend_from_slice(value.as_bytes());
                }
                Const::Integer(value) => {
                    out.push(3);
                    out.extend_from_slice(&value.to_be_bytes());
                }
                Const::Long(value) => {
                    out.push(5);
                    out.extend_from_slice(&value.to_be_bytes());
                }
                Const::Class(name_index) => {
                    out.push(7);
                    out.extend_from_slice(&name_index.to_be_bytes());
                }
                Const::String(value_index) => {
                    out.push(8);
                    out.extend_from_slice(&value_index.to_be_bytes());
                }
                Const::FieldRef(class_index, nat_index) => {
                    out.push(9);
                    out.extend_from_slice(&class_index.to_be_bytes());
                    out.extend_from_slice(&nat_index.to_be_bytes());
                }
                Const::MethodRef(class_index, nat_index) => {
                    out.push(10);
                    out.extend_from_slice(&class_index.to_be_bytes());
                    out.extend_from_slice(&nat_index.to_be_bytes());
                }
                Const::InterfaceMethodRef(class_index, nat_index) => {
                    out.push(11);
                    out.extend_from_slice(&class_index.to_be_bytes());
                    out.extend_from_slice(&nat_index.to_be_bytes());
                }
                Const::NameAndType(name_index, desc_index) => {
                    out.push(12);
                    out.extend_from_slice(&name_index.to_be_bytes());
                    out.extend_from_slice(&desc_index.to_be_bytes());
                }
                Const::Padding => {}
            }
        }

        out.extend_from_slice(&self.access_flags.to_be_bytes());
        out.extend_from_slice(&self.this_class.to_be_bytes());
        out.extend_from_slice(&self.super_class.to_be_bytes());
        out.extend_from_slice(&(self.interfaces.len() as u16).to_be_bytes());
        for interface in &self.interfaces {
            out.extend_from_slice(&interface.to_be_bytes());
        }

        out.extend_from_slice(&(self.fields.len() as u16).to_be_bytes());
        for field in &self.fields {
            out.extend_from_slice(&field.flags.to_be_bytes());
            out.extend_from_slice(&field.name_index.to_be_bytes());
            out.extend_from_slice(&field.desc_index.to_be_bytes());
            out.extend_from_slice(&0u16.to_be_bytes()); // attributes
        }

        out.extend_from_slice(&(self.methods.len() as u16).to_be_bytes());
        for method in &self.methods {
            out.extend_from_slice(&method.flags.to_be_bytes());
            out.extend_from_slice(&method.name_index.to_be_bytes());
            out.extend_from_slice(&method.desc_index.to_be_bytes());
            if method.flags & ACC_ABSTRACT != 0 {
                out.extend_from_slice(&0u16.to_be_bytes());
                continue;
            }
            out.extend_from_slice(&1u16.to_be_bytes()); // one attribute: Code

            let code_length = 2 + 2 + 4 + method.code.len() + 2 + method.exceptions.len() * 8 + 2;
            out.extend_from_slice(&self.code_attr_name.to_be_bytes());
            out.extend_from_slice(&(code_length as u32).to_be_bytes());
            out.extend_from_slice(&method.max_stack.to_be_bytes());
            out.extend_from_slice(&method.max_locals.to_be_bytes());
            out.extend_from_slice(&(method.code.len() as u32).to_be_bytes());
            out.extend_from_slice(&method.code);
            out.extend_from_slice(&(method.exceptions.len() as u16).to_be_bytes());
            for (start, end, handler, catch) in &method.exceptions {
                out.extend_from_slice(&start.to_be_bytes());
                out.extend_from_slice(&end.to_be_bytes());
                out.extend_from_slice(&handler.to_be_bytes());
                out.extend_from_slice(&catch.to_be_bytes());
            }
            out.extend_from_slice(&0u16.to_be_bytes()); // code attributes
        }

        out.extend_from_slice(&0u16.to_be_bytes()); // class attributes
        out
    }
}

/// Splices a u16 operand into hand-assembled code.
pub fn b2(value: u16) -> [u8; 2] {
    value.to_be_bytes()
}

pub fn object_class() -> Vec<u8> {
    let mut builder = ClassBuilder::new("java/lang/Object", None);
    builder.add_method(ACC_PUBLIC, "<init>", "()V", 1, 1, vec![0xb1], Vec::new());
    builder.build()
}

pub fn string_class() -> Vec<u8> {
    let mut builder = ClassBuilder::new("java/lang/String", Some("java/lang/Object"));
    builder.add_field(ACC_PUBLIC | ACC_FINAL, "value", "[C");
    builder.add_method(ACC_PUBLIC, "<init>", "()V", 1, 1, vec![0xb1], Vec::new());
    builder.build()
}

/// A throwable-shaped class with a no-arg constructor; the runtime falls
/// back to writing `detailMessage` directly when no string constructor
/// exists.
pub fn simple_throwable(name: &str, super_name: &str) -> Vec<u8> {
    let mut builder = ClassBuilder::new(name, Some(super_name));
    if name == "java/lang/Throwable" {
        builder.add_field(ACC_PUBLIC, "detailMessage", "Ljava/lang/String;");
    }
    let super_init = builder.method_ref(super_name, "<init>", "()V");
    let mut code = vec![0x2a]; // aload_0
    code.push(0xb7); // invokespecial
    code.extend_from_slice(&b2(super_init));
    code.push(0xb1); // return
    builder.add_method(ACC_PUBLIC, "<init>", "()V", 1, 1, code, Vec::new());
    builder.build()
}

/// A virtual machine over an in-memory source seeded with the minimal core
/// classes, with the calling host thread registered as "main".
pub fn test_vm(classes: Vec<(&str, Vec<u8>)>) -> Arc<VirtualMachine> {
    let vm = VirtualMachine::new(VmConfig::default()).expect("vm construction");
    let source = Arc::new(MemorySource::new());
    source.insert("java/lang/Object", object_class());
    source.insert("java/lang/String", string_class());
    for (name, super_name) in [
        ("java/lang/Throwable", "java/lang/Object"),
        ("java/lang/Exception", "java/lang/Throwable"),
        ("java/lang/RuntimeException", "java/lang/Exception"),
        ("java/lang/ArithmeticException", "java/lang/RuntimeException"),
        ("java/lang/NullPointerException", "java/lang/RuntimeException"),
        ("java/lang/ClassCastException", "java/lang/RuntimeException"),
        (
            "java/lang/ArrayIndexOutOfBoundsException",
            "java/lang/RuntimeException",
        ),
        (
            "java/lang/NegativeArraySizeException",
            "java/lang/RuntimeException",
        ),
        ("java/lang/Error", "java/lang/Throwable"),
        ("java/lang/InternalError", "java/lang/Error"),
        ("java/lang/StackOverflowError", "java/lang/Error"),
        ("java/lang/AbstractMethodError", "java/lang/Error"),
        ("java/lang/LinkageError", "java/lang/Error"),
        ("java/lang/NoClassDefFoundError", "java/lang/Error"),
        ("java/lang/NoSuchFieldError", "java/lang/Error"),
        ("java/lang/NoSuchMethodError", "java/lang/Error"),
        ("java/lang/IllegalMonitorStateException", "java/lang/RuntimeException"),
    ] {
        source.insert(name, simple_throwable(name, super_name));
    }
    for (name, bytes) in classes {
        source.insert(name, bytes);
    }
    vm.class_registry().add_source(source);

    let record = vm.threads().new_record("main".to_owned());
    vm.threads().attach_current(&record);
    vm
}

/// Registers the calling host thread so it can run interpreter code.
pub fn attach_thread(vm: &VirtualMachine, name: &str) {
    let record = vm.threads().new_record(name.to_owned());
    vm.threads().attach_current(&record);
}
