use crate::error::VmError;
use crate::keys::{MethodKey, Symbol};
use crate::{build_exception, throw_exception};
use norn_classfile::attribute::method::code::{CodeAttributeInfo, LineNumberEntry};
use norn_classfile::attribute::method::{CodeAttribute, ExceptionTableEntry};
use norn_classfile::descriptor::MethodDescriptor;
use norn_classfile::flags::MethodFlags;

const CALLER_SENSITIVE_DESCRIPTOR: &str = "Lsun/reflect/CallerSensitive;";

pub struct CodeBody {
    pub code: Box<[u8]>,
    pub max_stack: u16,
    pub max_locals: u16,
    line_numbers: Option<Vec<LineNumberEntry>>,
    pub exception_table: Vec<ExceptionTableEntry>,
}

pub enum MethodBody {
    Interpreted(CodeBody),
    Native,
    Abstract,
}

pub struct MethodType {
    pub name: Symbol,
    pub desc: Symbol,
    flags: MethodFlags,
    descriptor: MethodDescriptor,
    body: MethodBody,
    caller_sensitive: bool,
}

impl MethodType {
    pub fn new(
        info: &norn_classfile::method::MethodInfo,
        name: Symbol,
        desc: Symbol,
        descriptor_str: &str,
        class_name: &str,
    ) -> Result<Self, VmError> {
        let flags = info.access_flags;
        let descriptor = MethodDescriptor::parse(descriptor_str)?;
        let caller_sensitive = info
            .annotation_descriptors()
            .any(|d| d == CALLER_SENSITIVE_DESCRIPTOR);

        let body = if flags.is_abstract() {
            MethodBody::Abstract
        } else if flags.is_native() {
            MethodBody::Native
        } else {
            let code = info.code().ok_or(build_exception!(
                ClassFormatError,
                "non-abstract, non-native method without Code in {}",
                class_name
            ))?;
            MethodBody::Interpreted(CodeBody::from_attribute(code, class_name)?)
        };

        Ok(Self {
            name,
            desc,
            flags,
            descriptor,
            body,
            caller_sensitive,
        })
    }

    pub fn key(&self) -> MethodKey {
        MethodKey {
            name: self.name,
            desc: self.desc,
        }
    }

    pub fn flags(&self) -> MethodFlags {
        self.flags
    }

    pub fn is_static(&self) -> bool {
        self.flags.is_static()
    }

    pub fn is_native(&self) -> bool {
        self.flags.is_native()
    }

    pub fn is_abstract(&self) -> bool {
        self.flags.is_abstract()
    }

    pub fn is_synchronized(&self) -> bool {
        self.flags.is_synchronized()
    }

    pub fn is_caller_sensitive(&self) -> bool {
        self.caller_sensitive
    }

    pub fn descriptor(&self) -> &MethodDescriptor {
        &self.descriptor
    }

    /// Argument slot count on invocation, including `this` for instance
    /// methods, with wide params counted twice.
    pub fn invoke_slots(&self) -> usize {
        self.descriptor.param_slots() + usize::from(!self.is_static())
    }

    pub fn code(&self) -> Result<&CodeBody, VmError> {
        match &self.body {
            MethodBody::Interpreted(body) => Ok(body),
            MethodBody::Native => Err(VmError::Internal(
                "native method has no bytecode body".to_owned(),
            )),
            MethodBody::Abstract => throw_exception!(AbstractMethodError),
        }
    }

    pub fn line_number_table(&self) -> Option<&[LineNumberEntry]> {
        match &self.body {
            MethodBody::Interpreted(body) => body.line_numbers.as_deref(),
            _ => None,
        }
    }

    /// The source line active at `pc`, per the `LineNumberTable` attribute.
    pub fn line_number_for_pc(&self, pc: usize) -> Option<i32> {
        let table = self.line_number_table()?;
        let mut result = None;
        for entry in table {
            if entry.start_pc as usize <= pc {
                result = Some(entry.line_number as i32);
            } else {
                break;
            }
        }
        result.or_else(|| table.first().map(|e| e.line_number as i32))
    }
}

impl CodeBody {
    fn from_attribute(attr: &CodeAttribute, class_name: &str) -> Result<Self, VmError> {
        if attr.code.is_empty() {
            return throw_exception!(
                ClassFormatError,
                "empty Code attribute in {}",
                class_name
            );
        }
        let mut line_numbers: Option<Vec<LineNumberEntry>> = None;
        for code_attr in &attr.attributes {
            if let CodeAttributeInfo::LineNumberTable(entries) = code_attr {
                line_numbers
                    .get_or_insert_with(Vec::new)
                    .extend_from_slice(entries);
            }
        }
        Ok(Self {
            code: attr.code.clone().into_boxed_slice(),
            max_stack: attr.max_stack,
            max_locals: attr.max_locals,
            line_numbers,
            exception_table: attr.exception_table.clone(),
        })
    }
}
