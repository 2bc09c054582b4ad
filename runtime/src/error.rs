use crate::value::Value;
use norn_classfile::error::ClassFileError;
use std::fmt::Display;

#[derive(Debug)]
pub enum VmError {
    /// No source could produce the class.
    ClassNotFound(String),
    ClassFile(ClassFileError),
    Io(std::io::Error),
    Archive(String),
    MainClassNotFound(String),
    /// Embedder-facing invalid state: not catchable from Java code.
    Invalid(String),
    /// Interpreter invariant violation; surfaces as a non-catchable
    /// `java/lang/InternalError`.
    Internal(String),
    /// A well-known Java exception the runtime wants to raise but has not
    /// materialized as a heap object yet.
    Synthetic(SyntheticException),
    /// A materialized Java throwable in flight.
    Thrown { value: Value, catchable: bool },
}

impl From<ClassFileError> for VmError {
    fn from(value: ClassFileError) -> Self {
        VmError::ClassFile(value)
    }
}

impl From<std::io::Error> for VmError {
    fn from(value: std::io::Error) -> Self {
        VmError::Io(value)
    }
}

impl From<SyntheticException> for VmError {
    fn from(value: SyntheticException) -> Self {
        VmError::Synthetic(value)
    }
}

impl Display for VmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VmError::ClassNotFound(name) => write!(f, "class not found: {name}"),
            VmError::ClassFile(e) => write!(f, "malformed class file: {e}"),
            VmError::Io(e) => write!(f, "i/o error: {e}"),
            VmError::Archive(msg) => write!(f, "unreadable archive: {msg}"),
            VmError::MainClassNotFound(name) => write!(f, "main class not found: {name}"),
            VmError::Invalid(msg) => write!(f, "invalid: {msg}"),
            VmError::Internal(msg) => write!(f, "internal error: {msg}"),
            VmError::Synthetic(ex) => write!(f, "{}", ex.render()),
            VmError::Thrown { .. } => write!(f, "java exception thrown"),
        }
    }
}

/// The Java exception kinds the runtime itself can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JavaExceptionKind {
    ArithmeticException,
    ArrayIndexOutOfBoundsException,
    ArrayStoreException,
    ClassCastException,
    ClassNotFoundException,
    CloneNotSupportedException,
    IllegalArgumentException,
    IllegalMonitorStateException,
    InterruptedException,
    NegativeArraySizeException,
    NullPointerException,
    AbstractMethodError,
    ClassFormatError,
    IncompatibleClassChangeError,
    InternalError,
    LinkageError,
    NoClassDefFoundError,
    NoSuchFieldError,
    NoSuchMethodError,
    UnsatisfiedLinkError,
    StackOverflowError,
    IOException,
}

impl JavaExceptionKind {
    pub const fn class_name(self) -> &'static str {
        match self {
            Self::ArithmeticException => "java/lang/ArithmeticException",
            Self::ArrayIndexOutOfBoundsException => "java/lang/ArrayIndexOutOfBoundsException",
            Self::ArrayStoreException => "java/lang/ArrayStoreException",
            Self::ClassCastException => "java/lang/ClassCastException",
            Self::ClassNotFoundException => "java/lang/ClassNotFoundException",
            Self::CloneNotSupportedException => "java/lang/CloneNotSupportedException",
            Self::IllegalArgumentException => "java/lang/IllegalArgumentException",
            Self::IllegalMonitorStateException => "java/lang/IllegalMonitorStateException",
            Self::InterruptedException => "java/lang/InterruptedException",
            Self::NegativeArraySizeException => "java/lang/NegativeArraySizeException",
            Self::NullPointerException => "java/lang/NullPointerException",
            Self::AbstractMethodError => "java/lang/AbstractMethodError",
            Self::ClassFormatError => "java/lang/ClassFormatError",
            Self::IncompatibleClassChangeError => "java/lang/IncompatibleClassChangeError",
            Self::InternalError => "java/lang/InternalError",
            Self::LinkageError => "java/lang/LinkageError",
            Self::NoClassDefFoundError => "java/lang/NoClassDefFoundError",
            Self::NoSuchFieldError => "java/lang/NoSuchFieldError",
            Self::NoSuchMethodError => "java/lang/NoSuchMethodError",
            Self::UnsatisfiedLinkError => "java/lang/UnsatisfiedLinkError",
            Self::StackOverflowError => "java/lang/StackOverflowError",
            Self::IOException => "java/io/IOException",
        }
    }

    pub fn class_name_dot(self) -> String {
        self.class_name().replace('/', ".")
    }

    /// Internal errors unwind without consulting exception tables.
    pub fn is_catchable(self) -> bool {
        !matches!(self, Self::InternalError)
    }
}

/// Reference to the constructor the materializer will call.
pub struct JavaExceptionReference {
    pub class: &'static str,
    pub name: &'static str,
    pub descriptor: &'static str,
}

#[derive(Debug, Clone)]
pub struct SyntheticException {
    pub kind: JavaExceptionKind,
    pub message: Option<String>,
}

impl SyntheticException {
    const CONSTRUCTOR_NAME: &'static str = "<init>";
    const STRING_PARAM_CONSTRUCTOR: &'static str = "(Ljava/lang/String;)V";
    const NO_PARAM_CONSTRUCTOR: &'static str = "()V";

    pub fn new(kind: JavaExceptionKind) -> Self {
        Self {
            kind,
            message: None,
        }
    }

    pub fn with_message(kind: JavaExceptionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: Some(message.into()),
        }
    }

    pub fn as_reference(&self) -> JavaExceptionReference {
        JavaExceptionReference {
            class: self.kind.class_name(),
            name: Self::CONSTRUCTOR_NAME,
            descriptor: if self.message.is_some() {
                Self::STRING_PARAM_CONSTRUCTOR
            } else {
                Self::NO_PARAM_CONSTRUCTOR
            },
        }
    }

    pub fn render(&self) -> String {
        match &self.message {
            Some(message) => format!("{}: {}", self.kind.class_name_dot(), message),
            None => self.kind.class_name_dot(),
        }
    }
}
