use thiserror::Error;

/// Errors produced while decoding a `.class` binary.
#[derive(Debug, Error)]
pub enum ClassFileError {
    #[error("unexpected end of class file at offset {offset} (wanted {wanted} more bytes)")]
    UnexpectedEof { offset: usize, wanted: usize },

    #[error("bad magic number {0:#010x}")]
    BadMagic(u32),

    #[error("unknown constant pool tag {tag} at index {index}")]
    UnknownPoolTag { tag: u8, index: u16 },

    #[error("constant pool index {0} out of range")]
    BadPoolIndex(u16),

    #[error("constant pool index {index} holds {actual}, expected {expected}")]
    PoolTagMismatch {
        index: u16,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("malformed modified UTF-8 in constant pool entry {0}")]
    BadUtf8(u16),

    #[error("malformed type descriptor {0:?}")]
    BadDescriptor(String),

    #[error("super_class index is 0 but this class is {0:?}")]
    MissingSuperClass(String),

    #[error("trailing bytes after class file end")]
    TrailingBytes,
}
