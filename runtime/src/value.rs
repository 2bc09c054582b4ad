use crate::error::VmError;
use crate::object::array::ArrayObject;
use crate::object::instance::ClassInstance;
use crate::throw_exception;
use norn_classfile::descriptor::{JavaType, PrimitiveType};
use std::sync::Arc;

pub type InstanceRef = Arc<ClassInstance>;
pub type ArrayRef = Arc<ArrayObject>;

/// Stack operands, locals, arguments, and field slots. Numeric primitives
/// keep their declared kind; the integer accessors widen per the JVM rules.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Instance(InstanceRef),
    Array(ArrayRef),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Reference,
}

impl ValueKind {
    pub fn from_type(ty: &JavaType) -> Self {
        match ty {
            JavaType::Primitive(p) => Self::from_primitive(*p),
            JavaType::Object(_) | JavaType::Array { .. } => ValueKind::Reference,
        }
    }

    pub fn from_primitive(p: PrimitiveType) -> Self {
        match p {
            PrimitiveType::Boolean => ValueKind::Boolean,
            PrimitiveType::Byte => ValueKind::Byte,
            PrimitiveType::Char => ValueKind::Char,
            PrimitiveType::Short => ValueKind::Short,
            PrimitiveType::Int => ValueKind::Int,
            PrimitiveType::Long => ValueKind::Long,
            PrimitiveType::Float => ValueKind::Float,
            PrimitiveType::Double => ValueKind::Double,
        }
    }

    /// Long and double occupy two local slots.
    pub fn is_wide(&self) -> bool {
        matches!(self, ValueKind::Long | ValueKind::Double)
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null | Value::Instance(_) | Value::Array(_) => ValueKind::Reference,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Byte(_) => ValueKind::Byte,
            Value::Char(_) => ValueKind::Char,
            Value::Short(_) => ValueKind::Short,
            Value::Int(_) => ValueKind::Int,
            Value::Long(_) => ValueKind::Long,
            Value::Float(_) => ValueKind::Float,
            Value::Double(_) => ValueKind::Double,
        }
    }

    /// The type-default: false, zero, or null.
    pub fn default_for(kind: ValueKind) -> Value {
        match kind {
            ValueKind::Boolean => Value::Boolean(false),
            ValueKind::Byte => Value::Byte(0),
            ValueKind::Char => Value::Char(0),
            ValueKind::Short => Value::Short(0),
            ValueKind::Int => Value::Int(0),
            ValueKind::Long => Value::Long(0),
            ValueKind::Float => Value::Float(0.0),
            ValueKind::Double => Value::Double(0.0),
            ValueKind::Reference => Value::Null,
        }
    }

    pub fn default_for_type(ty: &JavaType) -> Value {
        Self::default_for(ValueKind::from_type(ty))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Value::Null | Value::Instance(_) | Value::Array(_))
    }

    /// Widening read for the int-family kinds.
    pub fn as_int(&self) -> Result<i32, VmError> {
        match self {
            Value::Boolean(v) => Ok(*v as i32),
            Value::Byte(v) => Ok(*v as i32),
            Value::Char(v) => Ok(*v as i32),
            Value::Short(v) => Ok(*v as i32),
            Value::Int(v) => Ok(*v),
            other => Err(VmError::Internal(format!(
                "expected int-compatible value, got {:?}",
                other.kind()
            ))),
        }
    }

    pub fn as_long(&self) -> Result<i64, VmError> {
        match self {
            Value::Long(v) => Ok(*v),
            other => Err(VmError::Internal(format!(
                "expected long, got {:?}",
                other.kind()
            ))),
        }
    }

    pub fn as_float(&self) -> Result<f32, VmError> {
        match self {
            Value::Float(v) => Ok(*v),
            other => Err(VmError::Internal(format!(
                "expected float, got {:?}",
                other.kind()
            ))),
        }
    }

    pub fn as_double(&self) -> Result<f64, VmError> {
        match self {
            Value::Double(v) => Ok(*v),
            other => Err(VmError::Internal(format!(
                "expected double, got {:?}",
                other.kind()
            ))),
        }
    }

    /// A non-null instance; null raises `NullPointerException`.
    pub fn as_instance(&self) -> Result<&InstanceRef, VmError> {
        match self {
            Value::Instance(instance) => Ok(instance),
            Value::Null => throw_exception!(NullPointerException),
            other => Err(VmError::Internal(format!(
                "expected instance, got {:?}",
                other.kind()
            ))),
        }
    }

    /// A non-null array; null raises `NullPointerException`.
    pub fn as_array(&self) -> Result<&ArrayRef, VmError> {
        match self {
            Value::Array(array) => Ok(array),
            Value::Null => throw_exception!(NullPointerException),
            other => Err(VmError::Internal(format!(
                "expected array, got {:?}",
                other.kind()
            ))),
        }
    }

    /// Narrows an int-family value into the declared kind of a field or
    /// array slot; other kinds pass through unchanged.
    pub fn narrow_to(self, kind: ValueKind) -> Result<Value, VmError> {
        match kind {
            ValueKind::Boolean => Ok(Value::Boolean(self.as_int()? != 0)),
            ValueKind::Byte => Ok(Value::Byte(self.as_int()? as i8)),
            ValueKind::Char => Ok(Value::Char(self.as_int()? as u16)),
            ValueKind::Short => Ok(Value::Short(self.as_int()? as i16)),
            ValueKind::Int => Ok(Value::Int(self.as_int()?)),
            _ => Ok(self),
        }
    }

    /// Strict coercion into a declared slot kind: int-family values narrow,
    /// everything else must already match. Field and array stores use this.
    pub fn coerce_to(self, kind: ValueKind) -> Result<Value, VmError> {
        match kind {
            ValueKind::Boolean
            | ValueKind::Byte
            | ValueKind::Char
            | ValueKind::Short
            | ValueKind::Int => self.narrow_to(kind),
            ValueKind::Long => self.as_long().map(Value::Long),
            ValueKind::Float => self.as_float().map(Value::Float),
            ValueKind::Double => self.as_double().map(Value::Double),
            ValueKind::Reference => {
                if self.is_reference() {
                    Ok(self)
                } else {
                    Err(VmError::Internal(format!(
                        "expected reference, got {:?}",
                        self.kind()
                    )))
                }
            }
        }
    }

    /// Reference identity, the `if_acmp*` / intern-table notion of equality.
    pub fn same_ref(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Null, Value::Null) => true,
            (Value::Instance(x), Value::Instance(y)) => Arc::ptr_eq(x, y),
            (Value::Array(x), Value::Array(y)) => Arc::ptr_eq(x, y),
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Short(a), Value::Short(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Instance(a), Value::Instance(b)) => Arc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn int_family_widens() {
        assert_eq!(Value::Boolean(true).as_int().unwrap(), 1);
        assert_eq!(Value::Byte(-3).as_int().unwrap(), -3);
        assert_eq!(Value::Char(0xFFFF).as_int().unwrap(), 0xFFFF);
        assert_eq!(Value::Short(-2).as_int().unwrap(), -2);
        assert!(Value::Long(1).as_int().is_err());
    }

    #[test]
    fn narrowing_truncates() {
        assert_eq!(
            Value::Int(0x1FF).narrow_to(ValueKind::Byte).unwrap(),
            Value::Byte(-1)
        );
        assert_eq!(
            Value::Int(2).narrow_to(ValueKind::Boolean).unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            Value::Long(7).narrow_to(ValueKind::Long).unwrap(),
            Value::Long(7)
        );
    }

    #[test]
    fn defaults_match_kinds() {
        assert_eq!(Value::default_for(ValueKind::Int), Value::Int(0));
        assert_eq!(Value::default_for(ValueKind::Reference), Value::Null);
        assert_eq!(Value::default_for(ValueKind::Double), Value::Double(0.0));
    }

    #[test]
    fn null_as_instance_is_npe() {
        assert!(matches!(
            Value::Null.as_instance(),
            Err(VmError::Synthetic(ex))
                if ex.kind == crate::error::JavaExceptionKind::NullPointerException
        ));
    }
}
