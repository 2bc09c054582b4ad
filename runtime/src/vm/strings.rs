use crate::error::VmError;
use crate::keys::Symbol;
use crate::object::array::{ArrayElement, ArrayObject};
use crate::value::{Value, ValueKind};
use crate::vm::VirtualMachine;
use std::collections::HashMap;
use std::sync::Mutex;

/// Canonicalized `java/lang/String` instances, keyed by their UTF-16 unit
/// sequence. `intern(a)` and `intern(b)` return the identical instance iff
/// the sequences are equal.
#[derive(Default)]
pub struct InternTable {
    entries: Mutex<HashMap<Vec<u16>, Value>>,
}

impl InternTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, units: &[u16]) -> Option<Value> {
        self.entries.lock().unwrap().get(units).cloned()
    }

    /// Returns the canonical instance for `units`, inserting `candidate`
    /// when the value is new.
    pub fn intern(&self, units: Vec<u16>, candidate: Value) -> Value {
        self.entries
            .lock()
            .unwrap()
            .entry(units)
            .or_insert(candidate)
            .clone()
    }

    pub fn reset(&self) {
        self.entries.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}

impl VirtualMachine {
    /// Builds a fresh (non-interned) `java/lang/String` over a new `[C`.
    pub fn alloc_string(&self, s: &str) -> Result<Value, VmError> {
        let units: Vec<u16> = s.encode_utf16().collect();
        self.alloc_string_from_units(&units)
    }

    pub fn alloc_string_from_units(&self, units: &[u16]) -> Result<Value, VmError> {
        let symbols = self.symbols();
        let chars = ArrayObject::new(
            self.interner().get_or_intern("[C"),
            ArrayElement::primitive(ValueKind::Char),
            1,
            units.len() as i32,
        );
        for (i, unit) in units.iter().enumerate() {
            chars.set(i as i32, Value::Char(*unit))?;
        }

        let string_class = self.resolve_class_sym(symbols.java_lang_string_sym)?;
        let instance = self.new_instance(&string_class)?;
        if !instance.set_field(&symbols.string_value_fk, Value::Array(chars.into())) {
            return Err(VmError::Internal(
                "java/lang/String has no char[] value field".to_owned(),
            ));
        }
        Ok(Value::Instance(instance))
    }

    /// The UTF-16 content of a `java/lang/String` instance.
    pub fn string_units(&self, string: &Value) -> Result<Vec<u16>, VmError> {
        let instance = string.as_instance()?;
        let value = instance
            .get_field(&self.symbols().string_value_fk)
            .ok_or_else(|| {
                VmError::Internal("java/lang/String has no char[] value field".to_owned())
            })?;
        let chars = value.as_array()?;
        let mut units = Vec::with_capacity(chars.len() as usize);
        for i in 0..chars.len() {
            units.push(chars.get(i)?.as_int()? as u16);
        }
        Ok(units)
    }

    pub fn read_string(&self, string: &Value) -> Result<String, VmError> {
        Ok(String::from_utf16_lossy(&self.string_units(string)?))
    }

    /// Canonical instance for a Rust string.
    pub fn intern_string(&self, s: &str) -> Result<Value, VmError> {
        let units: Vec<u16> = s.encode_utf16().collect();
        if let Some(existing) = self.intern_table().lookup(&units) {
            return Ok(existing);
        }
        let candidate = self.alloc_string_from_units(&units)?;
        Ok(self.intern_table().intern(units, candidate))
    }

    pub fn intern_string_sym(&self, sym: Symbol) -> Result<Value, VmError> {
        let s = self.interner().resolve(&sym).to_owned();
        self.intern_string(&s)
    }

    /// `String.intern` on an existing instance.
    pub fn intern_existing(&self, string: &Value) -> Result<Value, VmError> {
        let units = self.string_units(string)?;
        if let Some(existing) = self.intern_table().lookup(&units) {
            return Ok(existing);
        }
        Ok(self.intern_table().intern(units, string.clone()))
    }
}
