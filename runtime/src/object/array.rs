use crate::error::VmError;
use crate::keys::Symbol;
use crate::object::monitor::Monitor;
use crate::object::next_identity;
use crate::throw_exception;
use crate::value::{Value, ValueKind};
use std::sync::RwLock;

/// Element variant of an array: a primitive kind, or a reference kind with
/// the element class name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayElement {
    pub kind: ValueKind,
    pub class_name: Option<Symbol>,
}

impl ArrayElement {
    pub fn primitive(kind: ValueKind) -> Self {
        Self {
            kind,
            class_name: None,
        }
    }

    pub fn reference(class_name: Symbol) -> Self {
        Self {
            kind: ValueKind::Reference,
            class_name: Some(class_name),
        }
    }
}

/// A Java array. The marker object the monitor conceptually lives on is
/// collapsed into the array itself: monitor and identity are hosted here,
/// and `Object`-polymorphic calls on arrays resolve against
/// `java/lang/Object` in the interpreter.
pub struct ArrayObject {
    /// Registry-style array class name, e.g. `[I` or `[Ljava/lang/String;`.
    name: Symbol,
    element: ArrayElement,
    dims: u8,
    data: RwLock<Vec<Value>>,
    monitor: Monitor,
    identity: u64,
}

impl std::fmt::Debug for ArrayObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArrayObject")
            .field("identity", &self.identity)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl ArrayObject {
    pub fn new(name: Symbol, element: ArrayElement, dims: u8, length: i32) -> Self {
        let default = Value::default_for(element.kind);
        Self {
            name,
            element,
            dims,
            data: RwLock::new(vec![default; length as usize]),
            monitor: Monitor::new(),
            identity: next_identity(),
        }
    }

    pub fn class_name(&self) -> Symbol {
        self.name
    }

    pub fn element(&self) -> ArrayElement {
        self.element
    }

    pub fn dims(&self) -> u8 {
        self.dims
    }

    pub fn len(&self) -> i32 {
        self.data.read().unwrap().len() as i32
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: i32) -> Result<Value, VmError> {
        let data = self.data.read().unwrap();
        if index < 0 || index as usize >= data.len() {
            return throw_exception!(
                ArrayIndexOutOfBoundsException,
                "Index {} out of bounds for length {}",
                index,
                data.len()
            );
        }
        Ok(data[index as usize].clone())
    }

    pub fn set(&self, index: i32, value: Value) -> Result<(), VmError> {
        let narrowed = value.coerce_to(self.element.kind)?;
        let mut data = self.data.write().unwrap();
        if index < 0 || index as usize >= data.len() {
            return throw_exception!(
                ArrayIndexOutOfBoundsException,
                "Index {} out of bounds for length {}",
                index,
                data.len()
            );
        }
        data[index as usize] = narrowed;
        Ok(())
    }

    /// `System.arraycopy` body: bounds-checked, overlap-safe (memmove).
    pub fn copy_range(
        src: &ArrayObject,
        src_pos: i32,
        dest: &ArrayObject,
        dest_pos: i32,
        length: i32,
    ) -> Result<(), VmError> {
        let src_len = src.len();
        let dest_len = dest.len();
        if src_pos < 0
            || dest_pos < 0
            || length < 0
            || src_pos.checked_add(length).map_or(true, |end| end > src_len)
            || dest_pos
                .checked_add(length)
                .map_or(true, |end| end > dest_len)
        {
            return throw_exception!(
                ArrayIndexOutOfBoundsException,
                "arraycopy: last source index {} out of bounds for length {}",
                src_pos.saturating_add(length),
                src_len
            );
        }

        if std::ptr::eq(src, dest) {
            let mut data = dest.data.write().unwrap();
            let tmp: Vec<Value> = data[src_pos as usize..(src_pos + length) as usize].to_vec();
            data[dest_pos as usize..(dest_pos + length) as usize].clone_from_slice(&tmp);
        } else {
            let src_data = src.data.read().unwrap();
            let mut dest_data = dest.data.write().unwrap();
            let src_slice = &src_data[src_pos as usize..(src_pos + length) as usize];
            dest_data[dest_pos as usize..(dest_pos + length) as usize]
                .clone_from_slice(src_slice);
        }
        Ok(())
    }

    /// Snapshot of the backing sequence, used by `Object.clone`.
    pub fn data_snapshot(&self) -> Vec<Value> {
        self.data.read().unwrap().clone()
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    pub fn identity_hash(&self) -> i32 {
        self.identity as i32
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use lasso::ThreadedRodeo;

    fn int_array(len: i32) -> ArrayObject {
        let interner = ThreadedRodeo::new();
        ArrayObject::new(
            interner.get_or_intern("[I"),
            ArrayElement::primitive(ValueKind::Int),
            1,
            len,
        )
    }

    #[test]
    fn slots_default_to_zero() {
        let array = int_array(3);
        assert_eq!(array.get(0).unwrap(), Value::Int(0));
        assert_eq!(array.get(2).unwrap(), Value::Int(0));
    }

    #[test]
    fn out_of_range_access_throws() {
        let array = int_array(0);
        for index in [-1, 0, 1] {
            assert!(array.get(index).is_err());
        }
        let array = int_array(2);
        assert!(array.get(2).is_err());
        assert!(array.set(-1, Value::Int(1)).is_err());
    }

    #[test]
    fn stores_narrow_to_element_kind() {
        let interner = ThreadedRodeo::new();
        let array = ArrayObject::new(
            interner.get_or_intern("[B"),
            ArrayElement::primitive(ValueKind::Byte),
            1,
            1,
        );
        array.set(0, Value::Int(0x1FF)).unwrap();
        assert_eq!(array.get(0).unwrap(), Value::Byte(-1));
    }

    #[test]
    fn overlapping_copy_has_memmove_semantics() {
        let array = int_array(5);
        for i in 0..5 {
            array.set(i, Value::Int(i)).unwrap();
        }
        // [0,1,2,3,4] shifted right by one: [0,0,1,2,3]
        ArrayObject::copy_range(&array, 0, &array, 1, 4).unwrap();
        let snapshot: Vec<i32> = array
            .data_snapshot()
            .iter()
            .map(|v| v.as_int().unwrap())
            .collect();
        assert_eq!(snapshot, vec![0, 0, 1, 2, 3]);
    }

    #[test]
    fn copy_bounds_are_checked() {
        let a = int_array(3);
        let b = int_array(3);
        assert!(ArrayObject::copy_range(&a, 1, &b, 0, 3).is_err());
        assert!(ArrayObject::copy_range(&a, 0, &b, 0, -1).is_err());
    }
}
