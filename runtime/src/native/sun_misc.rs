use crate::interpreter::Interpreter;
use crate::keys::FieldKey;
use crate::native::{noop, NativeRegistry, NativeRet};
use crate::rt::class::ClassTypeKind;
use crate::thread::ThreadRecord;
use crate::value::Value;
use crate::vm::VirtualMachine;
use crate::{error::VmError, throw_exception};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Managed emulation behind `sun.misc.Unsafe`: raw memory is a table of
/// byte buffers keyed by base address, and field offsets are handles into a
/// field-key table. No host memory is exposed.
pub struct UnsafeState {
    memory: Mutex<HashMap<u64, Vec<u8>>>,
    next_address: AtomicU64,
    field_offsets: Mutex<HashMap<i64, FieldKey>>,
    next_offset: AtomicI64,
    cas_lock: Mutex<()>,
}

impl Default for UnsafeState {
    fn default() -> Self {
        Self {
            memory: Mutex::new(HashMap::new()),
            next_address: AtomicU64::new(0x1000),
            field_offsets: Mutex::new(HashMap::new()),
            next_offset: AtomicI64::new(1),
            cas_lock: Mutex::new(()),
        }
    }
}

impl UnsafeState {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&self, size: usize) -> u64 {
        let aligned = (size + 7) & !7;
        let base = self
            .next_address
            .fetch_add(aligned as u64 + 16, Ordering::Relaxed);
        self.memory.lock().unwrap().insert(base, vec![0u8; size]);
        base
    }

    fn free(&self, base: u64) {
        self.memory.lock().unwrap().remove(&base);
    }

    fn with_slot<R>(
        &self,
        address: u64,
        len: usize,
        op: impl FnOnce(&mut [u8]) -> R,
    ) -> Result<R, VmError> {
        let mut memory = self.memory.lock().unwrap();
        for (base, buffer) in memory.iter_mut() {
            let end = base + buffer.len() as u64;
            if address >= *base && address + len as u64 <= end {
                let start = (address - base) as usize;
                return Ok(op(&mut buffer[start..start + len]));
            }
        }
        Err(VmError::Internal(format!(
            "unsafe access outside any allocation: {address:#x}"
        )))
    }

    fn register_field(&self, key: FieldKey) -> i64 {
        let offset = self.next_offset.fetch_add(1, Ordering::Relaxed);
        self.field_offsets.lock().unwrap().insert(offset, key);
        offset
    }

    fn field_for(&self, offset: i64) -> Result<FieldKey, VmError> {
        self.field_offsets
            .lock()
            .unwrap()
            .get(&offset)
            .copied()
            .ok_or_else(|| VmError::Internal(format!("unknown field offset {offset}")))
    }

    pub fn reset(&self) {
        self.memory.lock().unwrap().clear();
        self.field_offsets.lock().unwrap().clear();
    }
}

pub(super) fn register(registry: &NativeRegistry) {
    registry.register_static_str("sun/misc/Unsafe", "registerNatives", "()V", noop);
    registry.register_instance_str(
        "sun/misc/Unsafe",
        "arrayBaseOffset",
        "(Ljava/lang/Class;)I",
        unsafe_array_base_offset,
    );
    registry.register_instance_str(
        "sun/misc/Unsafe",
        "arrayIndexScale",
        "(Ljava/lang/Class;)I",
        unsafe_array_index_scale,
    );
    registry.register_instance_str("sun/misc/Unsafe", "addressSize", "()I", unsafe_address_size);
    registry.register_instance_str("sun/misc/Unsafe", "pageSize", "()I", unsafe_page_size);
    registry.register_instance_str(
        "sun/misc/Unsafe",
        "allocateMemory",
        "(J)J",
        unsafe_allocate_memory,
    );
    registry.register_instance_str("sun/misc/Unsafe", "freeMemory", "(J)V", unsafe_free_memory);
    registry.register_instance_str("sun/misc/Unsafe", "putLong", "(JJ)V", unsafe_put_long);
    registry.register_instance_str("sun/misc/Unsafe", "getLong", "(J)J", unsafe_get_long);
    registry.register_instance_str("sun/misc/Unsafe", "putByte", "(JB)V", unsafe_put_byte);
    registry.register_instance_str("sun/misc/Unsafe", "getByte", "(J)B", unsafe_get_byte);
    registry.register_instance_str(
        "sun/misc/Unsafe",
        "objectFieldOffset",
        "(Ljava/lang/reflect/Field;)J",
        unsafe_object_field_offset,
    );
    registry.register_instance_str(
        "sun/misc/Unsafe",
        "compareAndSwapInt",
        "(Ljava/lang/Object;JII)Z",
        unsafe_compare_and_swap,
    );
    registry.register_instance_str(
        "sun/misc/Unsafe",
        "compareAndSwapLong",
        "(Ljava/lang/Object;JJJ)Z",
        unsafe_compare_and_swap,
    );
    registry.register_instance_str(
        "sun/misc/Unsafe",
        "compareAndSwapObject",
        "(Ljava/lang/Object;JLjava/lang/Object;Ljava/lang/Object;)Z",
        unsafe_compare_and_swap,
    );
    registry.register_instance_str(
        "sun/misc/Unsafe",
        "getIntVolatile",
        "(Ljava/lang/Object;J)I",
        unsafe_get_field,
    );
    registry.register_instance_str(
        "sun/misc/Unsafe",
        "getObjectVolatile",
        "(Ljava/lang/Object;J)Ljava/lang/Object;",
        unsafe_get_field,
    );
    registry.register_instance_str(
        "sun/misc/Unsafe",
        "putObjectVolatile",
        "(Ljava/lang/Object;JLjava/lang/Object;)V",
        unsafe_put_field,
    );
    registry.register_instance_str(
        "sun/misc/Unsafe",
        "putOrderedObject",
        "(Ljava/lang/Object;JLjava/lang/Object;)V",
        unsafe_put_field,
    );
    registry.register_instance_str(
        "sun/misc/Unsafe",
        "ensureClassInitialized",
        "(Ljava/lang/Class;)V",
        unsafe_ensure_class_initialized,
    );

    registry.register_static_str("sun/misc/VM", "initialize", "()V", noop);

    registry.register_static_str(
        "sun/misc/Signal",
        "findSignal",
        "(Ljava/lang/String;)I",
        signal_find_signal,
    );
    registry.register_static_str("sun/misc/Signal", "handle0", "(IJ)J", signal_handle0);

    registry.register_static_str(
        "java/util/concurrent/atomic/AtomicLong",
        "VMSupportsCS8",
        "()Z",
        atomic_long_vm_supports_cs8,
    );
}

fn unsafe_array_base_offset(
    _vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    _args: &[Value],
) -> NativeRet {
    Ok(Some(Value::Int(0)))
}

fn unsafe_array_index_scale(
    _vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    _args: &[Value],
) -> NativeRet {
    Ok(Some(Value::Int(1)))
}

fn unsafe_address_size(
    _vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    _args: &[Value],
) -> NativeRet {
    Ok(Some(Value::Int(8)))
}

fn unsafe_page_size(
    _vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    _args: &[Value],
) -> NativeRet {
    Ok(Some(Value::Int(4096)))
}

fn unsafe_allocate_memory(
    vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    args: &[Value],
) -> NativeRet {
    let size = args[1].as_long()?;
    if size < 0 {
        return throw_exception!(IllegalArgumentException, "negative size");
    }
    let base = vm.unsafe_state().allocate(size as usize);
    Ok(Some(Value::Long(base as i64)))
}

fn unsafe_free_memory(
    vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    args: &[Value],
) -> NativeRet {
    vm.unsafe_state().free(args[1].as_long()? as u64);
    Ok(None)
}

fn unsafe_put_long(vm: &VirtualMachine, _thread: &Arc<ThreadRecord>, args: &[Value]) -> NativeRet {
    let address = args[1].as_long()? as u64;
    let value = args[2].as_long()?;
    vm.unsafe_state()
        .with_slot(address, 8, |slot| slot.copy_from_slice(&value.to_ne_bytes()))?;
    Ok(None)
}

fn unsafe_get_long(vm: &VirtualMachine, _thread: &Arc<ThreadRecord>, args: &[Value]) -> NativeRet {
    let address = args[1].as_long()? as u64;
    let value = vm.unsafe_state().with_slot(address, 8, |slot| {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(slot);
        i64::from_ne_bytes(bytes)
    })?;
    Ok(Some(Value::Long(value)))
}

fn unsafe_put_byte(vm: &VirtualMachine, _thread: &Arc<ThreadRecord>, args: &[Value]) -> NativeRet {
    let address = args[1].as_long()? as u64;
    let value = args[2].as_int()? as u8;
    vm.unsafe_state()
        .with_slot(address, 1, |slot| slot[0] = value)?;
    Ok(None)
}

fn unsafe_get_byte(vm: &VirtualMachine, _thread: &Arc<ThreadRecord>, args: &[Value]) -> NativeRet {
    let address = args[1].as_long()? as u64;
    let value = vm
        .unsafe_state()
        .with_slot(address, 1, |slot| slot[0] as i8)?;
    Ok(Some(Value::Int(value as i32)))
}

/// The descriptor of the class a `Field.type` mirror stands for.
fn mirror_descriptor(vm: &VirtualMachine, mirror: &Value) -> Result<String, VmError> {
    let class = vm.class_of_mirror(mirror)?;
    let name = vm.interner().resolve(&class.name()).to_owned();
    Ok(match class.kind() {
        ClassTypeKind::Primitive(p) => p.descriptor_char().to_string(),
        ClassTypeKind::Void => "V".to_owned(),
        ClassTypeKind::Array { .. } => name,
        ClassTypeKind::Instance => format!("L{name};"),
    })
}

fn unsafe_object_field_offset(
    vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    args: &[Value],
) -> NativeRet {
    let field = args[1].as_instance()?;
    let interner = vm.interner();
    let name_fk = FieldKey {
        name: interner.get_or_intern("name"),
        desc: vm.symbols().string_desc,
    };
    let type_fk = FieldKey {
        name: interner.get_or_intern("type"),
        desc: interner.get_or_intern("Ljava/lang/Class;"),
    };
    let name_value = field
        .get_field(&name_fk)
        .ok_or_else(|| VmError::Internal("Field has no name".to_owned()))?;
    let type_value = field
        .get_field(&type_fk)
        .ok_or_else(|| VmError::Internal("Field has no type".to_owned()))?;

    let key = FieldKey {
        name: interner.get_or_intern(vm.read_string(&name_value)?),
        desc: interner.get_or_intern(mirror_descriptor(vm, &type_value)?),
    };
    let offset = vm.unsafe_state().register_field(key);
    Ok(Some(Value::Long(offset)))
}

/// CAS on an emulated field slot; one lock serializes all compare-and-swap
/// traffic, which is enough for the bootstrap atomics.
fn unsafe_compare_and_swap(
    vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    args: &[Value],
) -> NativeRet {
    let object = args[1].as_instance()?;
    let key = vm.unsafe_state().field_for(args[2].as_long()?)?;
    let expected = &args[3];
    let update = args[4].clone();

    let state = vm.unsafe_state();
    let _serialize = state.cas_lock.lock().unwrap();
    let current = object
        .get_field(&key)
        .ok_or_else(|| VmError::Internal("CAS on a missing field".to_owned()))?;
    let matches = match (&current, expected) {
        (a, b) if a.is_reference() && b.is_reference() => Value::same_ref(a, b),
        (a, b) => a == b,
    };
    if matches {
        object.set_field(&key, update);
    }
    Ok(Some(Value::Boolean(matches)))
}

fn unsafe_get_field(
    vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    args: &[Value],
) -> NativeRet {
    let object = args[1].as_instance()?;
    let key = vm.unsafe_state().field_for(args[2].as_long()?)?;
    let value = object
        .get_field(&key)
        .ok_or_else(|| VmError::Internal("unsafe read of a missing field".to_owned()))?;
    Ok(Some(value))
}

fn unsafe_put_field(
    vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    args: &[Value],
) -> NativeRet {
    let object = args[1].as_instance()?;
    let key = vm.unsafe_state().field_for(args[2].as_long()?)?;
    object.set_field(&key, args[3].clone());
    Ok(None)
}

fn unsafe_ensure_class_initialized(
    vm: &VirtualMachine,
    thread: &Arc<ThreadRecord>,
    args: &[Value],
) -> NativeRet {
    let class = vm.class_of_mirror(&args[1])?;
    Interpreter::ensure_initialized(vm, thread, &class)?;
    Ok(None)
}

fn signal_find_signal(
    vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    args: &[Value],
) -> NativeRet {
    let name = vm.read_string(&args[0])?;
    let number = match name.as_str() {
        "HUP" => 1,
        "INT" => 2,
        "TERM" => 15,
        _ => -1,
    };
    Ok(Some(Value::Int(number)))
}

fn signal_handle0(
    _vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    _args: &[Value],
) -> NativeRet {
    Ok(Some(Value::Long(2)))
}

fn atomic_long_vm_supports_cs8(
    _vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    _args: &[Value],
) -> NativeRet {
    Ok(Some(Value::Boolean(false)))
}
