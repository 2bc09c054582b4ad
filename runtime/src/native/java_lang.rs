use crate::error::VmError;
use crate::interpreter::Interpreter;
use crate::keys::{FieldKey, MethodKey};
use crate::native::{noop, NativeRegistry, NativeRet};
use crate::object::array::ArrayObject;
use crate::object::instance::ClassInstance;
use crate::rt::class::ClassType;
use crate::thread::ThreadRecord;
use crate::value::Value;
use crate::vm::VirtualMachine;
use crate::{debug_log, throw_exception};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub(super) fn register(registry: &NativeRegistry) {
    // java.lang.Object
    registry.register_static_str("java/lang/Object", "registerNatives", "()V", noop);
    registry.register_instance_str(
        "java/lang/Object",
        "getClass",
        "()Ljava/lang/Class;",
        object_get_class,
    );
    registry.register_instance_str("java/lang/Object", "hashCode", "()I", object_hash_code);
    registry.register_instance_str("java/lang/Object", "notify", "()V", object_notify);
    registry.register_instance_str("java/lang/Object", "notifyAll", "()V", object_notify_all);
    registry.register_instance_str("java/lang/Object", "wait", "(J)V", object_wait);
    registry.register_instance_str(
        "java/lang/Object",
        "clone",
        "()Ljava/lang/Object;",
        object_clone,
    );

    // java.lang.Class
    registry.register_static_str("java/lang/Class", "registerNatives", "()V", noop);
    registry.register_static_str(
        "java/lang/Class",
        "getPrimitiveClass",
        "(Ljava/lang/String;)Ljava/lang/Class;",
        class_get_primitive_class,
    );
    registry.register_static_str(
        "java/lang/Class",
        "desiredAssertionStatus0",
        "(Ljava/lang/Class;)Z",
        class_desired_assertion_status,
    );
    registry.register_static_str(
        "java/lang/Class",
        "forName0",
        "(Ljava/lang/String;ZLjava/lang/ClassLoader;Ljava/lang/Class;)Ljava/lang/Class;",
        class_for_name,
    );
    registry.register_static_str(
        "java/lang/Class",
        "forName0",
        "(Ljava/lang/String;ZLjava/lang/ClassLoader;)Ljava/lang/Class;",
        class_for_name,
    );
    registry.register_instance_str(
        "java/lang/Class",
        "getDeclaredFields0",
        "(Z)[Ljava/lang/reflect/Field;",
        class_get_declared_fields,
    );
    registry.register_instance_str("java/lang/Class", "isInterface", "()Z", class_is_interface);
    registry.register_instance_str("java/lang/Class", "isPrimitive", "()Z", class_is_primitive);
    registry.register_instance_str("java/lang/Class", "isArray", "()Z", class_is_array);
    registry.register_instance_str(
        "java/lang/Class",
        "isAssignableFrom",
        "(Ljava/lang/Class;)Z",
        class_is_assignable_from,
    );
    registry.register_instance_str("java/lang/Class", "getModifiers", "()I", class_get_modifiers);
    registry.register_instance_str(
        "java/lang/Class",
        "getName0",
        "()Ljava/lang/String;",
        class_get_name,
    );
    registry.register_instance_str(
        "java/lang/Class",
        "getSuperclass",
        "()Ljava/lang/Class;",
        class_get_superclass,
    );

    // java.lang.ClassLoader
    registry.register_static_str("java/lang/ClassLoader", "registerNatives", "()V", noop);

    // java.lang.System
    registry.register_static_str("java/lang/System", "registerNatives", "()V", noop);
    registry.register_static_str(
        "java/lang/System",
        "initProperties",
        "(Ljava/util/Properties;)Ljava/util/Properties;",
        system_init_properties,
    );
    registry.register_static_str(
        "java/lang/System",
        "arraycopy",
        "(Ljava/lang/Object;ILjava/lang/Object;II)V",
        system_arraycopy,
    );
    registry.register_static_str(
        "java/lang/System",
        "setIn0",
        "(Ljava/io/InputStream;)V",
        system_set_in,
    );
    registry.register_static_str(
        "java/lang/System",
        "setOut0",
        "(Ljava/io/PrintStream;)V",
        system_set_out,
    );
    registry.register_static_str(
        "java/lang/System",
        "setErr0",
        "(Ljava/io/PrintStream;)V",
        system_set_err,
    );
    registry.register_static_str(
        "java/lang/System",
        "mapLibraryName",
        "(Ljava/lang/String;)Ljava/lang/String;",
        system_map_library_name,
    );
    registry.register_static_str(
        "java/lang/System",
        "loadLibrary",
        "(Ljava/lang/String;)V",
        noop,
    );
    registry.register_static_str(
        "java/lang/System",
        "currentTimeMillis",
        "()J",
        system_current_time_millis,
    );
    registry.register_static_str("java/lang/System", "nanoTime", "()J", system_nano_time);
    registry.register_static_str(
        "java/lang/System",
        "identityHashCode",
        "(Ljava/lang/Object;)I",
        system_identity_hash_code,
    );

    // java.lang.Thread
    registry.register_static_str("java/lang/Thread", "registerNatives", "()V", noop);
    registry.register_static_str(
        "java/lang/Thread",
        "currentThread",
        "()Ljava/lang/Thread;",
        thread_current_thread,
    );
    registry.register_instance_str("java/lang/Thread", "setPriority0", "(I)V", noop_instance);
    registry.register_instance_str("java/lang/Thread", "isAlive", "()Z", thread_is_alive);
    registry.register_instance_str("java/lang/Thread", "start0", "()V", thread_start0);
    registry.register_static_str("java/lang/Thread", "sleep", "(J)V", thread_sleep);
    registry.register_static_str("java/lang/Thread", "yield", "()V", thread_yield);
    registry.register_instance_str("java/lang/Thread", "interrupt0", "()V", thread_interrupt0);
    registry.register_instance_str(
        "java/lang/Thread",
        "isInterrupted",
        "(Z)Z",
        thread_is_interrupted,
    );

    // java.lang.Throwable
    registry.register_instance_str(
        "java/lang/Throwable",
        "fillInStackTrace",
        "(I)Ljava/lang/Throwable;",
        throwable_fill_in_stack_trace,
    );
    registry.register_instance_str(
        "java/lang/Throwable",
        "fillInStackTrace",
        "()Ljava/lang/Throwable;",
        throwable_fill_in_stack_trace,
    );
    registry.register_instance_str(
        "java/lang/Throwable",
        "getStackTraceDepth",
        "()I",
        throwable_get_stack_trace_depth,
    );
    registry.register_instance_str(
        "java/lang/Throwable",
        "getStackTraceElement",
        "(I)Ljava/lang/StackTraceElement;",
        throwable_get_stack_trace_element,
    );

    // java.lang.String
    registry.register_instance_str(
        "java/lang/String",
        "intern",
        "()Ljava/lang/String;",
        string_intern,
    );

    // java.lang.Float / java.lang.Double raw bit conversions
    registry.register_static_str(
        "java/lang/Float",
        "floatToRawIntBits",
        "(F)I",
        float_to_raw_int_bits,
    );
    registry.register_static_str(
        "java/lang/Float",
        "floatToIntBits",
        "(F)I",
        float_to_int_bits,
    );
    registry.register_static_str(
        "java/lang/Float",
        "intBitsToFloat",
        "(I)F",
        int_bits_to_float,
    );
    registry.register_static_str(
        "java/lang/Double",
        "doubleToRawLongBits",
        "(D)J",
        double_to_raw_long_bits,
    );
    registry.register_static_str(
        "java/lang/Double",
        "doubleToLongBits",
        "(D)J",
        double_to_long_bits,
    );
    registry.register_static_str(
        "java/lang/Double",
        "longBitsToDouble",
        "(J)D",
        long_bits_to_double,
    );

    // java.lang.Runtime
    registry.register_instance_str(
        "java/lang/Runtime",
        "availableProcessors",
        "()I",
        runtime_available_processors,
    );
    registry.register_instance_str("java/lang/Runtime", "maxMemory", "()J", runtime_memory);
    registry.register_instance_str("java/lang/Runtime", "freeMemory", "()J", runtime_memory);
    registry.register_instance_str("java/lang/Runtime", "totalMemory", "()J", runtime_memory);
    registry.register_instance_str("java/lang/Runtime", "gc", "()V", noop_instance);
}

fn noop_instance(_vm: &VirtualMachine, _thread: &Arc<ThreadRecord>, _args: &[Value]) -> NativeRet {
    Ok(None)
}

// --- java.lang.Object ---

fn receiver_class(vm: &VirtualMachine, value: &Value) -> Result<Arc<ClassType>, VmError> {
    match value {
        Value::Instance(instance) => match instance.class_type() {
            Some(class) => Ok(class),
            None => vm.resolve_class_sym(instance.class_name()),
        },
        Value::Array(array) => vm.resolve_class_sym(array.class_name()),
        Value::Null => throw_exception!(NullPointerException),
        _ => Err(VmError::Internal("receiver is not a reference".to_owned())),
    }
}

fn object_get_class(vm: &VirtualMachine, _thread: &Arc<ThreadRecord>, args: &[Value]) -> NativeRet {
    let class = receiver_class(vm, &args[0])?;
    Ok(Some(vm.class_mirror(&class)?))
}

fn object_hash_code(
    _vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    args: &[Value],
) -> NativeRet {
    let hash = match &args[0] {
        Value::Instance(instance) => instance.identity_hash(),
        Value::Array(array) => array.identity_hash(),
        _ => 0,
    };
    Ok(Some(Value::Int(hash)))
}

fn receiver_monitor(args: &[Value]) -> Result<&crate::object::monitor::Monitor, VmError> {
    match &args[0] {
        Value::Instance(instance) => Ok(instance.monitor()),
        Value::Array(array) => Ok(array.monitor()),
        Value::Null => throw_exception!(NullPointerException),
        _ => Err(VmError::Internal("receiver is not a reference".to_owned())),
    }
}

fn object_notify(_vm: &VirtualMachine, _thread: &Arc<ThreadRecord>, args: &[Value]) -> NativeRet {
    receiver_monitor(args)?.notify()?;
    Ok(None)
}

fn object_notify_all(
    _vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    args: &[Value],
) -> NativeRet {
    receiver_monitor(args)?.notify_all()?;
    Ok(None)
}

fn object_wait(_vm: &VirtualMachine, thread: &Arc<ThreadRecord>, args: &[Value]) -> NativeRet {
    let monitor = receiver_monitor(args)?;
    let millis = args[1].as_long()?;
    if millis < 0 {
        return throw_exception!(IllegalArgumentException, "timeout value is negative");
    }
    if thread.take_interrupted() {
        return throw_exception!(InterruptedException);
    }
    if millis == 0 {
        monitor.wait()?;
    } else {
        monitor.wait_for(millis as u64)?;
    }
    Ok(None)
}

fn object_clone(vm: &VirtualMachine, _thread: &Arc<ThreadRecord>, args: &[Value]) -> NativeRet {
    match &args[0] {
        Value::Array(array) => {
            let array_name = vm.interner().resolve(&array.class_name()).to_owned();
            let copy = vm.new_array(&array_name, array.len())?;
            for (i, value) in array.data_snapshot().into_iter().enumerate() {
                copy.set(i as i32, value)?;
            }
            Ok(Some(Value::Array(copy)))
        }
        Value::Instance(instance) => {
            let class = receiver_class(vm, &args[0])?;
            let cloneable = vm.interner().get_or_intern("java/lang/Cloneable");
            if !class.can_cast_to(vm, cloneable)? {
                return throw_exception!(
                    CloneNotSupportedException,
                    "{}",
                    vm.interner().resolve(&class.name()).replace('/', ".")
                );
            }
            let copy = Arc::new(ClassInstance::new(&class, instance.field_snapshot()));
            Ok(Some(Value::Instance(copy)))
        }
        Value::Null => throw_exception!(NullPointerException),
        _ => Err(VmError::Internal("clone receiver is not a reference".to_owned())),
    }
}

// --- java.lang.Class ---

fn class_get_primitive_class(
    vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    args: &[Value],
) -> NativeRet {
    let name = vm.read_string(&args[0])?;
    let class = vm.resolve_class(&name)?;
    Ok(Some(vm.class_mirror(&class)?))
}

fn class_desired_assertion_status(
    _vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    _args: &[Value],
) -> NativeRet {
    Ok(Some(Value::Boolean(false)))
}

fn class_for_name(vm: &VirtualMachine, thread: &Arc<ThreadRecord>, args: &[Value]) -> NativeRet {
    let dotted = vm.read_string(&args[0])?;
    let initialize = args
        .get(1)
        .map(|v| v.as_int())
        .transpose()?
        .unwrap_or(1)
        != 0;
    let class = match vm.resolve_class(&dotted) {
        Ok(class) => class,
        Err(VmError::ClassNotFound(name)) => {
            return throw_exception!(ClassNotFoundException, "{}", name)
        }
        Err(e) => return Err(e),
    };
    if initialize {
        Interpreter::ensure_initialized(vm, thread, &class)?;
    }
    Ok(Some(vm.class_mirror(&class)?))
}

fn class_get_declared_fields(
    vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    args: &[Value],
) -> NativeRet {
    let class = vm.class_of_mirror(&args[0])?;
    let public_only = args[1].as_int()? != 0;

    let field_class = vm.resolve_class("java/lang/reflect/Field")?;
    let interner = vm.interner();
    let clazz_fk = FieldKey {
        name: interner.get_or_intern("clazz"),
        desc: interner.get_or_intern("Ljava/lang/Class;"),
    };
    let slot_fk = FieldKey {
        name: interner.get_or_intern("slot"),
        desc: vm.symbols().int_desc,
    };
    let name_fk = FieldKey {
        name: interner.get_or_intern("name"),
        desc: vm.symbols().string_desc,
    };
    let type_fk = FieldKey {
        name: interner.get_or_intern("type"),
        desc: interner.get_or_intern("Ljava/lang/Class;"),
    };
    let modifiers_fk = FieldKey {
        name: interner.get_or_intern("modifiers"),
        desc: vm.symbols().int_desc,
    };

    let mut fields = Vec::new();
    for (slot, field) in class.fields().iter().enumerate() {
        const ACC_PUBLIC: i32 = 0x0001;
        let modifiers = field.flags.get_raw_i32();
        if public_only && modifiers & ACC_PUBLIC == 0 {
            continue;
        }
        let reflected = vm.new_instance(&field_class)?;
        reflected.set_field(&clazz_fk, vm.class_mirror(&class)?);
        reflected.set_field(&slot_fk, Value::Int(slot as i32));
        reflected.set_field(
            &name_fk,
            vm.intern_string(interner.resolve(&field.name))?,
        );
        let type_class = vm.resolve_class(&field.ty.class_name())?;
        reflected.set_field(&type_fk, vm.class_mirror(&type_class)?);
        reflected.set_field(&modifiers_fk, Value::Int(modifiers));
        fields.push(Value::Instance(reflected));
    }

    let array = vm.new_array("[Ljava/lang/reflect/Field;", fields.len() as i32)?;
    for (i, field) in fields.into_iter().enumerate() {
        array.set(i as i32, field)?;
    }
    Ok(Some(Value::Array(array)))
}

fn class_is_interface(
    vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    args: &[Value],
) -> NativeRet {
    let class = vm.class_of_mirror(&args[0])?;
    Ok(Some(Value::Boolean(class.is_interface())))
}

fn class_is_primitive(
    vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    args: &[Value],
) -> NativeRet {
    let class = vm.class_of_mirror(&args[0])?;
    Ok(Some(Value::Boolean(class.is_primitive())))
}

fn class_is_array(vm: &VirtualMachine, _thread: &Arc<ThreadRecord>, args: &[Value]) -> NativeRet {
    let class = vm.class_of_mirror(&args[0])?;
    Ok(Some(Value::Boolean(class.is_array())))
}

fn class_is_assignable_from(
    vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    args: &[Value],
) -> NativeRet {
    let this = vm.class_of_mirror(&args[0])?;
    if args[1].is_null() {
        return throw_exception!(NullPointerException);
    }
    let other = vm.class_of_mirror(&args[1])?;
    Ok(Some(Value::Boolean(other.can_cast_to(vm, this.name())?)))
}

fn class_get_modifiers(
    vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    args: &[Value],
) -> NativeRet {
    let class = vm.class_of_mirror(&args[0])?;
    Ok(Some(Value::Int(class.flags().get_raw_i32())))
}

fn class_get_name(vm: &VirtualMachine, _thread: &Arc<ThreadRecord>, args: &[Value]) -> NativeRet {
    let class = vm.class_of_mirror(&args[0])?;
    let dotted = vm.interner().resolve(&class.name()).replace('/', ".");
    Ok(Some(vm.intern_string(&dotted)?))
}

fn class_get_superclass(
    vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    args: &[Value],
) -> NativeRet {
    let class = vm.class_of_mirror(&args[0])?;
    match class.super_name() {
        Some(super_name) => {
            let super_class = vm.resolve_class_sym(super_name)?;
            Ok(Some(vm.class_mirror(&super_class)?))
        }
        None => Ok(Some(Value::Null)),
    }
}

// --- java.lang.System ---

fn system_init_properties(
    vm: &VirtualMachine,
    thread: &Arc<ThreadRecord>,
    args: &[Value],
) -> NativeRet {
    let properties = args[0].clone();
    let receiver_type = receiver_class(vm, &properties)?;
    let set_property_mk = MethodKey {
        name: vm.interner().get_or_intern("setProperty"),
        desc: vm
            .interner()
            .get_or_intern("(Ljava/lang/String;Ljava/lang/String;)Ljava/lang/Object;"),
    };
    let (declaring, method) = receiver_type
        .find_method(vm, &set_property_mk)?
        .ok_or_else(|| VmError::Internal("Properties.setProperty missing".to_owned()))?;
    for (key, value) in vm.properties_snapshot() {
        Interpreter::invoke(
            vm,
            thread,
            &declaring,
            &method,
            vec![
                properties.clone(),
                vm.alloc_string(&key)?,
                vm.alloc_string(&value)?,
            ],
        )?;
    }
    Ok(Some(properties))
}

fn system_arraycopy(
    _vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    args: &[Value],
) -> NativeRet {
    let src = args[0].as_array()?;
    let src_pos = args[1].as_int()?;
    let dest = args[2].as_array()?;
    let dest_pos = args[3].as_int()?;
    let length = args[4].as_int()?;
    if src.element().kind != dest.element().kind {
        return throw_exception!(ArrayStoreException, "incompatible array element kinds");
    }
    ArrayObject::copy_range(src, src_pos, dest, dest_pos, length)?;
    Ok(None)
}

fn set_system_stream(vm: &VirtualMachine, field: &str, desc: &str, value: Value) -> NativeRet {
    let system_class = vm.resolve_class_sym(vm.symbols().java_lang_system_sym)?;
    let key = FieldKey {
        name: vm.interner().get_or_intern(field),
        desc: vm.interner().get_or_intern(desc),
    };
    // Final fields; written through the raw slot like the JDK's natives do.
    system_class.put_static_slot(key, value);
    Ok(None)
}

fn system_set_in(vm: &VirtualMachine, _thread: &Arc<ThreadRecord>, args: &[Value]) -> NativeRet {
    set_system_stream(vm, "in", "Ljava/io/InputStream;", args[0].clone())
}

fn system_set_out(vm: &VirtualMachine, _thread: &Arc<ThreadRecord>, args: &[Value]) -> NativeRet {
    set_system_stream(vm, "out", "Ljava/io/PrintStream;", args[0].clone())
}

fn system_set_err(vm: &VirtualMachine, _thread: &Arc<ThreadRecord>, args: &[Value]) -> NativeRet {
    set_system_stream(vm, "err", "Ljava/io/PrintStream;", args[0].clone())
}

fn system_map_library_name(
    vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    args: &[Value],
) -> NativeRet {
    let name = vm.read_string(&args[0])?;
    Ok(Some(vm.alloc_string(&format!("lib{name}.so"))?))
}

fn system_current_time_millis(
    _vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    _args: &[Value],
) -> NativeRet {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);
    Ok(Some(Value::Long(millis)))
}

fn system_nano_time(
    _vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    _args: &[Value],
) -> NativeRet {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0);
    Ok(Some(Value::Long(nanos)))
}

fn system_identity_hash_code(
    _vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    args: &[Value],
) -> NativeRet {
    let hash = match &args[0] {
        Value::Instance(instance) => instance.identity_hash(),
        Value::Array(array) => array.identity_hash(),
        Value::Null => 0,
        _ => 0,
    };
    Ok(Some(Value::Int(hash)))
}

// --- java.lang.Thread ---

fn thread_current_thread(
    _vm: &VirtualMachine,
    thread: &Arc<ThreadRecord>,
    _args: &[Value],
) -> NativeRet {
    Ok(Some(thread.java_thread()))
}

fn thread_record_of(
    vm: &VirtualMachine,
    receiver: &Value,
) -> Result<Option<Arc<ThreadRecord>>, VmError> {
    let instance = receiver.as_instance()?;
    let eetop = instance
        .get_field(&vm.symbols().thread_eetop_fk)
        .map(|v| v.as_long())
        .transpose()?
        .unwrap_or(0);
    if eetop == 0 {
        return Ok(None);
    }
    Ok(vm.threads().by_eetop(eetop as u64))
}

fn thread_is_alive(vm: &VirtualMachine, _thread: &Arc<ThreadRecord>, args: &[Value]) -> NativeRet {
    let alive = thread_record_of(vm, &args[0])?
        .map(|record| record.is_alive())
        .unwrap_or(false);
    Ok(Some(Value::Boolean(alive)))
}

fn java_thread_name(vm: &VirtualMachine, instance: &Arc<ClassInstance>) -> String {
    let name_fk = FieldKey {
        name: vm.interner().get_or_intern("name"),
        desc: vm.symbols().char_array_desc,
    };
    let chars = instance.get_field(&name_fk);
    if let Some(Value::Array(array)) = chars {
        let units: Vec<u16> = array
            .data_snapshot()
            .iter()
            .filter_map(|v| v.as_int().ok().map(|c| c as u16))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    format!("Thread-{}", instance.identity_hash())
}

/// `Thread.start`: allocates a host thread, registers the record, stores the
/// handle into `eetop`, and dispatches to the Java-side `run()`.
fn thread_start0(vm: &VirtualMachine, _thread: &Arc<ThreadRecord>, args: &[Value]) -> NativeRet {
    let instance = args[0].as_instance()?;
    let name = java_thread_name(vm, instance);
    let record = vm.threads().new_record(name.clone());
    record.set_java_thread(args[0].clone());
    instance.set_field(
        &vm.symbols().thread_eetop_fk,
        Value::Long(record.eetop() as i64),
    );

    let vm_arc = vm.arc()?;
    let thread_value = args[0].clone();
    std::thread::Builder::new()
        .name(name)
        .spawn(move || {
            vm_arc.threads().attach_current(&record);
            let outcome = run_java_thread(&vm_arc, &record, thread_value);
            if let Err(e) = outcome {
                report_uncaught(&vm_arc, &record, e);
            }
            record.mark_finished();
        })
        .map_err(VmError::Io)?;
    Ok(None)
}

fn run_java_thread(
    vm: &VirtualMachine,
    record: &Arc<ThreadRecord>,
    thread_value: Value,
) -> Result<(), VmError> {
    let class = receiver_class(vm, &thread_value)?;
    let (declaring, method) = class
        .find_method(vm, &vm.symbols().run_mk)?
        .ok_or_else(|| VmError::Internal("thread has no run()".to_owned()))?;
    Interpreter::invoke(vm, record, &declaring, &method, vec![thread_value]).map(|_| ())
}

fn report_uncaught(vm: &VirtualMachine, record: &Arc<ThreadRecord>, err: VmError) {
    match vm.error_to_thrown(record, err) {
        Ok((value, _)) => {
            let thread_value = record.java_thread();
            let dispatched = dispatch_uncaught(vm, record, &thread_value, &value).is_ok();
            if !dispatched {
                eprintln!(
                    "Exception in thread \"{}\" {}",
                    record.name(),
                    vm.render_throwable(&value)
                );
            }
        }
        Err(e) => debug_log!("thread terminated with host error: {}", e),
    }
}

fn dispatch_uncaught(
    vm: &VirtualMachine,
    record: &Arc<ThreadRecord>,
    thread_value: &Value,
    throwable: &Value,
) -> Result<(), VmError> {
    let class = receiver_class(vm, thread_value)?;
    let dispatch_mk = MethodKey {
        name: vm.interner().get_or_intern("dispatchUncaughtException"),
        desc: vm.interner().get_or_intern("(Ljava/lang/Throwable;)V"),
    };
    let (declaring, method) = class
        .find_method(vm, &dispatch_mk)?
        .ok_or_else(|| VmError::Internal("no dispatchUncaughtException".to_owned()))?;
    Interpreter::invoke(
        vm,
        record,
        &declaring,
        &method,
        vec![thread_value.clone(), throwable.clone()],
    )
    .map(|_| ())
}

fn thread_sleep(_vm: &VirtualMachine, thread: &Arc<ThreadRecord>, args: &[Value]) -> NativeRet {
    let millis = args[0].as_long()?;
    if millis < 0 {
        return throw_exception!(IllegalArgumentException, "timeout value is negative");
    }
    if thread.take_interrupted() {
        return throw_exception!(InterruptedException, "sleep interrupted");
    }
    std::thread::sleep(std::time::Duration::from_millis(millis as u64));
    if thread.take_interrupted() {
        return throw_exception!(InterruptedException, "sleep interrupted");
    }
    Ok(None)
}

fn thread_yield(_vm: &VirtualMachine, _thread: &Arc<ThreadRecord>, _args: &[Value]) -> NativeRet {
    std::thread::yield_now();
    Ok(None)
}

fn thread_interrupt0(
    vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    args: &[Value],
) -> NativeRet {
    if let Some(record) = thread_record_of(vm, &args[0])? {
        record.interrupt();
    }
    Ok(None)
}

fn thread_is_interrupted(
    vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    args: &[Value],
) -> NativeRet {
    let clear = args[1].as_int()? != 0;
    let interrupted = match thread_record_of(vm, &args[0])? {
        Some(record) => {
            if clear {
                record.take_interrupted()
            } else {
                record.is_interrupted()
            }
        }
        None => false,
    };
    Ok(Some(Value::Boolean(interrupted)))
}

// --- java.lang.Throwable ---

fn throwable_fill_in_stack_trace(
    vm: &VirtualMachine,
    thread: &Arc<ThreadRecord>,
    args: &[Value],
) -> NativeRet {
    vm.fill_in_stack_trace(thread, &args[0])?;
    Ok(Some(args[0].clone()))
}

fn throwable_backtrace(vm: &VirtualMachine, throwable: &Value) -> Result<Option<Value>, VmError> {
    let instance = throwable.as_instance()?;
    Ok(instance.get_field(&vm.symbols().throwable_backtrace_fk))
}

fn throwable_get_stack_trace_depth(
    vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    args: &[Value],
) -> NativeRet {
    let depth = match throwable_backtrace(vm, &args[0])? {
        Some(Value::Array(array)) => array.len(),
        _ => 0,
    };
    Ok(Some(Value::Int(depth)))
}

fn throwable_get_stack_trace_element(
    vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    args: &[Value],
) -> NativeRet {
    let index = args[1].as_int()?;
    match throwable_backtrace(vm, &args[0])? {
        Some(Value::Array(array)) => Ok(Some(array.get(index)?)),
        _ => throw_exception!(ArrayIndexOutOfBoundsException, "{}", index),
    }
}

// --- java.lang.String ---

fn string_intern(vm: &VirtualMachine, _thread: &Arc<ThreadRecord>, args: &[Value]) -> NativeRet {
    Ok(Some(vm.intern_existing(&args[0])?))
}

// --- raw bit conversions ---

fn float_to_raw_int_bits(
    _vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    args: &[Value],
) -> NativeRet {
    Ok(Some(Value::Int(args[0].as_float()?.to_bits() as i32)))
}

fn float_to_int_bits(
    _vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    args: &[Value],
) -> NativeRet {
    let value = args[0].as_float()?;
    let bits = if value.is_nan() {
        0x7fc0_0000u32
    } else {
        value.to_bits()
    };
    Ok(Some(Value::Int(bits as i32)))
}

fn int_bits_to_float(
    _vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    args: &[Value],
) -> NativeRet {
    Ok(Some(Value::Float(f32::from_bits(args[0].as_int()? as u32))))
}

fn double_to_raw_long_bits(
    _vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    args: &[Value],
) -> NativeRet {
    Ok(Some(Value::Long(args[0].as_double()?.to_bits() as i64)))
}

fn double_to_long_bits(
    _vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    args: &[Value],
) -> NativeRet {
    let value = args[0].as_double()?;
    let bits = if value.is_nan() {
        0x7ff8_0000_0000_0000u64
    } else {
        value.to_bits()
    };
    Ok(Some(Value::Long(bits as i64)))
}

fn long_bits_to_double(
    _vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    args: &[Value],
) -> NativeRet {
    Ok(Some(Value::Double(f64::from_bits(
        args[0].as_long()? as u64
    ))))
}

// --- java.lang.Runtime ---

fn runtime_available_processors(
    _vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    _args: &[Value],
) -> NativeRet {
    let count = std::thread::available_parallelism()
        .map(|n| n.get() as i32)
        .unwrap_or(1);
    Ok(Some(Value::Int(count)))
}

fn runtime_memory(
    _vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    _args: &[Value],
) -> NativeRet {
    const MEMORY: i64 = 256 * 1024 * 1024;
    Ok(Some(Value::Long(MEMORY)))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::VmConfig;

    fn harness() -> (Arc<VirtualMachine>, Arc<ThreadRecord>) {
        let vm = VirtualMachine::new(VmConfig::default()).unwrap();
        let record = vm.threads().new_record("test".to_owned());
        (vm, record)
    }

    #[test]
    fn double_raw_bits_round_trip() {
        let (vm, thread) = harness();
        for bits in [0i64, 1, -1, i64::MIN, i64::MAX, 0x7ff8_dead_beef_0000] {
            let as_double = long_bits_to_double(&vm, &thread, &[Value::Long(bits)])
                .unwrap()
                .unwrap();
            let back = double_to_raw_long_bits(&vm, &thread, &[as_double])
                .unwrap()
                .unwrap();
            assert_eq!(back, Value::Long(bits));
        }
    }

    #[test]
    fn float_raw_bits_round_trip() {
        let (vm, thread) = harness();
        for bits in [0i32, 1, -1, i32::MIN, i32::MAX, 0x7fc0_dead_u32 as i32] {
            let as_float = int_bits_to_float(&vm, &thread, &[Value::Int(bits)])
                .unwrap()
                .unwrap();
            let back = float_to_raw_int_bits(&vm, &thread, &[as_float])
                .unwrap()
                .unwrap();
            assert_eq!(back, Value::Int(bits));
        }
    }

    #[test]
    fn non_raw_bits_collapse_nan() {
        let (vm, thread) = harness();
        let bits = float_to_int_bits(&vm, &thread, &[Value::Float(f32::NAN)])
            .unwrap()
            .unwrap();
        assert_eq!(bits, Value::Int(0x7fc0_0000u32 as i32));
        let bits = double_to_long_bits(&vm, &thread, &[Value::Double(f64::NAN)])
            .unwrap()
            .unwrap();
        assert_eq!(bits, Value::Long(0x7ff8_0000_0000_0000u64 as i64));
    }
}
