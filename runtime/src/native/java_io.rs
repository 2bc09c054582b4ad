use crate::keys::FieldKey;
use crate::native::{noop, NativeRegistry, NativeRet};
use crate::thread::ThreadRecord;
use crate::value::Value;
use crate::vm::VirtualMachine;
use crate::{error::VmError, throw_exception};
use std::io::{Read, Write};
use std::sync::Arc;

pub(super) fn register(registry: &NativeRegistry) {
    registry.register_static_str("java/io/FileDescriptor", "initIDs", "()V", noop);
    registry.register_static_str("java/io/FileInputStream", "initIDs", "()V", noop);
    registry.register_static_str("java/io/FileOutputStream", "initIDs", "()V", noop);

    registry.register_instance_str(
        "java/io/FileOutputStream",
        "writeBytes",
        "([BIIZ)V",
        file_output_stream_write_bytes,
    );
    registry.register_instance_str(
        "java/io/FileInputStream",
        "readBytes",
        "([BII)I",
        file_input_stream_read_bytes,
    );
    registry.register_instance_str(
        "java/io/FileInputStream",
        "available0",
        "()I",
        file_input_stream_available,
    );
    registry.register_instance_str(
        "java/io/FileInputStream",
        "available",
        "()I",
        file_input_stream_available,
    );
}

/// The host fd behind a stream instance: `this.fd.fd`.
fn host_fd(vm: &VirtualMachine, stream: &Value) -> Result<i32, VmError> {
    let interner = vm.interner();
    let fd_field = FieldKey {
        name: interner.get_or_intern("fd"),
        desc: interner.get_or_intern("Ljava/io/FileDescriptor;"),
    };
    let fd_int_field = FieldKey {
        name: interner.get_or_intern("fd"),
        desc: vm.symbols().int_desc,
    };
    let descriptor = stream
        .as_instance()?
        .get_field(&fd_field)
        .ok_or_else(|| VmError::Internal("stream has no FileDescriptor".to_owned()))?;
    descriptor
        .as_instance()?
        .get_field(&fd_int_field)
        .ok_or_else(|| VmError::Internal("FileDescriptor has no fd".to_owned()))?
        .as_int()
}

fn file_output_stream_write_bytes(
    vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    args: &[Value],
) -> NativeRet {
    let fd = host_fd(vm, &args[0])?;
    let array = args[1].as_array()?;
    let offset = args[2].as_int()?;
    let length = args[3].as_int()?;
    if offset < 0 || length < 0 || offset + length > array.len() {
        return throw_exception!(ArrayIndexOutOfBoundsException, "write range out of bounds");
    }

    let mut bytes = Vec::with_capacity(length as usize);
    for i in offset..offset + length {
        bytes.push(array.get(i)?.as_int()? as u8);
    }

    let written = match fd {
        1 => std::io::stdout().write_all(&bytes),
        2 => std::io::stderr().write_all(&bytes),
        _ => return throw_exception!(IOException, "unsupported file descriptor {}", fd),
    };
    written.map_err(|e| crate::build_exception!(IOException, "{}", e))?;

    // Keep interactive output visible without a Java-side flush.
    if fd == 1 {
        let _ = std::io::stdout().flush();
    }
    Ok(None)
}

fn file_input_stream_read_bytes(
    vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    args: &[Value],
) -> NativeRet {
    let fd = host_fd(vm, &args[0])?;
    if fd != 0 {
        return throw_exception!(IOException, "unsupported file descriptor {}", fd);
    }
    let array = args[1].as_array()?;
    let offset = args[2].as_int()?;
    let length = args[3].as_int()?;
    if offset < 0 || length < 0 || offset + length > array.len() {
        return throw_exception!(ArrayIndexOutOfBoundsException, "read range out of bounds");
    }
    if length == 0 {
        return Ok(Some(Value::Int(0)));
    }

    let mut buffer = vec![0u8; length as usize];
    let read = std::io::stdin()
        .read(&mut buffer)
        .map_err(|e| crate::build_exception!(IOException, "{}", e))?;
    if read == 0 {
        return Ok(Some(Value::Int(-1)));
    }
    for (i, byte) in buffer[..read].iter().enumerate() {
        array.set(offset + i as i32, Value::Int(*byte as i8 as i32))?;
    }
    Ok(Some(Value::Int(read as i32)))
}

fn file_input_stream_available(
    _vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    _args: &[Value],
) -> NativeRet {
    Ok(Some(Value::Int(0)))
}
