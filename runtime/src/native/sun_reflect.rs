use crate::native::{NativeRegistry, NativeRet};
use crate::thread::ThreadRecord;
use crate::value::Value;
use crate::vm::VirtualMachine;
use std::sync::Arc;

pub(super) fn register(registry: &NativeRegistry) {
    registry.register_static_str(
        "sun/reflect/Reflection",
        "getCallerClass",
        "()Ljava/lang/Class;",
        reflection_get_caller_class,
    );
    registry.register_static_str(
        "sun/reflect/Reflection",
        "getCallerClass",
        "(I)Ljava/lang/Class;",
        reflection_get_caller_class,
    );
    registry.register_static_str(
        "sun/reflect/Reflection",
        "getClassAccessFlags",
        "(Ljava/lang/Class;)I",
        reflection_get_class_access_flags,
    );
}

/// The class of the caller of the caller-sensitive method invoking this
/// native, skipping caller-sensitive frames.
fn reflection_get_caller_class(
    vm: &VirtualMachine,
    thread: &Arc<ThreadRecord>,
    _args: &[Value],
) -> NativeRet {
    let snapshot = thread.call_stack_snapshot();
    // Top entry is this native itself; the next non-caller-sensitive one is
    // the answer.
    let caller = snapshot
        .iter()
        .rev()
        .skip(1)
        .find(|frame| !frame.caller_sensitive);
    match caller {
        Some(frame) => Ok(Some(vm.class_mirror(&frame.class)?)),
        None => Ok(Some(Value::Null)),
    }
}

fn reflection_get_class_access_flags(
    vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    args: &[Value],
) -> NativeRet {
    let class = vm.class_of_mirror(&args[0])?;
    Ok(Some(Value::Int(class.flags().get_raw_i32())))
}
