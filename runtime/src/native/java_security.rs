use crate::interpreter::Interpreter;
use crate::keys::MethodKey;
use crate::native::{NativeRegistry, NativeRet};
use crate::thread::ThreadRecord;
use crate::value::Value;
use crate::vm::VirtualMachine;
use crate::{error::VmError, throw_exception};
use std::sync::Arc;

pub(super) fn register(registry: &NativeRegistry) {
    for desc in [
        "(Ljava/security/PrivilegedAction;)Ljava/lang/Object;",
        "(Ljava/security/PrivilegedExceptionAction;)Ljava/lang/Object;",
        "(Ljava/security/PrivilegedAction;Ljava/security/AccessControlContext;)Ljava/lang/Object;",
        "(Ljava/security/PrivilegedExceptionAction;Ljava/security/AccessControlContext;)Ljava/lang/Object;",
    ] {
        registry.register_static_str(
            "java/security/AccessController",
            "doPrivileged",
            desc,
            access_controller_do_privileged,
        );
    }
    registry.register_static_str(
        "java/security/AccessController",
        "getStackAccessControlContext",
        "()Ljava/security/AccessControlContext;",
        null_context,
    );
    registry.register_static_str(
        "java/security/AccessController",
        "getInheritedAccessControlContext",
        "()Ljava/security/AccessControlContext;",
        null_context,
    );
}

/// Invokes `run()` on the action; no privilege tracking.
fn access_controller_do_privileged(
    vm: &VirtualMachine,
    thread: &Arc<ThreadRecord>,
    args: &[Value],
) -> NativeRet {
    let action = &args[0];
    if action.is_null() {
        return throw_exception!(NullPointerException);
    }
    let class = match action {
        Value::Instance(instance) => match instance.class_type() {
            Some(class) => class,
            None => vm.resolve_class_sym(instance.class_name())?,
        },
        _ => return Err(VmError::Internal("action is not an instance".to_owned())),
    };
    let run_mk = MethodKey {
        name: vm.symbols().run_sym,
        desc: vm.interner().get_or_intern("()Ljava/lang/Object;"),
    };
    let (declaring, method) = class
        .find_method(vm, &run_mk)?
        .ok_or_else(|| VmError::Internal("privileged action has no run()".to_owned()))?;
    Interpreter::invoke(vm, thread, &declaring, &method, vec![action.clone()])
}

fn null_context(
    _vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    _args: &[Value],
) -> NativeRet {
    Ok(Some(Value::Null))
}
