use crate::error::VmError;
use crate::interpreter::frame::Frame;
use crate::keys::{FullyQualifiedMethodKey, MethodKey};
use crate::rt::class::ClassType;
use crate::rt::method::MethodType;
use crate::thread::{CallStackEntry, CallStackGuard, ThreadRecord};
use crate::value::Value;
use crate::vm::VirtualMachine;
use crate::{build_exception, throw_exception};
use tracing_log::log::trace;
use std::sync::Arc;

pub mod frame;
mod handlers;

pub(crate) enum Flow {
    Continue,
    Return(Option<Value>),
}

/// Held for the duration of a `synchronized` method activation.
enum MonitorHold {
    Instance(crate::value::InstanceRef),
    Array(crate::value::ArrayRef),
    Class(Arc<ClassType>),
}

struct SynchronizedScope(MonitorHold);

impl SynchronizedScope {
    fn enter(hold: MonitorHold) -> Self {
        match &hold {
            MonitorHold::Instance(instance) => instance.monitor().enter(),
            MonitorHold::Array(array) => array.monitor().enter(),
            MonitorHold::Class(class) => class.monitor().enter(),
        }
        Self(hold)
    }
}

impl Drop for SynchronizedScope {
    fn drop(&mut self) {
        let result = match &self.0 {
            MonitorHold::Instance(instance) => instance.monitor().leave(),
            MonitorHold::Array(array) => array.monitor().leave(),
            MonitorHold::Class(class) => class.monitor().leave(),
        };
        if result.is_err() {
            trace!("synchronized scope exit without ownership");
        }
    }
}

pub struct Interpreter;

impl Interpreter {
    /// Executes one method activation. `args` carries `this` first for
    /// instance methods; wide values are single entries.
    pub fn invoke(
        vm: &VirtualMachine,
        thread: &Arc<ThreadRecord>,
        class: &Arc<ClassType>,
        method: &Arc<MethodType>,
        args: Vec<Value>,
    ) -> Result<Option<Value>, VmError> {
        if thread.call_stack_depth() >= vm.config().frame_stack_limit {
            return throw_exception!(StackOverflowError);
        }

        let caller_sensitive =
            method.is_caller_sensitive() || thread.caller_sensitive_raised();
        let (_guard, entry_index) = CallStackGuard::push(
            thread,
            CallStackEntry {
                class: Arc::clone(class),
                method_name: method.name,
                method_desc: method.desc,
                pc: 0,
                caller_sensitive,
            },
        );

        let _synchronized = if method.is_synchronized() {
            Some(SynchronizedScope::enter(if method.is_static() {
                MonitorHold::Class(Arc::clone(class))
            } else {
                match args.first() {
                    Some(Value::Instance(instance)) => {
                        MonitorHold::Instance(Arc::clone(instance))
                    }
                    Some(Value::Array(array)) => MonitorHold::Array(Arc::clone(array)),
                    _ => return throw_exception!(NullPointerException),
                }
            }))
        } else {
            None
        };

        if method.is_native() {
            Self::invoke_native(vm, thread, class, method, args)
        } else if method.is_abstract() {
            throw_exception!(
                AbstractMethodError,
                "{}",
                vm_pretty_method(vm, class, method)
            )
        } else {
            Self::run_interpreted(vm, thread, class, method, args, entry_index)
        }
    }

    /// Finds the declared constructor along the chain and runs it.
    /// `args[0]` is the receiver.
    pub fn invoke_constructor(
        vm: &VirtualMachine,
        thread: &Arc<ThreadRecord>,
        class: &Arc<ClassType>,
        key: &MethodKey,
        args: Vec<Value>,
    ) -> Result<(), VmError> {
        let mut current = Arc::clone(class);
        let (declaring, method) = loop {
            if let Some(method) = current.find_declared_method(key) {
                break (current, method);
            }
            match current.super_name() {
                Some(super_name) => current = vm.resolve_class_sym(super_name)?,
                None => {
                    return throw_exception!(
                        NoSuchMethodError,
                        "{}.{}{}",
                        vm.interner().resolve(&class.name()),
                        vm.interner().resolve(&key.name),
                        vm.interner().resolve(&key.desc)
                    )
                }
            }
        };
        Self::invoke(vm, thread, &declaring, &method, args).map(|_| ())
    }

    fn invoke_native(
        vm: &VirtualMachine,
        thread: &Arc<ThreadRecord>,
        class: &Arc<ClassType>,
        method: &Arc<MethodType>,
        args: Vec<Value>,
    ) -> Result<Option<Value>, VmError> {
        let key = FullyQualifiedMethodKey::new(class.name(), method.name, method.desc);
        let native = if method.is_static() {
            vm.native_registry.get_static(&key)
        } else {
            vm.native_registry.get_instance(&key)
        };
        let native = native.ok_or_else(|| {
            build_exception!(
                UnsatisfiedLinkError,
                "{}",
                vm_pretty_method(vm, class, method)
            )
        })?;
        native(vm, thread, &args)
    }

    fn run_interpreted(
        vm: &VirtualMachine,
        thread: &Arc<ThreadRecord>,
        class: &Arc<ClassType>,
        method: &Arc<MethodType>,
        args: Vec<Value>,
        entry_index: usize,
    ) -> Result<Option<Value>, VmError> {
        let body = method.code()?;
        let mut frame = Frame::new(
            Arc::clone(class),
            Arc::clone(method),
            body,
            args,
            entry_index,
        )?;

        loop {
            let step = frame
                .fetch_opcode()
                .and_then(|opcode| handlers::execute(vm, thread, &mut frame, opcode));
            match step {
                Ok(Flow::Continue) => {}
                Ok(Flow::Return(value)) => return Ok(value),
                Err(err) => {
                    thread.update_pc(entry_index, frame.current_opcode_pc);
                    Self::dispatch_to_handler(vm, thread, &mut frame, err)?;
                }
            }
        }
    }

    /// Exception flow: materialize if needed, scan the active exception
    /// table entries at the faulting pc, transfer control to the first
    /// matching handler, or propagate out of the frame.
    fn dispatch_to_handler(
        vm: &VirtualMachine,
        thread: &Arc<ThreadRecord>,
        frame: &mut Frame,
        err: VmError,
    ) -> Result<(), VmError> {
        let (value, catchable) = vm.error_to_thrown(thread, err)?;
        if !catchable {
            return Err(VmError::Thrown {
                value,
                catchable: false,
            });
        }

        let throwable_class = match &value {
            Value::Instance(instance) => match instance.class_type() {
                Some(class) => class,
                None => vm.resolve_class_sym(instance.class_name())?,
            },
            _ => {
                return Err(VmError::Internal(
                    "thrown value is not an instance".to_owned(),
                ))
            }
        };

        let mut handler_pc = None;
        for entry in frame.active_exception_entries(frame.current_opcode_pc) {
            let matches = if entry.catch_type == 0 {
                true
            } else {
                let catch_sym = frame
                    .class
                    .cp()
                    .get_class_sym(entry.catch_type, vm.interner())?;
                throwable_class.can_cast_to(vm, catch_sym)?
            };
            if matches {
                handler_pc = Some(entry.handler_pc as usize);
                break;
            }
        }

        match handler_pc {
            Some(handler_pc) => {
                frame.reset_stack_with(value);
                frame.pc = handler_pc;
                thread.clear_throw_state();
                Ok(())
            }
            None => Err(VmError::Thrown {
                value,
                catchable: true,
            }),
        }
    }

    /// `<clinit>` gating: runs the static initializer exactly once per class
    /// type lifetime unless disabled, super classes first. Reentry from the
    /// initializing thread returns immediately; other threads block until
    /// initialization finished.
    pub fn ensure_initialized(
        vm: &VirtualMachine,
        thread: &Arc<ThreadRecord>,
        class: &Arc<ClassType>,
    ) -> Result<(), VmError> {
        if class.is_initialized() {
            return Ok(());
        }
        if !class.begin_initialization() {
            return Ok(());
        }

        let result = (|| {
            if let Some(super_name) = class.super_name() {
                let super_class = vm.resolve_class_sym(super_name)?;
                Self::ensure_initialized(vm, thread, &super_class)?;
            }
            class.apply_constant_values(vm)?;
            if let Some(clinit) = class.find_declared_method(&vm.symbols().clinit_mk) {
                trace!(
                    "running <clinit> of {}",
                    vm.interner().resolve(&class.name())
                );
                Self::invoke(vm, thread, class, &clinit, Vec::new())?;
            }
            Ok(())
        })();

        // Marked complete even on a throwing initializer; rerunning a
        // half-executed <clinit> would be worse.
        class.finish_initialization();
        result
    }
}

fn vm_pretty_method(vm: &VirtualMachine, class: &Arc<ClassType>, method: &MethodType) -> String {
    format!(
        "{}.{}{}",
        vm.interner().resolve(&class.name()),
        vm.interner().resolve(&method.name),
        vm.interner().resolve(&method.desc)
    )
}
