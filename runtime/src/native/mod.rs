use crate::error::VmError;
use crate::keys::FullyQualifiedMethodKey;
use crate::thread::ThreadRecord;
use crate::value::Value;
use crate::vm::VirtualMachine;
use dashmap::DashMap;
use lasso::ThreadedRodeo;
use std::sync::Arc;

mod java_io;
mod java_lang;
mod java_security;
mod sun_misc;
mod sun_reflect;

pub use sun_misc::UnsafeState;

pub type NativeRet = Result<Option<Value>, VmError>;

/// Instance natives receive `this` as `args[0]`.
pub type NativeFn = fn(&VirtualMachine, &Arc<ThreadRecord>, &[Value]) -> NativeRet;

/// (class, name, descriptor) → native function tables, one for statics and
/// one for instance natives. Filled once at startup; lookup is exact-match.
pub struct NativeRegistry {
    pub string_interner: Arc<ThreadedRodeo>,
    statics: DashMap<FullyQualifiedMethodKey, NativeFn>,
    instances: DashMap<FullyQualifiedMethodKey, NativeFn>,
}

impl NativeRegistry {
    pub fn new(string_interner: Arc<ThreadedRodeo>) -> Self {
        Self {
            string_interner,
            statics: DashMap::new(),
            instances: DashMap::new(),
        }
    }

    pub fn register_static(&self, key: FullyQualifiedMethodKey, native: NativeFn) {
        self.statics.insert(key, native);
    }

    pub fn register_instance(&self, key: FullyQualifiedMethodKey, native: NativeFn) {
        self.instances.insert(key, native);
    }

    pub fn register_static_str(&self, class: &str, name: &str, desc: &str, native: NativeFn) {
        self.register_static(
            FullyQualifiedMethodKey::new_with_str(class, name, desc, &self.string_interner),
            native,
        );
    }

    pub fn register_instance_str(&self, class: &str, name: &str, desc: &str, native: NativeFn) {
        self.register_instance(
            FullyQualifiedMethodKey::new_with_str(class, name, desc, &self.string_interner),
            native,
        );
    }

    pub fn get_static(&self, key: &FullyQualifiedMethodKey) -> Option<NativeFn> {
        self.statics.get(key).map(|entry| *entry.value())
    }

    pub fn get_instance(&self, key: &FullyQualifiedMethodKey) -> Option<NativeFn> {
        self.instances.get(key).map(|entry| *entry.value())
    }
}

/// The one-time standard registration: everything the bootstrap classes
/// need to reach.
pub(crate) fn register_standard_natives(registry: &NativeRegistry) {
    java_lang::register(registry);
    java_io::register(registry);
    java_security::register(registry);
    sun_misc::register(registry);
    sun_reflect::register(registry);
}

pub(super) fn noop(
    _vm: &VirtualMachine,
    _thread: &Arc<ThreadRecord>,
    _args: &[Value],
) -> NativeRet {
    Ok(None)
}
