use crate::class_loader::{define_class, ClassSource};
use crate::error::VmError;
use crate::keys::Symbol;
use crate::rt::class::ClassType;
use crate::vm::VirtualMachine;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Name → bytes source for embedders and tests.
#[derive(Default)]
pub struct MemorySource {
    classes: Mutex<HashMap<String, Vec<u8>>>,
    cache: Mutex<HashMap<Symbol, Arc<ClassType>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: impl Into<String>, bytes: Vec<u8>) {
        self.classes.lock().unwrap().insert(name.into(), bytes);
    }
}

impl ClassSource for MemorySource {
    fn locate(&self, vm: &VirtualMachine, name: Symbol) -> Result<Option<Arc<ClassType>>, VmError> {
        if let Some(class) = self.cache.lock().unwrap().get(&name) {
            return Ok(Some(Arc::clone(class)));
        }
        let name_str = vm.interner().resolve(&name).to_owned();
        let Some(bytes) = self.classes.lock().unwrap().get(&name_str).cloned() else {
            return Ok(None);
        };
        let class = define_class(vm, &bytes)?;
        self.cache.lock().unwrap().insert(name, Arc::clone(&class));
        Ok(Some(class))
    }

    fn reset(&self) {
        self.cache.lock().unwrap().clear();
    }

    fn cached_types(&self) -> Vec<Arc<ClassType>> {
        self.cache.lock().unwrap().values().cloned().collect()
    }
}
