use crate::keys::{FieldKey, Symbol};
use crate::object::monitor::Monitor;
use crate::object::next_identity;
use crate::rt::class::ClassType;
use crate::value::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};

/// A Java object. Instances never own their class type: the registry owns
/// types and the back-reference here is weak, with the name kept for
/// re-resolution after a registry reset.
pub struct ClassInstance {
    class_name: Symbol,
    class: Weak<ClassType>,
    fields: RwLock<HashMap<FieldKey, Value>>,
    monitor: Monitor,
    identity: u64,
}

impl std::fmt::Debug for ClassInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassInstance")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl ClassInstance {
    /// `field_defaults` must already cover the whole inherited field set;
    /// the virtual machine collects it by walking the super chain.
    pub fn new(class: &Arc<ClassType>, field_defaults: HashMap<FieldKey, Value>) -> Self {
        Self {
            class_name: class.name(),
            class: Arc::downgrade(class),
            fields: RwLock::new(field_defaults),
            monitor: Monitor::new(),
            identity: next_identity(),
        }
    }

    pub fn class_name(&self) -> Symbol {
        self.class_name
    }

    pub fn class_type(&self) -> Option<Arc<ClassType>> {
        self.class.upgrade()
    }

    pub fn get_field(&self, key: &FieldKey) -> Option<Value> {
        self.fields.read().unwrap().get(key).cloned()
    }

    /// Returns false when the field does not exist on this instance.
    pub fn set_field(&self, key: &FieldKey, value: Value) -> bool {
        let mut fields = self.fields.write().unwrap();
        match fields.get_mut(key) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn has_field(&self, key: &FieldKey) -> bool {
        self.fields.read().unwrap().contains_key(key)
    }

    /// Snapshot of the field table, used by `Object.clone`.
    pub fn field_snapshot(&self) -> HashMap<FieldKey, Value> {
        self.fields.read().unwrap().clone()
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    pub fn identity_hash(&self) -> i32 {
        self.identity as i32
    }
}
