use crate::error::VmError;
use crate::keys::{FieldKey, MethodKey, Symbol};
use crate::object::array::ArrayElement;
use crate::object::monitor::Monitor;
use crate::rt::constant_pool::{LoadableConstant, RuntimeConstantPool};
use crate::rt::field::FieldType;
use crate::rt::method::MethodType;
use crate::value::Value;
use crate::vm::VirtualMachine;
use crate::{build_exception, throw_exception};
use lasso::ThreadedRodeo;
use norn_classfile::attribute::method::code::LineNumberEntry;
use norn_classfile::descriptor::PrimitiveType;
use norn_classfile::flags::ClassFlags;
use norn_classfile::ClassFile;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::thread::ThreadId;

pub const JAVA_LANG_OBJECT: &str = "java/lang/Object";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassTypeKind {
    Instance,
    Primitive(PrimitiveType),
    /// The `void` pseudo class behind `Void.TYPE`.
    Void,
    Array { element: ArrayElement, dims: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClinitState {
    NotStarted,
    InProgress(ThreadId),
    Done,
    Disabled,
}

/// Runtime representation of a loaded class. One canonical instance per name,
/// owned by the class registry; everything else refers to it by `Arc` or by
/// name lookup.
pub struct ClassType {
    name: Symbol,
    flags: ClassFlags,
    super_name: Option<Symbol>,
    interface_names: Vec<Symbol>,
    kind: ClassTypeKind,
    cp: RuntimeConstantPool,
    methods: Vec<Arc<MethodType>>,
    fields: Vec<FieldType>,
    source_file: Option<Symbol>,
    static_fields: RwLock<HashMap<FieldKey, Value>>,
    clinit_state: Mutex<ClinitState>,
    monitor: Monitor,
    mirror: OnceCell<Value>,
}

impl ClassType {
    pub fn from_class_file(cf: ClassFile, interner: &ThreadedRodeo) -> Result<Self, VmError> {
        let name_str = cf.this_class_name()?.to_owned();
        let name = interner.get_or_intern(&name_str);
        let super_name = cf
            .super_class_name()?
            .map(|super_name| interner.get_or_intern(super_name));
        let interface_names = cf
            .interface_names()?
            .into_iter()
            .map(|interface| interner.get_or_intern(interface))
            .collect();
        let source_file = cf
            .source_file()?
            .map(|source| interner.get_or_intern(source));

        let mut fields = Vec::with_capacity(cf.fields.len());
        let mut static_fields = HashMap::new();
        for field in &cf.fields {
            let field_name = interner.get_or_intern(cf.cp.utf8(field.name_index)?);
            let desc_str = cf.cp.utf8(field.descriptor_index)?;
            let field_type = FieldType {
                name: field_name,
                desc: interner.get_or_intern(desc_str),
                flags: field.access_flags,
                ty: norn_classfile::descriptor::JavaType::from_descriptor(desc_str)?,
                constant_value_index: field.constant_value_index(),
            };
            if field_type.is_static() {
                static_fields.insert(field_type.key(), field_type.default_value());
            }
            fields.push(field_type);
        }

        let mut methods = Vec::with_capacity(cf.methods.len());
        for method in &cf.methods {
            let method_name = interner.get_or_intern(cf.cp.utf8(method.name_index)?);
            let desc_str = cf.cp.utf8(method.descriptor_index)?;
            let desc = interner.get_or_intern(desc_str);
            methods.push(Arc::new(MethodType::new(
                method,
                method_name,
                desc,
                desc_str,
                &name_str,
            )?));
        }

        Ok(Self {
            name,
            flags: cf.access_flags,
            super_name,
            interface_names,
            kind: ClassTypeKind::Instance,
            cp: RuntimeConstantPool::new(cf.cp.inner),
            methods,
            fields,
            source_file,
            static_fields: RwLock::new(static_fields),
            clinit_state: Mutex::new(ClinitState::NotStarted),
            monitor: Monitor::new(),
            mirror: OnceCell::new(),
        })
    }

    /// Pseudo class for `int`, `boolean`, ... handed out by
    /// `Class.getPrimitiveClass`.
    pub fn primitive(name: Symbol, primitive: PrimitiveType) -> Self {
        Self::synthetic(name, None, ClassTypeKind::Primitive(primitive))
    }

    pub fn void(name: Symbol) -> Self {
        Self::synthetic(name, None, ClassTypeKind::Void)
    }

    /// Pseudo class for an array name such as `[I`. Super class is Object.
    pub fn array(
        name: Symbol,
        element: ArrayElement,
        dims: u8,
        object_sym: Symbol,
    ) -> Self {
        Self::synthetic(
            name,
            Some(object_sym),
            ClassTypeKind::Array { element, dims },
        )
    }

    fn synthetic(name: Symbol, super_name: Option<Symbol>, kind: ClassTypeKind) -> Self {
        // public, final, abstract: what getModifiers reports for arrays
        const SYNTHETIC_FLAGS: u16 = 0x0411;
        Self {
            name,
            flags: ClassFlags::from_raw(SYNTHETIC_FLAGS),
            super_name,
            interface_names: Vec::new(),
            kind,
            cp: RuntimeConstantPool::new(Vec::new()),
            methods: Vec::new(),
            fields: Vec::new(),
            source_file: None,
            static_fields: RwLock::new(HashMap::new()),
            clinit_state: Mutex::new(ClinitState::Done),
            monitor: Monitor::new(),
            mirror: OnceCell::new(),
        }
    }

    pub fn name(&self) -> Symbol {
        self.name
    }

    pub fn flags(&self) -> ClassFlags {
        self.flags
    }

    pub fn super_name(&self) -> Option<Symbol> {
        self.super_name
    }

    pub fn interface_names(&self) -> &[Symbol] {
        &self.interface_names
    }

    pub fn kind(&self) -> ClassTypeKind {
        self.kind
    }

    pub fn is_interface(&self) -> bool {
        self.flags.is_interface()
    }

    pub fn is_primitive(&self) -> bool {
        matches!(
            self.kind,
            ClassTypeKind::Primitive(_) | ClassTypeKind::Void
        )
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, ClassTypeKind::Array { .. })
    }

    pub fn cp(&self) -> &RuntimeConstantPool {
        &self.cp
    }

    pub fn methods(&self) -> &[Arc<MethodType>] {
        &self.methods
    }

    pub fn fields(&self) -> &[FieldType] {
        &self.fields
    }

    pub fn source_file(&self) -> Option<Symbol> {
        self.source_file
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    pub fn mirror(&self) -> Option<Value> {
        self.mirror.get().cloned()
    }

    pub fn set_mirror(&self, mirror: Value) -> Result<(), VmError> {
        self.mirror
            .set(mirror)
            .map_err(|_| VmError::Internal("class mirror already created".to_owned()))
    }

    pub fn find_declared_method(&self, key: &MethodKey) -> Option<Arc<MethodType>> {
        self.methods
            .iter()
            .find(|method| method.name == key.name && method.desc == key.desc)
            .cloned()
    }

    pub fn find_field(&self, key: &FieldKey) -> Option<&FieldType> {
        self.fields
            .iter()
            .find(|field| field.name == key.name && field.desc == key.desc)
    }

    pub fn has_static_field(&self, key: &FieldKey) -> bool {
        self.static_fields.read().unwrap().contains_key(key)
    }

    pub fn get_static_field(
        &self,
        key: &FieldKey,
        interner: &ThreadedRodeo,
    ) -> Result<Value, VmError> {
        self.static_fields
            .read()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| {
                build_exception!(
                    NoSuchFieldError,
                    "{}.{}",
                    interner.resolve(&self.name),
                    interner.resolve(&key.name)
                )
            })
    }

    pub fn set_static_field(
        &self,
        key: &FieldKey,
        value: Value,
        interner: &ThreadedRodeo,
    ) -> Result<(), VmError> {
        let field = self.find_field(key).filter(|f| f.is_static());
        let Some(field) = field else {
            return throw_exception!(
                NoSuchFieldError,
                "{}.{}",
                interner.resolve(&self.name),
                interner.resolve(&key.name)
            );
        };
        let coerced = value.coerce_to(field.kind()).map_err(|_| {
            build_exception!(
                IncompatibleClassChangeError,
                "static {}.{} is not of the stored kind",
                interner.resolve(&self.name),
                interner.resolve(&key.name)
            )
        })?;
        self.static_fields.write().unwrap().insert(*key, coerced);
        Ok(())
    }

    /// Raw slot write without a declared-field check; preparation and
    /// bootstrap patching use it.
    pub(crate) fn put_static_slot(&self, key: FieldKey, value: Value) {
        self.static_fields.write().unwrap().insert(key, value);
    }

    /// Method lookup: this class first, then the super chain, interface
    /// default methods last. Returns the declaring class and the method.
    pub fn find_method(
        self: &Arc<Self>,
        vm: &VirtualMachine,
        key: &MethodKey,
    ) -> Result<Option<(Arc<ClassType>, Arc<MethodType>)>, VmError> {
        let mut current = Arc::clone(self);
        loop {
            if let Some(method) = current.find_declared_method(key) {
                return Ok(Some((current, method)));
            }
            match current.super_name {
                Some(super_name) => current = vm.resolve_class_sym(super_name)?,
                None => break,
            }
        }

        // Interface default methods, over the transitive set.
        for interface_name in self.collect_interfaces(vm)? {
            let interface = vm.resolve_class_sym(interface_name)?;
            if let Some(method) = interface.find_declared_method(key) {
                if !method.is_abstract() {
                    return Ok(Some((interface, method)));
                }
            }
        }
        Ok(None)
    }

    /// The transitive set of interface names: declared here, inherited from
    /// supers, and super-interfaces.
    pub fn collect_interfaces(
        self: &Arc<Self>,
        vm: &VirtualMachine,
    ) -> Result<Vec<Symbol>, VmError> {
        let mut seen = Vec::new();
        let mut queue: Vec<Symbol> = Vec::new();
        let mut current = Some(Arc::clone(self));
        while let Some(class) = current {
            queue.extend_from_slice(class.interface_names());
            current = match class.super_name() {
                Some(super_name) => Some(vm.resolve_class_sym(super_name)?),
                None => None,
            };
        }
        while let Some(interface_name) = queue.pop() {
            if seen.contains(&interface_name) {
                continue;
            }
            seen.push(interface_name);
            let interface = vm.resolve_class_sym(interface_name)?;
            queue.extend_from_slice(interface.interface_names());
        }
        Ok(seen)
    }

    /// Class-chain ascent including transitively implemented interfaces,
    /// with array covariance.
    pub fn can_cast_to(
        self: &Arc<Self>,
        vm: &VirtualMachine,
        target: Symbol,
    ) -> Result<bool, VmError> {
        if self.name == target {
            return Ok(true);
        }

        if let ClassTypeKind::Array { .. } = self.kind {
            let target_str = vm.interner().resolve(&target).to_owned();
            // Arrays are Objects (and Cloneable/Serializable).
            if target_str == JAVA_LANG_OBJECT
                || target_str == "java/lang/Cloneable"
                || target_str == "java/io/Serializable"
            {
                return Ok(true);
            }
            if let Some(target_elem) = target_str.strip_prefix('[') {
                let self_str = vm.interner().resolve(&self.name).to_owned();
                let self_elem = match self_str.strip_prefix('[') {
                    Some(elem) => elem.to_owned(),
                    None => return Ok(false),
                };
                if self_elem == target_elem {
                    return Ok(true);
                }
                // Object-element covariance: [LA; -> [LB; iff A -> B.
                if let (Some(self_class), Some(target_class)) = (
                    self_elem.strip_prefix('L').and_then(|s| s.strip_suffix(';')),
                    target_elem
                        .strip_prefix('L')
                        .and_then(|s| s.strip_suffix(';')),
                ) {
                    let element_type = vm.resolve_class(self_class)?;
                    let target_sym = vm.interner().get_or_intern(target_class);
                    return element_type.can_cast_to(vm, target_sym);
                }
            }
            return Ok(false);
        }

        let mut current = Some(Arc::clone(self));
        while let Some(class) = current {
            if class.name() == target {
                return Ok(true);
            }
            current = match class.super_name() {
                Some(super_name) => Some(vm.resolve_class_sym(super_name)?),
                None => None,
            };
        }
        for interface_name in self.collect_interfaces(vm)? {
            if interface_name == target {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Type-default values for the full inherited instance field set.
    pub fn instance_field_defaults(
        self: &Arc<Self>,
        vm: &VirtualMachine,
    ) -> Result<HashMap<FieldKey, Value>, VmError> {
        let mut defaults = HashMap::new();
        let mut current = Some(Arc::clone(self));
        while let Some(class) = current {
            for field in class.fields() {
                if !field.is_static() {
                    defaults.entry(field.key()).or_insert(field.default_value());
                }
            }
            current = match class.super_name() {
                Some(super_name) => Some(vm.resolve_class_sym(super_name)?),
                None => None,
            };
        }
        Ok(defaults)
    }

    pub fn method_line_number_table(&self, key: &MethodKey) -> Option<Vec<LineNumberEntry>> {
        self.find_declared_method(key)
            .and_then(|method| method.line_number_table().map(|t| t.to_vec()))
    }

    pub fn method_is_caller_sensitive(&self, key: &MethodKey) -> bool {
        self.find_declared_method(key)
            .is_some_and(|method| method.is_caller_sensitive())
    }

    pub fn clinit_method(&self, vm: &VirtualMachine) -> Option<Arc<MethodType>> {
        self.find_declared_method(&vm.symbols().clinit_mk)
    }

    /// Runs `<clinit>` exactly once per class type lifetime unless disabled;
    /// idempotent under concurrent entry.
    pub fn ensure_static_initializer_called(
        self: &Arc<Self>,
        vm: &VirtualMachine,
        thread: &Arc<crate::thread::ThreadRecord>,
    ) -> Result<(), VmError> {
        crate::interpreter::Interpreter::ensure_initialized(vm, thread, self)
    }

    pub fn disable_static_initializer(&self) {
        *self.clinit_state.lock().unwrap() = ClinitState::Disabled;
    }

    pub fn is_initialized(&self) -> bool {
        matches!(
            *self.clinit_state.lock().unwrap(),
            ClinitState::Done | ClinitState::Disabled
        )
    }

    pub(crate) fn reset_clinit_state(&self) {
        *self.clinit_state.lock().unwrap() = ClinitState::NotStarted;
    }

    /// Wins the right to run `<clinit>`, or blocks until another thread
    /// finished it. Returns true when this thread must run the initializer.
    /// Reentry from the initializing thread itself returns false.
    pub(crate) fn begin_initialization(&self) -> bool {
        let me = std::thread::current().id();
        self.monitor.enter();
        loop {
            let state = *self.clinit_state.lock().unwrap();
            match state {
                ClinitState::Done | ClinitState::Disabled => {
                    let _ = self.monitor.leave();
                    return false;
                }
                ClinitState::InProgress(owner) if owner == me => {
                    let _ = self.monitor.leave();
                    return false;
                }
                ClinitState::InProgress(_) => {
                    // Releases the monitor while parked; woken by
                    // finish_initialization.
                    let _ = self.monitor.wait();
                }
                ClinitState::NotStarted => {
                    *self.clinit_state.lock().unwrap() = ClinitState::InProgress(me);
                    let _ = self.monitor.leave();
                    return true;
                }
            }
        }
    }

    pub(crate) fn finish_initialization(&self) {
        self.monitor.enter();
        *self.clinit_state.lock().unwrap() = ClinitState::Done;
        let _ = self.monitor.notify_all();
        let _ = self.monitor.leave();
    }

    /// Applies `ConstantValue` initial values to static finals. Runs during
    /// initialization, before `<clinit>`.
    pub(crate) fn apply_constant_values(&self, vm: &VirtualMachine) -> Result<(), VmError> {
        for field in &self.fields {
            let Some(index) = field.constant_value_index else {
                continue;
            };
            if !field.is_static() {
                continue;
            }
            let value = match self.cp.get_loadable(index, vm.interner())? {
                LoadableConstant::Integer(v) => Value::Int(v).coerce_to(field.kind())?,
                LoadableConstant::Float(v) => Value::Float(v),
                LoadableConstant::Long(v) => Value::Long(v),
                LoadableConstant::Double(v) => Value::Double(v),
                LoadableConstant::String(sym) => vm.intern_string_sym(sym)?,
                LoadableConstant::Class(_) => {
                    return Err(VmError::Internal(
                        "ConstantValue cannot hold a class".to_owned(),
                    ))
                }
            };
            self.put_static_slot(field.key(), value);
        }
        Ok(())
    }
}
