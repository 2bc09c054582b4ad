use crate::class_loader::directory::DirectorySource;
use crate::class_loader::jar::JarSource;
use crate::class_loader::{ClassRegistry, ClassSource};
use crate::debug_log;
use crate::error::VmError;
use crate::interpreter::Interpreter;
use crate::keys::Symbol;
use crate::native::{register_standard_natives, NativeRegistry, UnsafeState};
use crate::object::array::ArrayObject;
use crate::object::instance::ClassInstance;
use crate::rt::class::{ClassType, ClassTypeKind};
use crate::thread::{ThreadRecord, ThreadRegistry};
use crate::value::{ArrayRef, InstanceRef, Value};
use crate::vm::bootstrap_registry::BootstrapRegistry;
use crate::vm::strings::InternTable;
use crate::{throw_exception, VmConfig};
use lasso::ThreadedRodeo;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

pub mod bootstrap_registry;
pub mod properties;
pub mod strings;
pub mod throw;

/// Outcome of one top-level invocation, as seen by the embedder.
#[derive(Debug)]
pub enum ExecutionResult {
    Void,
    Return(Value),
    Thrown { value: Value, catchable: bool },
    Invalid(String),
}

pub struct VirtualMachine {
    self_ref: Weak<VirtualMachine>,
    config: VmConfig,
    interner: Arc<ThreadedRodeo>,
    symbols: BootstrapRegistry,
    class_registry: ClassRegistry,
    pub native_registry: NativeRegistry,
    thread_registry: ThreadRegistry,
    intern_table: InternTable,
    properties: RwLock<HashMap<String, String>>,
    mirror_index: Mutex<HashMap<i32, Arc<ClassType>>>,
    unsafe_state: UnsafeState,
    prepared: AtomicBool,
}

impl VirtualMachine {
    pub fn new(mut config: VmConfig) -> Result<Arc<Self>, VmError> {
        let mut sources: Vec<Arc<dyn ClassSource>> = Vec::new();
        for entry in &config.class_path {
            if entry.extension().and_then(|e| e.to_str()) == Some("jar") {
                let jar = Arc::new(JarSource::open(entry)?);
                if config.main_class.is_none() {
                    config.main_class = jar.main_class();
                }
                sources.push(jar);
            } else {
                sources.push(Arc::new(DirectorySource::new(entry)?));
            }
        }

        let interner = Arc::new(ThreadedRodeo::new());
        let symbols = BootstrapRegistry::new(&interner);
        let mut properties = properties::default_properties();
        properties.extend(config.properties.clone());

        let vm = Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            config,
            symbols,
            class_registry: ClassRegistry::new(),
            native_registry: NativeRegistry::new(Arc::clone(&interner)),
            thread_registry: ThreadRegistry::new(),
            intern_table: InternTable::new(),
            properties: RwLock::new(properties),
            mirror_index: Mutex::new(HashMap::new()),
            unsafe_state: UnsafeState::new(),
            prepared: AtomicBool::new(false),
            interner,
        });

        for source in sources {
            vm.class_registry.add_source(source);
        }
        register_standard_natives(&vm.native_registry);
        Ok(vm)
    }

    pub fn arc(&self) -> Result<Arc<VirtualMachine>, VmError> {
        self.self_ref
            .upgrade()
            .ok_or_else(|| VmError::Internal("virtual machine already dropped".to_owned()))
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn interner(&self) -> &ThreadedRodeo {
        &self.interner
    }

    pub fn symbols(&self) -> &BootstrapRegistry {
        &self.symbols
    }

    pub fn class_registry(&self) -> &ClassRegistry {
        &self.class_registry
    }

    pub fn threads(&self) -> &ThreadRegistry {
        &self.thread_registry
    }

    pub fn intern_table(&self) -> &InternTable {
        &self.intern_table
    }

    pub fn unsafe_state(&self) -> &UnsafeState {
        &self.unsafe_state
    }

    pub fn get_property(&self, key: &str) -> Option<String> {
        self.properties.read().unwrap().get(key).cloned()
    }

    pub fn set_property(&self, key: String, value: String) {
        self.properties.write().unwrap().insert(key, value);
    }

    pub fn properties_snapshot(&self) -> Vec<(String, String)> {
        let properties = self.properties.read().unwrap();
        properties
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn resolve_class(&self, name: &str) -> Result<Arc<ClassType>, VmError> {
        self.class_registry.resolve(self, name)
    }

    pub fn resolve_class_sym(&self, name: Symbol) -> Result<Arc<ClassType>, VmError> {
        self.class_registry.resolve_sym(self, name)
    }

    pub fn current_thread(&self) -> Result<Arc<ThreadRecord>, VmError> {
        self.thread_registry.current().ok_or_else(|| {
            VmError::Internal("current host thread is not registered".to_owned())
        })
    }

    // --- allocation ---

    pub fn new_instance(&self, class: &Arc<ClassType>) -> Result<InstanceRef, VmError> {
        let defaults = class.instance_field_defaults(self)?;
        Ok(Arc::new(ClassInstance::new(class, defaults)))
    }

    /// Allocates a one-level array of the named array class (`[I`,
    /// `[Ljava/lang/String;`, `[[D`, ...).
    pub fn new_array(&self, class_name: &str, length: i32) -> Result<ArrayRef, VmError> {
        if length < 0 {
            return throw_exception!(NegativeArraySizeException, "{}", length);
        }
        let class = self.resolve_class(class_name)?;
        let ClassTypeKind::Array { element, dims } = class.kind() else {
            return Err(VmError::Internal(format!(
                "{class_name} is not an array class"
            )));
        };
        Ok(Arc::new(ArrayObject::new(
            class.name(),
            element,
            dims,
            length,
        )))
    }

    // --- class mirrors ---

    /// The `java/lang/Class` instance for a class type, created on first
    /// request.
    pub fn class_mirror(&self, class: &Arc<ClassType>) -> Result<Value, VmError> {
        if let Some(mirror) = class.mirror() {
            return Ok(mirror);
        }
        let class_class = self.resolve_class_sym(self.symbols.java_lang_class_sym)?;
        let mirror = self.new_instance(&class_class)?;
        let dotted = self.interner.resolve(&class.name()).replace('/', ".");
        // Seed Class.name so getName answers without the lazy native.
        let _ = mirror.set_field(&self.symbols.class_name_fk, self.intern_string(&dotted)?);
        self.mirror_index
            .lock()
            .unwrap()
            .insert(mirror.identity_hash(), Arc::clone(class));
        let value = Value::Instance(mirror);
        match class.set_mirror(value.clone()) {
            Ok(()) => Ok(value),
            // Lost the race; the winner's mirror is canonical.
            Err(_) => Ok(class.mirror().expect("mirror set by racing thread")),
        }
    }

    pub fn class_of_mirror(&self, mirror: &Value) -> Result<Arc<ClassType>, VmError> {
        let instance = mirror.as_instance()?;
        self.mirror_index
            .lock()
            .unwrap()
            .get(&instance.identity_hash())
            .cloned()
            .ok_or_else(|| VmError::Internal("not a class mirror".to_owned()))
    }

    // --- execution facade ---

    pub fn is_prepared(&self) -> bool {
        self.prepared.load(Ordering::Acquire)
    }

    /// The fixed bootstrap ordering needed before user code runs.
    pub fn prepare_execution(&self) -> Result<(), VmError> {
        if self.is_prepared() {
            return Err(VmError::Invalid(
                "execution already prepared; reset first".to_owned(),
            ));
        }

        // Main thread first: everything below may run Java code.
        let thread = self.thread_registry.new_record("main".to_owned());
        self.thread_registry.attach_current(&thread);

        // Bootstrap frames must not pollute the caller-class view.
        let _caller_sensitive = crate::thread::CallerSensitiveScope::raise(&thread);

        let thread_group_class =
            self.resolve_class_sym(self.symbols.java_lang_thread_group_sym)?;
        Interpreter::ensure_initialized(self, &thread, &thread_group_class)?;

        let system_group = self.new_instance(&thread_group_class)?;
        Interpreter::invoke_constructor(
            self,
            &thread,
            &thread_group_class,
            &self.symbols.no_arg_constructor_mk,
            vec![Value::Instance(Arc::clone(&system_group))],
        )?;

        // Allocated now, constructed later in the sequence.
        let main_group = self.new_instance(&thread_group_class)?;

        let thread_class = self.resolve_class_sym(self.symbols.java_lang_thread_sym)?;
        Interpreter::ensure_initialized(self, &thread, &thread_class)?;
        let main_thread = self.new_instance(&thread_class)?;
        main_thread.set_field(
            &self.symbols.thread_group_fk,
            Value::Instance(Arc::clone(&main_group)),
        );
        main_thread.set_field(
            &self.symbols.thread_eetop_fk,
            Value::Long(thread.eetop() as i64),
        );
        main_thread.set_field(&self.symbols.thread_priority_fk, Value::Int(5));
        thread.set_java_thread(Value::Instance(Arc::clone(&main_thread)));

        let class_class = self.resolve_class_sym(self.symbols.java_lang_class_sym)?;
        Interpreter::ensure_initialized(self, &thread, &class_class)?;
        if class_class
            .set_static_field(
                &self.symbols.class_use_caches_fk,
                Value::Boolean(false),
                &self.interner,
            )
            .is_err()
        {
            debug_log!("java/lang/Class has no useCaches static");
        }

        for name in [
            "java/io/InputStream",
            "java/io/PrintStream",
            "java/lang/SecurityManager",
        ] {
            let class = self.resolve_class(name)?;
            Interpreter::ensure_initialized(self, &thread, &class)?;
        }

        Interpreter::invoke_constructor(
            self,
            &thread,
            &thread_group_class,
            &self.symbols.thread_group_main_constructor_mk,
            vec![
                Value::Instance(Arc::clone(&main_group)),
                Value::Null,
                Value::Instance(Arc::clone(&system_group)),
                self.intern_string("main")?,
            ],
        )?;

        match self.resolve_class("sun/security/util/Debug") {
            Ok(debug_class) => debug_class.disable_static_initializer(),
            Err(VmError::ClassNotFound(_)) => {
                debug_log!("sun/security/util/Debug absent; nothing to disable")
            }
            Err(e) => return Err(e),
        }

        Interpreter::invoke_constructor(
            self,
            &thread,
            &thread_class,
            &self.symbols.thread_constructor_mk,
            vec![
                Value::Instance(Arc::clone(&main_thread)),
                Value::Instance(Arc::clone(&main_group)),
                self.intern_string("main")?,
            ],
        )?;

        let utf8_class = self.resolve_class("sun/nio/cs/UTF_8")?;
        Interpreter::ensure_initialized(self, &thread, &utf8_class)?;
        let utf8_instance = self.new_instance(&utf8_class)?;
        Interpreter::invoke_constructor(
            self,
            &thread,
            &utf8_class,
            &self.symbols.no_arg_constructor_mk,
            vec![Value::Instance(Arc::clone(&utf8_instance))],
        )?;
        let charset_class = self.resolve_class("java/nio/charset/Charset")?;
        Interpreter::ensure_initialized(self, &thread, &charset_class)?;
        charset_class.put_static_slot(
            self.symbols.charset_default_charset_fk,
            Value::Instance(utf8_instance),
        );

        let system_class = self.resolve_class_sym(self.symbols.java_lang_system_sym)?;
        Interpreter::ensure_initialized(self, &thread, &system_class)?;
        let init_method = system_class
            .find_declared_method(&self.symbols.initialize_system_class_mk)
            .ok_or_else(|| {
                VmError::Invalid("java/lang/System.initializeSystemClass missing".to_owned())
            })?;
        Interpreter::invoke(self, &thread, &system_class, &init_method, Vec::new())?;

        self.prepared.store(true, Ordering::Release);
        Ok(())
    }

    /// Resolves the main class and invokes `main([Ljava/lang/String;)V`.
    pub fn invoke_main(&self, class_name: &str, args: &[String]) -> ExecutionResult {
        let thread = match self.current_thread() {
            Ok(thread) => thread,
            Err(e) => return ExecutionResult::Invalid(e.to_string()),
        };
        let class = match self.resolve_class(class_name) {
            Ok(class) => class,
            Err(e) => return ExecutionResult::Invalid(e.to_string()),
        };
        let Some(method) = class.find_declared_method(&self.symbols.main_mk) else {
            return ExecutionResult::Invalid(format!(
                "{class_name} has no main([Ljava/lang/String;)V"
            ));
        };

        let result = self.build_main_args(args).and_then(|argv| {
            Interpreter::ensure_initialized(self, &thread, &class)?;
            Interpreter::invoke(self, &thread, &class, &method, vec![argv])
        });
        self.result_to_execution(&thread, result)
    }

    /// Embedder entry point for any static method.
    pub fn invoke_static(
        &self,
        class_name: &str,
        method_name: &str,
        descriptor: &str,
        args: Vec<Value>,
    ) -> ExecutionResult {
        let thread = match self.current_thread() {
            Ok(thread) => thread,
            Err(e) => return ExecutionResult::Invalid(e.to_string()),
        };
        let result = (|| {
            let class = self.resolve_class(class_name)?;
            let key = crate::keys::MethodKey {
                name: self.interner.get_or_intern(method_name),
                desc: self.interner.get_or_intern(descriptor),
            };
            let (declaring, method) = class.find_method(self, &key)?.ok_or_else(|| {
                VmError::Invalid(format!("{class_name} has no {method_name}{descriptor}"))
            })?;
            Interpreter::ensure_initialized(self, &thread, &declaring)?;
            Interpreter::invoke(self, &thread, &declaring, &method, args)
        })();
        self.result_to_execution(&thread, result)
    }

    fn build_main_args(&self, args: &[String]) -> Result<Value, VmError> {
        let array = self.new_array("[Ljava/lang/String;", args.len() as i32)?;
        for (i, arg) in args.iter().enumerate() {
            array.set(i as i32, self.alloc_string(arg)?)?;
        }
        Ok(Value::Array(array))
    }

    /// Clears all process-wide caches; `prepare_execution` must run again
    /// before the next invocation.
    pub fn reset_execution(&self) {
        self.class_registry.reset();
        self.intern_table.reset();
        self.thread_registry.reset();
        self.mirror_index.lock().unwrap().clear();
        self.unsafe_state.reset();
        self.prepared.store(false, Ordering::Release);
    }
}
