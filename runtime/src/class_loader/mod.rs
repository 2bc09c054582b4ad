use crate::debug_log;
use crate::error::VmError;
use crate::keys::Symbol;
use crate::object::array::ArrayElement;
use crate::rt::class::ClassType;
use crate::value::ValueKind;
use crate::vm::VirtualMachine;
use norn_classfile::descriptor::{JavaType, PrimitiveType};
use norn_classfile::ClassFile;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

pub mod directory;
pub mod jar;
pub mod manifest;
pub mod memory;

/// One entry of the class path. Sources cache the class types they produced;
/// the registry scans them in order and the first hit wins.
pub trait ClassSource: Send + Sync {
    fn locate(&self, vm: &VirtualMachine, name: Symbol) -> Result<Option<Arc<ClassType>>, VmError>;

    /// Drops every cached class type.
    fn reset(&self);

    fn cached_types(&self) -> Vec<Arc<ClassType>>;
}

/// Parses and links class bytes: the super chain and declared interfaces are
/// resolved before the type is handed out.
pub(crate) fn define_class(
    vm: &VirtualMachine,
    bytes: &[u8],
) -> Result<Arc<ClassType>, VmError> {
    let cf = ClassFile::parse(bytes)?;
    let class = Arc::new(ClassType::from_class_file(cf, vm.interner())?);
    if let Some(super_name) = class.super_name() {
        vm.resolve_class_sym(super_name)?;
    }
    for interface in class.interface_names() {
        vm.resolve_class_sym(*interface)?;
    }
    Ok(class)
}

/// Ordered list of class sources plus the canonical name → type cache.
/// Array and primitive pseudo classes are synthesized here.
pub struct ClassRegistry {
    sources: RwLock<Vec<Arc<dyn ClassSource>>>,
    resolved: Mutex<HashMap<Symbol, Arc<ClassType>>>,
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self {
            sources: RwLock::new(Vec::new()),
            resolved: Mutex::new(HashMap::new()),
        }
    }

    pub fn add_source(&self, source: Arc<dyn ClassSource>) {
        self.sources.write().unwrap().push(source);
    }

    pub fn resolve(&self, vm: &VirtualMachine, name: &str) -> Result<Arc<ClassType>, VmError> {
        let canonical = name.replace('.', "/");
        let sym = vm.interner().get_or_intern(&canonical);
        self.resolve_sym(vm, sym)
    }

    pub fn resolve_sym(&self, vm: &VirtualMachine, name: Symbol) -> Result<Arc<ClassType>, VmError> {
        if let Some(class) = self.resolved.lock().unwrap().get(&name) {
            return Ok(Arc::clone(class));
        }

        let name_str = vm.interner().resolve(&name).to_owned();
        let class = if name_str.starts_with('[') {
            self.synthesize_array(vm, name, &name_str)?
        } else if let Some(primitive) = PrimitiveType::values()
            .iter()
            .find(|p| p.java_name() == name_str)
        {
            Arc::new(ClassType::primitive(name, *primitive))
        } else if name_str == "void" {
            Arc::new(ClassType::void(name))
        } else {
            self.locate_in_sources(vm, name, &name_str)?
        };

        // Racing resolvers may both have linked; the first insertion wins
        // and stays canonical.
        let canonical = Arc::clone(
            self.resolved
                .lock()
                .unwrap()
                .entry(name)
                .or_insert(class),
        );
        Ok(canonical)
    }

    fn locate_in_sources(
        &self,
        vm: &VirtualMachine,
        name: Symbol,
        name_str: &str,
    ) -> Result<Arc<ClassType>, VmError> {
        let sources: Vec<Arc<dyn ClassSource>> = self.sources.read().unwrap().clone();
        for source in sources {
            if let Some(class) = source.locate(vm, name)? {
                debug_log!("resolved class {}", name_str);
                return Ok(class);
            }
        }
        Err(VmError::ClassNotFound(name_str.to_owned()))
    }

    fn synthesize_array(
        &self,
        vm: &VirtualMachine,
        name: Symbol,
        name_str: &str,
    ) -> Result<Arc<ClassType>, VmError> {
        let ty = JavaType::from_descriptor(name_str)?;
        let JavaType::Array { element, dims } = ty else {
            return Err(VmError::Internal(format!(
                "array class name expected, got {name_str}"
            )));
        };
        let element = match element.as_ref() {
            JavaType::Primitive(p) => ArrayElement::primitive(ValueKind::from_primitive(*p)),
            JavaType::Object(element_name) => {
                // The element class must itself resolve.
                let element_class = vm.resolve_class(element_name)?;
                ArrayElement::reference(element_class.name())
            }
            JavaType::Array { .. } => unreachable!("array element is never an array"),
        };
        let object_sym = vm.symbols().java_lang_object_sym;
        Ok(Arc::new(ClassType::array(name, element, dims, object_sym)))
    }

    /// Clears the canonical cache and every source's cache.
    pub fn reset(&self) {
        self.resolved.lock().unwrap().clear();
        for source in self.sources.read().unwrap().iter() {
            source.reset();
        }
    }

    pub fn cached_types(&self) -> Vec<Arc<ClassType>> {
        self.resolved.lock().unwrap().values().cloned().collect()
    }
}
