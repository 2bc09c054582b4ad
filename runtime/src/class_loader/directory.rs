use crate::class_loader::{define_class, ClassSource};
use crate::error::VmError;
use crate::keys::Symbol;
use crate::rt::class::ClassType;
use crate::vm::VirtualMachine;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use walkdir::WalkDir;

/// Classpath directory source. The `.class` files under the root are indexed
/// eagerly by slash name; parsing and linking happen on first locate.
pub struct DirectorySource {
    index: HashMap<String, PathBuf>,
    cache: Mutex<HashMap<Symbol, Arc<ClassType>>>,
}

impl DirectorySource {
    pub fn new(root: impl AsRef<Path>) -> Result<Self, VmError> {
        let root = root.as_ref();
        let mut index = HashMap::new();
        for entry in WalkDir::new(root) {
            let entry = entry.map_err(|e| VmError::Invalid(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("class") {
                continue;
            }
            let relative = path
                .strip_prefix(root)
                .map_err(|e| VmError::Invalid(e.to_string()))?;
            let name = relative
                .with_extension("")
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            index.insert(name, path.to_path_buf());
        }
        Ok(Self {
            index,
            cache: Mutex::new(HashMap::new()),
        })
    }
}

impl ClassSource for DirectorySource {
    fn locate(&self, vm: &VirtualMachine, name: Symbol) -> Result<Option<Arc<ClassType>>, VmError> {
        if let Some(class) = self.cache.lock().unwrap().get(&name) {
            return Ok(Some(Arc::clone(class)));
        }
        let name_str = vm.interner().resolve(&name).to_owned();
        let Some(path) = self.index.get(&name_str) else {
            return Ok(None);
        };
        let bytes = std::fs::read(path)?;
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
