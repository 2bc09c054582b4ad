use crate::class_loader::manifest::ManifestFile;
use crate::class_loader::{define_class, ClassSource};
use crate::error::VmError;
use crate::keys::Symbol;
use crate::rt::class::ClassType;
use crate::vm::VirtualMachine;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, Mutex};

const MANIFEST_ENTRY: &str = "META-INF/MANIFEST.MF";

/// Key → bytes view over an archive; the core consumes nothing else from the
/// ZIP layer.
pub trait ArchiveView: Send + Sync {
    fn entry(&self, name: &str) -> Result<Option<Vec<u8>>, VmError>;
}

/// `ArchiveView` over a ZIP file via the `zip` crate.
pub struct ZipArchiveView {
    archive: Mutex<zip::ZipArchive<std::fs::File>>,
}

impl ZipArchiveView {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, VmError> {
        let file = std::fs::File::open(path.as_ref())?;
        let archive = zip::ZipArchive::new(file)
            .map_err(|e| VmError::Archive(format!("{}: {e}", path.as_ref().display())))?;
        Ok(Self {
            archive: Mutex::new(archive),
        })
    }
}

impl ArchiveView for ZipArchiveView {
    fn entry(&self, name: &str) -> Result<Option<Vec<u8>>, VmError> {
        let mut archive = self.archive.lock().unwrap();
        let mut entry = match archive.by_name(name) {
            Ok(entry) => entry,
            Err(zip::result::ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(VmError::Archive(e.to_string())),
        };
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| VmError::Archive(e.to_string()))?;
        Ok(Some(bytes))
    }
}

/// Class source over a JAR: `<name>.class` entries on demand, plus the
/// manifest's `Main-Class`.
pub struct JarSource {
    archive: Box<dyn ArchiveView>,
    manifest: ManifestFile,
    cache: Mutex<HashMap<Symbol, Arc<ClassType>>>,
}

impl JarSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, VmError> {
        Self::from_archive(Box::new(ZipArchiveView::open(path)?))
    }

    pub fn from_archive(archive: Box<dyn ArchiveView>) -> Result<Self, VmError> {
        let manifest = match archive.entry(MANIFEST_ENTRY)? {
            Some(bytes) => ManifestFile::parse(&bytes),
            None => ManifestFile::default(),
        };
        Ok(Self {
            archive,
            manifest,
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Slash-form main class from the manifest, if any.
    pub fn main_class(&self) -> Option<String> {
        self.manifest.main_class()
    }

    pub fn manifest(&self) -> &ManifestFile {
        &self.manifest
    }
}

impl ClassSource for JarSource {
    fn locate(&self, vm: &VirtualMachine, name: Symbol) -> Result<Option<Arc<ClassType>>, VmError> {
        if let Some(class) = self.cache.lock().unwrap().get(&name) {
            return Ok(Some(Arc::clone(class)));
        }
        let entry_name = format!("{}.class", vm.interner().resolve(&name));
        let Some(bytes) = self.archive.entry(&entry_name)? else {
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
