//! Class-file pipeline and class-source tests: assembled bytes through the
//! parser, and archive-backed resolution through the registry.

mod common;

use common::{ClassBuilder, ACC_PUBLIC, ACC_STATIC};
use norn_classfile::error::ClassFileError;
use norn_classfile::ClassFile;
use norn_runtime::class_loader::jar::{ArchiveView, JarSource};
use norn_runtime::error::VmError;
use std::collections::HashMap;
use std::sync::Arc;

#[test]
fn assembled_class_parses_back() {
    let mut builder = ClassBuilder::new("pkg/Sample", Some("java/lang/Object"));
    builder.add_field(ACC_PUBLIC, "x", "I");
    builder.add_method(
        ACC_PUBLIC | ACC_STATIC,
        "id",
        "(I)I",
        1,
        1,
        vec![0x1a, 0xac],
        Vec::new(),
    );

    let bytes = builder.build();
    let cf = ClassFile::parse(&bytes).unwrap();
    assert_eq!(cf.this_class_name().unwrap(), "pkg/Sample");
    assert_eq!(cf.super_class_name().unwrap(), Some("java/lang/Object"));
    assert_eq!(cf.fields.len(), 1);
    assert_eq!(cf.methods.len(), 1);

    let method = &cf.methods[0];
    assert_eq!(cf.cp.utf8(method.name_index).unwrap(), "id");
    let code = method.code().expect("Code attribute");
    assert_eq!(code.max_locals, 1);
    assert_eq!(code.code, vec![0x1a, 0xac]);
}

#[test]
fn missing_super_is_only_legal_for_object() {
    let builder = ClassBuilder::new("NotObject", None);
    let bytes = builder.build();
    assert!(matches!(
        ClassFile::parse(&bytes),
        Err(ClassFileError::MissingSuperClass(name)) if name == "NotObject"
    ));

    let object = common::object_class();
    assert!(ClassFile::parse(&object).is_ok());
}

struct MapArchive(HashMap<String, Vec<u8>>);

impl ArchiveView for MapArchive {
    fn entry(&self, name: &str) -> Result<Option<Vec<u8>>, VmError> {
        Ok(self.0.get(name).cloned())
    }
}

#[test]
fn jar_source_reads_manifest_and_classes() {
    let mut entries = HashMap::new();
    entries.insert(
        "META-INF/MANIFEST.MF".to_owned(),
        b"Manifest-Version: 1.0\r\nMain-Class: pkg.App\r\n".to_vec(),
    );

    let mut app = ClassBuilder::new("pkg/App", Some("java/lang/Object"));
    app.add_method(
        ACC_PUBLIC | ACC_STATIC,
        "answer",
        "()I",
        1,
        0,
        vec![0x10, 42, 0xac],
        Vec::new(),
    );
    entries.insert("pkg/App.class".to_owned(), app.build());

    let jar = JarSource::from_archive(Box::new(MapArchive(entries))).unwrap();
    assert_eq!(jar.main_class().as_deref(), Some("pkg/App"));

    let vm = common::test_vm(Vec::new());
    vm.class_registry().add_source(Arc::new(jar));

    let result = vm.invoke_static("pkg/App", "answer", "()I", Vec::new());
    match result {
        norn_runtime::ExecutionResult::Return(value) => {
            assert_eq!(value.as_int().unwrap(), 42)
        }
        other => panic!("expected 42, got {other:?}"),
    }
}

#[test]
fn array_and_primitive_pseudo_classes_resolve() {
    let vm = common::test_vm(Vec::new());

    let ints = vm.resolve_class("[I").unwrap();
    assert!(ints.is_array());
    let again = vm.resolve_class("[I").unwrap();
    assert!(Arc::ptr_eq(&ints, &again));

    let strings = vm.resolve_class("[Ljava/lang/String;").unwrap();
    assert!(strings.is_array());

    let int_class = vm.resolve_class("int").unwrap();
    assert!(int_class.is_primitive());
}
