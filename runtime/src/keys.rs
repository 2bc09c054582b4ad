use lasso::ThreadedRodeo;

/// Interned string handle; class names, member names, and descriptors all
/// live in the process-wide interner.
pub type Symbol = lasso::Spur;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldKey {
    pub name: Symbol,
    pub desc: Symbol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodKey {
    pub name: Symbol,
    pub desc: Symbol,
}

/// Key for native method lookup. `class` is `None` for the array pseudo
/// receivers (currently only `Object.clone` on arrays).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FullyQualifiedMethodKey {
    pub class: Option<Symbol>,
    pub name: Symbol,
    pub desc: Symbol,
}

impl FullyQualifiedMethodKey {
    pub fn new(class: Symbol, name: Symbol, desc: Symbol) -> Self {
        Self {
            class: Some(class),
            name,
            desc,
        }
    }

    pub fn new_with_str(
        class: &str,
        name: &str,
        desc: &str,
        interner: &ThreadedRodeo,
    ) -> Self {
        Self {
            class: Some(interner.get_or_intern(class)),
            name: interner.get_or_intern(name),
            desc: interner.get_or_intern(desc),
        }
    }
}
