use crate::error::{SyntheticException, VmError};
use crate::interpreter::Interpreter;
use crate::keys::MethodKey;
use crate::rt::class::ClassType;
use crate::thread::ThreadRecord;
use crate::value::Value;
use crate::vm::{ExecutionResult, VirtualMachine};
use itertools::Itertools;
use std::sync::Arc;

impl VirtualMachine {
    /// Builds the Java throwable for a synthetic exception: resolves the
    /// class, allocates, and runs the matching constructor. In minimal
    /// environments without constructors the detail message is written
    /// directly.
    pub fn materialize_exception(
        &self,
        thread: &Arc<ThreadRecord>,
        ex: &SyntheticException,
    ) -> Result<Value, VmError> {
        let class = self.resolve_class(ex.kind.class_name())?;
        Interpreter::ensure_initialized(self, thread, &class)?;
        let instance = self.new_instance(&class)?;
        let value = Value::Instance(Arc::clone(&instance));

        let reference = ex.as_reference();
        let ctor_key = MethodKey {
            name: self.interner().get_or_intern(reference.name),
            desc: self.interner().get_or_intern(reference.descriptor),
        };

        if let Some(declaring) = self.find_constructor(&class, &ctor_key)? {
            let mut args = vec![value.clone()];
            if let Some(message) = &ex.message {
                args.push(self.alloc_string(message)?);
            }
            Interpreter::invoke_constructor(self, thread, &declaring, &ctor_key, args)?;
        } else if let Some(message) = &ex.message {
            instance.set_field(
                &self.symbols().throwable_detail_message_fk,
                self.alloc_string(message)?,
            );
        }
        Ok(value)
    }

    /// Constructors are not inherited, but minimal class sets may only carry
    /// `Object.<init>` — walk the chain for a declared match and return the
    /// declaring class.
    fn find_constructor(
        &self,
        class: &Arc<ClassType>,
        key: &MethodKey,
    ) -> Result<Option<Arc<ClassType>>, VmError> {
        let mut current = Some(Arc::clone(class));
        while let Some(c) = current {
            if c.find_declared_method(key).is_some() {
                return Ok(Some(c));
            }
            current = match c.super_name() {
                Some(super_name) => Some(self.resolve_class_sym(super_name)?),
                None => None,
            };
        }
        Ok(None)
    }

    /// Converts an interpreter error into an in-flight throwable. Errors the
    /// embedder must see (I/O, malformed archives, invalid state) pass
    /// through unchanged.
    pub(crate) fn error_to_thrown(
        &self,
        thread: &Arc<ThreadRecord>,
        err: VmError,
    ) -> Result<(Value, bool), VmError> {
        match err {
            VmError::Thrown { value, catchable } => Ok((value, catchable)),
            VmError::Synthetic(ex) => {
                let catchable = ex.kind.is_catchable();
                let value = self.materialize_exception(thread, &ex)?;
                thread.set_throw_state(value.clone(), catchable);
                Ok((value, catchable))
            }
            VmError::ClassNotFound(name) => {
                let ex = SyntheticException::with_message(
                    crate::error::JavaExceptionKind::NoClassDefFoundError,
                    name,
                );
                let value = self.materialize_exception(thread, &ex)?;
                thread.set_throw_state(value.clone(), true);
                Ok((value, true))
            }
            VmError::Internal(message) => {
                let ex = SyntheticException::with_message(
                    crate::error::JavaExceptionKind::InternalError,
                    message,
                );
                let value = self.materialize_exception(thread, &ex)?;
                thread.set_throw_state(value.clone(), false);
                Ok((value, false))
            }
            other => Err(other),
        }
    }

    pub(crate) fn result_to_execution(
        &self,
        thread: &Arc<ThreadRecord>,
        result: Result<Option<Value>, VmError>,
    ) -> ExecutionResult {
        match result {
            Ok(None) => ExecutionResult::Void,
            Ok(Some(value)) => ExecutionResult::Return(value),
            Err(err) => match self.error_to_thrown(thread, err) {
                Ok((value, catchable)) => ExecutionResult::Thrown { value, catchable },
                Err(err) => ExecutionResult::Invalid(err.to_string()),
            },
        }
    }

    /// Snapshots the current thread's inverted call stack into
    /// `StackTraceElement`s, skipping caller-sensitive frames, and stores
    /// the array in the throwable's `backtrace` field (`stackTrace` nulls).
    pub fn fill_in_stack_trace(
        &self,
        thread: &Arc<ThreadRecord>,
        throwable: &Value,
    ) -> Result<(), VmError> {
        let symbols = self.symbols();
        let instance = throwable.as_instance()?;
        let snapshot = thread.call_stack_snapshot();

        let ste_class = self.resolve_class_sym(symbols.java_lang_stack_trace_element_sym)?;

        // Skip the fill-in native and the throwable constructor chain at the
        // top so the trace starts at the throw site.
        let mut skip = 0;
        for frame in snapshot.iter().rev() {
            let is_fill =
                self.interner().resolve(&frame.method_name) == "fillInStackTrace";
            let is_throwable_ctor = frame.method_name == symbols.init_sym
                && frame
                    .class
                    .can_cast_to(self, symbols.java_lang_throwable_sym)?;
            if is_fill || is_throwable_ctor {
                skip += 1;
            } else {
                break;
            }
        }

        let mut elements = Vec::new();
        for frame in snapshot.iter().rev().skip(skip) {
            if frame.caller_sensitive {
                continue;
            }
            let element = self.new_instance(&ste_class)?;
            let dotted = self
                .interner()
                .resolve(&frame.class.name())
                .replace('/', ".");
            element.set_field(&symbols.ste_declaring_class_fk, self.alloc_string(&dotted)?);
            element.set_field(
                &symbols.ste_method_name_fk,
                self.alloc_string(self.interner().resolve(&frame.method_name))?,
            );
            let file_name = match frame.class.source_file() {
                Some(source) => self.alloc_string(self.interner().resolve(&source))?,
                None => Value::Null,
            };
            element.set_field(&symbols.ste_file_name_fk, file_name);
            let line = frame
                .class
                .find_declared_method(&MethodKey {
                    name: frame.method_name,
                    desc: frame.method_desc,
                })
                .and_then(|method| method.line_number_for_pc(frame.pc))
                .unwrap_or(-1);
            element.set_field(&symbols.ste_line_number_fk, Value::Int(line));
            elements.push(Value::Instance(element));
        }

        let array = self.new_array("[Ljava/lang/StackTraceElement;", elements.len() as i32)?;
        for (i, element) in elements.into_iter().enumerate() {
            array.set(i as i32, element)?;
        }
        instance.set_field(&symbols.throwable_backtrace_fk, Value::Array(array));
        instance.set_field(&symbols.throwable_stack_trace_fk, Value::Null);
        Ok(())
    }

    /// Host-side rendering of a throwable, used when the Java-side
    /// `printStackTrace` is unavailable or as the embedder's fallback.
    pub fn render_throwable(&self, throwable: &Value) -> String {
        let Ok(instance) = throwable.as_instance() else {
            return "<no throwable>".to_owned();
        };
        let name = self
            .interner()
            .resolve(&instance.class_name())
            .replace('/', ".");
        let mut header = name;
        if let Some(message) = instance.get_field(&self.symbols().throwable_detail_message_fk) {
            if !message.is_null() {
                if let Ok(text) = self.read_string(&message) {
                    header.push_str(": ");
                    header.push_str(&text);
                }
            }
        }

        let frames = self.render_backtrace(instance.get_field(
            &self.symbols().throwable_backtrace_fk,
        ));
        match frames {
            Some(frames) if !frames.is_empty() => {
                format!("{header}\n{}", frames.iter().format("\n"))
            }
            _ => header,
        }
    }

    fn render_backtrace(&self, backtrace: Option<Value>) -> Option<Vec<String>> {
        let array = match backtrace {
            Some(Value::Array(array)) => array,
            _ => return None,
        };
        let symbols = self.symbols();
        let mut lines = Vec::new();
        for i in 0..array.len() {
            let Ok(Value::Instance(element)) = array.get(i) else {
                continue;
            };
            let class = element
                .get_field(&symbols.ste_declaring_class_fk)
                .and_then(|v| self.read_string(&v).ok())
                .unwrap_or_default();
            let method = element
                .get_field(&symbols.ste_method_name_fk)
                .and_then(|v| self.read_string(&v).ok())
                .unwrap_or_default();
            let file = element
                .get_field(&symbols.ste_file_name_fk)
                .filter(|v| !v.is_null())
                .and_then(|v| self.read_string(&v).ok())
                .unwrap_or_else(|| "Unknown Source".to_owned());
            let line = element
                .get_field(&symbols.ste_line_number_fk)
                .and_then(|v| v.as_int().ok())
                .unwrap_or(-1);
            if line >= 0 {
                lines.push(format!("\tat {class}.{method}({file}:{line})"));
            } else {
                lines.push(format!("\tat {class}.{method}({file})"));
            }
        }
        Some(lines)
    }
}
