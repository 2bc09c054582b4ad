use crate::keys::{FieldKey, MethodKey, Symbol};
use lasso::ThreadedRodeo;

/// Pre-interned names, descriptors, and member keys the bootstrap path and
/// the intrinsics reach for constantly.
pub struct BootstrapRegistry {
    // Common method keys
    pub clinit_mk: MethodKey,
    pub no_arg_constructor_mk: MethodKey,
    pub main_mk: MethodKey,
    pub run_mk: MethodKey,
    pub thread_group_main_constructor_mk: MethodKey,
    pub thread_constructor_mk: MethodKey,
    pub initialize_system_class_mk: MethodKey,
    pub uncaught_exception_mk: MethodKey,

    // Common field keys
    pub thread_eetop_fk: FieldKey,
    pub thread_group_fk: FieldKey,
    pub thread_priority_fk: FieldKey,
    pub class_name_fk: FieldKey,
    pub class_use_caches_fk: FieldKey,
    pub string_value_fk: FieldKey,
    pub throwable_backtrace_fk: FieldKey,
    pub throwable_stack_trace_fk: FieldKey,
    pub throwable_detail_message_fk: FieldKey,
    pub ste_declaring_class_fk: FieldKey,
    pub ste_method_name_fk: FieldKey,
    pub ste_file_name_fk: FieldKey,
    pub ste_line_number_fk: FieldKey,
    pub charset_default_charset_fk: FieldKey,

    // Common class names (interned)
    pub java_lang_object_sym: Symbol,
    pub java_lang_class_sym: Symbol,
    pub java_lang_string_sym: Symbol,
    pub java_lang_system_sym: Symbol,
    pub java_lang_thread_sym: Symbol,
    pub java_lang_thread_group_sym: Symbol,
    pub java_lang_throwable_sym: Symbol,
    pub java_lang_stack_trace_element_sym: Symbol,

    // Common method names (interned)
    pub init_sym: Symbol,
    pub clinit_sym: Symbol,
    pub main_sym: Symbol,
    pub run_sym: Symbol,

    // Common descriptors (interned)
    pub void_desc: Symbol,
    pub string_desc: Symbol,
    pub object_desc: Symbol,
    pub char_array_desc: Symbol,
    pub string_array_desc: Symbol,
    pub ste_array_desc: Symbol,
    pub long_desc: Symbol,
    pub int_desc: Symbol,
    pub boolean_desc: Symbol,
    pub thread_group_desc: Symbol,
}

impl BootstrapRegistry {
    pub fn new(interner: &ThreadedRodeo) -> Self {
        // Method names
        let init_sym = interner.get_or_intern("<init>");
        let clinit_sym = interner.get_or_intern("<clinit>");
        let main_sym = interner.get_or_intern("main");
        let run_sym = interner.get_or_intern("run");

        // Descriptors
        let void_desc = interner.get_or_intern("()V");
        let string_desc = interner.get_or_intern("Ljava/lang/String;");
        let object_desc = interner.get_or_intern("Ljava/lang/Object;");
        let char_array_desc = interner.get_or_intern("[C");
        let string_array_desc = interner.get_or_intern("[Ljava/lang/String;");
        let ste_array_desc = interner.get_or_intern("[Ljava/lang/StackTraceElement;");
        let long_desc = interner.get_or_intern("J");
        let int_desc = interner.get_or_intern("I");
        let boolean_desc = interner.get_or_intern("Z");
        let thread_group_desc = interner.get_or_intern("Ljava/lang/ThreadGroup;");

        Self {
            clinit_mk: MethodKey {
                name: clinit_sym,
                desc: void_desc,
            },
            no_arg_constructor_mk: MethodKey {
                name: init_sym,
                desc: void_desc,
            },
            main_mk: MethodKey {
                name: main_sym,
                desc: interner.get_or_intern("([Ljava/lang/String;)V"),
            },
            run_mk: MethodKey {
                name: run_sym,
                desc: void_desc,
            },
            thread_group_main_constructor_mk: MethodKey {
                name: init_sym,
                desc: interner
                    .get_or_intern("(Ljava/lang/Void;Ljava/lang/ThreadGroup;Ljava/lang/String;)V"),
            },
            thread_constructor_mk: MethodKey {
                name: init_sym,
                desc: interner.get_or_intern("(Ljava/lang/ThreadGroup;Ljava/lang/String;)V"),
            },
            initialize_system_class_mk: MethodKey {
                name: interner.get_or_intern("initializeSystemClass"),
                desc: void_desc,
            },
            uncaught_exception_mk: MethodKey {
                name: interner.get_or_intern("uncaughtException"),
                desc: interner.get_or_intern("(Ljava/lang/Thread;Ljava/lang/Throwable;)V"),
            },

            thread_eetop_fk: FieldKey {
                name: interner.get_or_intern("eetop"),
                desc: long_desc,
            },
            thread_group_fk: FieldKey {
                name: interner.get_or_intern("group"),
                desc: thread_group_desc,
            },
            thread_priority_fk: FieldKey {
                name: interner.get_or_intern("priority"),
                desc: int_desc,
            },
            class_name_fk: FieldKey {
                name: interner.get_or_intern("name"),
                desc: string_desc,
            },
            class_use_caches_fk: FieldKey {
                name: interner.get_or_intern("useCaches"),
                desc: boolean_desc,
            },
            string_value_fk: FieldKey {
                name: interner.get_or_intern("value"),
                desc: char_array_desc,
            },
            throwable_backtrace_fk: FieldKey {
                name: interner.get_or_intern("backtrace"),
                desc: object_desc,
            },
            throwable_stack_trace_fk: FieldKey {
                name: interner.get_or_intern("stackTrace"),
                desc: ste_array_desc,
            },
            throwable_detail_message_fk: FieldKey {
                name: interner.get_or_intern("detailMessage"),
                desc: string_desc,
            },
            ste_declaring_class_fk: FieldKey {
                name: interner.get_or_intern("declaringClass"),
                desc: string_desc,
            },
            ste_method_name_fk: FieldKey {
                name: interner.get_or_intern("methodName"),
                desc: string_desc,
            },
            ste_file_name_fk: FieldKey {
                name: interner.get_or_intern("fileName"),
                desc: string_desc,
            },
            ste_line_number_fk: FieldKey {
                name: interner.get_or_intern("lineNumber"),
                desc: int_desc,
            },
            charset_default_charset_fk: FieldKey {
                name: interner.get_or_intern("defaultCharset"),
                desc: interner.get_or_intern("Ljava/nio/charset/Charset;"),
            },

            java_lang_object_sym: interner.get_or_intern("java/lang/Object"),
            java_lang_class_sym: interner.get_or_intern("java/lang/Class"),
            java_lang_string_sym: interner.get_or_intern("java/lang/String"),
            java_lang_system_sym: interner.get_or_intern("java/lang/System"),
            java_lang_thread_sym: interner.get_or_intern("java/lang/Thread"),
            java_lang_thread_group_sym: interner.get_or_intern("java/lang/ThreadGroup"),
            java_lang_throwable_sym: interner.get_or_intern("java/lang/Throwable"),
            java_lang_stack_trace_element_sym: interner
                .get_or_intern("java/lang/StackTraceElement"),

            init_sym,
            clinit_sym,
            main_sym,
            run_sym,

            void_desc,
            string_desc,
            object_desc,
            char_array_desc,
            string_array_desc,
            ste_array_desc,
            long_desc,
            int_desc,
            boolean_desc,
            thread_group_desc,
        }
    }
}
