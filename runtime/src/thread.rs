use crate::keys::Symbol;
use crate::rt::class::ClassType;
use crate::value::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::ThreadId;

/// One invocation on a thread's call stack: caller class, invoked member,
/// current code offset, and the caller-sensitive mark.
#[derive(Clone)]
pub struct CallStackEntry {
    pub class: Arc<ClassType>,
    pub method_name: Symbol,
    pub method_desc: Symbol,
    pub pc: usize,
    pub caller_sensitive: bool,
}

/// The currently propagating exception of a thread.
pub struct ThrowState {
    pub throwable: Value,
    pub catchable: bool,
    /// Set once the first unwinding frame has recorded the throw, so the
    /// same throw is not counted again further up.
    pub notified: bool,
}

/// Shared per-thread record: the Java `Thread` object, the call stack used
/// by stack-trace fill-in and caller-sensitive lookups, and the throw state.
pub struct ThreadRecord {
    eetop: u64,
    host_id: Mutex<Option<ThreadId>>,
    java_thread: RwLock<Value>,
    name: RwLock<String>,
    call_stack: Mutex<Vec<CallStackEntry>>,
    throw_state: Mutex<Option<ThrowState>>,
    caller_sensitive_depth: AtomicUsize,
    alive: AtomicBool,
    finished: AtomicBool,
    interrupted: AtomicBool,
}

impl ThreadRecord {
    fn new(eetop: u64, name: String) -> Self {
        Self {
            eetop,
            host_id: Mutex::new(None),
            java_thread: RwLock::new(Value::Null),
            name: RwLock::new(name),
            call_stack: Mutex::new(Vec::new()),
            throw_state: Mutex::new(None),
            caller_sensitive_depth: AtomicUsize::new(0),
            alive: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            interrupted: AtomicBool::new(false),
        }
    }

    /// The numeric handle stored into the Java thread's `eetop` field.
    pub fn eetop(&self) -> u64 {
        self.eetop
    }

    pub fn name(&self) -> String {
        self.name.read().unwrap().clone()
    }

    pub fn set_name(&self, name: String) {
        *self.name.write().unwrap() = name;
    }

    pub fn java_thread(&self) -> Value {
        self.java_thread.read().unwrap().clone()
    }

    pub fn set_java_thread(&self, thread: Value) {
        *self.java_thread.write().unwrap() = thread;
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire) && !self.finished.load(Ordering::Acquire)
    }

    pub fn mark_started(&self) {
        self.alive.store(true, Ordering::Release);
    }

    /// Completion keeps the record registered so `isAlive` still answers.
    pub fn mark_finished(&self) {
        self.finished.store(true, Ordering::Release);
    }

    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::Release);
    }

    pub fn take_interrupted(&self) -> bool {
        self.interrupted.swap(false, Ordering::AcqRel)
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::Acquire)
    }

    // --- call stack ---

    pub fn push_frame(&self, entry: CallStackEntry) -> usize {
        let mut stack = self.call_stack.lock().unwrap();
        stack.push(entry);
        stack.len() - 1
    }

    fn pop_frame(&self) {
        self.call_stack.lock().unwrap().pop();
    }

    pub fn update_pc(&self, index: usize, pc: usize) {
        let mut stack = self.call_stack.lock().unwrap();
        if let Some(entry) = stack.get_mut(index) {
            entry.pc = pc;
        }
    }

    pub fn call_stack_snapshot(&self) -> Vec<CallStackEntry> {
        self.call_stack.lock().unwrap().clone()
    }

    pub fn call_stack_depth(&self) -> usize {
        self.call_stack.lock().unwrap().len()
    }

    // --- caller-sensitive scope ---

    pub fn caller_sensitive_raised(&self) -> bool {
        self.caller_sensitive_depth.load(Ordering::Acquire) > 0
    }

    // --- throw state ---

    pub fn set_throw_state(&self, throwable: Value, catchable: bool) {
        *self.throw_state.lock().unwrap() = Some(ThrowState {
            throwable,
            catchable,
            notified: false,
        });
    }

    pub fn clear_throw_state(&self) {
        *self.throw_state.lock().unwrap() = None;
    }

    /// Marks the in-flight throw as recorded; returns false when it had
    /// already been recorded by a deeper frame.
    pub fn notify_throw(&self) -> bool {
        let mut state = self.throw_state.lock().unwrap();
        match state.as_mut() {
            Some(throw) if !throw.notified => {
                throw.notified = true;
                true
            }
            _ => false,
        }
    }

    pub fn has_throw_state(&self) -> bool {
        self.throw_state.lock().unwrap().is_some()
    }
}

/// Pops the call-stack entry on every exit path, and drives the
/// throw-notified flag during unwinds.
pub struct CallStackGuard<'a> {
    record: &'a ThreadRecord,
}

impl<'a> CallStackGuard<'a> {
    pub fn push(record: &'a ThreadRecord, entry: CallStackEntry) -> (Self, usize) {
        let index = record.push_frame(entry);
        (Self { record }, index)
    }
}

impl Drop for CallStackGuard<'_> {
    fn drop(&mut self) {
        if self.record.has_throw_state() {
            self.record.notify_throw();
        }
        self.record.pop_frame();
    }
}

/// Raises the per-thread caller-sensitive flag for one scope. Never mutated
/// mid-call.
pub struct CallerSensitiveScope<'a> {
    record: &'a ThreadRecord,
}

impl<'a> CallerSensitiveScope<'a> {
    pub fn raise(record: &'a ThreadRecord) -> Self {
        record
            .caller_sensitive_depth
            .fetch_add(1, Ordering::AcqRel);
        Self { record }
    }
}

impl Drop for CallerSensitiveScope<'_> {
    fn drop(&mut self) {
        self.record
            .caller_sensitive_depth
            .fetch_sub(1, Ordering::AcqRel);
    }
}

/// Process-wide host-thread → thread-record map.
pub struct ThreadRegistry {
    by_host: Mutex<HashMap<ThreadId, Arc<ThreadRecord>>>,
    by_eetop: Mutex<HashMap<u64, Arc<ThreadRecord>>>,
    next_eetop: AtomicU64,
}

impl Default for ThreadRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadRegistry {
    pub fn new() -> Self {
        Self {
            by_host: Mutex::new(HashMap::new()),
            by_eetop: Mutex::new(HashMap::new()),
            next_eetop: AtomicU64::new(1),
        }
    }

    /// Allocates a record not yet bound to a host thread (`Thread.start0`
    /// binds it from inside the new thread).
    pub fn new_record(&self, name: String) -> Arc<ThreadRecord> {
        let eetop = self.next_eetop.fetch_add(1, Ordering::Relaxed);
        let record = Arc::new(ThreadRecord::new(eetop, name));
        self.by_eetop
            .lock()
            .unwrap()
            .insert(eetop, Arc::clone(&record));
        record
    }

    /// Binds `record` to the calling host thread.
    pub fn attach_current(&self, record: &Arc<ThreadRecord>) {
        let host_id = std::thread::current().id();
        *record.host_id.lock().unwrap() = Some(host_id);
        record.mark_started();
        self.by_host
            .lock()
            .unwrap()
            .insert(host_id, Arc::clone(record));
    }

    pub fn current(&self) -> Option<Arc<ThreadRecord>> {
        let host_id = std::thread::current().id();
        self.by_host.lock().unwrap().get(&host_id).cloned()
    }

    pub fn by_eetop(&self, eetop: u64) -> Option<Arc<ThreadRecord>> {
        self.by_eetop.lock().unwrap().get(&eetop).cloned()
    }

    pub fn records(&self) -> Vec<Arc<ThreadRecord>> {
        self.by_eetop.lock().unwrap().values().cloned().collect()
    }

    pub fn reset(&self) {
        self.by_host.lock().unwrap().clear();
        self.by_eetop.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn registry_resolves_current_thread_after_attach() {
        let registry = ThreadRegistry::new();
        let record = registry.new_record("main".to_owned());
        assert!(registry.current().is_none());
        registry.attach_current(&record);
        let current = registry.current().unwrap();
        assert_eq!(current.eetop(), record.eetop());
        assert!(current.is_alive());
    }

    #[test]
    fn finished_records_stay_registered() {
        let registry = ThreadRegistry::new();
        let record = registry.new_record("worker".to_owned());
        registry.attach_current(&record);
        record.mark_finished();
        assert!(!record.is_alive());
        assert!(registry.by_eetop(record.eetop()).is_some());
    }

    #[test]
    fn caller_sensitive_scope_raises_and_lowers() {
        let registry = ThreadRegistry::new();
        let record = registry.new_record("main".to_owned());
        assert!(!record.caller_sensitive_raised());
        {
            let _scope = CallerSensitiveScope::raise(&record);
            assert!(record.caller_sensitive_raised());
        }
        assert!(!record.caller_sensitive_raised());
    }

    #[test]
    fn throw_is_notified_once() {
        let registry = ThreadRegistry::new();
        let record = registry.new_record("main".to_owned());
        record.set_throw_state(Value::Null, true);
        assert!(record.notify_throw());
        assert!(!record.notify_throw());
        record.clear_throw_state();
        assert!(!record.has_throw_state());
    }
}
