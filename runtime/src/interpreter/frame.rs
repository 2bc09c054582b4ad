use crate::error::VmError;
use crate::rt::class::ClassType;
use crate::rt::method::{CodeBody, MethodType};
use crate::value::Value;
use norn_classfile::attribute::method::ExceptionTableEntry;
use norn_classfile::opcode::Opcode;
use smallvec::{smallvec, SmallVec};
use std::sync::Arc;

/// Most methods keep well under this many operands and locals; deeper
/// frames spill to the heap.
type Slots = SmallVec<[Value; 16]>;

/// Per-invocation execution context: growable operand stack, fixed-size
/// locals, the owning class's constant pool by reference, the method's
/// exception table, and the code cursor.
pub struct Frame<'a> {
    pub class: Arc<ClassType>,
    pub method: Arc<MethodType>,
    code: &'a [u8],
    pub pc: usize,
    /// Offset of the opcode currently executing; branches and exception
    /// table scans are relative to this, not to the operand cursor.
    pub current_opcode_pc: usize,
    /// Index of this invocation in the thread's call stack.
    pub stack_entry_index: usize,
    stack: Slots,
    locals: Slots,
    exception_table: &'a [ExceptionTableEntry],
}

impl<'a> Frame<'a> {
    /// Locals get slot 0 = `this` for instance methods (the caller places it
    /// first in `args`), then parameters in declared order; wide values
    /// consume two slots.
    pub fn new(
        class: Arc<ClassType>,
        method: Arc<MethodType>,
        body: &'a CodeBody,
        args: Vec<Value>,
        stack_entry_index: usize,
    ) -> Result<Self, VmError> {
        let max_locals = body.max_locals as usize;
        let mut locals: Slots = smallvec![Value::Null; max_locals];
        let mut slot = 0usize;
        for arg in args {
            let width = if arg.kind().is_wide() { 2 } else { 1 };
            if slot + width > max_locals {
                return Err(VmError::Internal(format!(
                    "arguments exceed max_locals {max_locals}"
                )));
            }
            locals[slot] = arg;
            slot += width;
        }
        Ok(Self {
            class,
            method,
            code: &body.code,
            pc: 0,
            current_opcode_pc: 0,
            stack_entry_index,
            stack: SmallVec::new(),
            locals,
            exception_table: &body.exception_table,
        })
    }

    // --- code cursor ---

    pub fn fetch_u8(&mut self) -> Result<u8, VmError> {
        let byte = self
            .code
            .get(self.pc)
            .copied()
            .ok_or_else(|| VmError::Internal(format!("pc {} past end of code", self.pc)))?;
        self.pc += 1;
        Ok(byte)
    }

    pub fn fetch_i8(&mut self) -> Result<i8, VmError> {
        Ok(self.fetch_u8()? as i8)
    }

    pub fn fetch_u16(&mut self) -> Result<u16, VmError> {
        let high = self.fetch_u8()?;
        let low = self.fetch_u8()?;
        Ok(u16::from_be_bytes([high, low]))
    }

    pub fn fetch_i16(&mut self) -> Result<i16, VmError> {
        Ok(self.fetch_u16()? as i16)
    }

    pub fn fetch_i32(&mut self) -> Result<i32, VmError> {
        let bytes = [
            self.fetch_u8()?,
            self.fetch_u8()?,
            self.fetch_u8()?,
            self.fetch_u8()?,
        ];
        Ok(i32::from_be_bytes(bytes))
    }

    pub fn fetch_opcode(&mut self) -> Result<Opcode, VmError> {
        self.current_opcode_pc = self.pc;
        let byte = self.fetch_u8()?;
        Opcode::try_from(byte)
            .map_err(|_| VmError::Internal(format!("unknown opcode {byte:#04x} at {}", self.current_opcode_pc)))
    }

    /// Branch target relative to the current opcode.
    pub fn branch(&mut self, offset: i32) {
        self.pc = (self.current_opcode_pc as i64 + offset as i64) as usize;
    }

    /// Skips the 0-3 alignment bytes after a switch opcode so the next read
    /// lands on a 4-byte boundary relative to the method start.
    pub fn align_switch(&mut self) {
        let misalignment = self.pc % 4;
        if misalignment != 0 {
            self.pc += 4 - misalignment;
        }
    }

    // --- operand stack ---

    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub fn pop(&mut self) -> Result<Value, VmError> {
        self.stack
            .pop()
            .ok_or_else(|| VmError::Internal("operand stack underflow".to_owned()))
    }

    pub fn peek(&self) -> Result<&Value, VmError> {
        self.stack
            .last()
            .ok_or_else(|| VmError::Internal("operand stack underflow".to_owned()))
    }

    pub fn pop_int(&mut self) -> Result<i32, VmError> {
        self.pop()?.as_int()
    }

    pub fn pop_long(&mut self) -> Result<i64, VmError> {
        self.pop()?.as_long()
    }

    pub fn pop_float(&mut self) -> Result<f32, VmError> {
        self.pop()?.as_float()
    }

    pub fn pop_double(&mut self) -> Result<f64, VmError> {
        self.pop()?.as_double()
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    /// Handler entry protocol: the operand stack holds only the throwable.
    pub fn reset_stack_with(&mut self, throwable: Value) {
        self.stack.clear();
        self.stack.push(throwable);
    }

    // --- locals ---

    pub fn local(&self, index: usize) -> Result<Value, VmError> {
        self.locals
            .get(index)
            .cloned()
            .ok_or_else(|| VmError::Internal(format!("local index {index} out of range")))
    }

    pub fn set_local(&mut self, index: usize, value: Value) -> Result<(), VmError> {
        match self.locals.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(VmError::Internal(format!(
                "local index {index} out of range"
            ))),
        }
    }

    /// Entries active at `pc` (`start <= pc < end`), declaration order
    /// preserved.
    pub fn active_exception_entries(&self, pc: usize) -> Vec<ExceptionTableEntry> {
        self.exception_table
            .iter()
            .filter(|entry| (entry.start_pc as usize) <= pc && pc < (entry.end_pc as usize))
            .copied()
            .collect()
    }
}
