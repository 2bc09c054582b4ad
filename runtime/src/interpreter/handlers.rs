use crate::error::VmError;
use crate::interpreter::frame::Frame;
use crate::interpreter::{Flow, Interpreter};
use crate::keys::{FieldKey, MethodKey};
use crate::rt::class::ClassType;
use crate::rt::constant_pool::LoadableConstant;
use crate::thread::ThreadRecord;
use crate::value::{ArrayRef, Value, ValueKind};
use crate::vm::VirtualMachine;
use crate::{build_exception, throw_exception};
use norn_classfile::descriptor::MethodDescriptor;
use norn_classfile::opcode::{ArrayTypeCode, Opcode};
use std::sync::Arc;

pub(super) fn execute(
    vm: &VirtualMachine,
    thread: &Arc<ThreadRecord>,
    frame: &mut Frame,
    opcode: Opcode,
) -> Result<Flow, VmError> {
    match opcode {
        Opcode::Nop => {}

        // --- constants ---
        Opcode::AconstNull => frame.push(Value::Null),
        Opcode::IconstM1 => frame.push(Value::Int(-1)),
        Opcode::Iconst0 => frame.push(Value::Int(0)),
        Opcode::Iconst1 => frame.push(Value::Int(1)),
        Opcode::Iconst2 => frame.push(Value::Int(2)),
        Opcode::Iconst3 => frame.push(Value::Int(3)),
        Opcode::Iconst4 => frame.push(Value::Int(4)),
        Opcode::Iconst5 => frame.push(Value::Int(5)),
        Opcode::Lconst0 => frame.push(Value::Long(0)),
        Opcode::Lconst1 => frame.push(Value::Long(1)),
        Opcode::Fconst0 => frame.push(Value::Float(0.0)),
        Opcode::Fconst1 => frame.push(Value::Float(1.0)),
        Opcode::Fconst2 => frame.push(Value::Float(2.0)),
        Opcode::Dconst0 => frame.push(Value::Double(0.0)),
        Opcode::Dconst1 => frame.push(Value::Double(1.0)),
        Opcode::Bipush => {
            let value = frame.fetch_i8()? as i32;
            frame.push(Value::Int(value));
        }
        Opcode::Sipush => {
            let value = frame.fetch_i16()? as i32;
            frame.push(Value::Int(value));
        }
        Opcode::Ldc => {
            let idx = frame.fetch_u8()? as u16;
            handle_ldc(vm, frame, idx)?;
        }
        Opcode::LdcW | Opcode::Ldc2W => {
            let idx = frame.fetch_u16()?;
            handle_ldc(vm, frame, idx)?;
        }

        // --- loads ---
        Opcode::Iload | Opcode::Lload | Opcode::Fload | Opcode::Dload | Opcode::Aload => {
            let idx = frame.fetch_u8()? as usize;
            let value = frame.local(idx)?;
            frame.push(value);
        }
        Opcode::Iload0 | Opcode::Lload0 | Opcode::Fload0 | Opcode::Dload0 | Opcode::Aload0 => {
            let value = frame.local(0)?;
            frame.push(value);
        }
        Opcode::Iload1 | Opcode::Lload1 | Opcode::Fload1 | Opcode::Dload1 | Opcode::Aload1 => {
            let value = frame.local(1)?;
            frame.push(value);
        }
        Opcode::Iload2 | Opcode::Lload2 | Opcode::Fload2 | Opcode::Dload2 | Opcode::Aload2 => {
            let value = frame.local(2)?;
            frame.push(value);
        }
        Opcode::Iload3 | Opcode::Lload3 | Opcode::Fload3 | Opcode::Dload3 | Opcode::Aload3 => {
            let value = frame.local(3)?;
            frame.push(value);
        }

        // --- stores ---
        Opcode::Istore | Opcode::Lstore | Opcode::Fstore | Opcode::Dstore | Opcode::Astore => {
            let idx = frame.fetch_u8()? as usize;
            let value = frame.pop()?;
            frame.set_local(idx, value)?;
        }
        Opcode::Istore0 | Opcode::Lstore0 | Opcode::Fstore0 | Opcode::Dstore0 | Opcode::Astore0 => {
            let value = frame.pop()?;
            frame.set_local(0, value)?;
        }
        Opcode::Istore1 | Opcode::Lstore1 | Opcode::Fstore1 | Opcode::Dstore1 | Opcode::Astore1 => {
            let value = frame.pop()?;
            frame.set_local(1, value)?;
        }
        Opcode::Istore2 | Opcode::Lstore2 | Opcode::Fstore2 | Opcode::Dstore2 | Opcode::Astore2 => {
            let value = frame.pop()?;
            frame.set_local(2, value)?;
        }
        Opcode::Istore3 | Opcode::Lstore3 | Opcode::Fstore3 | Opcode::Dstore3 | Opcode::Astore3 => {
            let value = frame.pop()?;
            frame.set_local(3, value)?;
        }

        // --- array loads/stores ---
        Opcode::Iaload
        | Opcode::Laload
        | Opcode::Faload
        | Opcode::Daload
        | Opcode::Aaload
        | Opcode::Baload
        | Opcode::Caload
        | Opcode::Saload => {
            let index = frame.pop_int()?;
            let array = frame.pop()?;
            let value = array.as_array()?.get(index)?;
            frame.push(value);
        }
        Opcode::Iastore
        | Opcode::Lastore
        | Opcode::Fastore
        | Opcode::Dastore
        | Opcode::Bastore
        | Opcode::Castore
        | Opcode::Sastore => {
            let value = frame.pop()?;
            let index = frame.pop_int()?;
            let array = frame.pop()?;
            array.as_array()?.set(index, value)?;
        }
        Opcode::Aastore => {
            let value = frame.pop()?;
            let index = frame.pop_int()?;
            let array_value = frame.pop()?;
            let array = array_value.as_array()?;
            check_array_store(vm, array, &value)?;
            array.set(index, value)?;
        }
        Opcode::Arraylength => {
            let array = frame.pop()?;
            let length = array.as_array()?.len();
            frame.push(Value::Int(length));
        }

        // --- stack shuffles ---
        Opcode::Pop => {
            frame.pop()?;
        }
        Opcode::Pop2 => {
            let top = frame.pop()?;
            if !top.kind().is_wide() {
                frame.pop()?;
            }
        }
        Opcode::Dup => {
            let top = frame.peek()?.clone();
            frame.push(top);
        }
        Opcode::DupX1 => {
            let v1 = frame.pop()?;
            let v2 = frame.pop()?;
            frame.push(v1.clone());
            frame.push(v2);
            frame.push(v1);
        }
        Opcode::DupX2 => {
            let v1 = frame.pop()?;
            let v2 = frame.pop()?;
            if v2.kind().is_wide() {
                frame.push(v1.clone());
                frame.push(v2);
                frame.push(v1);
            } else {
                let v3 = frame.pop()?;
                frame.push(v1.clone());
                frame.push(v3);
                frame.push(v2);
                frame.push(v1);
            }
        }
        Opcode::Dup2 => {
            let v1 = frame.pop()?;
            if v1.kind().is_wide() {
                frame.push(v1.clone());
                frame.push(v1);
            } else {
                let v2 = frame.pop()?;
                frame.push(v2.clone());
                frame.push(v1.clone());
                frame.push(v2);
                frame.push(v1);
            }
        }
        Opcode::Dup2X1 => {
            let v1 = frame.pop()?;
            if v1.kind().is_wide() {
                let v2 = frame.pop()?;
                frame.push(v1.clone());
                frame.push(v2);
                frame.push(v1);
            } else {
                let v2 = frame.pop()?;
                let v3 = frame.pop()?;
                frame.push(v2.clone());
                frame.push(v1.clone());
                frame.push(v3);
                frame.push(v2);
                frame.push(v1);
            }
        }
        Opcode::Dup2X2 => {
            let v1 = frame.pop()?;
            if v1.kind().is_wide() {
                let v2 = frame.pop()?;
                if v2.kind().is_wide() {
                    frame.push(v1.clone());
                    frame.push(v2);
                    frame.push(v1);
                } else {
                    let v3 = frame.pop()?;
                    frame.push(v1.clone());
                    frame.push(v3);
                    frame.push(v2);
                    frame.push(v1);
                }
            } else {
                let v2 = frame.pop()?;
                let v3 = frame.pop()?;
                if v3.kind().is_wide() {
                    frame.push(v2.clone());
                    frame.push(v1.clone());
                    frame.push(v3);
                    frame.push(v2);
                    frame.push(v1);
                } else {
                    let v4 = frame.pop()?;
                    frame.push(v2.clone());
                    frame.push(v1.clone());
                    frame.push(v4);
                    frame.push(v3);
                    frame.push(v2);
                    frame.push(v1);
                }
            }
        }
        Opcode::Swap => {
            let v1 = frame.pop()?;
            let v2 = frame.pop()?;
            frame.push(v1);
            frame.push(v2);
        }

        // --- int arithmetic ---
        Opcode::Iadd => int_binop(frame, i32::wrapping_add)?,
        Opcode::Isub => int_binop(frame, i32::wrapping_sub)?,
        Opcode::Imul => int_binop(frame, i32::wrapping_mul)?,
        Opcode::Idiv => {
            let b = frame.pop_int()?;
            let a = frame.pop_int()?;
            if b == 0 {
                return throw_exception!(ArithmeticException, "/ by zero");
            }
            frame.push(Value::Int(a.wrapping_div(b)));
        }
        Opcode::Irem => {
            let b = frame.pop_int()?;
            let a = frame.pop_int()?;
            if b == 0 {
                return throw_exception!(ArithmeticException, "/ by zero");
            }
            frame.push(Value::Int(a.wrapping_rem(b)));
        }
        Opcode::Ineg => {
            let a = frame.pop_int()?;
            frame.push(Value::Int(a.wrapping_neg()));
        }
        Opcode::Ishl => {
            let b = frame.pop_int()?;
            let a = frame.pop_int()?;
            frame.push(Value::Int(a.wrapping_shl(b as u32 & 0x1f)));
        }
        Opcode::Ishr => {
            let b = frame.pop_int()?;
            let a = frame.pop_int()?;
            frame.push(Value::Int(a.wrapping_shr(b as u32 & 0x1f)));
        }
        Opcode::Iushr => {
            let b = frame.pop_int()?;
            let a = frame.pop_int()?;
            frame.push(Value::Int(((a as u32) >> (b as u32 & 0x1f)) as i32));
        }
        Opcode::Iand => int_binop(frame, |a, b| a & b)?,
        Opcode::Ior => int_binop(frame, |a, b| a | b)?,
        Opcode::Ixor => int_binop(frame, |a, b| a ^ b)?,
        Opcode::Iinc => {
            let idx = frame.fetch_u8()? as usize;
            let delta = frame.fetch_i8()? as i32;
            let value = frame.local(idx)?.as_int()?;
            frame.set_local(idx, Value::Int(value.wrapping_add(delta)))?;
        }

        // --- long arithmetic ---
        Opcode::Ladd => long_binop(frame, i64::wrapping_add)?,
        Opcode::Lsub => long_binop(frame, i64::wrapping_sub)?,
        Opcode::Lmul => long_binop(frame, i64::wrapping_mul)?,
        Opcode::Ldiv => {
            let b = frame.pop_long()?;
            let a = frame.pop_long()?;
            if b == 0 {
                return throw_exception!(ArithmeticException, "/ by zero");
            }
            frame.push(Value::Long(a.wrapping_div(b)));
        }
        Opcode::Lrem => {
            let b = frame.pop_long()?;
            let a = frame.pop_long()?;
            if b == 0 {
                return throw_exception!(ArithmeticException, "/ by zero");
            }
            frame.push(Value::Long(a.wrapping_rem(b)));
        }
        Opcode::Lneg => {
            let a = frame.pop_long()?;
            frame.push(Value::Long(a.wrapping_neg()));
        }
        Opcode::Lshl => {
            let b = frame.pop_int()?;
            let a = frame.pop_long()?;
            frame.push(Value::Long(a.wrapping_shl(b as u32 & 0x3f)));
        }
        Opcode::Lshr => {
            let b = frame.pop_int()?;
            let a = frame.pop_long()?;
            frame.push(Value::Long(a.wrapping_shr(b as u32 & 0x3f)));
        }
        Opcode::Lushr => {
            let b = frame.pop_int()?;
            let a = frame.pop_long()?;
            frame.push(Value::Long(((a as u64) >> (b as u32 & 0x3f)) as i64));
        }
        Opcode::Land => long_binop(frame, |a, b| a & b)?,
        Opcode::Lor => long_binop(frame, |a, b| a | b)?,
        Opcode::Lxor => long_binop(frame, |a, b| a ^ b)?,

        // --- float/double arithmetic ---
        Opcode::Fadd => float_binop(frame, |a, b| a + b)?,
        Opcode::Fsub => float_binop(frame, |a, b| a - b)?,
        Opcode::Fmul => float_binop(frame, |a, b| a * b)?,
        Opcode::Fdiv => float_binop(frame, |a, b| a / b)?,
        Opcode::Frem => float_binop(frame, |a, b| a % b)?,
        Opcode::Fneg => {
            let a = frame.pop_float()?;
            frame.push(Value::Float(-a));
        }
        Opcode::Dadd => double_binop(frame, |a, b| a + b)?,
        Opcode::Dsub => double_binop(frame, |a, b| a - b)?,
        Opcode::Dmul => double_binop(frame, |a, b| a * b)?,
        Opcode::Ddiv => double_binop(frame, |a, b| a / b)?,
        Opcode::Drem => double_binop(frame, |a, b| a % b)?,
        Opcode::Dneg => {
            let a = frame.pop_double()?;
            frame.push(Value::Double(-a));
        }

        // --- conversions ---
        Opcode::I2l => {
            let a = frame.pop_int()?;
            frame.push(Value::Long(a as i64));
        }
        Opcode::I2f => {
            let a = frame.pop_int()?;
            frame.push(Value::Float(a as f32));
        }
        Opcode::I2d => {
            let a = frame.pop_int()?;
            frame.push(Value::Double(a as f64));
        }
        Opcode::L2i => {
            let a = frame.pop_long()?;
            frame.push(Value::Int(a as i32));
        }
        Opcode::L2f => {
            let a = frame.pop_long()?;
            frame.push(Value::Float(a as f32));
        }
        Opcode::L2d => {
            let a = frame.pop_long()?;
            frame.push(Value::Double(a as f64));
        }
        Opcode::F2i => {
            let a = frame.pop_float()?;
            frame.push(Value::Int(a as i32));
        }
        Opcode::F2l => {
            let a = frame.pop_float()?;
            frame.push(Value::Long(a as i64));
        }
        Opcode::F2d => {
            let a = frame.pop_float()?;
            frame.push(Value::Double(a as f64));
        }
        Opcode::D2i => {
            let a = frame.pop_double()?;
            frame.push(Value::Int(a as i32));
        }
        Opcode::D2l => {
            let a = frame.pop_double()?;
            frame.push(Value::Long(a as i64));
        }
        Opcode::D2f => {
            let a = frame.pop_double()?;
            frame.push(Value::Float(a as f32));
        }
        Opcode::I2b => {
            let a = frame.pop_int()?;
            frame.push(Value::Int(a as i8 as i32));
        }
        Opcode::I2c => {
            let a = frame.pop_int()?;
            frame.push(Value::Int(a as u16 as i32));
        }
        Opcode::I2s => {
            let a = frame.pop_int()?;
            frame.push(Value::Int(a as i16 as i32));
        }

        // --- comparisons ---
        Opcode::Lcmp => {
            let b = frame.pop_long()?;
            let a = frame.pop_long()?;
            frame.push(Value::Int(match a.cmp(&b) {
                std::cmp::Ordering::Less => -1,
                std::cmp::Ordering::Equal => 0,
                std::cmp::Ordering::Greater => 1,
            }));
        }
        Opcode::Fcmpl | Opcode::Fcmpg => {
            let b = frame.pop_float()?;
            let a = frame.pop_float()?;
            let nan_result = if opcode == Opcode::Fcmpg { 1 } else { -1 };
            frame.push(Value::Int(float_compare(a as f64, b as f64, nan_result)));
        }
        Opcode::Dcmpl | Opcode::Dcmpg => {
            let b = frame.pop_double()?;
            let a = frame.pop_double()?;
            let nan_result = if opcode == Opcode::Dcmpg { 1 } else { -1 };
            frame.push(Value::Int(float_compare(a, b, nan_result)));
        }

        // --- control flow ---
        Opcode::Ifeq
        | Opcode::Ifne
        | Opcode::Iflt
        | Opcode::Ifge
        | Opcode::Ifgt
        | Opcode::Ifle => {
            let offset = frame.fetch_i16()? as i32;
            let a = frame.pop_int()?;
            let taken = match opcode {
                Opcode::Ifeq => a == 0,
                Opcode::Ifne => a != 0,
                Opcode::Iflt => a < 0,
                Opcode::Ifge => a >= 0,
                Opcode::Ifgt => a > 0,
                _ => a <= 0,
            };
            if taken {
                frame.branch(offset);
            }
        }
        Opcode::IfIcmpeq
        | Opcode::IfIcmpne
        | Opcode::IfIcmplt
        | Opcode::IfIcmpge
        | Opcode::IfIcmpgt
        | Opcode::IfIcmple => {
            let offset = frame.fetch_i16()? as i32;
            let b = frame.pop_int()?;
            let a = frame.pop_int()?;
            let taken = match opcode {
                Opcode::IfIcmpeq => a == b,
                Opcode::IfIcmpne => a != b,
                Opcode::IfIcmplt => a < b,
                Opcode::IfIcmpge => a >= b,
                Opcode::IfIcmpgt => a > b,
                _ => a <= b,
            };
            if taken {
                frame.branch(offset);
            }
        }
        Opcode::IfAcmpeq | Opcode::IfAcmpne => {
            let offset = frame.fetch_i16()? as i32;
            let b = frame.pop()?;
            let a = frame.pop()?;
            let same = Value::same_ref(&a, &b);
            if (opcode == Opcode::IfAcmpeq) == same {
                frame.branch(offset);
            }
        }
        Opcode::Ifnull | Opcode::Ifnonnull => {
            let offset = frame.fetch_i16()? as i32;
            let a = frame.pop()?;
            if (opcode == Opcode::Ifnull) == a.is_null() {
                frame.branch(offset);
            }
        }
        Opcode::Goto => {
            let offset = frame.fetch_i16()? as i32;
            frame.branch(offset);
        }
        Opcode::GotoW => {
            let offset = frame.fetch_i32()?;
            frame.branch(offset);
        }
        Opcode::Jsr | Opcode::JsrW | Opcode::Ret => {
            return throw_exception!(AbstractMethodError, "jsr/ret are not supported");
        }
        Opcode::Tableswitch => {
            frame.align_switch();
            let default = frame.fetch_i32()?;
            let low = frame.fetch_i32()?;
            let high = frame.fetch_i32()?;
            let mut offsets = Vec::with_capacity((high - low + 1) as usize);
            for _ in low..=high {
                offsets.push(frame.fetch_i32()?);
            }
            let index = frame.pop_int()?;
            let offset = if index < low || index > high {
                default
            } else {
                offsets[(index - low) as usize]
            };
            frame.branch(offset);
        }
        Opcode::Lookupswitch => {
            frame.align_switch();
            let default = frame.fetch_i32()?;
            let npairs = frame.fetch_i32()?;
            let mut pairs = Vec::with_capacity(npairs as usize);
            for _ in 0..npairs {
                let key = frame.fetch_i32()?;
                let offset = frame.fetch_i32()?;
                pairs.push((key, offset));
            }
            let key = frame.pop_int()?;
            let offset = pairs
                .iter()
                .find(|(candidate, _)| *candidate == key)
                .map(|(_, offset)| *offset)
                .unwrap_or(default);
            frame.branch(offset);
        }

        // --- returns ---
        Opcode::Return => return Ok(Flow::Return(None)),
        Opcode::Ireturn
        | Opcode::Lreturn
        | Opcode::Freturn
        | Opcode::Dreturn
        | Opcode::Areturn => {
            let value = frame.pop()?;
            return Ok(Flow::Return(Some(value)));
        }

        // --- object ops ---
        Opcode::New => {
            let idx = frame.fetch_u16()?;
            let class_sym = frame.class.cp().get_class_sym(idx, vm.interner())?;
            let class = vm.resolve_class_sym(class_sym)?;
            Interpreter::ensure_initialized(vm, thread, &class)?;
            let instance = vm.new_instance(&class)?;
            frame.push(Value::Instance(instance));
        }
        Opcode::Newarray => {
            let atype = frame.fetch_u8()?;
            let code = ArrayTypeCode::try_from(atype)
                .map_err(|_| VmError::Internal(format!("bad newarray type {atype}")))?;
            let name = match code {
                ArrayTypeCode::Boolean => "[Z",
                ArrayTypeCode::Char => "[C",
                ArrayTypeCode::Float => "[F",
                ArrayTypeCode::Double => "[D",
                ArrayTypeCode::Byte => "[B",
                ArrayTypeCode::Short => "[S",
                ArrayTypeCode::Int => "[I",
                ArrayTypeCode::Long => "[J",
            };
            let length = frame.pop_int()?;
            let array = vm.new_array(name, length)?;
            frame.push(Value::Array(array));
        }
        Opcode::Anewarray => {
            let idx = frame.fetch_u16()?;
            let element_sym = frame.class.cp().get_class_sym(idx, vm.interner())?;
            let element_name = vm.interner().resolve(&element_sym).to_owned();
            let array_name = if element_name.starts_with('[') {
                format!("[{element_name}")
            } else {
                format!("[L{element_name};")
            };
            let length = frame.pop_int()?;
            let array = vm.new_array(&array_name, length)?;
            frame.push(Value::Array(array));
        }
        Opcode::Multianewarray => {
            let idx = frame.fetch_u16()?;
            let dims = frame.fetch_u8()? as usize;
            let class_sym = frame.class.cp().get_class_sym(idx, vm.interner())?;
            let name = vm.interner().resolve(&class_sym).to_owned();
            let mut counts = Vec::with_capacity(dims);
            for _ in 0..dims {
                counts.push(frame.pop_int()?);
            }
            counts.reverse();
            let array = alloc_multi_array(vm, &name, &counts)?;
            frame.push(Value::Array(array));
        }
        Opcode::Getstatic => {
            let idx = frame.fetch_u16()?;
            handle_getstatic(vm, thread, frame, idx)?;
        }
        Opcode::Putstatic => {
            let idx = frame.fetch_u16()?;
            handle_putstatic(vm, thread, frame, idx)?;
        }
        Opcode::Getfield => {
            let idx = frame.fetch_u16()?;
            handle_getfield(vm, frame, idx)?;
        }
        Opcode::Putfield => {
            let idx = frame.fetch_u16()?;
            handle_putfield(vm, frame, idx)?;
        }
        Opcode::Instanceof => {
            let idx = frame.fetch_u16()?;
            let target_sym = frame.class.cp().get_class_sym(idx, vm.interner())?;
            let value = frame.pop()?;
            let result = match runtime_class_of(vm, &value)? {
                None => 0,
                Some(class) => i32::from(class.can_cast_to(vm, target_sym)?),
            };
            frame.push(Value::Int(result));
        }
        Opcode::Checkcast => {
            let idx = frame.fetch_u16()?;
            let target_sym = frame.class.cp().get_class_sym(idx, vm.interner())?;
            let value = frame.peek()?.clone();
            if let Some(class) = runtime_class_of(vm, &value)? {
                if !class.can_cast_to(vm, target_sym)? {
                    return throw_exception!(
                        ClassCastException,
                        "{} cannot be cast to {}",
                        vm.interner().resolve(&class.name()).replace('/', "."),
                        vm.interner().resolve(&target_sym).replace('/', ".")
                    );
                }
            }
        }

        // --- invocations ---
        Opcode::Invokestatic => {
            let idx = frame.fetch_u16()?;
            handle_invokestatic(vm, thread, frame, idx)?;
        }
        Opcode::Invokespecial => {
            let idx = frame.fetch_u16()?;
            handle_invokespecial(vm, thread, frame, idx)?;
        }
        Opcode::Invokevirtual => {
            let idx = frame.fetch_u16()?;
            handle_invokevirtual(vm, thread, frame, idx, false)?;
        }
        Opcode::Invokeinterface => {
            let idx = frame.fetch_u16()?;
            let _count = frame.fetch_u8()?;
            let _zero = frame.fetch_u8()?;
            handle_invokevirtual(vm, thread, frame, idx, true)?;
        }
        Opcode::Invokedynamic => {
            let idx = frame.fetch_u16()?;
            let _zero = frame.fetch_u16()?;
            let nat = frame
                .class
                .cp()
                .get_invoke_dynamic_nat(idx, vm.interner())?;
            return throw_exception!(
                LinkageError,
                "invokedynamic call site {}{} is not supported",
                vm.interner().resolve(&nat.name),
                vm.interner().resolve(&nat.desc)
            );
        }

        // --- monitors / throw ---
        Opcode::Monitorenter => {
            let value = frame.pop()?;
            match &value {
                Value::Instance(instance) => instance.monitor().enter(),
                Value::Array(array) => array.monitor().enter(),
                Value::Null => return throw_exception!(NullPointerException),
                _ => {
                    return Err(VmError::Internal(
                        "monitorenter on a non-reference".to_owned(),
                    ))
                }
            }
        }
        Opcode::Monitorexit => {
            let value = frame.pop()?;
            match &value {
                Value::Instance(instance) => instance.monitor().leave()?,
                Value::Array(array) => array.monitor().leave()?,
                Value::Null => return throw_exception!(NullPointerException),
                _ => {
                    return Err(VmError::Internal(
                        "monitorexit on a non-reference".to_owned(),
                    ))
                }
            }
        }
        Opcode::Athrow => {
            let value = frame.pop()?;
            if value.is_null() {
                return throw_exception!(NullPointerException);
            }
            thread.set_throw_state(value.clone(), true);
            return Err(VmError::Thrown {
                value,
                catchable: true,
            });
        }

        Opcode::Wide => {
            handle_wide(frame)?;
        }
    }
    Ok(Flow::Continue)
}

fn int_binop(frame: &mut Frame, op: impl Fn(i32, i32) -> i32) -> Result<(), VmError> {
    let b = frame.pop_int()?;
    let a = frame.pop_int()?;
    frame.push(Value::Int(op(a, b)));
    Ok(())
}

fn long_binop(frame: &mut Frame, op: impl Fn(i64, i64) -> i64) -> Result<(), VmError> {
    let b = frame.pop_long()?;
    let a = frame.pop_long()?;
    frame.push(Value::Long(op(a, b)));
    Ok(())
}

fn float_binop(frame: &mut Frame, op: impl Fn(f32, f32) -> f32) -> Result<(), VmError> {
    let b = frame.pop_float()?;
    let a = frame.pop_float()?;
    frame.push(Value::Float(op(a, b)));
    Ok(())
}

fn double_binop(frame: &mut Frame, op: impl Fn(f64, f64) -> f64) -> Result<(), VmError> {
    let b = frame.pop_double()?;
    let a = frame.pop_double()?;
    frame.push(Value::Double(op(a, b)));
    Ok(())
}

fn float_compare(a: f64, b: f64, nan_result: i32) -> i32 {
    if a.is_nan() || b.is_nan() {
        nan_result
    } else if a < b {
        -1
    } else if a > b {
        1
    } else {
        0
    }
}

fn handle_ldc(vm: &VirtualMachine, frame: &mut Frame, idx: u16) -> Result<(), VmError> {
    let constant = frame.class.cp().get_loadable(idx, vm.interner())?;
    let value = match constant {
        LoadableConstant::Integer(v) => Value::Int(v),
        LoadableConstant::Float(v) => Value::Float(v),
        LoadableConstant::Long(v) => Value::Long(v),
        LoadableConstant::Double(v) => Value::Double(v),
        LoadableConstant::String(sym) => vm.intern_string_sym(sym)?,
        LoadableConstant::Class(sym) => {
            let class = vm.resolve_class_sym(sym)?;
            vm.class_mirror(&class)?
        }
    };
    frame.push(value);
    Ok(())
}

fn handle_wide(frame: &mut Frame) -> Result<(), VmError> {
    let sub = frame.fetch_u8()?;
    let opcode = Opcode::try_from(sub)
        .map_err(|_| VmError::Internal(format!("bad wide sub-opcode {sub:#04x}")))?;
    match opcode {
        Opcode::Iload | Opcode::Lload | Opcode::Fload | Opcode::Dload | Opcode::Aload => {
            let idx = frame.fetch_u16()? as usize;
            let value = frame.local(idx)?;
            frame.push(value);
        }
        Opcode::Istore | Opcode::Lstore | Opcode::Fstore | Opcode::Dstore | Opcode::Astore => {
            let idx = frame.fetch_u16()? as usize;
            let value = frame.pop()?;
            frame.set_local(idx, value)?;
        }
        Opcode::Iinc => {
            let idx = frame.fetch_u16()? as usize;
            let delta = frame.fetch_i16()? as i32;
            let value = frame.local(idx)?.as_int()?;
            frame.set_local(idx, Value::Int(value.wrapping_add(delta)))?;
        }
        Opcode::Ret => {
            return throw_exception!(AbstractMethodError, "jsr/ret are not supported");
        }
        other => {
            return Err(VmError::Internal(format!(
                "wide does not modify {other:?}"
            )))
        }
    }
    Ok(())
}

/// The runtime class of a reference value; `None` for null.
fn runtime_class_of(
    vm: &VirtualMachine,
    value: &Value,
) -> Result<Option<Arc<ClassType>>, VmError> {
    match value {
        Value::Null => Ok(None),
        Value::Instance(instance) => match instance.class_type() {
            Some(class) => Ok(Some(class)),
            None => vm.resolve_class_sym(instance.class_name()).map(Some),
        },
        Value::Array(array) => vm.resolve_class_sym(array.class_name()).map(Some),
        _ => Err(VmError::Internal(
            "expected a reference on the operand stack".to_owned(),
        )),
    }
}

fn check_array_store(
    vm: &VirtualMachine,
    array: &ArrayRef,
    value: &Value,
) -> Result<(), VmError> {
    let Some(element_name) = array.element().class_name else {
        return Ok(());
    };
    match runtime_class_of(vm, value)? {
        None => Ok(()),
        Some(class) => {
            if class.can_cast_to(vm, element_name)? {
                Ok(())
            } else {
                throw_exception!(
                    ArrayStoreException,
                    "{}",
                    vm.interner().resolve(&class.name()).replace('/', ".")
                )
            }
        }
    }
}

fn alloc_multi_array(
    vm: &VirtualMachine,
    name: &str,
    counts: &[i32],
) -> Result<ArrayRef, VmError> {
    let array = vm.new_array(name, counts[0])?;
    if counts.len() > 1 {
        let element_name = &name[1..];
        for i in 0..counts[0] {
            let element = alloc_multi_array(vm, element_name, &counts[1..])?;
            array.set(i, Value::Array(element))?;
        }
    }
    Ok(array)
}

/// Walks the chain (supers, then interfaces) for the class actually holding
/// a static field.
fn resolve_static_holder(
    vm: &VirtualMachine,
    start: &Arc<ClassType>,
    key: &FieldKey,
) -> Result<Arc<ClassType>, VmError> {
    let mut current = Some(Arc::clone(start));
    while let Some(class) = current {
        if class.has_static_field(key) {
            return Ok(class);
        }
        current = match class.super_name() {
            Some(super_name) => Some(vm.resolve_class_sym(super_name)?),
            None => None,
        };
    }
    for interface_name in start.collect_interfaces(vm)? {
        let interface = vm.resolve_class_sym(interface_name)?;
        if interface.has_static_field(key) {
            return Ok(interface);
        }
    }
    throw_exception!(
        NoSuchFieldError,
        "{}.{}",
        vm.interner().resolve(&start.name()),
        vm.interner().resolve(&key.name)
    )
}

/// The declared kind of an instance field, found along the super chain.
fn instance_field_kind(
    vm: &VirtualMachine,
    class_sym: crate::keys::Symbol,
    key: &FieldKey,
) -> Result<ValueKind, VmError> {
    let mut current = Some(vm.resolve_class_sym(class_sym)?);
    while let Some(class) = current {
        if let Some(field) = class.find_field(key) {
            return Ok(field.kind());
        }
        current = match class.super_name() {
            Some(super_name) => Some(vm.resolve_class_sym(super_name)?),
            None => None,
        };
    }
    throw_exception!(
        NoSuchFieldError,
        "{}.{}",
        vm.interner().resolve(&class_sym),
        vm.interner().resolve(&key.name)
    )
}

fn handle_getstatic(
    vm: &VirtualMachine,
    thread: &Arc<ThreadRecord>,
    frame: &mut Frame,
    idx: u16,
) -> Result<(), VmError> {
    let view = frame.class.cp().get_field_view(idx, vm.interner())?;
    let target = vm.resolve_class_sym(view.class)?;
    Interpreter::ensure_initialized(vm, thread, &target)?;
    let key = FieldKey {
        name: view.nat.name,
        desc: view.nat.desc,
    };
    let holder = resolve_static_holder(vm, &target, &key)?;
    Interpreter::ensure_initialized(vm, thread, &holder)?;
    let value = holder.get_static_field(&key, vm.interner())?;
    frame.push(value);
    Ok(())
}

fn handle_putstatic(
    vm: &VirtualMachine,
    thread: &Arc<ThreadRecord>,
    frame: &mut Frame,
    idx: u16,
) -> Result<(), VmError> {
    let view = frame.class.cp().get_field_view(idx, vm.interner())?;
    let target = vm.resolve_class_sym(view.class)?;
    Interpreter::ensure_initialized(vm, thread, &target)?;
    let key = FieldKey {
        name: view.nat.name,
        desc: view.nat.desc,
    };
    let holder = resolve_static_holder(vm, &target, &key)?;
    Interpreter::ensure_initialized(vm, thread, &holder)?;
    let value = frame.pop()?;
    holder.set_static_field(&key, value, vm.interner())
}

fn handle_getfield(vm: &VirtualMachine, frame: &mut Frame, idx: u16) -> Result<(), VmError> {
    let view = frame.class.cp().get_field_view(idx, vm.interner())?;
    let key = FieldKey {
        name: view.nat.name,
        desc: view.nat.desc,
    };
    let object = frame.pop()?;
    let instance = object.as_instance()?;
    let value = instance.get_field(&key).ok_or_else(|| {
        build_exception!(
            NoSuchFieldError,
            "{}.{}",
            vm.interner().resolve(&instance.class_name()),
            vm.interner().resolve(&key.name)
        )
    })?;
    frame.push(value);
    Ok(())
}

fn handle_putfield(vm: &VirtualMachine, frame: &mut Frame, idx: u16) -> Result<(), VmError> {
    let view = frame.class.cp().get_field_view(idx, vm.interner())?;
    let key = FieldKey {
        name: view.nat.name,
        desc: view.nat.desc,
    };
    let value = frame.pop()?;
    let object = frame.pop()?;
    let instance = object.as_instance()?;
    let kind = instance_field_kind(vm, view.class, &key)?;
    let coerced = value.coerce_to(kind).map_err(|_| {
        build_exception!(
            IncompatibleClassChangeError,
            "{}.{} is not of the stored kind",
            vm.interner().resolve(&view.class),
            vm.interner().resolve(&key.name)
        )
    })?;
    if !instance.set_field(&key, coerced) {
        return throw_exception!(
            NoSuchFieldError,
            "{}.{}",
            vm.interner().resolve(&instance.class_name()),
            vm.interner().resolve(&key.name)
        );
    }
    Ok(())
}

fn pop_args(frame: &mut Frame, count: usize) -> Result<Vec<Value>, VmError> {
    let mut args = Vec::with_capacity(count + 1);
    for _ in 0..count {
        args.push(frame.pop()?);
    }
    args.reverse();
    Ok(args)
}

fn method_not_found(
    vm: &VirtualMachine,
    class: &Arc<ClassType>,
    key: &MethodKey,
) -> VmError {
    build_exception!(
        NoSuchMethodError,
        "{}.{}{}",
        vm.interner().resolve(&class.name()),
        vm.interner().resolve(&key.name),
        vm.interner().resolve(&key.desc)
    )
}

fn handle_invokestatic(
    vm: &VirtualMachine,
    thread: &Arc<ThreadRecord>,
    frame: &mut Frame,
    idx: u16,
) -> Result<(), VmError> {
    let view = frame
        .class
        .cp()
        .get_method_or_interface_method_view(idx, vm.interner())?;
    let target = vm.resolve_class_sym(view.class)?;
    Interpreter::ensure_initialized(vm, thread, &target)?;
    let key = MethodKey {
        name: view.nat.name,
        desc: view.nat.desc,
    };
    let (declaring, method) = target
        .find_method(vm, &key)?
        .ok_or_else(|| method_not_found(vm, &target, &key))?;
    let args = pop_args(frame, method.descriptor().params.len())?;
    thread.update_pc(frame.stack_entry_index, frame.current_opcode_pc);
    if let Some(value) = Interpreter::invoke(vm, thread, &declaring, &method, args)? {
        frame.push(value);
    }
    Ok(())
}

fn handle_invokespecial(
    vm: &VirtualMachine,
    thread: &Arc<ThreadRecord>,
    frame: &mut Frame,
    idx: u16,
) -> Result<(), VmError> {
    let view = frame
        .class
        .cp()
        .get_method_or_interface_method_view(idx, vm.interner())?;
    let target = vm.resolve_class_sym(view.class)?;
    let key = MethodKey {
        name: view.nat.name,
        desc: view.nat.desc,
    };
    // Exactly the method named in the ref; no receiver-type dispatch.
    let (declaring, method) = target
        .find_method(vm, &key)?
        .ok_or_else(|| method_not_found(vm, &target, &key))?;
    let mut args = pop_args(frame, method.descriptor().params.len())?;
    let receiver = frame.pop()?;
    if receiver.is_null() {
        return throw_exception!(NullPointerException);
    }
    args.insert(0, receiver);
    thread.update_pc(frame.stack_entry_index, frame.current_opcode_pc);
    if let Some(value) = Interpreter::invoke(vm, thread, &declaring, &method, args)? {
        frame.push(value);
    }
    Ok(())
}

fn handle_invokevirtual(
    vm: &VirtualMachine,
    thread: &Arc<ThreadRecord>,
    frame: &mut Frame,
    idx: u16,
    interface: bool,
) -> Result<(), VmError> {
    let view = if interface {
        frame
            .class
            .cp()
            .get_interface_method_view(idx, vm.interner())?
    } else {
        frame.class.cp().get_method_view(idx, vm.interner())?
    };
    let key = MethodKey {
        name: view.nat.name,
        desc: view.nat.desc,
    };
    let desc_str = vm.interner().resolve(&key.desc).to_owned();
    let param_count = MethodDescriptor::parse(&desc_str)?.params.len();
    let mut args = pop_args(frame, param_count)?;
    let receiver = frame.pop()?;

    // Dispatch on the runtime class of the receiver; arrays answer their
    // Object-polymorphic calls through java/lang/Object.
    let runtime_class = match &receiver {
        Value::Instance(instance) => match instance.class_type() {
            Some(class) => class,
            None => vm.resolve_class_sym(instance.class_name())?,
        },
        Value::Array(_) => vm.resolve_class_sym(vm.symbols().java_lang_object_sym)?,
        Value::Null => return throw_exception!(NullPointerException),
        _ => {
            return Err(VmError::Internal(
                "invoke receiver is not a reference".to_owned(),
            ))
        }
    };
    let (declaring, method) = runtime_class
        .find_method(vm, &key)?
        .ok_or_else(|| method_not_found(vm, &runtime_class, &key))?;
    if method.is_abstract() {
        return throw_exception!(
            AbstractMethodError,
            "{}.{}{}",
            vm.interner().resolve(&runtime_class.name()),
            vm.interner().resolve(&key.name),
            vm.interner().resolve(&key.desc)
        );
    }
    args.insert(0, receiver);
    thread.update_pc(frame.stack_entry_index, frame.current_opcode_pc);
    if let Some(value) = Interpreter::invoke(vm, thread, &declaring, &method, args)? {
        frame.push(value);
    }
    Ok(())
}
