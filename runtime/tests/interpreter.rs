//! End-to-end interpreter tests over synthetic class files: assemble real
//! bytecode, load it through a memory source, and execute it.

mod common;

use common::{b2, ClassBuilder, ExEntry};
use common::{ACC_ABSTRACT, ACC_INTERFACE, ACC_PUBLIC, ACC_STATIC, ACC_SYNCHRONIZED};
use norn_runtime::keys::FieldKey;
use norn_runtime::value::Value;
use norn_runtime::ExecutionResult;
use norn_runtime::VirtualMachine;
use rstest::rstest;
use std::sync::Arc;

fn expect_return(result: ExecutionResult) -> Value {
    match result {
        ExecutionResult::Return(value) => value,
        other => panic!("expected a return value, got {other:?}"),
    }
}

fn expect_int(result: ExecutionResult) -> i32 {
    expect_return(result).as_int().expect("int return")
}

fn thrown_class_name(vm: &VirtualMachine, result: ExecutionResult) -> String {
    match result {
        ExecutionResult::Thrown { value, .. } => {
            let instance = value.as_instance().expect("thrown instance");
            vm.interner().resolve(&instance.class_name()).to_owned()
        }
        other => panic!("expected a thrown result, got {other:?}"),
    }
}

fn arithmetic_class() -> Vec<u8> {
    let mut builder = ClassBuilder::new("T", Some("java/lang/Object"));
    builder.add_method(
        ACC_PUBLIC | ACC_STATIC,
        "div",
        "(II)I",
        2,
        2,
        vec![0x1a, 0x1b, 0x6c, 0xac],
        Vec::new(),
    );
    builder.add_method(
        ACC_PUBLIC | ACC_STATIC,
        "rem",
        "(II)I",
        2,
        2,
        vec![0x1a, 0x1b, 0x70, 0xac],
        Vec::new(),
    );
    builder.add_method(
        ACC_PUBLIC | ACC_STATIC,
        "ishl",
        "(II)I",
        2,
        2,
        vec![0x1a, 0x1b, 0x78, 0xac],
        Vec::new(),
    );
    builder.add_method(
        ACC_PUBLIC | ACC_STATIC,
        "iushr",
        "(II)I",
        2,
        2,
        vec![0x1a, 0x1b, 0x7c, 0xac],
        Vec::new(),
    );
    builder.add_method(
        ACC_PUBLIC | ACC_STATIC,
        "lshl",
        "(JI)J",
        3,
        3,
        vec![0x1e, 0x1c, 0x79, 0xad],
        Vec::new(),
    );
    builder.build()
}

#[rstest]
#[case(i32::MIN, -1, i32::MIN)]
#[case(7, 2, 3)]
#[case(-7, 2, -3)]
fn idiv_follows_jvm_semantics(#[case] a: i32, #[case] b: i32, #[case] expected: i32) {
    let vm = common::test_vm(vec![("T", arithmetic_class())]);
    let result = vm.invoke_static("T", "div", "(II)I", vec![Value::Int(a), Value::Int(b)]);
    assert_eq!(expect_int(result), expected);
}

#[test]
fn idiv_by_zero_throws_arithmetic_exception() {
    let vm = common::test_vm(vec![("T", arithmetic_class())]);
    let result = vm.invoke_static("T", "div", "(II)I", vec![Value::Int(7), Value::Int(0)]);
    assert_eq!(
        thrown_class_name(&vm, result),
        "java/lang/ArithmeticException"
    );
    let result = vm.invoke_static("T", "rem", "(II)I", vec![Value::Int(7), Value::Int(0)]);
    assert_eq!(
        thrown_class_name(&vm, result),
        "java/lang/ArithmeticException"
    );
}

#[rstest]
#[case(1, 33, 2)] // shift count masks to 5 bits
#[case(1, 1, 2)]
#[case(-16, 4, -256)]
fn int_shift_masks_to_five_bits(#[case] a: i32, #[case] b: i32, #[case] expected: i32) {
    let vm = common::test_vm(vec![("T", arithmetic_class())]);
    let result = vm.invoke_static("T", "ishl", "(II)I", vec![Value::Int(a), Value::Int(b)]);
    assert_eq!(expect_int(result), expected);
}

#[test]
fn long_shift_masks_to_six_bits() {
    let vm = common::test_vm(vec![("T", arithmetic_class())]);
    let result = vm.invoke_static(
        "T",
        "lshl",
        "(JI)J",
        vec![Value::Long(1), Value::Int(65)],
    );
    assert_eq!(expect_return(result).as_long().unwrap(), 2);
}

#[test]
fn iushr_is_logical() {
    let vm = common::test_vm(vec![("T", arithmetic_class())]);
    let result = vm.invoke_static(
        "T",
        "iushr",
        "(II)I",
        vec![Value::Int(-1), Value::Int(28)],
    );
    assert_eq!(expect_int(result), 0xF);
}

#[test]
fn recursive_fib_by_invokestatic() {
    let mut builder = ClassBuilder::new("Fib", Some("java/lang/Object"));
    let fib_ref = builder.method_ref("Fib", "fib", "(I)I");
    let mut code = vec![0x1a, 0x05, 0xa2];
    code.extend_from_slice(&b2(5)); // if_icmpge -> 7
    code.extend_from_slice(&[0x1a, 0xac]); // return n
    code.extend_from_slice(&[0x1a, 0x04, 0x64, 0xb8]); // fib(n-1)
    code.extend_from_slice(&b2(fib_ref));
    code.extend_from_slice(&[0x1a, 0x05, 0x64, 0xb8]); // fib(n-2)
    code.extend_from_slice(&b2(fib_ref));
    code.extend_from_slice(&[0x60, 0xac]); // iadd; ireturn
    builder.add_method(ACC_PUBLIC | ACC_STATIC, "fib", "(I)I", 3, 1, code, Vec::new());

    let vm = common::test_vm(vec![("Fib", builder.build())]);
    let result = vm.invoke_static("Fib", "fib", "(I)I", vec![Value::Int(20)]);
    assert_eq!(expect_int(result), 6765);
}

fn thrower_class() -> Vec<u8> {
    let mut builder = ClassBuilder::new("Thrower", Some("java/lang/Object"));
    let re = builder.class("java/lang/RuntimeException");
    let re_init = builder.method_ref("java/lang/RuntimeException", "<init>", "()V");
    let ae = builder.class("java/lang/ArithmeticException");
    let ae_init = builder.method_ref("java/lang/ArithmeticException", "<init>", "()V");

    let throw_re = |new_index: u16, init_index: u16| {
        let mut code = vec![0xbb];
        code.extend_from_slice(&b2(new_index));
        code.push(0x59); // dup
        code.push(0xb7); // invokespecial <init>
        code.extend_from_slice(&b2(init_index));
        code.push(0xbf); // athrow
        code
    };

    // try { throw new RuntimeException(); } catch (RuntimeException e) { return 7; }
    let mut caught = throw_re(re, re_init);
    caught.extend_from_slice(&[0x57, 0x10, 7, 0xac]); // pop; bipush 7; ireturn
    builder.add_method(
        ACC_PUBLIC | ACC_STATIC,
        "catchIt",
        "()I",
        2,
        0,
        caught,
        vec![ExEntry {
            start: 0,
            end: 8,
            handler: 8,
            catch: Some("java/lang/RuntimeException"),
        }],
    );

    // Catch through the super chain: ArithmeticException by Exception.
    let mut caught_super = throw_re(ae, ae_init);
    caught_super.extend_from_slice(&[0x57, 0x10, 9, 0xac]);
    builder.add_method(
        ACC_PUBLIC | ACC_STATIC,
        "catchSuper",
        "()I",
        2,
        0,
        caught_super,
        vec![ExEntry {
            start: 0,
            end: 8,
            handler: 8,
            catch: Some("java/lang/Exception"),
        }],
    );

    // catch-any entry (catch_type 0), the finally shape.
    let mut finally_any = throw_re(re, re_init);
    finally_any.extend_from_slice(&[0x57, 0x10, 5, 0xac]);
    builder.add_method(
        ACC_PUBLIC | ACC_STATIC,
        "finallyAny",
        "()I",
        2,
        0,
        finally_any,
        vec![ExEntry {
            start: 0,
            end: 8,
            handler: 8,
            catch: None,
        }],
    );

    let uncaught = throw_re(re, re_init);
    builder.add_method(
        ACC_PUBLIC | ACC_STATIC,
        "uncaught",
        "()V",
        2,
        0,
        uncaught,
        Vec::new(),
    );

    builder.build()
}

#[test]
fn exception_is_caught_by_matching_handler() {
    let vm = common::test_vm(vec![("Thrower", thrower_class())]);
    assert_eq!(expect_int(vm.invoke_static("Thrower", "catchIt", "()I", Vec::new())), 7);
}

#[test]
fn exception_is_caught_through_super_chain() {
    let vm = common::test_vm(vec![("Thrower", thrower_class())]);
    assert_eq!(
        expect_int(vm.invoke_static("Thrower", "catchSuper", "()I", Vec::new())),
        9
    );
}

#[test]
fn catch_any_entry_matches_everything() {
    let vm = common::test_vm(vec![("Thrower", thrower_class())]);
    assert_eq!(
        expect_int(vm.invoke_static("Thrower", "finallyAny", "()I", Vec::new())),
        5
    );
}

#[test]
fn uncaught_exception_surfaces_as_thrown() {
    let vm = common::test_vm(vec![("Thrower", thrower_class())]);
    let result = vm.invoke_static("Thrower", "uncaught", "()V", Vec::new());
    assert_eq!(
        thrown_class_name(&vm, result),
        "java/lang/RuntimeException"
    );
}

fn casts_class() -> Vec<u8> {
    let mut builder = ClassBuilder::new("Casts", Some("java/lang/Object"));
    let string_class = builder.class("java/lang/String");
    let re_class = builder.class("java/lang/RuntimeException");

    let mut check_null = vec![0x01, 0xc0];
    check_null.extend_from_slice(&b2(string_class));
    check_null.push(0xb0);
    builder.add_method(
        ACC_PUBLIC | ACC_STATIC,
        "checkNull",
        "()Ljava/lang/Object;",
        1,
        0,
        check_null,
        Vec::new(),
    );

    let mut instance_of_null = vec![0x01, 0xc1];
    instance_of_null.extend_from_slice(&b2(string_class));
    instance_of_null.push(0xac);
    builder.add_method(
        ACC_PUBLIC | ACC_STATIC,
        "instanceOfNull",
        "()I",
        1,
        0,
        instance_of_null,
        Vec::new(),
    );

    let mut is_re = vec![0x2a, 0xc1];
    is_re.extend_from_slice(&b2(re_class));
    is_re.push(0xac);
    builder.add_method(
        ACC_PUBLIC | ACC_STATIC,
        "isRuntimeException",
        "(Ljava/lang/Object;)I",
        1,
        1,
        is_re,
        Vec::new(),
    );

    let mut bad_cast = vec![0x2a, 0xc0];
    bad_cast.extend_from_slice(&b2(string_class));
    bad_cast.push(0xb0);
    builder.add_method(
        ACC_PUBLIC | ACC_STATIC,
        "castToString",
        "(Ljava/lang/Object;)Ljava/lang/Object;",
        1,
        1,
        bad_cast,
        Vec::new(),
    );

    builder.build()
}

#[test]
fn checkcast_null_succeeds_and_instanceof_null_is_false() {
    let vm = common::test_vm(vec![("Casts", casts_class())]);
    assert!(expect_return(vm.invoke_static("Casts", "checkNull", "()Ljava/lang/Object;", Vec::new())).is_null());
    assert_eq!(
        expect_int(vm.invoke_static("Casts", "instanceOfNull", "()I", Vec::new())),
        0
    );
}

#[test]
fn instanceof_and_checkcast_follow_the_class_chain() {
    let vm = common::test_vm(vec![("Casts", casts_class())]);
    let ae_class = vm.resolve_class("java/lang/ArithmeticException").unwrap();
    let ae = Value::Instance(vm.new_instance(&ae_class).unwrap());
    let object = Value::Instance(
        vm.new_instance(&vm.resolve_class("java/lang/Object").unwrap())
            .unwrap(),
    );

    assert_eq!(
        expect_int(vm.invoke_static(
            "Casts",
            "isRuntimeException",
            "(Ljava/lang/Object;)I",
            vec![ae.clone()]
        )),
        1
    );
    assert_eq!(
        expect_int(vm.invoke_static(
            "Casts",
            "isRuntimeException",
            "(Ljava/lang/Object;)I",
            vec![object.clone()]
        )),
        0
    );
    let result = vm.invoke_static(
        "Casts",
        "castToString",
        "(Ljava/lang/Object;)Ljava/lang/Object;",
        vec![object],
    );
    assert_eq!(thrown_class_name(&vm, result), "java/lang/ClassCastException");
}

fn arrays_class() -> Vec<u8> {
    let mut builder = ClassBuilder::new("Arrays", Some("java/lang/Object"));

    // int[2]; a[0] = 7; return a[0];
    builder.add_method(
        ACC_PUBLIC | ACC_STATIC,
        "storeLoad",
        "()I",
        4,
        0,
        vec![
            0x05, 0xbc, 0x0a, 0x59, 0x03, 0x10, 7, 0x4f, 0x03, 0x2e, 0xac,
        ],
        Vec::new(),
    );

    // new int[0]; return a[0];
    builder.add_method(
        ACC_PUBLIC | ACC_STATIC,
        "emptyRead",
        "()I",
        2,
        0,
        vec![0x03, 0xbc, 0x0a, 0x03, 0x2e, 0xac],
        Vec::new(),
    );

    // new int[-1];
    builder.add_method(
        ACC_PUBLIC | ACC_STATIC,
        "negativeSize",
        "()V",
        1,
        0,
        vec![0x02, 0xbc, 0x0a, 0x57, 0xb1],
        Vec::new(),
    );

    // new int[2][3]; return arr[0].length;
    let grid = builder.class("[[I");
    let mut grid_code = vec![0x05, 0x06, 0xc5];
    grid_code.extend_from_slice(&b2(grid));
    grid_code.extend_from_slice(&[0x02, 0x03, 0x32, 0xbe, 0xac]);
    builder.add_method(
        ACC_PUBLIC | ACC_STATIC,
        "gridRowLength",
        "()I",
        2,
        0,
        grid_code,
        Vec::new(),
    );

    builder.build()
}

#[test]
fn array_store_and_load_round_trip() {
    let vm = common::test_vm(vec![("Arrays", arrays_class())]);
    assert_eq!(
        expect_int(vm.invoke_static("Arrays", "storeLoad", "()I", Vec::new())),
        7
    );
}

#[test]
fn empty_array_read_is_out_of_bounds() {
    let vm = common::test_vm(vec![("Arrays", arrays_class())]);
    let result = vm.invoke_static("Arrays", "emptyRead", "()I", Vec::new());
    assert_eq!(
        thrown_class_name(&vm, result),
        "java/lang/ArrayIndexOutOfBoundsException"
    );
}

#[test]
fn negative_array_size_throws() {
    let vm = common::test_vm(vec![("Arrays", arrays_class())]);
    let result = vm.invoke_static("Arrays", "negativeSize", "()V", Vec::new());
    assert_eq!(
        thrown_class_name(&vm, result),
        "java/lang/NegativeArraySizeException"
    );
}

#[test]
fn multianewarray_builds_nested_arrays() {
    let vm = common::test_vm(vec![("Arrays", arrays_class())]);
    // The multianewarray operand dims is 2; grid[0] is an int[3].
    let grid_code_dims = 3;
    assert_eq!(
        expect_int(vm.invoke_static("Arrays", "gridRowLength", "()I", Vec::new())),
        grid_code_dims
    );
}

fn switch_class() -> Vec<u8> {
    let mut builder = ClassBuilder::new("Switches", Some("java/lang/Object"));

    let mut table = vec![0x1a, 0xaa, 0, 0];
    table.extend_from_slice(&36i32.to_be_bytes()); // default -> 37
    table.extend_from_slice(&0i32.to_be_bytes());
    table.extend_from_slice(&2i32.to_be_bytes());
    table.extend_from_slice(&27i32.to_be_bytes()); // 0 -> 28
    table.extend_from_slice(&30i32.to_be_bytes()); // 1 -> 31
    table.extend_from_slice(&33i32.to_be_bytes()); // 2 -> 34
    table.extend_from_slice(&[0x10, 10, 0xac]);
    table.extend_from_slice(&[0x10, 20, 0xac]);
    table.extend_from_slice(&[0x10, 30, 0xac]);
    table.extend_from_slice(&[0x10, 99, 0xac]);
    builder.add_method(ACC_PUBLIC | ACC_STATIC, "table", "(I)I", 1, 1, table, Vec::new());

    let mut lookup = vec![0x1a, 0xab, 0, 0];
    lookup.extend_from_slice(&22i32.to_be_bytes()); // default -> 23
    lookup.extend_from_slice(&1i32.to_be_bytes()); // npairs
    lookup.extend_from_slice(&5i32.to_be_bytes());
    lookup.extend_from_slice(&19i32.to_be_bytes()); // 5 -> 20
    lookup.extend_from_slice(&[0x10, 1, 0xac]);
    lookup.extend_from_slice(&[0x03, 0xac]);
    builder.add_method(ACC_PUBLIC | ACC_STATIC, "lookup", "(I)I", 1, 1, lookup, Vec::new());

    builder.build()
}

#[rstest]
#[case(0, 10)]
#[case(1, 20)]
#[case(2, 30)]
#[case(5, 99)]
#[case(-1, 99)]
fn tableswitch_selects_cases(#[case] input: i32, #[case] expected: i32) {
    let vm = common::test_vm(vec![("Switches", switch_class())]);
    assert_eq!(
        expect_int(vm.invoke_static("Switches", "table", "(I)I", vec![Value::Int(input)])),
        expected
    );
}

#[rstest]
#[case(5, 1)]
#[case(6, 0)]
fn lookupswitch_matches_pairs(#[case] input: i32, #[case] expected: i32) {
    let vm = common::test_vm(vec![("Switches", switch_class())]);
    assert_eq!(
        expect_int(vm.invoke_static("Switches", "lookup", "(I)I", vec![Value::Int(input)])),
        expected
    );
}

fn fields_class() -> Vec<u8> {
    let mut builder = ClassBuilder::new("Box", Some("java/lang/Object"));
    builder.add_field(ACC_PUBLIC, "v", "I");
    let object_init = builder.method_ref("java/lang/Object", "<init>", "()V");
    let box_init = builder.method_ref("Box", "<init>", "()V");
    let box_new = builder.class("Box");
    let v_ref = builder.field_ref("Box", "v", "I");

    let mut ctor = vec![0x2a, 0xb7];
    ctor.extend_from_slice(&b2(object_init));
    ctor.push(0xb1);
    builder.add_method(ACC_PUBLIC, "<init>", "()V", 1, 1, ctor, Vec::new());

    let mut round_trip = vec![0xbb];
    round_trip.extend_from_slice(&b2(box_new));
    round_trip.push(0x59);
    round_trip.push(0xb7);
    round_trip.extend_from_slice(&b2(box_init));
    round_trip.push(0x4c); // astore_1
    round_trip.push(0x2b); // aload_1
    round_trip.push(0x1a); // iload_0
    round_trip.push(0xb5); // putfield
    round_trip.extend_from_slice(&b2(v_ref));
    round_trip.push(0x2b);
    round_trip.push(0xb4); // getfield
    round_trip.extend_from_slice(&b2(v_ref));
    round_trip.push(0xac);
    builder.add_method(
        ACC_PUBLIC | ACC_STATIC,
        "roundTrip",
        "(I)I",
        2,
        2,
        round_trip,
        Vec::new(),
    );

    builder.build()
}

#[test]
fn instance_fields_round_trip_through_put_and_get() {
    let vm = common::test_vm(vec![("Box", fields_class())]);
    assert_eq!(
        expect_int(vm.invoke_static("Box", "roundTrip", "(I)I", vec![Value::Int(41)])),
        41
    );
}

fn dispatch_classes() -> Vec<(&'static str, Vec<u8>)> {
    let mut animal = ClassBuilder::new("Animal", Some("java/lang/Object"));
    animal.add_method(
        ACC_PUBLIC,
        "speak",
        "()I",
        1,
        1,
        vec![0x04, 0xac], // iconst_1; ireturn
        Vec::new(),
    );
    let speak_ref = animal.method_ref("Animal", "speak", "()I");
    let mut call = vec![0x2a, 0xb6];
    call.extend_from_slice(&b2(speak_ref));
    call.push(0xac);
    animal.add_method(
        ACC_PUBLIC | ACC_STATIC,
        "call",
        "(LAnimal;)I",
        1,
        1,
        call,
        Vec::new(),
    );

    let mut dog = ClassBuilder::new("Dog", Some("Animal"));
    dog.add_method(ACC_PUBLIC, "speak", "()I", 1, 1, vec![0x05, 0xac], Vec::new());

    vec![("Animal", animal.build()), ("Dog", dog.build())]
}

#[test]
fn invokevirtual_dispatches_on_runtime_class() {
    let vm = common::test_vm(dispatch_classes());
    let dog = Value::Instance(vm.new_instance(&vm.resolve_class("Dog").unwrap()).unwrap());
    let animal = Value::Instance(
        vm.new_instance(&vm.resolve_class("Animal").unwrap())
            .unwrap(),
    );
    assert_eq!(
        expect_int(vm.invoke_static("Animal", "call", "(LAnimal;)I", vec![dog])),
        2
    );
    assert_eq!(
        expect_int(vm.invoke_static("Animal", "call", "(LAnimal;)I", vec![animal])),
        1
    );
}

#[test]
fn invokevirtual_on_null_receiver_throws_npe() {
    let vm = common::test_vm(dispatch_classes());
    let result = vm.invoke_static("Animal", "call", "(LAnimal;)I", vec![Value::Null]);
    assert_eq!(
        thrown_class_name(&vm, result),
        "java/lang/NullPointerException"
    );
}

fn interface_classes() -> Vec<(&'static str, Vec<u8>)> {
    let mut iface = ClassBuilder::new("Iface", Some("java/lang/Object"));
    iface.set_access_flags(ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT);
    iface.add_abstract_method(ACC_PUBLIC, "f", "()I");
    iface.add_method(
        ACC_PUBLIC,
        "g",
        "()I",
        1,
        1,
        vec![0x07, 0xac], // iconst_4; ireturn
        Vec::new(),
    );

    let mut implementation = ClassBuilder::new("Impl", Some("java/lang/Object"));
    implementation.implement("Iface");
    implementation.add_method(
        ACC_PUBLIC,
        "f",
        "()I",
        1,
        1,
        vec![0x10, 9, 0xac],
        Vec::new(),
    );

    let mut caller = ClassBuilder::new("Caller", Some("java/lang/Object"));
    let f_ref = caller.interface_method_ref("Iface", "f", "()I");
    let g_ref = caller.interface_method_ref("Iface", "g", "()I");
    let mut call_f = vec![0x2a, 0xb9];
    call_f.extend_from_slice(&b2(f_ref));
    call_f.extend_from_slice(&[2, 0, 0xac]);
    caller.add_method(
        ACC_PUBLIC | ACC_STATIC,
        "callF",
        "(LIface;)I",
        1,
        1,
        call_f,
        Vec::new(),
    );
    let mut call_g = vec![0x2a, 0xb9];
    call_g.extend_from_slice(&b2(g_ref));
    call_g.extend_from_slice(&[2, 0, 0xac]);
    caller.add_method(
        ACC_PUBLIC | ACC_STATIC,
        "callG",
        "(LIface;)I",
        1,
        1,
        call_g,
        Vec::new(),
    );

    vec![
        ("Iface", iface.build()),
        ("Impl", implementation.build()),
        ("Caller", caller.build()),
    ]
}

#[test]
fn invokeinterface_dispatches_to_implementation() {
    let vm = common::test_vm(interface_classes());
    let instance = Value::Instance(vm.new_instance(&vm.resolve_class("Impl").unwrap()).unwrap());
    assert_eq!(
        expect_int(vm.invoke_static("Caller", "callF", "(LIface;)I", vec![instance])),
        9
    );
}

#[test]
fn invokeinterface_falls_back_to_default_method() {
    let vm = common::test_vm(interface_classes());
    let instance = Value::Instance(vm.new_instance(&vm.resolve_class("Impl").unwrap()).unwrap());
    assert_eq!(
        expect_int(vm.invoke_static("Caller", "callG", "(LIface;)I", vec![instance])),
        4
    );
}

fn counter_class() -> Vec<u8> {
    let mut builder = ClassBuilder::new("Counter", Some("java/lang/Object"));
    builder.add_field(ACC_PUBLIC | ACC_STATIC, "count", "I");
    let count_ref = builder.field_ref("Counter", "count", "I");

    let mut clinit = vec![0xb2];
    clinit.extend_from_slice(&b2(count_ref));
    clinit.extend_from_slice(&[0x04, 0x60, 0xb3]);
    clinit.extend_from_slice(&b2(count_ref));
    clinit.push(0xb1);
    builder.add_method(ACC_STATIC, "<clinit>", "()V", 2, 0, clinit, Vec::new());

    builder.add_method(
        ACC_PUBLIC | ACC_STATIC,
        "touch",
        "()V",
        1,
        0,
        vec![0xb1],
        Vec::new(),
    );
    builder.build()
}

#[test]
fn static_initializer_runs_exactly_once_across_threads() {
    let vm = common::test_vm(vec![("Counter", counter_class())]);
    let barrier = Arc::new(std::sync::Barrier::new(4));
    let mut handles = Vec::new();
    for i in 0..4 {
        let vm = Arc::clone(&vm);
        let barrier = Arc::clone(&barrier);
        handles.push(std::thread::spawn(move || {
            common::attach_thread(&vm, &format!("worker-{i}"));
            barrier.wait();
            matches!(
                vm.invoke_static("Counter", "touch", "()V", Vec::new()),
                ExecutionResult::Void
            )
        }));
    }
    for handle in handles {
        assert!(handle.join().unwrap());
    }

    let class = vm.resolve_class("Counter").unwrap();
    let key = FieldKey {
        name: vm.interner().get_or_intern("count"),
        desc: vm.interner().get_or_intern("I"),
    };
    assert_eq!(
        class.get_static_field(&key, vm.interner()).unwrap(),
        Value::Int(1)
    );
}

fn sync_class() -> Vec<u8> {
    let mut builder = ClassBuilder::new("Sync", Some("java/lang/Object"));
    builder.add_field(ACC_PUBLIC | ACC_STATIC, "value", "I");
    let value_ref = builder.field_ref("Sync", "value", "I");
    let inc_ref = builder.method_ref("Sync", "inc", "()V");

    let mut inc = vec![0xb2];
    inc.extend_from_slice(&b2(value_ref));
    inc.extend_from_slice(&[0x04, 0x60, 0xb3]);
    inc.extend_from_slice(&b2(value_ref));
    inc.push(0xb1);
    builder.add_method(
        ACC_PUBLIC | ACC_STATIC | ACC_SYNCHRONIZED,
        "inc",
        "()V",
        2,
        0,
        inc,
        Vec::new(),
    );

    let mut run = vec![0x03, 0x3b, 0x1a, 0x11];
    run.extend_from_slice(&10_000i16.to_be_bytes());
    run.push(0xa2);
    run.extend_from_slice(&12i16.to_be_bytes()); // if_icmpge -> 18
    run.push(0xb8);
    run.extend_from_slice(&b2(inc_ref));
    run.extend_from_slice(&[0x84, 0, 1]); // iinc 0, 1
    run.push(0xa7);
    run.extend_from_slice(&(-13i16).to_be_bytes()); // goto -> 2
    run.push(0xb1);
    builder.add_method(ACC_PUBLIC | ACC_STATIC, "run10k", "()V", 2, 1, run, Vec::new());

    builder.build()
}

#[test]
fn synchronized_increments_from_two_threads_total_correctly() {
    let vm = common::test_vm(vec![("Sync", sync_class())]);
    let mut handles = Vec::new();
    for i in 0..2 {
        let vm = Arc::clone(&vm);
        handles.push(std::thread::spawn(move || {
            common::attach_thread(&vm, &format!("incrementer-{i}"));
            matches!(
                vm.invoke_static("Sync", "run10k", "()V", Vec::new()),
                ExecutionResult::Void
            )
        }));
    }
    for handle in handles {
        assert!(handle.join().unwrap());
    }

    let class = vm.resolve_class("Sync").unwrap();
    let key = FieldKey {
        name: vm.interner().get_or_intern("value"),
        desc: vm.interner().get_or_intern("I"),
    };
    assert_eq!(
        class.get_static_field(&key, vm.interner()).unwrap(),
        Value::Int(20_000)
    );
}

fn monitor_class() -> Vec<u8> {
    let mut builder = ClassBuilder::new("Locks", Some("java/lang/Object"));
    builder.add_method(
        ACC_PUBLIC | ACC_STATIC,
        "lockAndAdd",
        "(Ljava/lang/Object;II)I",
        2,
        3,
        vec![0x2a, 0xc2, 0x1b, 0x1c, 0x60, 0x2a, 0xc3, 0xac],
        Vec::new(),
    );
    builder.build()
}

#[test]
fn monitorenter_and_exit_pair_in_bytecode() {
    let vm = common::test_vm(vec![("Locks", monitor_class())]);
    let object = Value::Instance(
        vm.new_instance(&vm.resolve_class("java/lang/Object").unwrap())
            .unwrap(),
    );
    assert_eq!(
        expect_int(vm.invoke_static(
            "Locks",
            "lockAndAdd",
            "(Ljava/lang/Object;II)I",
            vec![object, Value::Int(2), Value::Int(3)]
        )),
        5
    );
}

#[test]
fn unbounded_recursion_is_a_stack_overflow_error() {
    let mut builder = ClassBuilder::new("Rec", Some("java/lang/Object"));
    let rec_ref = builder.method_ref("Rec", "rec", "()V");
    let mut code = vec![0xb8];
    code.extend_from_slice(&b2(rec_ref));
    code.push(0xb1);
    builder.add_method(ACC_PUBLIC | ACC_STATIC, "rec", "()V", 1, 0, code, Vec::new());

    let vm = common::test_vm(vec![("Rec", builder.build())]);
    let result = vm.invoke_static("Rec", "rec", "()V", Vec::new());
    assert_eq!(
        thrown_class_name(&vm, result),
        "java/lang/StackOverflowError"
    );
}

#[test]
fn ldc_pushes_interned_strings_and_wide_constants() {
    let mut builder = ClassBuilder::new("Consts", Some("java/lang/Object"));
    let hi = builder.string_const("hi");
    let big = builder.long_const(1_234_567_890_123);

    builder.add_method(
        ACC_PUBLIC | ACC_STATIC,
        "greet",
        "()Ljava/lang/String;",
        1,
        0,
        vec![0x12, hi as u8, 0xb0],
        Vec::new(),
    );
    let mut answer = vec![0x14];
    answer.extend_from_slice(&b2(big));
    answer.push(0xad);
    builder.add_method(ACC_PUBLIC | ACC_STATIC, "answer", "()J", 2, 0, answer, Vec::new());

    let vm = common::test_vm(vec![("Consts", builder.build())]);
    let greeting = expect_return(vm.invoke_static("Consts", "greet", "()Ljava/lang/String;", Vec::new()));
    assert_eq!(vm.read_string(&greeting).unwrap(), "hi");
    // ldc of a string constant yields the interned instance.
    let canonical = vm.intern_string("hi").unwrap();
    assert!(Value::same_ref(&greeting, &canonical));

    let answer = expect_return(vm.invoke_static("Consts", "answer", "()J", Vec::new()));
    assert_eq!(answer.as_long().unwrap(), 1_234_567_890_123);
}

#[test]
fn wide_iinc_reaches_two_byte_operands() {
    let mut builder = ClassBuilder::new("Wide", Some("java/lang/Object"));
    builder.add_method(
        ACC_PUBLIC | ACC_STATIC,
        "bump",
        "()I",
        1,
        1,
        vec![0x03, 0x3b, 0xc4, 0x84, 0, 0, 0x01, 0x2c, 0x1a, 0xac],
        Vec::new(),
    );
    let vm = common::test_vm(vec![("Wide", builder.build())]);
    assert_eq!(expect_int(vm.invoke_static("Wide", "bump", "()I", Vec::new())), 300);
}

#[test]
fn string_interning_is_by_utf16_value() {
    let vm = common::test_vm(Vec::new());
    let a = vm.intern_string("hello").unwrap();
    let b = vm.intern_string("hello").unwrap();
    assert!(Value::same_ref(&a, &b));

    let fresh = vm.alloc_string("hello").unwrap();
    assert!(!Value::same_ref(&a, &fresh));
    let canonical = vm.intern_existing(&fresh).unwrap();
    assert!(Value::same_ref(&a, &canonical));

    let other = vm.intern_string("world").unwrap();
    assert!(!Value::same_ref(&a, &other));
}

#[test]
fn class_resolution_is_cached_and_reset_clears_it() {
    let vm = common::test_vm(vec![("T", arithmetic_class())]);
    let first = vm.resolve_class("T").unwrap();
    let second = vm.resolve_class("T").unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    vm.reset_execution();
    common::attach_thread(&vm, "main");
    let third = vm.resolve_class("T").unwrap();
    assert!(!Arc::ptr_eq(&first, &third));
}

#[test]
fn invoke_main_builds_the_argument_array() {
    let mut builder = ClassBuilder::new("Main", Some("java/lang/Object"));
    // return args.length via main? main is void; store nothing: just return.
    builder.add_method(
        ACC_PUBLIC | ACC_STATIC,
        "main",
        "([Ljava/lang/String;)V",
        1,
        1,
        vec![0xb1],
        Vec::new(),
    );
    let vm = common::test_vm(vec![("Main", builder.build())]);
    let result = vm.invoke_main("Main", &["one".to_owned(), "two".to_owned()]);
    assert!(matches!(result, ExecutionResult::Void));
}
