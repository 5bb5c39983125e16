mod common;
use common::*;

#[test]
fn test_callsub_recursion() {
    let mut r = runtime();
    exec(
        &mut r,
        "{\n @r = callsub(L_Fact, 10);\n end;\nL_Fact:\n if (getarg(0) <= 1) return 1;\n return getarg(0) * callsub(L_Fact, getarg(0) - 1);\n}",
    );
    assert_eq!(int(&mut r, "@r"), 3628800);
}

#[test]
fn test_callsub_statement() {
    let mut r = runtime();
    assert_eq!(
        exec(
            &mut r,
            "{ callsub L_Greet, \"Novice\"; mes \"back\"; end;\nL_Greet:\n mes \"Hi \" + getarg(0) + \" (\" + getargcount() + \")\"; return; }"
        ),
        "Hi Novice (1)\nback\n[end]\n"
    );
}

#[test]
fn test_getarg_default() {
    let mut r = runtime();
    exec(
        &mut r,
        "{ @a = callsub(L_Opt, 5); @b = callsub(L_Opt); end;\nL_Opt:\n return getarg(0, 42);\n}",
    );
    assert_eq!(int(&mut r, "@a"), 5);
    assert_eq!(int(&mut r, "@b"), 42);
}

#[test]
fn test_getarg_out_of_range() {
    let mut r = runtime();
    assert_eq!(
        exec(&mut r, "{ callsub L_Bad; end;\nL_Bad:\n @x = getarg(3); return; }"),
        "[failed]\n"
    );
    assert_eq!(exec(&mut r, "{ @x = getarg(0); }"), "[failed]\n");
}

#[test]
fn test_return_outside_call() {
    let mut r = runtime();
    assert_eq!(exec(&mut r, "{ return; }"), "[failed]\n");
}

#[test]
fn test_scope_per_frame() {
    let mut r = runtime();
    exec(
        &mut r,
        "{ .@a = 5; callsub L_Sub; @outer = .@a; end;\nL_Sub:\n @before = .@a; .@a = 99; @inner = .@a; return; }",
    );
    assert_eq!(int(&mut r, "@outer"), 5);
    assert_eq!(int(&mut r, "@before"), 0);
    assert_eq!(int(&mut r, "@inner"), 99);
}

#[test]
fn test_reference_argument() {
    let mut r = runtime();
    exec(
        &mut r,
        "{ .@v = 1; callsub L_Set, .@v; @got = .@v; end;\nL_Set:\n set getarg(0), getarg(0) + 6; return; }",
    );
    assert_eq!(int(&mut r, "@got"), 7);
}

#[test]
fn test_user_function() {
    let mut r = runtime();
    assert_eq!(
        exec(
            &mut r,
            "{\n function Add;\n @x = Add(2, 3);\n mes \"sum \" + @x;\n end;\n function Add {\n  return getarg(0) + getarg(1);\n }\n}"
        ),
        "sum 5\n[end]\n"
    );
}

#[test]
fn test_user_function_defined_first() {
    let mut r = runtime();
    exec(
        &mut r,
        "{\n function Twice {\n  return getarg(0) * 2;\n }\n @x = Twice(Twice(3));\n}",
    );
    assert_eq!(int(&mut r, "@x"), 12);
}

#[test]
fn test_user_function_falls_off_end() {
    let mut r = runtime();
    assert_eq!(
        exec(
            &mut r,
            "{\n function Hello {\n  mes \"hello\";\n }\n Hello();\n Hello();\n mes \"done\";\n}"
        ),
        "hello\nhello\ndone\n[end]\n"
    );
}

#[test]
fn test_callfunc() {
    let mut r = runtime();
    let double = compile(&mut r, "{ .calls += 1; return getarg(0) * 2; }");
    r.add_function("Double", double);
    exec(
        &mut r,
        "{ @y = callfunc(\"Double\", 21); @z = Double(4); }",
    );
    assert_eq!(int(&mut r, "@y"), 42);
    assert_eq!(int(&mut r, "@z"), 8);
}

#[test]
fn test_callfunc_script_variables() {
    let mut r = runtime();
    let counter = compile(&mut r, "{ .count += 1; return .count; }");
    r.add_function("Counter", counter);
    exec(
        &mut r,
        "{ .count = 100; @a = Counter(); @b = Counter(); @local = .count; }",
    );
    assert_eq!(int(&mut r, "@a"), 1);
    assert_eq!(int(&mut r, "@b"), 2);
    assert_eq!(int(&mut r, "@local"), 100);
}

#[test]
fn test_callfunc_missing() {
    let mut r = runtime();
    assert_eq!(
        exec(&mut r, "{ callfunc \"Nowhere\"; mes \"unreached\"; }"),
        "[failed]\n"
    );
}

#[test]
fn test_host_command() {
    let mut r = runtime();
    r.register("double", "i", |b| {
        let n = b.int(0)?;
        b.push_int(n * 2)
    })
    .unwrap();
    r.register("refuse", "", |b| Err(b.fail("not today"))).unwrap();
    exec(&mut r, "{ @x = double(21); }");
    assert_eq!(int(&mut r, "@x"), 42);
    assert_eq!(exec(&mut r, "{ refuse; mes \"unreached\"; }"), "[failed]\n");
}

#[test]
fn test_host_command_sees_actor() {
    let mut r = runtime();
    r.register("whoami", "", |b| {
        let id = b.require_actor()?;
        b.push_int(id as i32)
    })
    .unwrap();
    exec(&mut r, "{ @me = whoami(); }");
    assert_eq!(int(&mut r, "@me"), PLAYER as i32);
    assert_eq!(exec_detached(&mut r, "{ $x = whoami(); }"), "[failed]\n");
}
