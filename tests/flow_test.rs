mod common;
use common::*;
use npcscript::mach::Val;

#[test]
fn test_if_else() {
    let mut r = runtime();
    let source = "{ if (@x == 1) mes \"one\"; else if (@x == 2) mes \"two\"; else mes \"many\"; mes \"done\"; }";
    r.set_variable(Some(PLAYER), "@x", Val::Int(2)).unwrap();
    assert_eq!(exec(&mut r, source), "two\ndone\n[end]\n");
    r.set_variable(Some(PLAYER), "@x", Val::Int(1)).unwrap();
    assert_eq!(exec(&mut r, source), "one\ndone\n[end]\n");
    r.set_variable(Some(PLAYER), "@x", Val::Int(9)).unwrap();
    assert_eq!(exec(&mut r, source), "many\ndone\n[end]\n");
}

#[test]
fn test_if_block() {
    let mut r = runtime();
    assert_eq!(
        exec(
            &mut r,
            "{ @a = 3; if (@a > 2) { mes \"big\"; @a = 0; } else { mes \"small\"; } mes \"a=\" + @a; }"
        ),
        "big\na=0\n[end]\n"
    );
}

#[test]
fn test_while() {
    let mut r = runtime();
    exec(&mut r, "{ set @i, 0; while (@i < 3) { @sum = @sum + @i; @i++; } }");
    assert_eq!(int(&mut r, "@sum"), 3);
    assert_eq!(int(&mut r, "@i"), 3);
}

#[test]
fn test_for() {
    let mut r = runtime();
    exec(&mut r, "{ for (@i = 0; @i < 5; @i++) @t += @i; }");
    assert_eq!(int(&mut r, "@t"), 10);
    exec(&mut r, "{ for (; @j < 3;) @j++; }");
    assert_eq!(int(&mut r, "@j"), 3);
    exec(&mut r, "{ for (@k = 0; ; @k++) { if (@k == 4) break; } }");
    assert_eq!(int(&mut r, "@k"), 4);
}

#[test]
fn test_do_while_continue() {
    let mut r = runtime();
    exec(
        &mut r,
        "{ do { @n++; if (@n % 2) continue; @even++; } while (@n < 6); }",
    );
    assert_eq!(int(&mut r, "@n"), 6);
    assert_eq!(int(&mut r, "@even"), 3);
}

#[test]
fn test_nested_loops() {
    let mut r = runtime();
    exec(
        &mut r,
        "{ for (@i = 0; @i < 3; @i++) { for (@j = 0; @j < 10; @j++) { if (@j == 2) break; @count++; } } }",
    );
    assert_eq!(int(&mut r, "@count"), 6);
}

#[test]
fn test_switch() {
    let mut r = runtime();
    let source = "{\n switch (@v) {\n case 1:\n  mes \"one\";\n  break;\n case 2:\n  mes \"two\";\n case 3:\n  mes \"three\";\n  break;\n default:\n  mes \"other\";\n }\n mes \"after\";\n}";
    r.set_variable(Some(PLAYER), "@v", Val::Int(2)).unwrap();
    assert_eq!(exec(&mut r, source), "two\nthree\nafter\n[end]\n");
    r.set_variable(Some(PLAYER), "@v", Val::Int(1)).unwrap();
    assert_eq!(exec(&mut r, source), "one\nafter\n[end]\n");
    r.set_variable(Some(PLAYER), "@v", Val::Int(9)).unwrap();
    assert_eq!(exec(&mut r, source), "other\nafter\n[end]\n");
}

#[test]
fn test_switch_without_default() {
    let mut r = runtime();
    let source = "{ switch (@v) { case 1: mes \"one\"; } mes \"after\"; }";
    assert_eq!(exec(&mut r, source), "after\n[end]\n");
}

#[test]
fn test_switch_inside_loop() {
    let mut r = runtime();
    exec(
        &mut r,
        "{ for (@i = 0; @i < 4; @i++) { switch (@i) { case 1: continue; case 2: @two++; break; } @seen++; } }",
    );
    assert_eq!(int(&mut r, "@two"), 1);
    assert_eq!(int(&mut r, "@seen"), 3);
}

#[test]
fn test_goto() {
    let mut r = runtime();
    assert_eq!(
        exec(
            &mut r,
            "{ goto L_Skip; mes \"skipped\"; L_Skip: mes \"landed\"; end; mes \"unreached\"; }"
        ),
        "landed\n[end]\n"
    );
    exec(
        &mut r,
        "{ L_Loop: @n++; if (@n < 5) goto L_Loop; }",
    );
    assert_eq!(int(&mut r, "@n"), 5);
}

#[test]
fn test_end_in_nested_block() {
    let mut r = runtime();
    assert_eq!(
        exec(&mut r, "{ while (1) { mes \"once\"; end; } }"),
        "once\n[end]\n"
    );
}

#[test]
fn test_stack_is_balanced() {
    let mut r = runtime();
    r.register("stackdepth", "", |b| {
        let n = b.state().stack.len();
        b.push_int(n as i32)
    })
    .unwrap();
    exec(
        &mut r,
        "{ @d0 = stackdepth(); for (@i = 0; @i < 10; @i++) { @t = @t + callsub(L_F, @i); if (@i % 2) mes \"x\" + @i; } @d1 = stackdepth(); end;\nL_F:\n return getarg(0);\n}",
    );
    assert_eq!(int(&mut r, "@t"), 45);
    assert_eq!(int(&mut r, "@d0"), int(&mut r, "@d1"));
}
