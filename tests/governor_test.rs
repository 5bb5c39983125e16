mod common;
use common::*;
use npcscript::mach::{Config, Runtime};

#[test]
fn test_infinite_loop_fails() {
    let mut r = runtime();
    assert_eq!(exec(&mut r, "{ while (1) @x++; }"), "[failed]\n");
    assert_eq!(exec(&mut r, "{ L_Top: goto L_Top; }"), "[failed]\n");
}

#[test]
fn test_long_loop_fails_without_freeloop() {
    let mut r = runtime();
    assert_eq!(
        exec(&mut r, "{ while (@i < 5000) @i++; mes \"done\"; }"),
        "[failed]\n"
    );
}

#[test]
fn test_freeloop() {
    let mut r = runtime();
    assert_eq!(
        exec(
            &mut r,
            "{ freeloop(1); while (@i < 5000) @i++; @was = freeloop(); freeloop(0); mes \"done\"; }"
        ),
        "done\n[end]\n"
    );
    assert_eq!(int(&mut r, "@i"), 5000);
    assert_eq!(int(&mut r, "@was"), 1);
}

#[test]
fn test_counters_reset_when_resumed() {
    let mut r = runtime();
    exec(
        &mut r,
        "{ for (@i = 0; @i < 3; @i++) { for (@j = 0; @j < 500; @j++) @n++; next; } }",
    );
    r.next(PLAYER).unwrap();
    r.next(PLAYER).unwrap();
    r.next(PLAYER).unwrap();
    assert_eq!(render(&mut r), "[next]\n[next]\n[end]\n");
    assert_eq!(int(&mut r, "@n"), 1500);
}

#[test]
fn test_run_trusted() {
    let mut r = runtime();
    let script = compile(&mut r, "{ while (@i < 5000) @i++; }");
    r.run_trusted(&script, 0, Some(PLAYER), NPC).unwrap();
    assert_eq!(render(&mut r), "[end]\n");
    assert_eq!(int(&mut r, "@i"), 5000);
}

#[test]
fn test_governors_disabled() {
    let mut r = Runtime::with_config(Config {
        check_cmdcount: 0,
        check_gotocount: 0,
        ..Config::default()
    });
    r.add_actor(PLAYER, ACCOUNT);
    assert_eq!(exec(&mut r, "{ while (@i < 20000) @i++; }"), "[end]\n");
    assert_eq!(int(&mut r, "@i"), 20000);
}

#[test]
fn test_fatal_type_mismatch() {
    let mut r = runtime();
    assert_eq!(exec(&mut r, "{ mes 5; }"), "5\n[end]\n");
    let mut r = Runtime::with_config(Config {
        argtype_mismatch_fatal: true,
        ..Config::default()
    });
    r.add_actor(PLAYER, ACCOUNT);
    assert_eq!(exec(&mut r, "{ mes 5; }"), "[failed]\n");
}
