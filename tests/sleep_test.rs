mod common;
use common::*;

#[test]
fn test_sleep_wakes_on_timer() {
    let mut r = runtime();
    assert_eq!(exec_detached(&mut r, "{ $a = 1; sleep 100; $a = 2; }"), "");
    assert_eq!(r.sleeping(), 1);
    assert_eq!(int(&mut r, "$a"), 1);
    r.run_timers(50);
    assert_eq!(r.sleeping(), 1);
    assert_eq!(render(&mut r), "");
    r.run_timers(100);
    assert_eq!(r.sleeping(), 0);
    assert_eq!(render(&mut r), "[end]\n");
    assert_eq!(int(&mut r, "$a"), 2);
    assert_eq!(r.tick(), 100);
}

#[test]
fn test_sleep_detaches_actor() {
    let mut r = runtime();
    assert_eq!(exec(&mut r, "{ mes \"a\"; sleep 10; mes \"b\"; }"), "a\n");
    assert!(!r.actor(PLAYER).unwrap().has_script());
    r.run_timers(10);
    assert_eq!(render(&mut r), "[failed]\n");
}

#[test]
fn test_sleep2_keeps_actor() {
    let mut r = runtime();
    assert_eq!(
        exec(&mut r, "{ @a = 1; sleep2 100; @a = 2; mes \"awake\"; }"),
        ""
    );
    r.run_timers(99);
    assert_eq!(int(&mut r, "@a"), 1);
    r.run_timers(100);
    assert_eq!(render(&mut r), "awake\n[end]\n");
    assert_eq!(int(&mut r, "@a"), 2);
}

#[test]
fn test_sleep2_actor_gone() {
    let mut r = runtime();
    exec(&mut r, "{ sleep2 10; mes \"late\"; }");
    r.remove_actor(PLAYER);
    r.run_timers(10);
    assert_eq!(render(&mut r), "[cancelled]\n");
    assert_eq!(r.sleeping(), 0);
}

#[test]
fn test_sleep_inside_loop() {
    let mut r = runtime();
    exec_detached(
        &mut r,
        "{ for ($i = 0; $i < 3; $i++) { sleep 10; $ticks++; } }",
    );
    for now in 1..=3 {
        r.run_timers(now * 10);
        assert_eq!(int(&mut r, "$ticks"), now as i32);
    }
    assert_eq!(render(&mut r), "[end]\n");
}

#[test]
fn test_timers_run_in_order() {
    let mut r = runtime();
    exec_detached(&mut r, "{ sleep 30; $order = $order * 10 + 1; }");
    exec_detached(&mut r, "{ sleep 10; $order = $order * 10 + 2; }");
    r.run_timers(30);
    assert_eq!(int(&mut r, "$order"), 21);
}

#[test]
fn test_non_positive_sleep() {
    let mut r = runtime();
    assert_eq!(exec_detached(&mut r, "{ sleep 0; $z = 1; }"), "[end]\n");
    assert_eq!(int(&mut r, "$z"), 1);
    assert_eq!(r.sleeping(), 0);
}

#[test]
fn test_stop_sleep_timers() {
    let mut r = runtime();
    let script = compile(&mut r, "{ sleep 100; $woke++; }");
    r.run(&script, 0, None, NPC).unwrap();
    r.run(&script, 0, None, NPC).unwrap();
    r.run(&script, 0, None, 200).unwrap();
    assert_eq!(r.sleeping(), 3);
    assert_eq!(r.stop_sleep_timers(NPC), 2);
    assert_eq!(render(&mut r), "[cancelled]\n[cancelled]\n");
    r.run_timers(100);
    assert_eq!(render(&mut r), "[end]\n");
    assert_eq!(int(&mut r, "$woke"), 1);
}

#[test]
fn test_shutdown() {
    let mut r = runtime();
    exec_detached(&mut r, "{ sleep 100; $woke = 1; }");
    exec(&mut r, "{ mes \"a\"; next; }");
    r.shutdown();
    assert_eq!(r.sleeping(), 0);
    assert_eq!(r.actor(PLAYER).unwrap().waiting(), None);
    r.run_timers(1000);
    assert_eq!(render(&mut r), "");
    assert_eq!(int(&mut r, "$woke"), 0);
}
