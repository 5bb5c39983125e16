mod common;
use common::*;
use npcscript::lang::ErrorCode;
use npcscript::mach::{Config, Runtime};

fn compile_error(r: &mut Runtime, source: &str) -> npcscript::lang::Error {
    match r.compile(source, "test.txt", 1) {
        Err(e) => e,
        Ok(_) => panic!("expected a compile error for {}", source),
    }
}

#[test]
fn test_empty_script() {
    let mut r = runtime();
    assert!(r.compile("{ }", "test.txt", 1).unwrap().is_none());
    assert_eq!(exec(&mut r, "{\n}"), "?EMPTY\n");
}

#[test]
fn test_comments() {
    let mut r = runtime();
    assert_eq!(
        exec(
            &mut r,
            "{ // line comment\n mes \"a\"; /* block\n   comment */ mes \"b\"; }"
        ),
        "a\nb\n[end]\n"
    );
}

#[test]
fn test_undefined_label() {
    let mut r = runtime();
    let e = compile_error(&mut r, "{ goto L_Nowhere; }");
    assert!(e.is(ErrorCode::UndefinedLabel), "{}", e);
}

#[test]
fn test_duplicate_label() {
    let mut r = runtime();
    let e = compile_error(&mut r, "{ L_A: end; L_A: end; }");
    assert!(e.is(ErrorCode::DuplicateLabel), "{}", e);
}

#[test]
fn test_labels_are_per_script() {
    let mut r = runtime();
    compile(&mut r, "{ L_A: end; }");
    let e = compile_error(&mut r, "{ goto L_A; }");
    assert!(e.is(ErrorCode::UndefinedLabel), "{}", e);
}

#[test]
fn test_duplicate_case() {
    let mut r = runtime();
    let e = compile_error(
        &mut r,
        "{ switch (@x) {\n case 1: end;\n case 1: end;\n } }",
    );
    assert!(e.is(ErrorCode::DuplicateCase), "{}", e);
}

#[test]
fn test_unexpected_break() {
    let mut r = runtime();
    let e = compile_error(&mut r, "{ break; }");
    assert!(e.is(ErrorCode::UnexpectedBreak), "{}", e);
}

#[test]
fn test_unresolved_function() {
    let mut r = runtime();
    let e = compile_error(&mut r, "{ function F; F(); }");
    assert!(e.is(ErrorCode::UnresolvedFunction), "{}", e);
}

#[test]
fn test_error_position() {
    let mut r = runtime();
    let e = compile_error(&mut r, "{\n  mes \"a\";\n  goto L_Nowhere;\n}");
    assert_eq!(e.line(), Some(3));
    assert!(e.to_string().starts_with("UNDEFINED LABEL IN 3:"), "{}", e);
}

#[test]
fn test_missing_arguments() {
    let mut r = runtime();
    let e = compile_error(&mut r, "{ mes; }");
    assert!(e.is(ErrorCode::SyntaxError), "{}", e);
    let mut r = Runtime::with_config(Config {
        warn_func_mismatch_paramnum: false,
        ..Config::default()
    });
    assert!(r.compile("{ mes; }", "test.txt", 1).is_ok());
}

#[test]
fn test_constant_is_not_assignable() {
    let mut r = runtime();
    r.load_constants("MAX_LEVEL,99");
    assert!(r.compile("{ MAX_LEVEL = 5; }", "test.txt", 1).is_err());
}

#[test]
fn test_listing() {
    let mut r = runtime();
    let script = compile(&mut r, "{ mes \"hi\"; }");
    let listing = script.listing();
    assert!(listing.contains("STR \"hi\""), "{}", listing);
    assert!(listing.contains("EOL"), "{}", listing);
}

#[test]
fn test_event_labels() {
    let mut r = runtime();
    let script = compile(
        &mut r,
        "{ end;\nOnInit:\n $init = 1; end;\nOnTimer1000:\n $timer = 1; end;\nL_Private:\n end; }",
    );
    assert!(script.label("OnInit").is_some());
    assert!(script.label("OnTimer1000").is_some());
    assert_eq!(script.label("L_Private"), None);
    assert!(r.run_event(&script, "OnInit", None, NPC).unwrap());
    assert!(!r.run_event(&script, "OnMissing", None, NPC).unwrap());
    assert_eq!(render(&mut r), "[end]\n");
    assert_eq!(int(&mut r, "$init"), 1);
    assert_eq!(int(&mut r, "$timer"), 0);
}

#[test]
fn test_bare_source() {
    use npcscript::lang::CompileOptions;
    let mut r = runtime();
    let options = CompileOptions {
        ignore_external_braces: true,
        ..CompileOptions::default()
    };
    let script = r
        .compile_with("mes \"bare\";\nclose;", "test.txt", 1, options)
        .unwrap()
        .unwrap();
    r.run(&script, 0, Some(PLAYER), NPC).unwrap();
    assert_eq!(render(&mut r), "bare\n[close]\n[closed]\n");
}

#[test]
fn test_start_outside_script() {
    let mut r = runtime();
    let script = compile(&mut r, "{ end; }");
    assert!(r.run(&script, 10_000, None, NPC).is_err());
}
