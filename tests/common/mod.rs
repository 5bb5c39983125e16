#![allow(dead_code)]
use npcscript::mach::{Event, Runtime, Script, Status, Val};
use std::rc::Rc;

pub const PLAYER: u32 = 1;
pub const ACCOUNT: u32 = 10;
pub const NPC: u32 = 100;

/// A runtime with one actor online.
pub fn runtime() -> Runtime {
    let mut r = Runtime::default();
    r.seed(7);
    r.add_actor(PLAYER, ACCOUNT);
    r
}

pub fn compile(r: &mut Runtime, source: &str) -> Rc<Script> {
    match r.compile(source, "test.txt", 1) {
        Ok(Some(script)) => script,
        Ok(None) => panic!("empty script"),
        Err(e) => panic!("{}", e),
    }
}

/// Compiles `source` and runs it for the player, returning what the
/// player saw.
pub fn exec(r: &mut Runtime, source: &str) -> String {
    let script = match r.compile(source, "test.txt", 1) {
        Ok(Some(script)) => script,
        Ok(None) => return "?EMPTY\n".to_string(),
        Err(e) => return format!("?{}\n", e),
    };
    if let Err(e) = r.run(&script, 0, Some(PLAYER), NPC) {
        return format!("?{}\n", e);
    }
    render(r)
}

/// Same as [`exec`] with no actor attached.
pub fn exec_detached(r: &mut Runtime, source: &str) -> String {
    let script = compile(r, source);
    if let Err(e) = r.run(&script, 0, None, NPC) {
        return format!("?{}\n", e);
    }
    render(r)
}

/// One line per event.
pub fn render(r: &mut Runtime) -> String {
    let mut s = String::new();
    for event in r.events() {
        match event {
            Event::Message { text, .. } => s.push_str(&format!("{}\n", text)),
            Event::Next { .. } => s.push_str("[next]\n"),
            Event::Close { .. } => s.push_str("[close]\n"),
            Event::Menu { options, .. } => s.push_str(&format!("[menu {}]\n", options.join("|"))),
            Event::Input { text, .. } => {
                s.push_str(if text { "[input$]\n" } else { "[input]\n" })
            }
            Event::Debug { text, .. } => s.push_str(&format!("[debug {}]\n", text)),
            Event::Finished { status, .. } => s.push_str(match status {
                Status::Ended => "[end]\n",
                Status::Closed => "[closed]\n",
                Status::Failed => "[failed]\n",
                Status::Cancelled => "[cancelled]\n",
            }),
        }
    }
    s
}

pub fn int(r: &mut Runtime, name: &str) -> i32 {
    match r.variable(Some(PLAYER), name) {
        Ok(Val::Int(n)) => n,
        other => panic!("{} is not an int: {:?}", name, other),
    }
}

pub fn string(r: &mut Runtime, name: &str) -> String {
    match r.variable(Some(PLAYER), name) {
        Ok(Val::Str(s)) => s,
        other => panic!("{} is not a string: {:?}", name, other),
    }
}
