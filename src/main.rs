//! # npcscript
//!
//! Runs one NPC script file at the console, answering its dialogs as the
//! attached actor.
//!

mod term;

fn main() {
    term::main();
}
