//! # NPC Script
//!
//! An embedded scripting engine for game-server NPCs: a single pass
//! compiler from C-like script source to compact bytecode, and a stack
//! virtual machine that runs it cooperatively inside the host's loop.
//!
//! A script that asks its actor something, or sleeps, is parked and picks
//! up where it left off when the host answers.
//! ```
//! use npcscript::mach::{Event, Runtime};
//!
//! let mut rt = Runtime::new();
//! rt.add_actor(1, 1);
//! let script = rt
//!     .compile("{ mes \"Hello\"; next; mes \"Bye\"; close; }", "hello.txt", 1)
//!     .unwrap()
//!     .unwrap();
//! rt.run(&script, 0, Some(1), 100).unwrap();
//! assert_eq!(rt.events()[0], Event::Message { actor: 1, text: "Hello".into() });
//! rt.next(1).unwrap();
//! ```
//!
//! Hosts add their own commands with
//! [`Runtime::register`](mach::Runtime::register).

pub mod lang;
pub mod mach;
