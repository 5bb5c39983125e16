/*!
## Rust Machine Module

This Rust module is the bytecode format and the virtual machine that runs
compiled NPC scripts cooperatively for a host.

*/

pub mod code;

mod actor;
mod bridge;
mod builtins;
mod config;
mod function;
mod interp;
mod opcode;
mod operation;
mod runtime;
mod script;
mod stack;
mod state;
mod val;
mod var;

pub use actor::{AccountId, Actor, Dialog, Reply, Wait};
pub use bridge::{str_to_int, Bridge};
pub use code::{Code, NEXT_LINE};
pub use config::Config;
pub use function::{ArgType, Function, Handler};
pub use opcode::Opcode;
pub use operation::Operation;
pub use runtime::{AccountVars, Event, Runtime, Status};
pub use script::Script;
pub use stack::Stack;
pub use state::{ActorId, Backup, EntityId, InstanceId, RunState, ScriptState};
pub use val::{Ref, RetInfo, Scope, Store, Val};
pub use var::{Class, Var, VarId, MAX_ARRAY_SIZE};
