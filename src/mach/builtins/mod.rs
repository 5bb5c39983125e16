/*!
## Language built-ins

Commands every script can use regardless of host. Hosts add their own
through [`Runtime::register`](super::Runtime::register).

*/

use super::{Bridge, Runtime};
use crate::lang::Error;

type Result<T> = std::result::Result<T, Error>;

mod data;
mod dialog;
mod flow;

/// Name, signature and handler of one command.
type Command = (&'static str, &'static str, fn(&mut Bridge) -> Result<()>);

pub fn install(rt: &mut Runtime) -> Result<()> {
    for (name, signature, handler) in flow::COMMANDS
        .iter()
        .chain(dialog::COMMANDS)
        .chain(data::COMMANDS)
    {
        rt.register(name, signature, *handler)?;
    }
    Ok(())
}
