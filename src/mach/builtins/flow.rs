use super::{Command, Result};
use crate::mach::{Bridge, Class, Ref, RetInfo, RunState, Store, Val, Var, VarId};
use std::cell::RefCell;
use std::rc::Rc;

pub const COMMANDS: &[Command] = &[
    ("set", "rv", set),
    ("getelementofarray", "ri", getelementofarray),
    ("goto", "l", goto),
    ("jump_zero", "il", jump_zero),
    ("end", "", end),
    ("callsub", "l*", callsub),
    ("callfunc", "s*", callfunc),
    ("getarg", "i?", getarg),
    ("getargcount", "", getargcount),
    ("return", "?", return_),
    ("freeloop", "?", freeloop),
];

fn set(b: &mut Bridge) -> Result<()> {
    let r = b.reference(0)?;
    let val = b.arg(1)?;
    b.set_var(&r, val.clone())?;
    b.push(val)
}

fn getelementofarray(b: &mut Bridge) -> Result<()> {
    let r = b.reference(0)?;
    let index = b.int(1)?;
    let id = VarId::element(r.id.symbol, index)?;
    b.push(Val::Ref(Ref { id, store: r.store }))
}

fn goto(b: &mut Bridge) -> Result<()> {
    let pos = b.label(0)?;
    b.jump(pos);
    Ok(())
}

fn jump_zero(b: &mut Bridge) -> Result<()> {
    if b.int(0)? == 0 {
        let pos = b.label(1)?;
        b.jump(pos);
    }
    Ok(())
}

fn end(b: &mut Bridge) -> Result<()> {
    b.end();
    Ok(())
}

/// Pushes the call's arguments for the callee. References to the
/// caller's frame keep pointing there once the frame is swapped out.
fn push_frame(b: &mut Bridge, bind_script: bool) -> Result<()> {
    let count = b.arg_count();
    for i in 1..count {
        let mut val = match b.arg_raw(i) {
            Some(v) => v.clone(),
            None => Val::Nil,
        };
        if let Val::Ref(r) = &mut val {
            if r.store.is_none() {
                match Class::of(b.var_name(r)) {
                    Class::Scope => r.store = Some(Store::Scope(Rc::clone(&b.st.scope))),
                    Class::Script if bind_script => {
                        r.store = Some(Store::Script(Rc::clone(&b.st.script)))
                    }
                    _ => {}
                }
            }
        }
        b.push(val)?;
    }
    let nargs = count.saturating_sub(1);
    let info = RetInfo {
        script: Rc::clone(&b.st.script),
        pos: b.st.pos,
        nargs,
        scope: Rc::clone(&b.st.scope),
        defsp: b.st.defsp,
    };
    b.push(Val::RetInfo(Box::new(info)))?;
    b.st.defsp = b.st.stack.len();
    b.st.scope = Rc::new(RefCell::new(Var::new()));
    Ok(())
}

fn callsub(b: &mut Bridge) -> Result<()> {
    let pos = b.label(0)?;
    push_frame(b, false)?;
    b.jump(pos);
    Ok(())
}

fn callfunc(b: &mut Bridge) -> Result<()> {
    let name = b.str(0)?;
    let script = match b.rt.function(&name) {
        Some(script) => script,
        None => return Err(b.fail(&format!("function '{}' not found", name))),
    };
    push_frame(b, true)?;
    b.st.script = script;
    b.jump(0);
    Ok(())
}

fn frame(b: &Bridge) -> Option<RetInfo> {
    let at = b.st.defsp.checked_sub(1)?;
    match b.st.stack.get(at) {
        Some(Val::RetInfo(info)) => Some(info.as_ref().clone()),
        _ => None,
    }
}

fn getarg(b: &mut Bridge) -> Result<()> {
    let info = match frame(b) {
        Some(info) => info,
        None => return Err(b.fail("used outside of a function or subroutine")),
    };
    let n = b.int(0)?;
    if n >= 0 && (n as usize) < info.nargs {
        let at = b.st.defsp - 1 - info.nargs + n as usize;
        let val = match b.st.stack.get(at) {
            Some(v) => v.clone(),
            None => Val::Nil,
        };
        b.push(val)
    } else if b.has_arg(1) {
        let val = b.arg(1)?;
        b.push(val)
    } else {
        Err(b.fail(&format!(
            "index {} out of range ({} arguments)",
            n, info.nargs
        )))
    }
}

fn getargcount(b: &mut Bridge) -> Result<()> {
    match frame(b) {
        Some(info) => b.push_int(info.nargs as i32),
        None => Err(b.fail("used outside of a function or subroutine")),
    }
}

/// The value is read before the frame goes away.
fn return_(b: &mut Bridge) -> Result<()> {
    if b.has_arg(0) {
        let val = b.arg(0)?;
        b.push(val)?;
    } else {
        b.push_nil()?;
    }
    b.st.state = RunState::Return;
    Ok(())
}

fn freeloop(b: &mut Bridge) -> Result<()> {
    if b.has_arg(0) {
        b.st.freeloop = b.int(0)? != 0;
    }
    let flag = b.st.freeloop as i32;
    b.push_int(flag)
}
