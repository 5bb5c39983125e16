use super::{Command, Result};
use crate::mach::bridge::str_to_int;
use crate::mach::{Bridge, Event, Ref, Reply, Val, VarId, Wait, NEXT_LINE};

pub const COMMANDS: &[Command] = &[
    ("mes", "s*", mes),
    ("next", "", next),
    ("close", "", close),
    ("close2", "", close2),
    ("menu", "sl*", menu),
    ("select", "s*", select),
    ("prompt", "s*", prompt),
    ("input", "r??", input),
    ("sleep", "i", sleep),
    ("sleep2", "i", sleep2),
    ("attachrid", "i", attachrid),
    ("detachrid", "", detachrid),
    ("playerattached", "", playerattached),
];

/// Choice reported when the actor cancels a menu.
const MENU_CANCEL: i32 = 255;

fn mes(b: &mut Bridge) -> Result<()> {
    let actor = b.require_actor()?;
    for i in 0..b.arg_count() {
        let text = b.str(i)?;
        b.emit(Event::Message { actor, text });
    }
    b.st.mes_active = true;
    Ok(())
}

fn next(b: &mut Bridge) -> Result<()> {
    let actor = b.require_actor()?;
    b.emit(Event::Next { actor });
    b.wait(Wait::Next, 0)
}

fn close(b: &mut Bridge) -> Result<()> {
    let actor = b.require_actor()?;
    b.emit(Event::Close { actor });
    b.st.mes_active = false;
    b.close();
    Ok(())
}

/// Like `close`, but the script goes on once the actor dismisses the
/// dialog.
fn close2(b: &mut Bridge) -> Result<()> {
    let actor = b.require_actor()?;
    b.emit(Event::Close { actor });
    b.st.mes_active = false;
    b.wait(Wait::Close, 0)
}

fn set_menu(b: &mut Bridge, choice: i32) -> Result<()> {
    let id = b.rt.symbols.intern("@menu");
    b.set_var(&Ref::new(VarId::new(id)), Val::Int(choice))
}

fn show_menu(b: &mut Bridge, options: Vec<String>) -> Result<()> {
    let actor = b.require_actor()?;
    let count = options.len();
    b.emit(Event::Menu { actor, options });
    b.wait(Wait::Menu, count)
}

fn split_options(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(':').map(str::to_string)
}

/// `menu "a:b", L_AB, "c", L_C;` jumps to the label paired with the
/// string holding the choice. Empty strings add no choices; a `-` label
/// falls through to the next statement.
fn menu(b: &mut Bridge) -> Result<()> {
    if b.arg_count() % 2 != 0 {
        return Err(b.fail("options and labels must come in pairs"));
    }
    let mut pairs = Vec::new();
    for i in (0..b.arg_count()).step_by(2) {
        let text = b.str(i)?;
        let label = b.label(i + 1)?;
        pairs.push((text, label));
    }
    let choice = match b.take_reply() {
        None => {
            let options = pairs
                .iter()
                .filter(|(text, _)| !text.is_empty())
                .flat_map(|(text, _)| split_options(text))
                .collect();
            return show_menu(b, options);
        }
        Some(Reply::Menu(choice)) => choice,
        Some(_) => return Err(b.fail("expected a menu choice")),
    };
    if choice == MENU_CANCEL || choice < 1 || choice as usize > b.menu_options() {
        b.end();
        return Ok(());
    }
    set_menu(b, choice)?;
    let mut remaining = choice as usize;
    for (text, label) in pairs.iter().filter(|(text, _)| !text.is_empty()) {
        let count = text.split(':').count();
        if remaining <= count {
            if *label != NEXT_LINE {
                b.jump(*label);
            }
            return Ok(());
        }
        remaining -= count;
    }
    Err(b.fail("menu choice does not match any option"))
}

fn choice(b: &mut Bridge) -> Result<Option<i32>> {
    let mut options = Vec::new();
    for i in 0..b.arg_count() {
        let text = b.str(i)?;
        options.extend(split_options(&text));
    }
    match b.take_reply() {
        None => {
            show_menu(b, options)?;
            Ok(None)
        }
        Some(Reply::Menu(choice)) => Ok(Some(choice)),
        Some(_) => Err(b.fail("expected a menu choice")),
    }
}

/// `select("a:b:c")` returns the 1-based choice, which is also left in
/// `@menu`. Empty options still count.
fn select(b: &mut Bridge) -> Result<()> {
    let choice = match choice(b)? {
        Some(choice) => choice,
        None => return Ok(()),
    };
    if choice == MENU_CANCEL || choice < 1 || choice as usize > b.menu_options() {
        b.end();
        return Ok(());
    }
    set_menu(b, choice)?;
    b.push_int(choice)
}

/// `select` that hands a cancel back to the script as 255.
fn prompt(b: &mut Bridge) -> Result<()> {
    let choice = match choice(b)? {
        Some(choice) => choice,
        None => return Ok(()),
    };
    let choice = if choice < 1 || choice as usize > b.menu_options() {
        MENU_CANCEL
    } else {
        choice
    };
    set_menu(b, choice)?;
    b.push_int(choice)
}

/// `input <var>{, <min>{, <max>}}` stores the answer, clamped for
/// numbers, and returns 1 above the range, -1 below it, 0 within. For
/// strings the range applies to the length.
fn input(b: &mut Bridge) -> Result<()> {
    let r = b.reference(0)?;
    let is_string = b.is_string_ref(&r);
    let reply = match b.take_reply() {
        Some(reply) => reply,
        None => {
            let actor = b.require_actor()?;
            b.emit(Event::Input {
                actor,
                text: is_string,
            });
            return b.wait(Wait::Input, 0);
        }
    };
    let min = if b.has_arg(1) {
        b.int(1)?
    } else {
        b.rt.config.input_min_value
    };
    let max = if b.has_arg(2) {
        b.int(2)?
    } else {
        b.rt.config.input_max_value
    };
    let measure = |n: i64| {
        if n > max as i64 {
            1
        } else if n < min as i64 {
            -1
        } else {
            0
        }
    };
    if is_string {
        let text = match reply {
            Reply::Text(s) => s,
            Reply::Number(n) | Reply::Menu(n) => n.to_string(),
        };
        let status = measure(text.chars().count() as i64);
        b.set_var(&r, Val::Str(text))?;
        b.push_int(status)
    } else {
        let n = match reply {
            Reply::Number(n) | Reply::Menu(n) => n,
            Reply::Text(s) => str_to_int(&s),
        };
        let status = measure(n as i64);
        let clamped = if max < min { min } else { n.max(min).min(max) };
        b.set_var(&r, Val::Int(clamped))?;
        b.push_int(status)
    }
}

fn do_sleep(b: &mut Bridge, keep_actor: bool) -> Result<()> {
    if b.sleep_done() {
        return Ok(());
    }
    let ms = b.int(0)?;
    if ms <= 0 {
        log::warn!("{}: ignoring non-positive delay {}", b.command_name(), ms);
        return Ok(());
    }
    b.sleep(ms as u32, keep_actor);
    Ok(())
}

/// Parks the state and detaches its actor until the timer fires.
fn sleep(b: &mut Bridge) -> Result<()> {
    do_sleep(b, false)
}

/// Parks the state with its actor still attached.
fn sleep2(b: &mut Bridge) -> Result<()> {
    do_sleep(b, true)
}

fn attachrid(b: &mut Bridge) -> Result<()> {
    let id = b.int(0)? as u32;
    let free = match b.rt.actors.get(&id) {
        Some(actor) => !actor.has_script(),
        None => false,
    };
    if free {
        b.st.actor = Some(id);
    }
    b.push_int(free as i32)
}

/// Lets the actor go, handing back any dialog this state displaced.
fn detachrid(b: &mut Bridge) -> Result<()> {
    if let Some(id) = b.st.actor.take() {
        if let Some(backup) = b.st.backup.take() {
            match b.rt.actors.get_mut(&id) {
                Some(actor) => {
                    actor.state = Some(*backup.state);
                    actor.dialog = backup.dialog;
                }
                None => log::warn!("detachrid: actor {} is gone", id),
            }
        }
    }
    Ok(())
}

fn playerattached(b: &mut Bridge) -> Result<()> {
    let id = match b.st.actor {
        Some(id) if b.rt.actors.contains_key(&id) => id as i32,
        _ => 0,
    };
    b.push_int(id)
}
