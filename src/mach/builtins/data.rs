use super::{Command, Result};
use crate::mach::bridge::str_to_int;
use crate::mach::{Bridge, Event, Ref, Val, VarId, MAX_ARRAY_SIZE};
use chrono::{Local, Timelike, Utc};
use rand::Rng;
use std::fmt::Write;

pub const COMMANDS: &[Command] = &[
    ("setarray", "rv*", setarray),
    ("cleararray", "rvi", cleararray),
    ("copyarray", "rri", copyarray),
    ("deletearray", "r?", deletearray),
    ("getarraysize", "r", getarraysize),
    ("rand", "i?", rand),
    ("getstrlen", "s", getstrlen),
    ("gettimetick", "i", gettimetick),
    ("gettimestr", "si", gettimestr),
    ("debugmes", "s", debugmes),
    ("isnum", "s", isnum),
    ("atoi", "s", atoi),
    ("toupper", "s", toupper),
    ("tolower", "s", tolower),
    ("substr", "sii", substr),
];

/// Reference to element `offset` past the one `r` names.
fn element(r: &Ref, offset: i64) -> Result<Ref> {
    let index = (r.id.index as i64 + offset).min(i32::MAX as i64) as i32;
    Ok(Ref {
        id: VarId::element(r.id.symbol, index)?,
        store: r.store.clone(),
    })
}

fn setarray(b: &mut Bridge) -> Result<()> {
    let r = b.reference(0)?;
    for i in 1..b.arg_count() {
        let val = b.arg(i)?;
        let target = element(&r, i as i64 - 1)?;
        b.set_var(&target, val)?;
    }
    Ok(())
}

fn cleararray(b: &mut Bridge) -> Result<()> {
    let r = b.reference(0)?;
    let val = b.arg(1)?;
    let count = b.int(2)?;
    for i in 0..count.max(0) as i64 {
        let target = element(&r, i)?;
        b.set_var(&target, val.clone())?;
    }
    Ok(())
}

/// Reads the whole source before writing, so overlapping ranges copy
/// the original values.
fn copyarray(b: &mut Bridge) -> Result<()> {
    let dest = b.reference(0)?;
    let src = b.reference(1)?;
    let count = b.int(2)?.max(0) as i64;
    let mut vals = Vec::new();
    for i in 0..count {
        let from = element(&src, i)?;
        vals.push(b.get_var(&from)?);
    }
    for (i, val) in vals.into_iter().enumerate() {
        let to = element(&dest, i as i64)?;
        b.set_var(&to, val)?;
    }
    Ok(())
}

fn deletearray(b: &mut Bridge) -> Result<()> {
    let r = b.reference(0)?;
    let from = r.id.index;
    let count = if b.has_arg(1) {
        b.int(1)?.max(0) as u32
    } else {
        MAX_ARRAY_SIZE - from
    };
    let symbol = r.id.symbol;
    b.with_var(&r, |vars| vars.delete_elements(symbol, from, count));
    Ok(())
}

fn getarraysize(b: &mut Bridge) -> Result<()> {
    let r = b.reference(0)?;
    let symbol = r.id.symbol;
    let size = b.with_var(&r, |vars| vars.array_size(symbol)).unwrap_or(0);
    b.push_int(size as i32)
}

/// `rand(n)` is `0..n`, `rand(a, b)` is `a..=b` in either order.
fn rand(b: &mut Bridge) -> Result<()> {
    let (min, max) = if b.has_arg(1) {
        let (x, y) = (b.int(0)? as i64, b.int(1)? as i64);
        (x.min(y), x.max(y))
    } else {
        (0, b.int(0)? as i64 - 1)
    };
    let n = if max <= min {
        min
    } else {
        b.rt.rng.gen_range(min..=max)
    };
    b.push_int(n as i32)
}

fn getstrlen(b: &mut Bridge) -> Result<()> {
    let s = b.str(0)?;
    b.push_int(s.chars().count() as i32)
}

/// 0 is the runtime tick, 1 seconds since local midnight, 2 seconds
/// since the epoch.
fn gettimetick(b: &mut Bridge) -> Result<()> {
    let n = match b.int(0)? {
        0 => b.rt.tick as i32,
        1 => Local::now().num_seconds_from_midnight() as i32,
        2 => Utc::now().timestamp() as i32,
        kind => {
            log::warn!("gettimetick: unknown kind {}", kind);
            0
        }
    };
    b.push_int(n)
}

/// `gettimestr("%Y-%m-%d", 11)`: local time in a strftime style format,
/// cut to one less than the length given.
fn gettimestr(b: &mut Bridge) -> Result<()> {
    let format = b.str(0)?;
    let maxlen = b.int(1)?;
    let mut s = String::new();
    if write!(s, "{}", Local::now().format(&format)).is_err() {
        return Err(b.fail(&format!("invalid time format '{}'", format)));
    }
    let keep = (maxlen.max(1) - 1) as usize;
    let s: String = s.chars().take(keep).collect();
    b.push_str(s)
}

fn debugmes(b: &mut Bridge) -> Result<()> {
    let text = b.str(0)?;
    let owner = b.st.owner;
    log::debug!("script debug : {} : {}", owner, text);
    b.emit(Event::Debug { owner, text });
    Ok(())
}

fn isnum(b: &mut Bridge) -> Result<()> {
    let s = b.str(0)?;
    let n = s.trim().parse::<i64>().is_ok();
    b.push_int(n as i32)
}

fn atoi(b: &mut Bridge) -> Result<()> {
    let s = b.str(0)?;
    b.push_int(str_to_int(&s))
}

fn toupper(b: &mut Bridge) -> Result<()> {
    let s = b.str(0)?;
    b.push_str(s.to_ascii_uppercase())
}

fn tolower(b: &mut Bridge) -> Result<()> {
    let s = b.str(0)?;
    b.push_str(s.to_ascii_lowercase())
}

/// Characters `start..=end`; an out of range request gives `""`.
fn substr(b: &mut Bridge) -> Result<()> {
    let s = b.str(0)?;
    let start = b.int(1)?;
    let end = b.int(2)?;
    let len = s.chars().count() as i32;
    if start < 0 || end < start || end >= len {
        log::warn!(
            "substr: range {}..={} is outside a string of length {}",
            start,
            end,
            len
        );
        return b.push_str(String::new());
    }
    let sub = s
        .chars()
        .skip(start as usize)
        .take((end - start + 1) as usize)
        .collect();
    b.push_str(sub)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_bounds() {
        let r = Ref::new(VarId::element(4, 126).unwrap());
        assert_eq!(element(&r, 1).unwrap().id.index, 127);
        assert!(element(&r, 2).is_err());
    }
}
