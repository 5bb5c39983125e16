extern crate ctrlc;
extern crate linefeed;
use ansi_term::Style;
use chrono::{DateTime, Utc};
use linefeed::{Interface, ReadResult, Signal, Terminal};
use npcscript::lang::CompileOptions;
use npcscript::mach::{ActorId, Event, Runtime, Status, Wait};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

mod logger;

const PLAYER: ActorId = 1;
const ACCOUNT: u32 = 1;
const OWNER: u32 = 1;

struct Args {
    file: String,
    constants: Option<String>,
    listing: bool,
    bare: bool,
    verbose: bool,
}

fn usage() -> String {
    "usage: npcscript [--listing] [--bare] [--verbose] [--constants FILE] SCRIPT".to_string()
}

fn parse_args() -> Result<Args, String> {
    let mut file = None;
    let mut constants = None;
    let mut listing = false;
    let mut bare = false;
    let mut verbose = false;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--listing" => listing = true,
            "--bare" => bare = true,
            "--verbose" => verbose = true,
            "--constants" => constants = Some(args.next().ok_or_else(usage)?),
            s if s.starts_with("--") => return Err(usage()),
            _ if file.is_some() => return Err(usage()),
            _ => file = Some(arg),
        }
    }
    Ok(Args {
        file: file.ok_or_else(usage)?,
        constants,
        listing,
        bare,
        verbose,
    })
}

pub fn main() {
    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{}", msg);
            std::process::exit(2);
        }
    };
    logger::init(args.verbose);
    let interrupted = Arc::new(AtomicBool::new(false));
    let int_moved = interrupted.clone();
    if let Err(error) = ctrlc::set_handler(move || {
        int_moved.store(true, Ordering::SeqCst);
    }) {
        eprintln!("Error setting Ctrl-C handler: {}", error);
    }
    if let Err(error) = main_loop(&args, interrupted) {
        eprintln!("{}", error);
        std::process::exit(1);
    }
}

fn bold<T: Terminal>(interface: &Interface<T>, s: &str) -> std::io::Result<()> {
    interface.write_fmt(format_args!("{}\n", Style::new().bold().paint(s)))
}

fn main_loop(args: &Args, interrupted: Arc<AtomicBool>) -> std::io::Result<()> {
    let interface = Interface::new("npcscript")?;
    interface.set_report_signal(Signal::Interrupt, true);
    let mut runtime = Runtime::new();
    if let Some(path) = &args.constants {
        let text = std::fs::read_to_string(path)?;
        let count = runtime.load_constants(&text);
        log::debug!("{} constants loaded from {}", count, path);
    }
    let source = std::fs::read_to_string(&args.file)?;
    let options = CompileOptions {
        ignore_external_braces: args.bare,
        ..CompileOptions::default()
    };
    let script = match runtime.compile_with(&source, &args.file, 1, options) {
        Ok(Some(script)) => script,
        Ok(None) => return bold(&interface, "script is empty"),
        Err(error) => return bold(&interface, &error.to_string()),
    };
    if args.listing {
        return interface.write_fmt(format_args!("{}", script.listing()));
    }
    runtime.add_actor(PLAYER, ACCOUNT);
    let start: DateTime<Utc> = Utc::now();
    if let Err(error) = runtime.run(&script, 0, Some(PLAYER), OWNER) {
        return bold(&interface, &error.to_string());
    }
    let mut text_input = false;
    loop {
        if interrupted.swap(false, Ordering::SeqCst) {
            runtime.cancel(PLAYER);
        }
        for event in runtime.events() {
            match event {
                Event::Message { text, .. } => interface.write_fmt(format_args!("{}\n", text))?,
                Event::Next { .. } => interface.write_fmt(format_args!("[next]\n"))?,
                Event::Close { .. } => interface.write_fmt(format_args!("[close]\n"))?,
                Event::Menu { options, .. } => {
                    for (i, option) in options.iter().enumerate() {
                        interface.write_fmt(format_args!("  {}) {}\n", i + 1, option))?;
                    }
                }
                Event::Input { text, .. } => text_input = text,
                Event::Debug { text, .. } => {
                    interface.write_fmt(format_args!("{}\n", Style::new().dimmed().paint(text)))?
                }
                Event::Finished { status, .. } => match status {
                    Status::Failed => bold(&interface, "script failed")?,
                    Status::Cancelled => bold(&interface, "cancelled")?,
                    Status::Ended | Status::Closed => {}
                },
            }
        }
        let waiting = runtime.actor(PLAYER).and_then(|a| a.waiting());
        let wait = match waiting {
            Some(wait) => wait,
            None if runtime.sleeping() > 0 => {
                std::thread::sleep(Duration::from_millis(10));
                let now = Utc::now().signed_duration_since(start).num_milliseconds();
                runtime.run_timers(now.max(0) as u64);
                continue;
            }
            None => break,
        };
        interface.set_prompt(match wait {
            Wait::Menu => "choice> ",
            Wait::Input => "> ",
            Wait::Next | Wait::Close => "",
        })?;
        let line = match interface.read_line()? {
            ReadResult::Input(line) => line,
            ReadResult::Signal(Signal::Interrupt) => {
                runtime.cancel(PLAYER);
                continue;
            }
            ReadResult::Signal(_) | ReadResult::Eof => break,
        };
        let result = match wait {
            Wait::Next => runtime.next(PLAYER),
            Wait::Close => runtime.close(PLAYER),
            Wait::Menu => runtime.select_menu(PLAYER, line.trim().parse().unwrap_or(255)),
            Wait::Input if text_input => runtime.input_string(PLAYER, &line),
            Wait::Input => runtime.input_number(PLAYER, line.trim().parse().unwrap_or(0)),
        };
        if let Err(error) = result {
            bold(&interface, &error.to_string())?;
        }
    }
    runtime.shutdown();
    Ok(())
}
