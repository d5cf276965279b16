use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chip8_dbg::dbg::{DbgFlags, Debugger};
use chip8_dbg::err::Error as _;
use chip8_dbg::sim::device::{key_for_char, ChannelKeypad, InterruptFromFn, KeyEvent, TermDisplay};
use chip8_dbg::sim::{SimErr, SimFlags, Simulator};
use clap::Parser;
use crossbeam_channel as cbc;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;

/// CHIP-8 interpreter with an interactive debugger.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// The program image to load at 0x200.
    rom: PathBuf,

    /// Run the program in the terminal instead of starting the debugger.
    #[arg(long)]
    run: bool,

    /// Instructions executed per second.
    #[arg(long, default_value_t = 500)]
    hz: u32,

    /// Rate of the delay and sound timers, in ticks per second.
    #[arg(long, default_value_t = 60)]
    timer_hz: u32,

    /// Seed for the random number generator.
    #[arg(long)]
    seed: Option<u64>,

    /// Disable colored debugger output.
    #[arg(long)]
    no_color: bool,
}
impl Cli {
    fn period(&self) -> Duration {
        Duration::from_secs(1) / self.hz.max(1)
    }
}

/// Forwards SIGINT to the returned channel.
fn install_halt_signal() -> cbc::Receiver<()> {
    use signal_hook::{consts::SIGINT, iterator::Signals};

    let (tx, rx) = cbc::unbounded();
    match Signals::new([SIGINT]) {
        Ok(mut signals) => {
            thread::spawn(move || {
                for _ in signals.forever() {
                    if tx.send(()).is_err() { break };
                }
            });
        },
        Err(e) => log::warn!("failed to install SIGINT handler: {e}"),
    }
    rx
}

/// Reads lines of standard input into the returned channel.
///
/// The channel disconnects at end of input.
fn spawn_line_reader() -> cbc::Receiver<String> {
    let (tx, rx) = cbc::unbounded();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() { break };
        }
    });
    rx
}

/// Translates terminal key events into keypad events.
///
/// Escape and Ctrl-C are sent to `halt` instead.
fn spawn_key_reader(keys: cbc::Sender<KeyEvent>, halt: cbc::Sender<()>) {
    thread::spawn(move || loop {
        let ev = match event::read() {
            Ok(Event::Key(ev)) => ev,
            Ok(_) => continue,
            Err(e) => {
                log::warn!("failed to read terminal event: {e}");
                break;
            }
        };

        let is_ctrl_c = ev.code == KeyCode::Char('c') && ev.modifiers.contains(KeyModifiers::CONTROL);
        if ev.code == KeyCode::Esc || is_ctrl_c {
            if halt.send(()).is_err() { break };
            continue;
        }

        let KeyCode::Char(c) = ev.code else { continue };
        let Some(key) = key_for_char(c) else { continue };
        let event = match ev.kind {
            KeyEventKind::Release => KeyEvent::Release(key),
            _ => KeyEvent::Press(key),
        };
        if keys.send(event).is_err() { break };
    });
}

fn free_run(mut sim: Simulator, period: Duration) -> io::Result<Result<(), SimErr>> {
    let (key_tx, key_rx) = cbc::unbounded();
    let (halt_tx, halt_rx) = cbc::unbounded();

    let display = Arc::new(Mutex::new(TermDisplay::stdout()));
    sim.device_handler.set_keypad(ChannelKeypad::new(key_rx));
    sim.device_handler.set_display(Arc::clone(&display));
    sim.device_handler.set_interrupt(InterruptFromFn::from_channel(halt_rx));

    terminal::enable_raw_mode()?;
    if let Ok(mut d) = display.lock() {
        d.enter()?;
    }
    spawn_key_reader(key_tx, halt_tx);

    let result = sim.run_paced(period);

    if let Ok(mut d) = display.lock() {
        d.leave()?;
    }
    terminal::disable_raw_mode()?;
    log::info!("{} instructions executed", sim.instructions_run);

    Ok(result)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let image = std::fs::read(&cli.rom).unwrap_or_else(|e| {
        eprintln!("error: could not read '{}': {e}", cli.rom.display());
        process::exit(1);
    });

    let sim = Simulator::new(SimFlags { timer_hz: cli.timer_hz, seed: cli.seed });

    if cli.run {
        let mut sim = sim;
        if let Err(e) = sim.load_program(&image) {
            report(&e);
            process::exit(1);
        }

        match free_run(sim, cli.period()) {
            Ok(Ok(())) | Ok(Err(SimErr::Interrupted)) => {},
            Ok(Err(e)) => {
                report(&e);
                process::exit(1);
            },
            Err(e) => {
                eprintln!("error: {e}");
                process::exit(1);
            }
        }
        return;
    }

    let flags = DbgFlags {
        tick: cli.period(),
        color: !cli.no_color
    };
    let mut dbg = Debugger::new(sim, flags);
    if let Err(e) = dbg.load_program(&image) {
        report(&e);
        process::exit(1);
    }

    let halt = install_halt_signal();
    let lines = spawn_line_reader();
    if let Err(e) = dbg.repl(lines, halt, &mut io::stdout()) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn report(e: &SimErr) {
    eprintln!("error: {e}");
    if let Some(help) = e.help() {
        eprintln!("help: {help}");
    }
}
