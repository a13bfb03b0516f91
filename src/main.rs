//! pinline - pinned prompt demo
//!
//! A ticker thread prints colored lines continuously while the prompt stays
//! on the bottom row of the terminal.
//!
//! # Commands at the prompt
//!
//! | Command | Action |
//! |---------|--------|
//! | key | Read one raw keystroke |
//! | where | Show the cursor position in the top-right corner |
//! | clear | Clear the screen |
//! | quit | Exit |

use std::env;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use pinline::{
    backend, display_width, Config, CursorPosition, CursorSnapshot, PinnedOutput, ResizeWatcher,
    Rgb, TerminalError, TerminalState,
};

/// Command line options
#[derive(Default)]
struct Args {
    reserve: Option<u16>,
    no_color: bool,
    verbose: bool,
}

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_version() {
    eprintln!("pinline {}", VERSION);
}

fn print_help() {
    eprintln!("pinline {} - pinned prompt demo", VERSION);
    eprintln!();
    eprintln!("Usage: pinline [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -r, --reserve <N>     Bottom rows kept for the prompt (default 2)");
    eprintln!("      --no-color        Plain output");
    eprintln!("      --verbose         Debug logging");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Prompt commands: key, where, clear, quit");
    eprintln!();
    eprintln!("Configuration: ~/.pinline/config.toml");
    eprintln!("Log file:      ~/.pinline/pinline.log");
}

fn parse_args() -> Result<Args, String> {
    let args: Vec<String> = env::args().collect();
    let mut parsed = Args::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "-r" | "--reserve" => {
                i += 1;
                let value = args.get(i).ok_or("Missing reserve argument")?;
                let rows = value
                    .parse()
                    .map_err(|_| format!("Invalid reserve row count: {}", value))?;
                parsed.reserve = Some(rows);
            }
            "--no-color" => {
                parsed.no_color = true;
            }
            "--verbose" => {
                parsed.verbose = true;
            }
            arg => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
        i += 1;
    }

    Ok(parsed)
}

/// Log to a file; the terminal itself belongs to the demo
fn init_logging(verbose: bool) {
    let log_path = Config::config_dir()
        .map(|dir| dir.join("pinline.log"))
        .unwrap_or_else(|| std::path::PathBuf::from("pinline.log"));

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let level = if verbose { Level::DEBUG } else { Level::INFO };
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

/// Rainbow color for tick `n`
fn hue_color(n: u64) -> Rgb {
    let h = (n * 15 % 360) as f64 / 60.0;
    let x = 1.0 - (h % 2.0 - 1.0).abs();
    let (r, g, b) = match h as u32 {
        0 => (1.0, x, 0.0),
        1 => (x, 1.0, 0.0),
        2 => (0.0, 1.0, x),
        3 => (0.0, x, 1.0),
        4 => (x, 0.0, 1.0),
        _ => (1.0, 0.0, x),
    };
    Rgb::new((r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8)
}

/// End of input or Ctrl-C at the prompt
fn is_end_of_input(e: &TerminalError) -> bool {
    matches!(
        e,
        TerminalError::Read(err)
            if matches!(err.kind(), io::ErrorKind::UnexpectedEof | io::ErrorKind::Interrupted)
    )
}

fn main() -> anyhow::Result<()> {
    let args = match parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    init_logging(args.verbose);
    info!("pinline starting...");

    // Command line overrides config file
    let mut config = Config::load();
    if let Some(reserve) = args.reserve {
        config.reserve_lines = reserve;
    }
    if args.no_color {
        config.colors = false;
    }

    let backend = backend::detect()?;
    if config.colors {
        if let Err(code) = backend.enable_virtual_terminal_processing() {
            warn!("ANSI processing unavailable (error {}), colors off", code);
            config.colors = false;
        }
    }

    let state = Arc::new(TerminalState::from_backend(backend.as_ref())?);
    let watcher = ResizeWatcher::spawn(state.clone(), backend.clone(), config.resize_poll())?;
    let out = Arc::new(PinnedOutput::new(
        state.clone(),
        backend.clone(),
        config.reserve_lines,
    ));

    out.clear()?;
    info!(
        "Reserve: {} rows, colors: {}",
        config.reserve_lines, config.colors
    );

    let running = Arc::new(AtomicBool::new(true));
    let ticker = {
        let out = out.clone();
        let running = running.clone();
        let colors = config.colors;
        thread::spawn(move || {
            let mut n: u64 = 0;
            while running.load(Ordering::SeqCst) {
                let line = format!("tick {}", n);
                let result = if colors {
                    out.print_colored(hue_color(n), &line)
                } else {
                    out.pinned_print(&line)
                };
                if let Err(e) = result {
                    error!("Ticker print failed: {}", e);
                    break;
                }
                n += 1;
                thread::sleep(Duration::from_millis(800));
            }
        })
    };

    let result = run_prompt(&out);

    running.store(false, Ordering::SeqCst);
    let _ = ticker.join();
    watcher.stop();
    info!("pinline exiting");

    result
}

fn run_prompt(out: &PinnedOutput) -> anyhow::Result<()> {
    loop {
        let line = match out.pinned_input("> ") {
            Ok(line) => line,
            Err(e) if is_end_of_input(&e) => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        match line.trim() {
            "quit" | "exit" => return Ok(()),
            "" => {}
            "key" => {
                out.pinned_print("press any key...")?;
                let key = out.backend().read_raw_char()?;
                out.pinned_print(format!("key: {:?} (U+{:04X})", key, key as u32))?;
            }
            "where" => show_position(out)?,
            "clear" => out.clear()?,
            text => {
                out.pinned_print(format!(
                    "you typed {:?}: {} chars, {} cells",
                    text,
                    text.chars().count(),
                    display_width(text)
                ))?;
            }
        }
    }
}

/// Draw the cursor position in the top-right corner, then put the cursor back
fn show_position(out: &PinnedOutput) -> anyhow::Result<()> {
    let backend = out.backend();
    let geometry = out.state().lock();

    let snapshot = CursorSnapshot::capture(backend.as_ref())?;
    let pos = snapshot.position();
    let label = format!("[row {}, col {}]", pos.row, pos.column);
    let column = (geometry.columns as usize).saturating_sub(display_width(&label));

    backend.set_cursor_position(CursorPosition::new(0, column as u16))?;
    let mut stdout = io::stdout();
    stdout.write_all(label.as_bytes())?;
    stdout.flush()?;
    snapshot.load(backend.as_ref())?;
    Ok(())
}
