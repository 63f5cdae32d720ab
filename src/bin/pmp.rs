// Samples the stacks of a running process until interrupted, then prints one line per distinct
// stack: `<frames, root first>\t<count>`.

use std::io;
use std::process;
use std::time::Duration;

use clap::error::ErrorKind;
use clap::Parser;

use pmp::{Config, Format, Shutdown, ThreadId};

#[derive(Debug, Parser)]
#[clap(
    name = "pmp",
    about = "Poor man's profiler: samples the call stacks of a running process."
)]
struct Args {
    /// Process to profile.
    #[clap(allow_hyphen_values = true, allow_negative_numbers = true)]
    pid: String,
    /// Pause between samples, in milliseconds.
    #[clap(long, env = "PMP_INTERVAL_MS", default_value_t = 1)]
    interval_ms: u64,
    /// Stacks deeper than this are discarded as bogus unwinds.
    #[clap(long, env = "PMP_MAX_FRAMES", default_value_t = 64)]
    max_frames: usize,
    /// Print symbol names as libunwind reports them.
    #[clap(long)]
    no_demangle: bool,
    /// collapsed, json or speedscope.
    #[clap(long, env = "PMP_FORMAT", default_value = "collapsed")]
    format: Format,
}

fn parse_pid(raw: &str) -> Option<ThreadId> {
    match raw.parse::<i32>() {
        Ok(pid) if pid > 0 => Some(ThreadId::from_raw(pid)),
        _ => None,
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            // Usage goes to stderr, help to stdout.
            let _ = e.print();
            process::exit(code);
        }
    };

    let pid = match parse_pid(&args.pid) {
        Some(pid) => pid,
        None => {
            eprintln!("bad pid: {}", args.pid);
            process::exit(2);
        }
    };

    let config = Config {
        pid,
        interval: Duration::from_millis(args.interval_ms),
        max_frames: args.max_frames,
        demangle: !args.no_demangle,
        format: args.format,
    };

    let shutdown = Shutdown::new();
    let handler_shutdown = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_shutdown.request()) {
        eprintln!("failed: couldn't install interrupt handler: {}", e);
        process::exit(1);
    }

    let report = match pmp::profile(&config, shutdown) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("failed: {}", e);
            process::exit(1);
        }
    };

    let stdout = io::stdout();
    let name = format!("pmp {}", pid);
    let mut out = stdout.lock();
    if let Err(e) = pmp::output::write_report(&report.histogram, config.format, &name, &mut out) {
        eprintln!("failed: {}", e);
        process::exit(1);
    }
}
