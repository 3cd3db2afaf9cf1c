//! ESESC simulator CLI.
//!
//! This binary boots a simulator from a JSON configuration. It performs:
//! 1. **Recovery:** registers the stop/dump signal handlers before anything is resolved.
//! 2. **Plug:** resolves simulation, report, emulation and power from the configuration.
//! 3. **Run:** boots, writes the final report, then unboots and unplugs.
//!
//! Any configuration error is printed in full and the process exits with code 1.
//! When a stop signal arrives mid-run, the recovery handler owns the rest of the
//! shutdown and the main thread waits for it to abort the process.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::thread;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use esesc_boot::components::InertComponents;
use esesc_boot::sim::recovery;
use esesc_boot::{
    BootError, BootLoader, Capabilities, ConfArgs, FileReport, Recovery, TaskHandler,
};

#[derive(Parser, Debug)]
#[command(
    name = "esesc",
    author,
    version,
    about = "ESESC cycle-level simulator boot loader",
    long_about = "Resolve a simulator configuration, run it, and write the statistics report.\n\nThe report file name comes from REPORTFILE (and REPORTFILE2) or the configuration's reportFile.\nSend SIGUSR1 for a partial report; SIGINT/SIGTERM write one and stop.\n\nExamples:\n  esesc -c esesc.json\n  esesc -c esesc.json -s cpusimu0:inorder=true --report-dir out"
)]
struct Cli {
    /// JSON configuration document.
    #[arg(short, long, default_value = "esesc.json")]
    conf: PathBuf,

    /// Override one value, written `section:key=value` (repeatable).
    #[arg(short = 's', long = "set", value_name = "SECTION:KEY=VALUE")]
    overrides: Vec<String>,

    /// Directory the report files are written into.
    #[arg(long, default_value = ".")]
    report_dir: PathBuf,

    /// Where to write the memory architecture diagram.
    #[arg(long, default_value = "memory-arch.dot", conflicts_with = "no_arch")]
    arch: PathBuf,

    /// Do not write the memory architecture diagram.
    #[arg(long)]
    no_arch: bool,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let caps = Capabilities {
        arch_diagram: (!cli.no_arch).then(|| cli.arch.clone()),
        ..Capabilities::default()
    };
    let boot = Arc::new(BootLoader::new(
        Arc::new(InertComponents),
        Arc::new(TaskHandler::new()),
        Box::new(FileReport::new(&cli.report_dir)),
        caps,
    ));

    let handler = Arc::new(Recovery::new(Arc::clone(&boot)));
    if let Err(e) = recovery::install(handler) {
        error!("cannot register recovery signals: {e}");
        process::exit(1);
    }

    let args = cli
        .overrides
        .into_iter()
        .fold(ConfArgs::new(&cli.conf), ConfArgs::with_override);

    match run(&boot, &args) {
        Ok(()) => {}
        Err(_) if boot.is_stopping() => wait_for_recovery(),
        Err(e) => {
            report_failure(&e);
            process::exit(1);
        }
    }
}

fn run(boot: &BootLoader, args: &ConfArgs) -> Result<(), BootError> {
    boot.plug(args)?;
    boot.boot()?;
    boot.report("done")?;
    boot.unboot();
    boot.unplug();
    if boot.is_stopping() {
        return Err(BootError::Stopping);
    }
    if let Some(path) = boot.report_path() {
        info!("report written to {}", path.display());
    }
    Ok(())
}

fn wait_for_recovery() -> ! {
    info!("stop signal received; waiting for recovery to finish the shutdown");
    loop {
        thread::park();
    }
}

fn report_failure(err: &BootError) {
    eprintln!("[!] {err}");
    if let BootError::ConfigIncorrect { errors, .. } = err {
        for e in errors {
            eprintln!("    {e}");
        }
    }
}
