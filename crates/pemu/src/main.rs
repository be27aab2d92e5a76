use std::fmt;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use qemu_config::{Diagnostic, Resolution};
use qemu_launch::{DryRunLauncher, LaunchPlan, Launcher, ProcessLauncher};
use tracing::{Level, info, warn};
use tracing_subscriber::fmt::time::FormatTime;

struct Elapsed(Instant);

impl FormatTime for Elapsed {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> fmt::Result {
        let d = self.0.elapsed();
        let total_secs = d.as_secs();
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        let millis = d.subsec_millis();
        write!(w, "[{mins:02}:{secs:02}:{millis:03}]")
    }
}

/// Launch QEMU/KVM virtual machines described by an INI file
#[derive(Parser)]
#[command(name = "pemu", version)]
struct Cli {
    /// Path to the VM config file
    #[arg(short = 'f', long, env = "PEMU_CONFIG", default_value = "vm.ini")]
    config_file: PathBuf,
    /// Print the rendered commands instead of starting the VMs
    #[arg(short, long)]
    dry_run: bool,
    /// With --dry-run, print the resolved plan as JSON
    #[arg(long, requires = "dry_run")]
    json: bool,
    /// Wait for every VM to exit; Ctrl-C kills them all
    #[arg(short, long, conflicts_with = "dry_run")]
    wait: bool,
    /// Log debug details to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_timer(Elapsed(Instant::now()))
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let raw = qemu_config::load(&cli.config_file)?;
    let plan = match qemu_config::resolve(&raw) {
        Ok(plan) => plan,
        Err(rejected) => {
            report(&rejected.diagnostics);
            return Err(rejected.into());
        }
    };
    report(&plan.diagnostics);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    let plans = launch_plans(&plan);
    let mut launcher: Box<dyn Launcher> = if cli.dry_run {
        Box::new(DryRunLauncher::new(std::io::stdout()))
    } else {
        Box::new(ProcessLauncher::new(cli.wait))
    };
    info!(
        launcher = launcher.name(),
        instances = plans.len(),
        config = %cli.config_file.display(),
        "launching"
    );

    for launched in launcher.launch(&plans).await? {
        if let Some(pid) = launched.pid {
            println!("{}: pid {pid}", launched.instance);
        }
    }
    Ok(())
}

fn launch_plans(plan: &Resolution) -> Vec<LaunchPlan> {
    plan.instances.iter().map(LaunchPlan::from_spec).collect()
}

fn report(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        warn!("{diagnostic}");
    }
}
