/*!
 * halfwpa command line
 *
 * Lists the half-handshakes found in a capture, picks one and runs a
 * dictionary attack against it from a wordlist, a PMK table or stdin.
 * With --gen-pmk it precomputes a PMK table for one SSID instead.
 */

mod cli;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use halfwpa::{
    load_handshakes, select_handshake, Coordinator, CrackError, CrackOutcome, CrackReport,
    CrackState, CrackerConfig, Handshake, Progress,
};

use cli::Args;

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    println!("\n{}", "📡 halfwpa".bold().cyan());
    println!(
        "{}\n",
        "WPA/WPA2 half-handshake cracker - Educational use only".dimmed()
    );

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", format!("❌ {:#}", e).red());
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}

fn run(args: Args) -> Result<ExitCode> {
    let mut config = CrackerConfig::from_env();
    if let Some(threads) = args.threads {
        config = config.with_threads(threads);
    }
    if let Some(dir) = &args.output_dir {
        config = config.with_output_dir(dir);
    }

    if args.gen_pmk {
        return handle_gen_pmk(&args, config);
    }

    let capture = args
        .capture
        .as_deref()
        .context("--capture is required unless --gen-pmk is given")?;
    let handshakes = load_handshakes(capture)
        .with_context(|| format!("Failed to load handshakes from {}", capture.display()))?;
    print_handshakes(&handshakes);

    let ssid = args.ssid.as_deref().map(str::as_bytes);
    let handshake = select_handshake(&handshakes, ssid, args.id)?;

    if let Some(path) = &args.export {
        handshake
            .save_to_file(path)
            .with_context(|| format!("Failed to export handshake to {}", path.display()))?;
        println!(
            "{}",
            format!("✓ Handshake exported to {}", path.display()).green()
        );
    }

    let Some(source) = args.source() else {
        if args.export.is_some() {
            return Ok(ExitCode::SUCCESS);
        }
        bail!("No candidate source given, use --wordlist, --pmk or --stdin");
    };

    println!(
        "{} {} ({} → {})",
        "🎯 Target:".bold(),
        handshake.ssid_display().cyan(),
        display_mac(&handshake, true),
        display_mac(&handshake, false)
    );
    println!("{}", "\n🔓 Starting dictionary attack...".cyan());

    let coordinator = Coordinator::new(config);
    install_interrupt_handler(coordinator.state())?;

    let spinner = progress_spinner();
    let result = coordinator.crack(&handshake, source, |progress| {
        spinner.set_message(progress_message(progress));
    });
    spinner.finish_and_clear();

    match result {
        Ok(report) => {
            print_report(&report);
            Ok(ExitCode::SUCCESS)
        }
        Err(CrackError::IncompleteHandshake { missing }) => {
            println!(
                "{}",
                format!(
                    "⚠️  Selected handshake is incomplete (missing {}), nothing to crack",
                    missing.join(", ")
                )
                .yellow()
            );
            println!(
                "{}",
                "  Capture messages 1 and 2 of the same client, e.g. by deauthenticating it"
                    .dimmed()
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => Err(e).context("Attack failed"),
    }
}

/// Precompute a PMK table for --ssid
fn handle_gen_pmk(args: &Args, config: CrackerConfig) -> Result<ExitCode> {
    let ssid = args.ssid.as_deref().context("--gen-pmk needs --ssid")?;
    let Some(source) = args.source() else {
        bail!("No candidate source given, use --wordlist or --stdin");
    };

    println!(
        "{} {}",
        "🧮 Precomputing PMKs for".cyan(),
        ssid.bold().cyan()
    );

    let coordinator = Coordinator::new(config);
    install_interrupt_handler(coordinator.state())?;

    let spinner = progress_spinner();
    let result = coordinator.precompute(ssid.as_bytes(), source, None, |progress| {
        spinner.set_message(progress_message(progress));
    });
    spinner.finish_and_clear();

    let report = result.context("PMK precomputation failed")?;
    if report.cancelled {
        println!("{}", "⚠️  Interrupted, table is partial".yellow());
    }
    println!(
        "{}",
        format!(
            "✓ Appended {} PMKs to {} in {:.2}s",
            report.written,
            report.cache_file.display(),
            report.elapsed.as_secs_f64()
        )
        .green()
    );
    println!(
        "  Use it with: {}",
        format!("halfwpa -c <capture> -p {}", report.cache_file.display()).cyan()
    );
    Ok(ExitCode::SUCCESS)
}

/// Ctrl-C and SIGTERM stop the run the same way a found password does
fn install_interrupt_handler(state: Arc<CrackState>) -> Result<()> {
    ctrlc::set_handler(move || {
        state.cancel();
    })
    .context("Failed to install interrupt handler")
}

fn progress_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("Loading candidates...");
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

fn progress_message(progress: &Progress) -> String {
    format!("{} tested ({:.0} pwd/s)", progress.attempts, progress.rate)
}

fn display_mac(handshake: &Handshake, ap: bool) -> String {
    let mac = if ap {
        handshake.ap_mac
    } else {
        handshake.client_mac
    };
    mac.map(|m| m.to_string()).unwrap_or_else(|| "?".to_string())
}

fn print_handshakes(handshakes: &[Handshake]) {
    if handshakes.is_empty() {
        return;
    }

    println!("{}", "Half-handshakes found:".bold().green());
    println!(
        "  {:<4} {:<18} {:<18} {:<24} {:<7} {:<7}",
        "ID", "AP", "Client", "SSID", "Frame1", "Frame2"
    );
    for (id, hs) in handshakes.iter().enumerate() {
        let frame1 = hs.anonce.is_some();
        let frame2 = hs.snonce.is_some() && hs.mic.is_some() && hs.data.is_some();
        println!(
            "  {:<4} {:<18} {:<18} {:<24} {:<7} {:<7}",
            id.to_string().cyan(),
            display_mac(hs, true),
            display_mac(hs, false),
            hs.ssid_display(),
            mark(frame1),
            mark(frame2)
        );
    }
    println!();
}

fn mark(present: bool) -> colored::ColoredString {
    if present {
        "yes".green()
    } else {
        "no".red()
    }
}

fn print_report(report: &CrackReport) {
    println!();
    match &report.outcome {
        CrackOutcome::Found(password) => {
            println!(
                "{} {}",
                "✓ Password found:".bold().green(),
                String::from_utf8_lossy(password).bold().cyan()
            );
            if let Some(path) = &report.result_file {
                println!("  Saved to {}", path.display().to_string().cyan());
            }
        }
        CrackOutcome::Exhausted => {
            println!("{}", "✗ Password not found in the provided candidates".red());
        }
        CrackOutcome::Cancelled => {
            println!("{}", "⚠️  Attack interrupted".yellow());
        }
    }

    println!("\n{}", "Statistics:".bold());
    println!("  Attempts: {}", report.attempts.to_string().cyan());
    println!("  Duration: {:.2}s", report.elapsed.as_secs_f64());
    println!(
        "  Speed: {} passwords/second",
        format!("{:.0}", report.rate()).green()
    );

    if report.outcome == CrackOutcome::Exhausted {
        println!("\n{}", "💡 Tips:".bold().yellow());
        println!("  - Try a larger wordlist (e.g., rockyou.txt)");
        println!("  - Verify the SSID, it salts every key");
    }
}
