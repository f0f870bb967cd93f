//! cmd-metrics entrypoint: samples once, or every interval until SIGINT/SIGTERM.
//! In delta mode one line per interval aggregates every tracked command; otherwise
//! the matching process records are listed.

use clap::Parser;
use cmd_metrics::{
    cli::Cli,
    collectors::{page_size, ticks_per_second, ProcRoots, Sampler},
    config::MetricsConfig,
    error::Result,
    logging::StructuredLogger,
    metrics::CommandMetrics,
    output::ReportSink,
    report::{timestamp_now, DeltaReport, ProcessListing},
    signals::{self, Ticker, Wake, CONTROL},
};
use std::io::Write;
use std::process::ExitCode;
use std::time::Duration;
use sysinfo::System;
use tracing::{debug, info};

enum Mode {
    Delta {
        metrics: CommandMetrics,
        report: DeltaReport,
    },
    Listing(ProcessListing),
}

fn log_host(ticks_per_sec: u64) {
    let mut sys = System::new();
    sys.refresh_cpu();
    sys.refresh_memory();
    info!(
        cpus = sys.cpus().len(),
        total_memory = sys.total_memory(),
        available_memory = sys.available_memory(),
        page_size = page_size(),
        ticks_per_sec,
        "host"
    );
}

fn run_one_cycle(
    mode: &mut Mode,
    sampler: &mut Sampler,
    sink: &mut ReportSink,
    ticks_per_sec: u64,
) -> Result<()> {
    match mode {
        Mode::Delta { metrics, report } => {
            let sample = sampler.run_delta_cycle(metrics)?;
            let deltas = metrics.compute_deltas(ticks_per_sec);
            report.write_interval(sink, &timestamp_now(), &deltas)?;
            debug!(
                interval = metrics.intervals(),
                lines = report.lines_written(),
                records = sample.processes.len(),
                indexed_sockets = sample.indexed_sockets,
                "cycle complete"
            );
        }
        Mode::Listing(listing) => {
            let records = sampler.collect_processes()?;
            listing.write(sink, &records)?;
        }
    }
    sink.flush()?;
    Ok(())
}

fn run(config: &MetricsConfig) -> Result<()> {
    config.validate()?;

    let ticks_per_sec = ticks_per_second();
    log_host(ticks_per_sec);

    let roots = ProcRoots::from_env(config);
    info!(proc_root = %roots.proc_root.display(), tcp = %roots.tcp.display(), "sources");
    let mut sampler = Sampler::new(config, roots)?;
    let mut sink = ReportSink::open(config.output.path.as_deref())?;
    if let Some(path) = sink.reopen_path() {
        info!(path = %path.display(), "report output (reopened on SIGHUP)");
    }

    let mut mode = if config.delta {
        Mode::Delta {
            metrics: CommandMetrics::new(&config.commands)?,
            report: DeltaReport::new(config.sockets, config.repeat_header, config.output.json),
        }
    } else {
        Mode::Listing(ProcessListing::new(config.threads))
    };

    let mut ticker = if config.interval_secs > 0 {
        signals::install_handlers()?;
        info!(interval_secs = config.interval_secs, "sampling (Ctrl+C to stop)");
        Some(Ticker::new(Duration::from_secs(config.interval_secs)))
    } else {
        None
    };

    loop {
        run_one_cycle(&mut mode, &mut sampler, &mut sink, ticks_per_sec)?;
        let Some(ticker) = ticker.as_mut() else {
            break;
        };
        if ticker.wait(&CONTROL) == Wake::Stop {
            break;
        }
        if CONTROL.take_reopen() {
            sink.reopen();
        }
    }

    sink.flush()?;
    info!("cmd-metrics stopping");
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let file_config = cli
        .config
        .clone()
        .or_else(MetricsConfig::default_path)
        .map(|p| MetricsConfig::load(&p))
        .unwrap_or_default();
    let config = cli.apply(file_config);

    StructuredLogger::init(config.log.json, &config.log.level);

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {e}");
            ExitCode::FAILURE
        }
    }
}
