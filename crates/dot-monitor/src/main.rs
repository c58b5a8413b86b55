use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use dot_monitor::alarm::AlarmReactor;
use dot_monitor::config::MonitorConfig;
use dot_monitor::events::SessionEvent;
use dot_monitor::providers::primary_provider;
use dot_monitor::report::{
    append_event, format_report, sensor_panel, status_line, write_report,
};
use dot_monitor::session::{Session, SessionError};
use dot_monitor::trajectory::run_trajectory;
use dot_monitor::AdvisoryService;
use safety_core::{
    AdvisoryError, AdvisoryInput, AdvisoryProvider, LocalRuleProvider, Page, TelemetryState,
};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "DOT battery cabinet safety monitor", long_about = None)]
struct Cli {
    /// TOML configuration file; environment variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Operator page to open the session on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PageArg {
    /// Gauges, countdown and advisory.
    Home,
    /// Per-channel sensor gauges under each status line.
    Sensors,
    /// Trend history.
    Bi,
}

impl From<PageArg> for Page {
    fn from(arg: PageArg) -> Self {
        match arg {
            PageArg::Home => Page::Home,
            PageArg::Sensors => Page::Sensors,
            PageArg::Bi => Page::Bi,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a live monitoring session.
    Run {
        /// Start with critical mode engaged.
        #[arg(long)]
        critical: bool,
        /// Stop after this many seconds (default: until Ctrl-C).
        #[arg(long)]
        duration: Option<u64>,
        /// Request an advisory every N seconds.
        #[arg(long)]
        advise_every: Option<u64>,
        /// Seconds between status lines.
        #[arg(long, default_value_t = 1)]
        status_every: u64,
        /// Start with the siren muted.
        #[arg(long)]
        mute: bool,
        /// Page to open on.
        #[arg(long, value_enum, default_value_t = PageArg::Home)]
        page: PageArg,
        /// Write the trend report here on exit.
        #[arg(long)]
        report: Option<PathBuf>,
        /// Append every session event to this JSONL file.
        #[arg(long)]
        events: Option<PathBuf>,
    },
    /// Run the simulator offline and summarise the trajectory.
    Simulate {
        #[arg(long, default_value_t = 600)]
        ticks: u64,
        #[arg(long)]
        critical: bool,
        #[arg(long)]
        seed: Option<u64>,
        /// Print the summary as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Produce one advisory for the given readings.
    Advise {
        #[arg(long)]
        temperature: f64,
        #[arg(long)]
        gas: f64,
        #[arg(long, default_value_t = 600.0)]
        time_left: f64,
        /// Use the local rule table only.
        #[arg(long)]
        local: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = MonitorConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Run {
            critical,
            duration,
            advise_every,
            status_every,
            mute,
            page,
            report,
            events,
        } => {
            let opts = RunOptions {
                critical,
                duration: duration.map(Duration::from_secs),
                advise_every: advise_every.filter(|s| *s > 0).map(Duration::from_secs),
                status_every: Duration::from_secs(status_every.max(1)),
                mute,
                page: page.into(),
                report,
                events,
            };
            run_session(&config, opts).await
        }
        Command::Simulate {
            ticks,
            critical,
            seed,
            json,
        } => {
            let seed = seed.or(config.seed);
            let summary = run_trajectory(&config.simulator, ticks, critical, seed);
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{}", summary.render());
            }
            Ok(())
        }
        Command::Advise {
            temperature,
            gas,
            time_left,
            local,
        } => {
            let provider: Arc<dyn AdvisoryProvider> = if local {
                Arc::new(LocalRuleProvider::new())
            } else {
                primary_provider(&config)
            };
            let service = AdvisoryService::new(provider, config.advisory_timeout());
            let state = TelemetryState::new(temperature, gas, time_left);
            let input = AdvisoryInput::from_state(&state);
            let response = service
                .request(&input)
                .await
                .context("Advisory service rejected the request")?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
    }
}

struct RunOptions {
    critical: bool,
    duration: Option<Duration>,
    advise_every: Option<Duration>,
    status_every: Duration,
    mute: bool,
    page: Page,
    report: Option<PathBuf>,
    events: Option<PathBuf>,
}

async fn run_session(config: &MonitorConfig, opts: RunOptions) -> Result<()> {
    let handle = Session::spawn(config, primary_provider(config))?;
    let cancel = CancellationToken::new();

    let alarm = tokio::spawn(
        AlarmReactor::new(handle.subscribe(), handle.snapshot().severity).run(cancel.clone()),
    );

    let mut events = handle.subscribe();
    let event_log = opts.events.clone();

    if opts.critical {
        handle.set_critical(true).await?;
    }
    if opts.mute {
        handle.set_muted(true).await?;
    }
    if opts.page != Page::Home {
        handle.select_page(opts.page).await?;
    }

    let deadline = async {
        match opts.duration {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    let mut status = tokio::time::interval(opts.status_every);
    // Disabled by the select guard when no cadence is set.
    let advise_period = opts.advise_every.unwrap_or(Duration::from_secs(3600));
    let mut advise = tokio::time::interval(advise_period);
    advise.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = &mut interrupt => {
                info!("Interrupted; shutting down");
                break;
            }
            _ = &mut deadline => break,
            _ = status.tick() => {
                let view = handle.view();
                println!("{}", status_line(&view));
                if let Some(panel) = sensor_panel(&view) {
                    println!("{panel}");
                }
            }
            _ = advise.tick(), if opts.advise_every.is_some() => {
                match handle.request_advisory().await {
                    Ok(()) => {}
                    Err(SessionError::Advisory(AdvisoryError::Busy)) => {
                        debug!("Previous advisory still running; skipping");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            received = events.recv() => match received {
                Ok(event) => {
                    if let SessionEvent::AdvisoryCompleted { response } = &event {
                        info!(
                            level = %response.level,
                            served_by = %response.served_by,
                            risk = %response.payload.risk_level,
                            recommendation = %response.payload.recommendation,
                            prediction = %response.payload.prediction,
                            "Advisory"
                        );
                    }
                    if let Some(path) = &event_log {
                        if let Err(e) = append_event(&event, path) {
                            warn!(error = %e, "Event log write failed");
                        }
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event log lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    let outcome = handle.shutdown().await?;
    cancel.cancel();
    if let Ok(alarm) = alarm.await {
        info!(
            activations = alarm.activations,
            siren_beeps = alarm.siren_beeps,
            "Alarm summary"
        );
    }

    let report = outcome.history.report(Utc::now());
    println!("{}", format_report(&report));
    if let Some(path) = &opts.report {
        write_report(&report, path)?;
    }
    info!(ticks = outcome.ticks, "Session complete");
    Ok(())
}
