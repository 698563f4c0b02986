//! haul - download router for aria2 and yt-dlp

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use haul::backend::{CompletionWorker, Downloader, TaskOptions};
use haul::rpc::NotificationListener;
use haul::utils::{AppSettings, Relocator};
use haul::{EngineKind, Task, TaskAction, TaskStatus};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(name = "haul", version, about = "Send links to aria2 or yt-dlp and file the results")]
struct Cli {
    /// Settings file (defaults to <config dir>/haul/settings.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit one or more links
    Add {
        #[arg(required = true)]
        links: Vec<String>,

        /// Force an engine instead of choosing by link
        #[arg(long, value_enum)]
        engine: Option<EngineArg>,

        /// Output directory
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Cookie header value for sites that need a session
        #[arg(long)]
        cookie: Option<String>,

        /// Return right after submission; yt-dlp downloads then finish unattended
        #[arg(long)]
        no_wait: bool,
    },
    /// List known tasks
    List {
        #[arg(long)]
        json: bool,
    },
    Pause {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    Resume {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    Remove {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Follow aria2 notifications and relocate finished downloads until Ctrl-C
    Watch,
}

#[derive(Clone, Copy, ValueEnum)]
enum EngineArg {
    Rpc,
    Process,
}

impl From<EngineArg> for EngineKind {
    fn from(arg: EngineArg) -> Self {
        match arg {
            EngineArg::Rpc => EngineKind::Rpc,
            EngineArg::Process => EngineKind::Process,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays machine-readable (`list --json`)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let settings = AppSettings::resolve(cli.config.as_deref())?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(cli.command, settings))
}

async fn run(command: Command, settings: AppSettings) -> Result<()> {
    let (downloader, completions_tx, completions_rx) = Downloader::from_settings(&settings)?;
    let cancel = CancellationToken::new();

    let worker = CompletionWorker::new(
        downloader.rpc().clone(),
        downloader.process().tasks(),
        Relocator::new(settings.library_dir.clone()),
    );
    let worker_handle = tokio::spawn(worker.run(completions_rx, cancel.clone()));

    // Unattended yt-dlp runs must not hold the process open
    let detach = matches!(command, Command::Add { no_wait: true, .. });

    let result = match command {
        Command::Add {
            links,
            engine,
            dir,
            cookie,
            no_wait,
        } => {
            let options = TaskOptions {
                dir,
                cookie,
                ..Default::default()
            };
            add(&downloader, &links, &options, engine.map(Into::into), no_wait).await
        }
        Command::List { json } => list(&downloader, json).await,
        Command::Pause { ids } => dispatch(&downloader, &ids, TaskAction::Pause).await,
        Command::Resume { ids } => dispatch(&downloader, &ids, TaskAction::Resume).await,
        Command::Remove { ids } => dispatch(&downloader, &ids, TaskAction::Remove).await,
        Command::Watch => {
            let listener = NotificationListener::new(
                settings.notification_url(),
                settings.reconnect_delay(),
                completions_tx.clone(),
            );
            let listener_handle = tokio::spawn(listener.run(cancel.clone()));

            info!("Watching for finished downloads, press Ctrl-C to stop");
            tokio::signal::ctrl_c().await?;
            cancel.cancel();
            listener_handle.await?;
            Ok(())
        }
    };

    // The worker drains until every sender is gone, including those held by running yt-dlp tasks
    if detach {
        cancel.cancel();
    }
    drop(downloader);
    drop(completions_tx);
    worker_handle.await?;

    result
}

async fn add(
    downloader: &Downloader,
    links: &[String],
    options: &TaskOptions,
    engine: Option<EngineKind>,
    no_wait: bool,
) -> Result<()> {
    let submissions = downloader.add_tasks(links, options, engine).await;

    let mut pending = Vec::new();
    for submission in &submissions {
        match (&submission.id, &submission.error) {
            (Some(id), _) => {
                let engine = submission.engine.map(|e| e.as_str()).unwrap_or("-");
                println!("{}  {:<7}  {}", id, engine, submission.link);
                if submission.engine == Some(EngineKind::Process) {
                    pending.push(id.clone());
                }
            }
            (None, error) => {
                eprintln!(
                    "failed  {}: {}",
                    submission.link,
                    error.as_deref().unwrap_or("unknown error")
                );
            }
        }
    }

    if !no_wait && !pending.is_empty() {
        wait_for_process_tasks(downloader, &pending).await;
    }

    let failed = submissions.iter().filter(|s| !s.is_accepted()).count();
    if failed > 0 {
        return Err(anyhow!("{} of {} link(s) were not accepted", failed, submissions.len()));
    }
    Ok(())
}

async fn wait_for_process_tasks(downloader: &Downloader, ids: &[String]) {
    let mut remaining: Vec<String> = ids.to_vec();

    while !remaining.is_empty() {
        tokio::time::sleep(POLL_INTERVAL).await;

        let mut still_running = Vec::new();
        for id in remaining {
            let Some(task) = downloader.process().get_task(&id).await else {
                continue;
            };
            match task.status {
                TaskStatus::Complete => println!("{}  complete  {}", task.id, task.name),
                TaskStatus::Error => println!(
                    "{}  error     {}",
                    task.id,
                    task.error_message.as_deref().unwrap_or("unknown error")
                ),
                _ => {
                    println!(
                        "{}  {:>5.1}%  {}",
                        task.id,
                        task.percentage() * 100.0,
                        format_speed(task.download_speed)
                    );
                    still_running.push(id);
                }
            }
        }
        remaining = still_running;
    }
}

async fn list(downloader: &Downloader, json: bool) -> Result<()> {
    let tasks = downloader.list_tasks().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&tasks)?);
        return Ok(());
    }

    if tasks.is_empty() {
        println!("No tasks");
        return Ok(());
    }

    for task in &tasks {
        print_task(task);
    }
    Ok(())
}

fn print_task(task: &Task) {
    println!(
        "{:<16}  {:<7}  {:<8}  {:>5.1}%  {:>10}  {}",
        task.id,
        task.engine.as_str(),
        task.status.as_str(),
        task.percentage() * 100.0,
        format_speed(task.download_speed),
        task.name
    );
}

async fn dispatch(downloader: &Downloader, ids: &[String], action: TaskAction) -> Result<()> {
    let outcomes = downloader.dispatch(ids, action).await;

    let mut failed = 0;
    for outcome in &outcomes {
        match &outcome.error {
            None => println!("{}  {}", outcome.id, action),
            Some(error) => {
                failed += 1;
                eprintln!("{}  {} failed: {}", outcome.id, action, error);
            }
        }
    }

    if failed > 0 {
        return Err(anyhow!("{} of {} task(s) failed to {}", failed, outcomes.len(), action));
    }
    Ok(())
}

fn format_speed(speed: Option<f64>) -> String {
    match speed {
        Some(bps) if bps >= 1024.0 * 1024.0 => format!("{:.1} MiB/s", bps / (1024.0 * 1024.0)),
        Some(bps) if bps >= 1024.0 => format!("{:.1} KiB/s", bps / 1024.0),
        Some(bps) => format!("{:.0} B/s", bps),
        None => "-".to_string(),
    }
}
