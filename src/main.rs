use anyhow::Result;
use clap::Parser;
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;
use uuid::Uuid;

use scribeq::captions::CaptionFetcher;
use scribeq::cli::{CaptionsKeyAction, Cli, Commands, KeysAction, LibraryAction};
use scribeq::config::{Concurrency, SettingsStore};
use scribeq::keys::{mask_key, ApiKeyEntry, SettingsKeys};
use scribeq::library::Library;
use scribeq::media::MediaPayload;
use scribeq::queue::{JobQueue, JobStatus};
use scribeq::resolver::{self, OEmbedResolver};
use scribeq::store::{FileStorage, Storage};
use scribeq::transcribe::GeminiClient;
use scribeq::utils::{format_file_size, truncate_name};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scribeq=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Transcribe {
            inputs,
            concurrency,
            output,
            retry_failed,
        } => cmd_transcribe(inputs, concurrency, output.as_deref(), retry_failed, cli.api_key).await,
        Commands::Library { action } => cmd_library(action),
        Commands::Keys { action } => cmd_keys(action),
        Commands::CaptionsKey { action } => cmd_captions_key(action),
    }
}

fn open_storage() -> Result<Arc<dyn Storage>> {
    Ok(Arc::new(FileStorage::new()?))
}

async fn cmd_transcribe(
    inputs: Vec<String>,
    concurrency: Option<usize>,
    output: Option<&Path>,
    retry_failed: bool,
    api_key_override: Option<String>,
) -> Result<()> {
    let storage = open_storage()?;
    let settings = SettingsStore::open(Arc::clone(&storage))?;
    let concurrency = concurrency
        .map(Concurrency::Fixed)
        .unwrap_or(settings.settings().concurrency);

    let settings = Arc::new(Mutex::new(settings));
    let keys = Arc::new(SettingsKeys::new(Arc::clone(&settings)).with_default_override(api_key_override));
    let library = Library::open(Arc::clone(&storage))?;

    let client = reqwest::Client::new();
    let mut queue = JobQueue::new(
        Arc::new(CaptionFetcher::new(client.clone())),
        Arc::new(GeminiClient::new(client.clone())),
        Arc::new(OEmbedResolver::new(client)),
        keys,
        library,
        concurrency,
    );

    for input in &inputs {
        enqueue_input(&mut queue, input)?;
    }

    run_queue(&mut queue).await;

    if retry_failed && queue.jobs().iter().any(|j| j.status == JobStatus::Error) {
        println!("{}", style("Retrying failed jobs...").yellow());
        queue.retry_all_failed();
        run_queue(&mut queue).await;
    }

    print_summary(&queue);
    deliver_transcripts(&queue, output)?;

    if queue.is_paused() {
        eprintln!(
            "{}",
            style("The queue paused because no transcription API key is configured. Add one with `scribeq keys add <name> <key>` or set SCRIBEQ_API_KEY.")
                .yellow()
        );
    }
    Ok(())
}

fn enqueue_input(queue: &mut JobQueue, input: &str) -> Result<()> {
    let path = Path::new(input);
    if path.is_file() {
        let payload = MediaPayload::read_from(path)?;
        queue.enqueue_file(payload);
        return Ok(());
    }

    let is_http_url = Url::parse(input)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false);
    if is_http_url || resolver::extract_video_id(input).is_some() {
        queue.enqueue_url(input.to_string());
        return Ok(());
    }

    anyhow::bail!("input is neither an existing media file nor a URL: {input}");
}

async fn run_queue(queue: &mut JobQueue) {
    let bars = MultiProgress::new();
    let bar_style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:30.cyan/blue}] {pos:>3}% {msg}")
        .unwrap()
        .progress_chars("#>-");
    let mut by_job: HashMap<Uuid, ProgressBar> = HashMap::new();

    queue
        .run_until_drained(|jobs| {
            for job in jobs {
                let bar = by_job.entry(job.id).or_insert_with(|| {
                    let bar = bars.add(ProgressBar::new(100));
                    bar.set_style(bar_style.clone());
                    bar
                });
                bar.set_position(job.progress as u64);
                bar.set_message(format!(
                    "{} [{}]",
                    truncate_name(&job.display_name, 40),
                    job.status
                ));
                if job.status.is_terminal() && !bar.is_finished() {
                    bar.finish();
                }
            }
        })
        .await;
}

fn print_summary(queue: &JobQueue) {
    println!();
    for job in queue.jobs() {
        match job.status {
            JobStatus::Completed => {
                println!("  {} {}", style("done  ").green(), job.display_name);
            }
            JobStatus::Error => {
                println!(
                    "  {} {} - {}",
                    style("failed").red(),
                    job.display_name,
                    job.error.as_deref().unwrap_or("unknown error")
                );
            }
            other => {
                println!("  {} {} ({other})", style("queued").yellow(), job.display_name);
            }
        }
    }
}

fn deliver_transcripts(queue: &JobQueue, output: Option<&Path>) -> Result<()> {
    let completed: Vec<_> = queue
        .jobs()
        .iter()
        .filter(|j| j.status == JobStatus::Completed)
        .collect();
    if completed.is_empty() {
        return Ok(());
    }

    let blob = completed
        .iter()
        .map(|job| {
            format!(
                "===== {} =====\n\n{}",
                job.display_name,
                job.transcript.as_deref().unwrap_or_default()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    match output {
        Some(path) => {
            fs_err::write(path, &blob)?;
            println!("Transcripts saved to: {}", path.display());
        }
        None => println!("\n{blob}"),
    }
    Ok(())
}

fn cmd_library(action: LibraryAction) -> Result<()> {
    let mut library = Library::open(open_storage()?)?;

    match action {
        LibraryAction::List => {
            if library.items().is_empty() {
                println!("Library is empty.");
                return Ok(());
            }
            for item in library.items() {
                println!(
                    "{}  {:>9}  {}  {}",
                    item.id,
                    format_file_size(item.file_size),
                    item.created_at.format("%Y-%m-%d %H:%M"),
                    truncate_name(&item.file_name, 48)
                );
            }
        }
        LibraryAction::Show { id } => {
            let item = library
                .get(&id)
                .ok_or_else(|| anyhow::anyhow!("no library item with id {id}"))?;
            println!("{}", item.transcript);
        }
        LibraryAction::Export { output } => {
            let blob = library.export_all();
            match output {
                Some(path) => {
                    fs_err::write(&path, &blob)?;
                    println!(
                        "Exported {} transcripts to {}",
                        library.items().len(),
                        path.display()
                    );
                }
                None => println!("{blob}"),
            }
        }
        LibraryAction::Remove { id } => {
            if library.remove(&id)? {
                println!("Removed {id}");
            } else {
                anyhow::bail!("no library item with id {id}");
            }
        }
        LibraryAction::Clear => {
            let count = library.items().len();
            library.clear()?;
            println!("Removed {count} transcripts");
        }
    }
    Ok(())
}

fn cmd_keys(action: KeysAction) -> Result<()> {
    let mut store = SettingsStore::open(open_storage()?)?;

    match action {
        KeysAction::Add { name, key } => {
            let entry = ApiKeyEntry::new(name, key);
            let id = entry.id.clone();
            let label = entry.name.clone();
            store.update(|s| {
                s.active_key_id = Some(entry.id.clone());
                s.api_keys.push(entry);
            })?;
            println!("Added key '{label}' ({id}) and made it active");
        }
        KeysAction::List => {
            let settings = store.settings();
            if settings.api_keys.is_empty() {
                println!("No keys configured.");
                return Ok(());
            }
            for entry in &settings.api_keys {
                let active = settings.active_key_id.as_deref() == Some(entry.id.as_str());
                println!(
                    "{} {}  {}  {}",
                    if active { "*" } else { " " },
                    entry.id,
                    entry.name,
                    mask_key(&entry.key)
                );
            }
        }
        KeysAction::Use { id } => {
            if !store.settings().api_keys.iter().any(|e| e.id == id) {
                anyhow::bail!("no key with id {id}");
            }
            store.update(|s| s.active_key_id = Some(id.clone()))?;
            println!("Active key set to {id}");
        }
        KeysAction::Remove { id } => {
            if !store.settings().api_keys.iter().any(|e| e.id == id) {
                anyhow::bail!("no key with id {id}");
            }
            store.update(|s| {
                s.api_keys.retain(|e| e.id != id);
                if s.active_key_id.as_deref() == Some(id.as_str()) {
                    s.active_key_id = None;
                }
            })?;
            println!("Removed key {id}");
        }
    }
    Ok(())
}

fn cmd_captions_key(action: CaptionsKeyAction) -> Result<()> {
    let mut store = SettingsStore::open(open_storage()?)?;

    match action {
        CaptionsKeyAction::Set { key } => {
            store.update(|s| s.caption_api_key = Some(key))?;
            println!("Caption-search key set");
        }
        CaptionsKeyAction::Clear => {
            store.update(|s| s.caption_api_key = None)?;
            println!("Caption-search key removed");
        }
        CaptionsKeyAction::Show => match &store.settings().caption_api_key {
            Some(key) => println!("{}", mask_key(key)),
            None => println!("No caption-search key configured."),
        },
    }
    Ok(())
}
