use anyhow::{Context, Result};
use clap::Parser;
use shopchat::cli::{Cli, Commands};
use shopchat::storage::{FileSystemStorage, TranscriptStorage};
use shopchat::upload::{AttachmentSlot, ImagePreprocessor};
use shopchat::{utils, BackendClient, ChatSession, SendOutcome, SessionSnapshot, Settings};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::new().context("Failed to load settings")?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let (client, session) = shopchat::connect(&settings)?;
    let preprocessor = Arc::new(ImagePreprocessor::new(settings.image.clone()));

    match cli.command {
        Commands::Chat { message, image } => {
            handle_chat(session, preprocessor, message, image).await
        }
        Commands::Interactive {
            transcript,
            storage_dir,
        } => handle_interactive(session, preprocessor, transcript, storage_dir).await,
        Commands::Transcripts {
            storage_dir,
            delete,
        } => handle_transcripts(storage_dir, delete).await,
        Commands::Products { limit } => handle_products(&client, limit).await,
        Commands::Health { watch } => handle_health(&client, watch).await,
    }
}

/// Prints a notice whenever the session enters the warm-up wait
fn spawn_status_watcher(mut rx: watch::Receiver<SessionSnapshot>) {
    tokio::spawn(async move {
        let mut announced = false;
        while rx.changed().await.is_ok() {
            let warming_up = rx.borrow_and_update().warming_up;
            if warming_up && !announced {
                utils::print_warning(
                    "The assistant is warming up (first load can take a minute), retrying shortly...",
                );
            }
            announced = warming_up;
        }
    });
}

async fn handle_chat(
    session: ChatSession,
    preprocessor: Arc<ImagePreprocessor>,
    message: Option<String>,
    image: Option<PathBuf>,
) -> Result<()> {
    let mut slot = AttachmentSlot::new(preprocessor);
    if let Some(path) = image {
        match slot.attach_file_or_skip(&path).await {
            Some(preview) => utils::print_preview(&preview),
            None => utils::print_warning(&format!(
                "Could not read image {}, sending without it",
                path.display()
            )),
        }
    }
    let prepared = match slot.payload() {
        Some(handle) => handle.wait().await?,
        None => None,
    };

    spawn_status_watcher(session.subscribe());
    utils::print_info("Sending request...");

    match session.send_message(message.as_deref(), prepared.as_deref()).await {
        SendOutcome::Ignored => {
            utils::print_error("Nothing to send: pass a message or --image");
            Ok(())
        }
        outcome => {
            if let Some(reply) = session.snapshot().last_message() {
                println!();
                utils::print_message(reply);
            }
            if outcome == SendOutcome::Failed {
                anyhow::bail!(session.snapshot().error.unwrap_or_default());
            }
            Ok(())
        }
    }
}

async fn handle_interactive(
    session: ChatSession,
    preprocessor: Arc<ImagePreprocessor>,
    transcript: Option<String>,
    storage_dir: PathBuf,
) -> Result<()> {
    utils::print_header("Shopping Assistant");
    utils::print_info("Type your messages (/help for commands, Ctrl+C to exit)\n");

    let storage = match &transcript {
        Some(name) => {
            let storage = FileSystemStorage::new(storage_dir).await?;
            let saved = storage.load(name).await?;
            if saved.is_empty() {
                utils::print_success(&format!("New transcript '{}'", name));
            } else {
                utils::print_success(&format!(
                    "Resumed '{}' with {} previous messages\n",
                    name,
                    saved.messages.len()
                ));
                for message in &saved.messages {
                    utils::print_message(message);
                }
                session.restore(saved);
            }
            Some(storage)
        }
        None => None,
    };

    spawn_status_watcher(session.subscribe());
    let mut slot = AttachmentSlot::new(preprocessor);
    let mut reader = BufReader::new(io::stdin());

    loop {
        utils::print_prompt("You: ");
        let mut input = String::new();
        if reader.read_line(&mut input).await? == 0 {
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(path) = input.strip_prefix("/image ") {
            if let Err(e) = attach(&mut slot, Path::new(path.trim())).await {
                utils::print_error(&format!("{:#}", e));
            }
            continue;
        }

        match input {
            "/new" => {
                session.start_new_chat();
                slot.clear();
                if let (Some(storage), Some(name)) = (&storage, &transcript) {
                    storage.delete(name).await?;
                }
                utils::print_success("Started a new chat\n");
                continue;
            }
            "/drop-image" => {
                slot.clear();
                utils::print_info("Image removed");
                continue;
            }
            "/count" => {
                utils::print_info(&format!("Messages in chat: {}", session.message_count()));
                continue;
            }
            "/help" => {
                println!("Special commands:");
                println!("  /image PATH  - Attach an image to your next message");
                println!("  /drop-image  - Remove the attached image");
                println!("  /send        - Send the attached image without text");
                println!("  /new         - Start a new chat");
                println!("  /count       - Show message count");
                println!("  /help        - Show this help");
                println!("  Ctrl+C       - Exit\n");
                continue;
            }
            _ => {}
        }

        let prepared = match slot.payload() {
            Some(handle) => handle.wait().await.unwrap_or(None),
            None => None,
        };
        slot.clear();

        let text = if input == "/send" { None } else { Some(input) };
        let outcome = session.send_message(text, prepared.as_deref()).await;
        if outcome == SendOutcome::Ignored {
            continue;
        }

        if let Some(reply) = session.snapshot().last_message() {
            utils::print_message(reply);
        }

        if let (Some(storage), Some(name)) = (&storage, &transcript) {
            storage.save(name, &session.transcript()).await?;
        }
    }

    Ok(())
}

async fn attach(slot: &mut AttachmentSlot, path: &Path) -> Result<()> {
    let preview = slot
        .attach_file(path)
        .await
        .with_context(|| format!("Could not attach {}", path.display()))?;
    utils::print_preview(&preview);
    Ok(())
}

async fn handle_transcripts(storage_dir: PathBuf, delete: Option<String>) -> Result<()> {
    let storage = FileSystemStorage::new(storage_dir).await?;

    if let Some(name) = delete {
        if storage.exists(&name).await? {
            storage.delete(&name).await?;
            utils::print_success(&format!("Deleted transcript '{}'", name));
        } else {
            utils::print_warning(&format!("No transcript named '{}'", name));
        }
        return Ok(());
    }

    let names = storage.list().await?;
    if names.is_empty() {
        utils::print_info("No saved transcripts");
        return Ok(());
    }

    utils::print_header(&format!("Saved transcripts ({})", names.len()));
    for name in names {
        let transcript = storage.load(&name).await?;
        println!("  {} ({} messages)", name, transcript.messages.len());
    }
    Ok(())
}

async fn handle_products(client: &BackendClient, limit: Option<usize>) -> Result<()> {
    let products = client.products().await?;
    utils::print_header(&format!("Catalog ({} products)", products.len()));

    for (i, product) in products
        .iter()
        .take(limit.unwrap_or(usize::MAX))
        .enumerate()
    {
        utils::print_product_card(i + 1, product);
    }
    Ok(())
}

async fn handle_health(client: &BackendClient, watch: Option<u64>) -> Result<()> {
    loop {
        match client.health().await {
            Ok(health) if health.ready => utils::print_success(&format!(
                "Backend ready ({} products in catalog)",
                health.catalog_size
            )),
            Ok(health) => utils::print_warning(&format!(
                "Backend status: {} ({} products loaded)",
                health.status, health.catalog_size
            )),
            Err(e) => utils::print_error(&format!("Failed to reach backend: {}", e)),
        }

        // If watch mode enabled, wait and refresh
        if let Some(interval) = watch {
            tokio::time::sleep(tokio::time::Duration::from_secs(interval)).await;
        } else {
            break;
        }
    }

    Ok(())
}
