use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use starlet_cli::demo::{seed_demo_store, DEMO_CONVERSATION, DEMO_USER};
use starlet_cli::tracing_setup;
use starlet_core::config::CoreConfig;
use starlet_core::feed::FeedLoader;
use starlet_core::messaging::{ConversationListeners, MessagingLoader, MessagingStore, Outbox, SendOutcome};
use starlet_core::models::MessageBody;
use starlet_core::store::{LocalStore, MemoryLocalStore, SqliteStore};

#[derive(Parser)]
#[command(name = "starlet-cli")]
#[command(about = "Starlet marketplace core, driven against the in-memory store")]
struct Cli {
    /// Pretty-print JSON output
    #[arg(long, short)]
    pretty: bool,

    /// Directory for the durable message cache
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the ranked featured feed
    Feed,

    /// Run a scripted chat session: cached loads, optimistic sends,
    /// a retry storm, and listener switching
    ChatDemo,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_setup::init_tracing()?;
    let cli = Cli::parse();
    let config = match &cli.data_dir {
        Some(dir) => CoreConfig::new(dir),
        None => CoreConfig::default(),
    };

    match cli.command {
        Commands::Feed => run_feed(&config, cli.pretty).await,
        Commands::ChatDemo => run_chat_demo(&config).await,
    }
}

async fn run_feed(config: &CoreConfig, pretty: bool) -> anyhow::Result<()> {
    let store = seed_demo_store();
    let loader = FeedLoader::new(store, &config.feed);
    let feed = loader.load().await;

    if pretty {
        println!("{}", serde_json::to_string_pretty(&feed)?);
        return Ok(());
    }

    println!("{:<10} {:<30} {:<22} {:>14}", "tier", "title", "location", "price");
    for listing in &feed {
        println!(
            "{:<10} {:<30} {:<22} {:>14}",
            listing.tier.label(),
            listing.title,
            listing.display_location(),
            listing.display_price()
        );
    }
    Ok(())
}

async fn run_chat_demo(config: &CoreConfig) -> anyhow::Result<()> {
    let store = seed_demo_store();
    let state = Arc::new(Mutex::new(MessagingStore::new()));

    // Durable cache lives under the data dir; cache persistence failing is
    // never fatal, so fall back to a session-only store.
    let durable: Arc<dyn LocalStore> = match SqliteStore::open(&config.data_dir) {
        Ok(sqlite) => Arc::new(sqlite),
        Err(e) => {
            eprintln!("warning: durable cache unavailable ({e}); using in-memory cache");
            Arc::new(MemoryLocalStore::new())
        }
    };
    let loader = MessagingLoader::new(store.clone(), durable, config.cache.clone());
    // Same shape as production, shorter waits for an interactive demo
    let mut retry = config.retry;
    retry.base_delay = Duration::from_millis(100);
    let outbox = Outbox::new(store.clone(), state.clone(), retry)
        .with_message_cache(loader.message_cache());

    // Conversation list, then open the chat view
    let conversations = loader.conversations_for(DEMO_USER).await;
    println!("conversations for {DEMO_USER}:");
    for conv in &conversations {
        println!(
            "  {} with {} ({} unread): {}",
            conv.id,
            conv.counterpart(DEMO_USER).unwrap_or("?"),
            conv.unread_count,
            conv.last_message.as_deref().unwrap_or("")
        );
    }

    let mut listeners = ConversationListeners::new(store.clone());
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    listeners.open(DEMO_CONVERSATION, tx)?;

    // Feed the initial snapshot into the shared state
    if let Some(snapshot) = rx.recv().await {
        state.lock().handle_snapshot(&snapshot);
    }
    state.lock().mark_conversation_read(DEMO_CONVERSATION, DEMO_USER);

    // A send that goes through first try
    let outcome = outbox
        .send(
            DEMO_CONVERSATION,
            DEMO_USER,
            MessageBody::text("Great - can I view on Saturday morning?"),
        )
        .await;
    println!("\nfirst send: {outcome:?}");
    while let Ok(snapshot) = rx.try_recv() {
        state.lock().handle_snapshot(&snapshot);
    }

    // A send that exhausts its retries, then an explicit user retry
    store.fail_next_writes(retry.max_attempts);
    let outcome = outbox
        .send(DEMO_CONVERSATION, DEMO_USER, MessageBody::text("10am works for me."))
        .await;
    println!("send during outage: {outcome:?}");

    if let SendOutcome::Failed { temp_id, .. } = outcome {
        let retried = outbox.retry(DEMO_CONVERSATION, &temp_id).await;
        println!("explicit retry: {retried:?}");
    }
    while let Ok(snapshot) = rx.try_recv() {
        state.lock().handle_snapshot(&snapshot);
    }

    println!("\ntranscript:");
    {
        let state = state.lock();
        for msg in state.messages(DEMO_CONVERSATION) {
            println!(
                "  [{:?}] {}: {}",
                msg.status,
                state.display_name(&msg.sender_id),
                msg.body.preview()
            );
        }
    }

    // Switching conversations tears the listener down
    listeners.close();
    tokio::time::sleep(Duration::from_millis(10)).await;
    println!("\nactive listeners after close: {}", store.subscriber_count());
    Ok(())
}
