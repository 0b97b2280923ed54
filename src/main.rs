use std::sync::Arc;

use eva_assist::channels::CliChannel;
use eva_assist::chat::SessionRegistry;
use eva_assist::chat::ws::{chat_routes, serve};
use eva_assist::config::AssistantConfig;
use eva_assist::dialogue::Orchestrator;
use eva_assist::documents::AssetDirectory;
use eva_assist::identity::{HandoffFlags, MockIdentityStore};
use eva_assist::store::{JsonFileStore, KeyValueStore, MemoryStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing, optionally mirrored to a daily log file
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    let _log_guard = match std::env::var("EVA_LOG_DIR") {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "eva-assist.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer)
                .init();
            Some(guard)
        }
        Err(_) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    };

    let config = AssistantConfig::from_env();
    config.validate()?;
    let config = Arc::new(config);

    // ── Storage ─────────────────────────────────────────────────────────
    let storage_path = std::env::var("EVA_STORAGE_PATH")
        .unwrap_or_else(|_| "./data/local-storage.json".to_string());
    let local: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(&storage_path)?);
    let session_storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());

    // ── Dialogue ────────────────────────────────────────────────────────
    let identity = Arc::new(MockIdentityStore::new(local, config.login_delay));
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&config),
        identity,
    ));
    let documents = Arc::new(AssetDirectory::new(config.bill_pdf_path()));
    let registry = SessionRegistry::new(orchestrator, documents, HandoffFlags::new(session_storage));

    eprintln!("💬 EVA Assist v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Assistant: {}", config.assistant_name);
    eprintln!("   Storage: {}", storage_path);
    eprintln!("   Bill PDF: {}", config.bill_pdf_path().display());
    eprintln!("   Chat API: http://0.0.0.0:{}/api/chat/sessions", config.port);
    eprintln!("   Chat WS: ws://0.0.0.0:{}/ws/chat/{{id}}", config.port);
    eprintln!("   Type a message and press Enter. /help for commands, /quit to exit.\n");

    // Spawn Axum WS/REST server
    let app = chat_routes(Arc::clone(&registry));
    let addr = format!("0.0.0.0:{}", config.port);
    tokio::spawn(async move {
        if let Err(e) = serve(&addr, app).await {
            tracing::error!(error = %e, "Chat server stopped");
        }
    });

    // Local REPL on its own session
    let session = registry.create().await;
    CliChannel::new(session).run().await?;

    Ok(())
}
