use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use verified_schemes::classifier::{ReputationService, ThreatClassifier, VirusTotalClient};
use verified_schemes::config::AppConfig;
use verified_schemes::conversation::ConversationEngine;
use verified_schemes::directory::ProgramDirectory;
use verified_schemes::dispatch::{Dispatcher, LogSender, MessageSender, TwilioSender};
use verified_schemes::localization::{LibreTranslateClient, Localizer, Translator};
use verified_schemes::session::SessionStore;
use verified_schemes::store::{Database, LibSqlBackend};
use verified_schemes::webhook::{self, AppState};

/// Slack on top of the reputation client's HTTP timeout before a lookup is
/// abandoned.
const LOOKUP_TIMEOUT_SLACK: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("Failed to load configuration")?;
    let _log_guard = init_tracing(config.log_dir.as_deref());

    eprintln!("🛡️  Verified Schemes verifier v{}", env!("CARGO_PKG_VERSION"));

    // ── Database ─────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&config.database_path)
            .await
            .with_context(|| format!("Failed to open database at {}", config.database_path.display()))?,
    );
    eprintln!("   Database: {}", config.database_path.display());

    // ── Program directory ────────────────────────────────────────────────
    let directory = ProgramDirectory::new(Arc::clone(&db));
    if let Some(path) = &config.programs_path {
        directory
            .import_file(path)
            .await
            .with_context(|| format!("Failed to import programs from {}", path.display()))?;
    }
    eprintln!("   Programs: {}", directory.count().await?);

    // ── Classifier ───────────────────────────────────────────────────────
    let lookup_timeout = config
        .reputation
        .as_ref()
        .map(|rep| rep.timeout)
        .unwrap_or_default()
        + LOOKUP_TIMEOUT_SLACK;
    let reputation: Option<Arc<dyn ReputationService>> = match config.reputation.clone() {
        Some(rep) => {
            eprintln!("   Reputation: {} (timeout {:?})", rep.api_base, rep.timeout);
            Some(Arc::new(VirusTotalClient::new(rep)?))
        }
        None => {
            eprintln!("   Reputation: disabled (VIRUSTOTAL_API_KEY not set)");
            None
        }
    };
    let classifier = Arc::new(
        ThreatClassifier::new(reputation, Some(directory.clone())).with_lookup_timeout(lookup_timeout),
    );

    // ── Localization ─────────────────────────────────────────────────────
    let translator: Option<Arc<dyn Translator>> = match config.translation.clone() {
        Some(tr) => {
            eprintln!("   Translation: {}", tr.api_url);
            Some(Arc::new(LibreTranslateClient::new(tr)?))
        }
        None => {
            eprintln!("   Translation: disabled (replies stay in English)");
            None
        }
    };
    let localizer = Arc::new(Localizer::new(translator));

    // ── Outbound ─────────────────────────────────────────────────────────
    let sender: Arc<dyn MessageSender> = match config.twilio.clone() {
        Some(twilio) => {
            eprintln!("   WhatsApp: Twilio as {}", twilio.whatsapp_number);
            Arc::new(TwilioSender::new(twilio)?)
        }
        None => {
            eprintln!("   WhatsApp: dry run (Twilio credentials not set)");
            Arc::new(LogSender)
        }
    };

    // ── Webhook server ───────────────────────────────────────────────────
    let state = AppState {
        sessions: Arc::new(SessionStore::new(Arc::clone(&db))),
        engine: Arc::new(ConversationEngine::new(
            classifier,
            directory,
            localizer,
            config.conversation.clone(),
        )),
        dispatcher: Arc::new(Dispatcher::new(sender)),
    };
    let app = webhook::router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.server.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.server.port))?;
    eprintln!("   Webhook: http://0.0.0.0:{}/whatsapp/webhook\n", config.server.port);
    tracing::info!(port = config.server.port, "Webhook server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Webhook server stopped");
    Ok(())
}

/// Console logging, plus a daily rolling file when `log_dir` is set.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "verifier.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    guard
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
