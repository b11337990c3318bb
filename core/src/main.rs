/// Messaging demo - runs a simulated session and logs its events
use chrono::Utc;
use messaging_core::clock::RuntimeClock;
use messaging_core::directory::{ConnectionsDirectory, LocalUser, StaticDirectory};
use messaging_core::ids::UuidIds;
use messaging_core::messenger_types::{Message, MessageKind, MessengerEvent, Participant};
use messaging_core::{MessagingConfig, SeedConversation, SessionBootstrap, SessionHandle};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_DEMO_SECS: u64 = 20;

fn connections() -> Vec<Participant> {
    [
        ("usr_1", "Priya Raman", "Staff Engineer"),
        ("usr_2", "Tomás Ortega", "Recruiter"),
        ("usr_3", "Mei Chen", "Product Designer"),
    ]
    .into_iter()
    .map(|(id, name, title)| Participant {
        id: id.to_string(),
        display_name: name.to_string(),
        title: title.to_string(),
        avatar: format!("avatars/{}.png", id),
        online: false,
    })
    .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let config = MessagingConfig::from_env()
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    let run_for = std::env::var("MESSAGING_DEMO_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(DEFAULT_DEMO_SECS);

    let directory = StaticDirectory::new(connections());
    let priya = directory
        .find("usr_1")
        .ok_or_else(|| anyhow::anyhow!("demo directory is missing usr_1"))?;
    let bootstrap = SessionBootstrap {
        conversations: vec![SeedConversation {
            id: None,
            participant: priya,
            messages: vec![Message {
                id: "msg_seed".to_string(),
                conversation_id: String::new(),
                sender_id: "usr_1".to_string(),
                content: "Saw your post on async Rust, nice write-up!".to_string(),
                kind: MessageKind::Text,
                timestamp: Utc::now(),
                is_read: false,
                status: None,
            }],
            created_at: None,
        }],
        online: vec!["usr_1".to_string(), "usr_3".to_string()],
        viewport_width: Some(1280),
    };

    let handle = SessionHandle::start(
        LocalUser::new("me", "Demo User"),
        Arc::new(directory),
        bootstrap,
        config,
        Arc::new(RuntimeClock::new()),
        Box::new(UuidIds),
    )
    .map_err(|e| anyhow::anyhow!("Login failed: {}", e))?;

    let mut events = handle.subscribe();
    let logger = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => log_event(&event),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Event log lagged {} events", n);
                }
                Err(_) => break,
            }
        }
    });

    info!("🚀 Demo session running for {}s", run_for);
    info!("   Unread at login: {}", handle.total_unread().await?);

    let conv = handle.start_conversation("usr_3").await?;
    handle
        .send_message(&conv, "Hi Mei, do you have time for a portfolio review?", MessageKind::Text)
        .await?;

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(run_for)) => {}
        _ = signal::ctrl_c() => info!("Ctrl+C received"),
    }

    for row in handle.conversation_summaries().await? {
        info!(
            "{} ({}): {} unread, last: {:?}",
            row.participant_name, row.conversation_id, row.unread_count, row.last_preview
        );
    }
    info!("Total unread: {}", handle.total_unread().await?);

    handle.logout().await?;
    logger.abort();
    info!("Demo finished");
    Ok(())
}

fn log_event(event: &MessengerEvent) {
    match serde_json::to_string(event) {
        Ok(json) => info!("event {}", json),
        Err(e) => warn!("Unserializable event: {}", e),
    }
}
