use std::sync::Arc;

use anyhow::Context;
use futures::StreamExt;

use taxi_relay::channels::{
    CommandInvocation, InboundStream, InboundUpdate, OutgoingPayload, TelegramChannel, Transport,
};
use taxi_relay::commands::CommandHandler;
use taxi_relay::config::RelayConfig;
use taxi_relay::logging;
use taxi_relay::pipeline::classifier::Classifier;
use taxi_relay::pipeline::dispatcher::{Dispatcher, FailureSink, OperatorEscalator};
use taxi_relay::pipeline::formatter::NotificationFormatter;
use taxi_relay::pipeline::processor::RequestProcessor;
use taxi_relay::pipeline::retry::RetryPolicy;
use taxi_relay::pipeline::types::Destination;
use taxi_relay::store::{ConfigStore, JsonFileStore};
use taxi_relay::worker::ChatWorkers;

/// Everything the update loop needs.
struct Relay {
    updates: InboundStream,
    transport: Arc<dyn Transport>,
    failures: Arc<dyn FailureSink>,
    commands: Arc<CommandHandler>,
    workers: ChatWorkers,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let config = RelayConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export BOT_TOKEN=... MAIN_GROUP_IDS=... DRIVER_GROUP_IDS=...");
        std::process::exit(1);
    });

    let _log_guard = logging::init(&config.log_dir)
        .with_context(|| format!("setting up logging in {}", config.log_dir.display()))?;

    eprintln!("🚖 Taxi Relay v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Source groups: {}", config.source_groups.len());
    eprintln!("   Driver groups: {}", config.driver_groups.len());
    eprintln!(
        "   Operator: {}",
        config
            .operator
            .as_ref()
            .map_or_else(|| "none".to_string(), ToString::to_string)
    );
    eprintln!("   Config file: {}\n", config.config_file.display());

    let relay = bootstrap(config).await.context("starting relay")?;
    run(relay).await;

    Ok(())
}

async fn bootstrap(config: RelayConfig) -> taxi_relay::error::Result<Relay> {
    let store: Arc<dyn ConfigStore> = Arc::new(JsonFileStore::open(&config.config_file).await?);

    let formatter = NotificationFormatter::new(config.group_links(), config.display_offset);
    let source_chats = config.source_chat_ids();
    let telegram = Arc::new(TelegramChannel::new(config.bot_token, source_chats));
    telegram.health_check().await?;
    let transport: Arc<dyn Transport> = telegram.clone();

    let failures: Arc<dyn FailureSink> = Arc::new(OperatorEscalator::new(
        Arc::clone(&transport),
        config.operator,
        RetryPolicy::fixed(config.escalation_attempts, config.escalation_delay),
    ));
    let dispatcher = Dispatcher::new(Arc::clone(&transport), Arc::clone(&failures))
        .with_pacing(config.delivery_pacing);

    let processor = RequestProcessor::new(
        Classifier::new(config.classifier),
        formatter,
        dispatcher,
        Arc::clone(&store),
        Arc::clone(&failures),
        config.driver_groups,
    );

    let updates = telegram.start().await?;
    tracing::info!("Relay started");

    Ok(Relay {
        updates,
        transport,
        failures,
        commands: Arc::new(CommandHandler::new(store)),
        workers: ChatWorkers::new(Arc::new(processor)),
    })
}

async fn run(mut relay: Relay) {
    loop {
        tokio::select! {
            update = relay.updates.next() => match update {
                Some(InboundUpdate::Message(message)) => relay.workers.submit(message).await,
                Some(InboundUpdate::Command(invocation)) => {
                    tokio::spawn(answer_command(
                        Arc::clone(&relay.commands),
                        Arc::clone(&relay.transport),
                        Arc::clone(&relay.failures),
                        invocation,
                    ));
                }
                None => {
                    tracing::warn!("Update stream ended");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown requested");
                break;
            }
        }
    }

    relay.workers.shutdown().await;
    tracing::info!("Relay stopped");
}

async fn answer_command(
    commands: Arc<CommandHandler>,
    transport: Arc<dyn Transport>,
    failures: Arc<dyn FailureSink>,
    invocation: CommandInvocation,
) {
    let reply = match commands
        .handle(invocation.user_id, &invocation.command)
        .await
    {
        Ok(reply) => reply,
        Err(e) => {
            tracing::error!(
                user_id = invocation.user_id,
                command = ?invocation.command,
                error = %e,
                "Command failed"
            );
            failures
                .escalate(&format!("Buyruqni bajarishda xato: {e}"))
                .await;
            return;
        }
    };

    let chat = Destination::from(invocation.chat_id);
    if let Err(e) = transport.send(&chat, &OutgoingPayload::plain(reply)).await {
        tracing::warn!(chat = %chat, error = %e, "Failed to send command reply");
    }
}
