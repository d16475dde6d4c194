//! FlowKit demo — runs the SDK against an in-process loopback renderer.
//!
//! Main entry point that initializes tracing and config, wires a scripted
//! renderer over the channel transport, and drives one trigger round trip.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use serde_json::{json, Map};
use tokio::sync::mpsc;
use tracing::info;

use flowkit_analytics::flusher::{flush_once, LoggingSender};
use flowkit_bridge::transport::ChannelTransport;
use flowkit_core::config::SdkConfig;
use flowkit_core::envelope::{Envelope, TYPE_RESPONSE};
use flowkit_core::types::Campaign;
use flowkit_sdk::client::{FlowKit, MSG_SHOW_FLOW};

#[derive(Parser, Debug)]
#[command(name = "flowkit-demo")]
#[command(about = "FlowKit SDK demo against a loopback renderer")]
#[command(version)]
struct Cli {
    /// Customer identifier (overrides config)
    #[arg(long, env = "FLOWKIT__DISTINCT_ID")]
    distinct_id: Option<String>,

    /// Trigger event to fire
    #[arg(long, default_value = "app_opened")]
    event: String,
}

/// Loopback renderer: acks `show_flow`, shows the flow, completes it, and
/// closes — enough to exercise the whole journey lifecycle.
fn spawn_renderer(
    mut outbound_rx: mpsc::UnboundedReceiver<Envelope>,
    inbound_tx: mpsc::UnboundedSender<String>,
) {
    tokio::spawn(async move {
        while let Some(envelope) = outbound_rx.recv().await {
            info!(msg_type = %envelope.msg_type, "Renderer received");
            if envelope.msg_type != MSG_SHOW_FLOW {
                continue;
            }
            let flow_id = envelope.payload["flow_id"].as_str().unwrap_or("").to_string();
            let request_id = envelope.id.clone().unwrap_or_default();

            let mut ack = Map::new();
            ack.insert("status".to_string(), json!("ok"));
            let _ = inbound_tx.send(
                Envelope::reply_to(request_id, TYPE_RESPONSE, ack)
                    .to_json()
                    .unwrap_or_default(),
            );

            let flow_payload: Map<_, _> = [("flow_id".to_string(), json!(flow_id))]
                .into_iter()
                .collect();
            for msg_type in ["flow_shown", "flow_completed", "flow_closed"] {
                let _ = inbound_tx.send(
                    Envelope::new(msg_type, flow_payload.clone())
                        .to_json()
                        .unwrap_or_default(),
                );
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flowkit=info,flowkit_demo=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("FlowKit demo starting up");

    let mut config = SdkConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        SdkConfig::default()
    });
    if let Some(distinct_id) = cli.distinct_id {
        config.distinct_id = distinct_id;
    }
    let max_batch_size = config.batch.max_batch_size;

    let (transport, outbound_rx) = ChannelTransport::new();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    spawn_renderer(outbound_rx, inbound_tx);

    let client = FlowKit::new(config, Arc::new(transport), inbound_rx);
    client.register_campaign(Campaign::new(
        "camp-onboarding",
        "Onboarding",
        cli.event.clone(),
        vec!["flow-welcome".to_string()],
        "workflow_entry",
    ));

    info!(event = %cli.event, "Firing trigger");
    let update = tokio::time::timeout(Duration::from_secs(5), client.trigger(&cli.event)).await??;
    info!(?update, "Trigger resolved");

    client.track("demo_finished", None);
    flush_once(&client.queue(), &LoggingSender, max_batch_size);

    info!("FlowKit demo done");
    Ok(())
}
