//! CLI for queuescope
//!
//! Subcommands:
//! - `server`: run the WebSocket server over the in-memory queue service
//! - `tail`: follow one queue of a running server in the terminal
//! - `queues`: list the configured demo queues

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use queuescope::client::engine::{MergeEngine, spawn_engine};
use queuescope::client::tail::{render, run_tail};
use queuescope::config::{Settings, load_config};
use queuescope::queue::demo::spawn_demo_feed;
use queuescope::queue::{InMemoryQueueService, QueueService};
use queuescope::registry::{PollSchedule, SubscriptionRegistry};
use queuescope::transport::session::KeepAlive;
use queuescope::transport::websocket::start_websocket_server;
use queuescope::utils::logging;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "queuescope")]
enum Command {
    /// Start the WebSocket server
    Server {
        /// Publish synthetic messages into the demo queues
        #[arg(long)]
        demo: bool,
    },
    /// Follow a queue and print its messages, newest first
    Tail {
        /// WebSocket server URL to connect to (default: ws://127.0.0.1:8080)
        #[arg(long, default_value = "ws://127.0.0.1:8080")]
        url: String,
        /// Queue to subscribe to
        #[arg(long)]
        queue: String,
    },
    /// List the queues the server would create
    Queues,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let config = load_config()?;
    logging::init(&config.logging.level);

    match Command::parse() {
        Command::Server { demo } => {
            if let Err(e) = run_server(config, demo).await {
                error!("Server failed: {}", e);
            }
        }
        Command::Tail { url, queue } => {
            if let Err(e) = run_tail_command(&url, &queue).await {
                error!("Tail failed: {}", e);
            }
        }
        Command::Queues => {
            let service = demo_service(&config);
            for queue in service.list_queues().await? {
                println!("{queue}");
            }
        }
    }

    Ok(())
}

fn demo_service(config: &Settings) -> InMemoryQueueService {
    InMemoryQueueService::with_queues(
        config.demo.queues.iter().cloned(),
        Duration::from_secs(config.demo.visibility_timeout_secs),
    )
}

async fn run_server(config: Settings, demo: bool) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let service: Arc<dyn QueueService> = Arc::new(demo_service(&config));
    let registry = Arc::new(SubscriptionRegistry::new(
        service.clone(),
        PollSchedule::from(&config.poller),
    ));

    let feed_token = CancellationToken::new();
    if demo {
        let _feed = spawn_demo_feed(
            service,
            config.demo.queues.clone(),
            Duration::from_secs(config.demo.publish_interval_secs.max(1)),
            feed_token.clone(),
        );
    }

    tokio::select! {
        result = start_websocket_server(addr, registry.clone(), KeepAlive::from(&config.session)) => {
            error!("WebSocket server exited unexpectedly.");
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    feed_token.cancel();
    registry.shutdown();
    Ok(())
}

async fn run_tail_command(url: &str, queue: &str) -> Result<(), Box<dyn std::error::Error>> {
    let (engine, _engine_task) = spawn_engine(MergeEngine::new());

    let renderer = tokio::spawn({
        let engine = engine.clone();
        async move {
            let mut revisions = engine.revisions();
            while revisions.changed().await.is_ok() {
                let Ok(messages) = engine.ordered_messages().await else {
                    break;
                };
                print!("\x1B[2J\x1B[H{}", render(&messages));
            }
        }
    });

    let result = tokio::select! {
        result = run_tail(url, queue, &engine) => result,
        _ = tokio::signal::ctrl_c() => Ok(0),
    };
    renderer.abort();

    let received = result.map_err(|e| e.to_string())?;
    info!(received, "tail finished");
    Ok(())
}
