use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use agv_vision_common::SystemEvent;
use agv_vision_node::audit::{AuditSink, EventStore, NullEventStore, PgEventStore};
use agv_vision_node::camera;
use agv_vision_node::capture::CaptureLoop;
use agv_vision_node::config::NodeConfig;
use agv_vision_node::detection::{DetectionService, DEFAULT_CONFIDENCE_THRESHOLD};
use agv_vision_node::detector;
use agv_vision_node::frame_store::FrameStore;
use agv_vision_node::AppState;

const COMPONENT: &str = "vision-node";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "config/vision.yaml")]
    config: String,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[actix_web::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level)?;

    let config = NodeConfig::load(&args.config)
        .with_context(|| format!("loading configuration from {}", args.config))?;

    info!(
        host = %config.server.host,
        port = config.server.port,
        "starting AGV vision node"
    );

    let event_store = build_event_store(&config).await;
    let audit = AuditSink::spawn(event_store.clone());

    let model_name = config.inference.model_name();
    let detector = detector::build(&config.inference)?;

    let artifact_path = config.capture.artifact_path();
    let store = FrameStore::new(artifact_path.to_string_lossy().into_owned());

    let camera = camera::build(&config.camera)?;
    let capture = CaptureLoop::new(camera, store.clone(), audit.clone(), config.capture.clone());
    let capture_handle = capture.spawn().context("spawning capture loop")?;

    audit.event(
        SystemEvent::info(COMPONENT, "startup", "vision node started").with_details(json!({
            "model": model_name,
            "threshold": DEFAULT_CONFIDENCE_THRESHOLD,
        })),
    );

    let detection = DetectionService::new(detector, store, audit.clone());
    let app_state = web::Data::new(AppState {
        detection,
        model_name,
        event_store,
    });

    let server = HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(Cors::permissive())
            .configure(agv_vision_node::api::configure)
    })
    .bind((config.server.host.clone(), config.server.port))?
    .run();

    info!(
        "vision node listening on {}:{}",
        config.server.host, config.server.port
    );
    server.await?;

    info!("shutting down");
    capture_handle.stop();
    audit.event(SystemEvent::info(COMPONENT, "shutdown", "vision node shutting down"));
    // Give the audit writer a moment to drain before the process exits.
    tokio::time::sleep(Duration::from_millis(250)).await;

    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let log_level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

async fn build_event_store(config: &NodeConfig) -> Arc<dyn EventStore> {
    let Some(url) = &config.database.url else {
        warn!("no database configured, detections and events will not be recorded");
        return Arc::new(NullEventStore);
    };

    match PgEventStore::connect_lazy(url, config.database.max_connections) {
        Ok(store) => {
            if let Err(e) = store.run_migrations().await {
                warn!(error = %e, "audit schema migration failed, continuing without it");
            }
            Arc::new(store)
        }
        Err(e) => {
            warn!(error = %e, "invalid database configuration, running without persistence");
            Arc::new(NullEventStore)
        }
    }
}
