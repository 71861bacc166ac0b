//! NextGCore AMF (Access and Mobility Management Function)
//!
//! Daemon hosting the UE-initiated de-registration procedure. The N2 reader
//! (SCTP association and NGAP decoding) is not part of this binary; it feeds
//! uplink NAS and UE Context Release Complete through `AmfApp::event_sender`
//! and owns UE context creation in the shared store.

use anyhow::{Context, Result};
use clap::Parser;
use nextgcore_amfd::{
    AmfConfig, AmfEvent, AmfMetrics, AmfSapDispatcher, AmfSm, Deregistration, GmmStateMachine,
    NgapChannel, NgapMessage, UeContextStore,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// NextGCore AMF - Access and Mobility Management Function
#[derive(Parser, Debug)]
#[command(name = "nextgcore-amfd")]
#[command(author = "NextGCore")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "5G Core Access and Mobility Management Function")]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/nextgcore/amf.yaml")]
    config: String,

    /// Log level (trace, debug, info, warn, error); overrides the config
    #[arg(short, long)]
    log_level: Option<String>,
}

fn parse_log_level(level: &str) -> log::LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        _ => log::LevelFilter::Info,
    }
}

/// Level applied when RUST_LOG is unset: command line, then config, then info
fn effective_log_level(cli_level: Option<&str>, config_level: Option<&str>) -> log::LevelFilter {
    cli_level.or(config_level).map_or(log::LevelFilter::Info, parse_log_level)
}

/// Set up signal handlers for graceful shutdown
fn setup_signal_handlers(running: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")
}

/// Drain NGAP messages bound for the RAN
async fn ngap_writer(mut rx: mpsc::UnboundedReceiver<NgapMessage>) {
    while let Some(msg) = rx.recv().await {
        match &msg {
            NgapMessage::DownlinkNasTransport { amf_ue_ngap_id, ran_ue_ngap_id, nas_pdu } => {
                log::info!(
                    "[amf_ue_ngap_id={}] {} ran_ue_ngap_id={} nas_pdu={:02x?}",
                    amf_ue_ngap_id,
                    msg.name(),
                    ran_ue_ngap_id,
                    nas_pdu
                );
            }
            NgapMessage::UeContextReleaseCommand { amf_ue_ngap_id, ran_ue_ngap_id, cause } => {
                log::info!(
                    "[amf_ue_ngap_id={}] {} ran_ue_ngap_id={} cause={:?}",
                    amf_ue_ngap_id,
                    msg.name(),
                    ran_ue_ngap_id,
                    cause
                );
            }
        }
    }
}

/// AMF application: UE table, procedure wiring and the background tasks
struct AmfApp {
    store: Arc<UeContextStore>,
    metrics: Arc<AmfMetrics>,
    event_tx: mpsc::Sender<AmfEvent>,
    event_loop: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl AmfApp {
    /// Wire the procedure and spawn the event loop and NGAP writer
    fn start(config: &AmfConfig) -> Self {
        let store = Arc::new(UeContextStore::new(config.max_num_of_ue));
        let metrics = Arc::new(AmfMetrics::new());
        let (ngap_channel, ngap_rx) = NgapChannel::new();
        let ngap = Arc::new(ngap_channel);

        let dereg = Deregistration::new(
            store.clone(),
            Arc::new(AmfSapDispatcher::new(ngap.clone())),
            Arc::new(GmmStateMachine::new()),
            ngap,
            metrics.clone(),
        )
        .with_teardown_on_send_failure(config.deregistration.teardown_on_send_failure);
        let amf_sm = AmfSm::new(Arc::new(dereg));

        let (event_tx, event_rx) = mpsc::channel(1024);
        let writer = tokio::spawn(ngap_writer(ngap_rx));
        // The last NGAP sender goes away with the state machine
        let event_loop = tokio::spawn(async move { amf_sm.run(event_rx).await });

        Self { store, metrics, event_tx, event_loop, writer }
    }

    /// N2 ingress for the external NGAP reader
    #[allow(dead_code)]
    fn event_sender(&self) -> mpsc::Sender<AmfEvent> {
        self.event_tx.clone()
    }

    fn store(&self) -> &Arc<UeContextStore> {
        &self.store
    }

    /// Drain pending events, then stop the event loop and the NGAP writer
    ///
    /// Senders handed out by `event_sender` must be dropped first.
    async fn shutdown(self) -> Result<()> {
        log::info!("Shutting down AMF with {} UE context(s)", self.store().count());
        drop(self.event_tx);
        self.event_loop.await.context("Event loop task failed")?;
        self.writer.await.context("NGAP writer task failed")?;

        log::debug!("Final counters:\n{}", self.metrics.export_prometheus());
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let rust_log = std::env::var_os("RUST_LOG").is_some();
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Trace)
        .parse_default_env()
        .format_timestamp_millis()
        .init();
    if !rust_log {
        log::set_max_level(effective_log_level(args.log_level.as_deref(), None));
    }

    let config = AmfConfig::load(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config))?;
    if !rust_log {
        log::set_max_level(effective_log_level(args.log_level.as_deref(), Some(&config.logger.level)));
    }

    log::info!("NextGCore AMF v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Configuration: {}", args.config);
    log::info!(
        "max_num_of_ue={} teardown_on_send_failure={}",
        config.max_num_of_ue,
        config.deregistration.teardown_on_send_failure
    );

    let running = Arc::new(AtomicBool::new(true));
    setup_signal_handlers(running.clone())?;

    let app = AmfApp::start(&config);
    log::info!("AMF initialized successfully");

    while running.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    app.shutdown().await?;
    log::info!("NextGCore AMF terminated");
    Ok(())
}
