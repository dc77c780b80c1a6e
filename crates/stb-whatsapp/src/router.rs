use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::info;

use stb_core::{
    audit::AuditLogger,
    config::Config,
    credentials::{CredentialStore, FileCredentialStore},
    handler::ShipmentLookup,
    messaging::port::{ChallengeRenderer, Transport},
    records::{JsonFileStore, RecordStore},
    supervisor::{SessionEnd, Supervisor, SupervisorSettings},
};

use crate::{qr::QrRenderer, transport::WhatsAppTransport};

/// Wire the WhatsApp adapter into the core and run until logout or shutdown.
///
/// Fails before connecting if the auth folder cannot be used.
pub async fn run(cfg: Arc<Config>, cancel: CancellationToken) -> anyhow::Result<SessionEnd> {
    let store: Arc<dyn RecordStore> = Arc::new(JsonFileStore::new(cfg.shipments_file.clone()));

    let creds_store = FileCredentialStore::new(cfg.auth_dir.clone());
    creds_store
        .ensure_dir()
        .await
        .with_context(|| format!("auth folder {} is unusable", cfg.auth_dir.display()))?;
    let credentials: Arc<dyn CredentialStore> = Arc::new(creds_store);
    let renderer: Arc<dyn ChallengeRenderer> =
        Arc::new(QrRenderer::new(cfg.qr_image_path.clone(), cfg.qr_terminal));
    let transport: Arc<dyn Transport> = Arc::new(WhatsAppTransport::new(cfg.sidecar_url.clone()));

    let mut lookup = ShipmentLookup::new(store);
    if let Some(path) = &cfg.audit_log_path {
        lookup = lookup.with_audit(AuditLogger::new(path.clone(), cfg.audit_log_json));
    }

    // Basic startup info.
    println!("stb started: sidecar {}", cfg.sidecar_url);
    println!("Shipments file: {}", cfg.shipments_file.display());
    println!("Auth folder: {}", cfg.auth_dir.display());
    info!(
        browser = %cfg.browser.join(","),
        reconnect_delay_ms = cfg.reconnect_delay.as_millis() as u64,
        queue = cfg.message_queue_capacity,
        audit = cfg.audit_log_path.is_some(),
        "starting WhatsApp session"
    );

    let supervisor = Supervisor::new(
        transport,
        credentials,
        renderer,
        Arc::new(lookup),
        SupervisorSettings::from_config(&cfg),
    );
    Ok(supervisor.run(cancel).await)
}
