use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use stb_core::{config::Config, supervisor::SessionEnd};

#[tokio::main]
async fn main() -> Result<(), stb_core::Error> {
    stb_core::logging::init("stb")?;

    let cfg = Arc::new(Config::load()?);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("shutdown requested");
                    cancel.cancel();
                }
                Err(e) => warn!(error = %e, "failed to listen for ctrl-c"),
            }
        });
    }

    let end = stb_whatsapp::router::run(cfg.clone(), cancel)
        .await
        .map_err(|e| stb_core::Error::Config(format!("whatsapp bot failed: {e:#}")))?;

    match end {
        SessionEnd::Shutdown => Ok(()),
        SessionEnd::LoggedOut => {
            error!(auth_dir = %cfg.auth_dir.display(), "logged out by the phone");
            Err(stb_core::Error::Transport(format!(
                "logged out; delete {} and restart to scan a new QR code",
                cfg.auth_dir.display()
            )))
        }
    }
}
