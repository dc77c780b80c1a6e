//! Reconnect loop and event routing.
//!
//! One supervisor task owns the connection: it asks the transport for a
//! connection, routes its events, and executes the lifecycle decision when
//! the connection closes. Message handling runs on a separate worker so
//! connection events are never stuck behind a slow lookup.

use std::{sync::Arc, time::Duration};

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    config::Config,
    credentials::CredentialStore,
    handler::ShipmentLookup,
    lifecycle::{transition, ConnectionState, LifecycleAction},
    messaging::{
        port::{ChallengeRenderer, ConnectRequest, Connection, ReplyPort, Transport},
        types::{ConnectionUpdate, MessagesUpsert, TransportEvent},
    },
};

#[derive(Clone, Debug)]
pub struct SupervisorSettings {
    pub browser: Vec<String>,
    pub reconnect_delay: Duration,
    pub message_queue_capacity: usize,
}

impl SupervisorSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            browser: cfg.browser.clone(),
            reconnect_delay: cfg.reconnect_delay,
            message_queue_capacity: cfg.message_queue_capacity,
        }
    }
}

/// Why [`Supervisor::run`] returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEnd {
    /// The account was logged out; a new QR login is required.
    LoggedOut,
    /// Shutdown was requested.
    Shutdown,
}

/// An upsert plus the reply handle of the connection it arrived on.
struct MessageJob {
    upsert: MessagesUpsert,
    replies: Arc<dyn ReplyPort>,
}

pub struct Supervisor {
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialStore>,
    renderer: Arc<dyn ChallengeRenderer>,
    lookup: Arc<ShipmentLookup>,
    settings: SupervisorSettings,
}

impl Supervisor {
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialStore>,
        renderer: Arc<dyn ChallengeRenderer>,
        lookup: Arc<ShipmentLookup>,
        settings: SupervisorSettings,
    ) -> Self {
        Self {
            transport,
            credentials,
            renderer,
            lookup,
            settings,
        }
    }

    /// Connect, and keep reconnecting until logged out or cancelled.
    ///
    /// Queued messages are still answered before this returns.
    pub async fn run(&self, cancel: CancellationToken) -> SessionEnd {
        let (job_tx, job_rx) = mpsc::channel(self.settings.message_queue_capacity);
        let worker = tokio::spawn(run_message_worker(Arc::clone(&self.lookup), job_rx));

        let end = self.supervise(&job_tx, &cancel).await;

        drop(job_tx);
        if let Err(e) = worker.await {
            error!(error = %e, "message worker failed");
        }
        end
    }

    async fn supervise(
        &self,
        jobs: &mpsc::Sender<MessageJob>,
        cancel: &CancellationToken,
    ) -> SessionEnd {
        let mut attempt: u64 = 0;
        loop {
            attempt += 1;
            let action = tokio::select! {
                _ = cancel.cancelled() => return SessionEnd::Shutdown,
                action = self.run_connection(attempt, jobs) => action,
            };

            match action {
                LifecycleAction::Terminate => return SessionEnd::LoggedOut,
                _ => {
                    if !self.settings.reconnect_delay.is_zero() {
                        tokio::select! {
                            _ = cancel.cancelled() => return SessionEnd::Shutdown,
                            _ = tokio::time::sleep(self.settings.reconnect_delay) => {}
                        }
                    }
                }
            }
        }
    }

    /// Drive one connection until it closes; returns `Reconnect` or `Terminate`.
    async fn run_connection(
        &self,
        attempt: u64,
        jobs: &mpsc::Sender<MessageJob>,
    ) -> LifecycleAction {
        let credentials = match self.credentials.load().await {
            Ok(creds) => creds,
            Err(e) => {
                warn!(error = %e, "failed to load saved credentials; starting a fresh login");
                None
            }
        };

        info!(attempt, linked = credentials.is_some(), "connecting to WhatsApp");
        let mut state = ConnectionState::Connecting;

        let connection = self
            .transport
            .connect(ConnectRequest {
                credentials,
                browser: self.settings.browser.clone(),
            })
            .await;
        let Connection {
            mut events,
            replies,
        } = match connection {
            Ok(c) => c,
            Err(e) => {
                warn!(attempt, error = %e, "connection attempt failed");
                return self.apply(&mut state, &ConnectionUpdate::closed_without_reason());
            }
        };

        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::Connection(update) => {
                    if let Some(qr) = update.qr.as_deref() {
                        self.render_challenge(qr).await;
                    }
                    match self.apply(&mut state, &update) {
                        LifecycleAction::None | LifecycleAction::AnnounceOpen => {}
                        action => return action,
                    }
                }
                TransportEvent::CredsUpdate(creds) => {
                    if let Err(e) = self.credentials.save(&creds).await {
                        warn!(error = %e, "failed to persist credentials");
                    }
                }
                TransportEvent::Messages(upsert) => {
                    let job = MessageJob {
                        upsert,
                        replies: Arc::clone(&replies),
                    };
                    // Never wait on the worker here: connection events queue up behind us.
                    match jobs.try_send(job) {
                        Ok(()) => {}
                        Err(TrySendError::Full(job)) => warn!(
                            capacity = self.settings.message_queue_capacity,
                            messages = job.upsert.messages.len(),
                            "message queue full; dropping upsert"
                        ),
                        Err(TrySendError::Closed(_)) => {
                            error!("message worker is gone; dropping upsert")
                        }
                    }
                }
            }
        }

        debug!("transport event stream ended without a close update");
        self.apply(&mut state, &ConnectionUpdate::closed_without_reason())
    }

    fn apply(&self, state: &mut ConnectionState, update: &ConnectionUpdate) -> LifecycleAction {
        let t = transition(*state, update);
        *state = t.state;

        match t.action {
            LifecycleAction::None => {}
            LifecycleAction::AnnounceOpen => info!("✅ connected to WhatsApp"),
            LifecycleAction::Reconnect => {
                let reason = match t.state {
                    ConnectionState::Closed { reason } => reason,
                    _ => None,
                };
                warn!(?reason, "🔌 connection closed; reconnecting");
            }
            LifecycleAction::Terminate => {
                error!(
                    "🔌 logged out; delete the auth folder and scan a new QR code to link again"
                );
            }
        }
        t.action
    }

    async fn render_challenge(&self, payload: &str) {
        match self.renderer.render(payload).await {
            Ok(Some(path)) => {
                info!(path = %path.display(), "📱 new QR code saved; scan it with WhatsApp")
            }
            Ok(None) => info!("📱 new QR code; scan it with WhatsApp"),
            Err(e) => warn!(error = %e, "failed to render QR code"),
        }
    }
}

/// Handle upserts strictly in arrival order.
///
/// Each job runs in its own task so a panic is contained to that message.
async fn run_message_worker(lookup: Arc<ShipmentLookup>, mut jobs: mpsc::Receiver<MessageJob>) {
    while let Some(job) = jobs.recv().await {
        let lookup = Arc::clone(&lookup);
        let handle = tokio::spawn(async move {
            lookup
                .handle_upsert(job.upsert, job.replies.as_ref())
                .await
        });
        match handle.await {
            Ok(outcome) => debug!(?outcome, "upsert handled"),
            Err(e) => error!(error = %e, "message handler failed"),
        }
    }
}
