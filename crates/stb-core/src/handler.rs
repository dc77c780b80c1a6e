//! The `messages.upsert` pipeline: extract → load → resolve → format → send.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    audit::{AuditEvent, AuditLogger},
    formatting::format_reply,
    messaging::{
        port::ReplyPort,
        types::{MessagesUpsert, UpsertKind},
    },
    records::RecordStore,
    resolver::find_shipment,
    tracking::extract_tracking_code,
};

/// How one upsert event was handled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandleOutcome {
    /// Not a `notify` batch.
    IgnoredKind,
    /// Batch carried no envelope.
    Empty,
    /// Our own outgoing message echoed back.
    FromSelf,
    /// No tracking code in the text; nothing was looked up or sent.
    NoCode,
    Replied { code: String, found: bool },
    SendFailed { code: String, found: bool },
}

pub struct ShipmentLookup {
    store: Arc<dyn RecordStore>,
    audit: Option<AuditLogger>,
}

impl ShipmentLookup {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store, audit: None }
    }

    pub fn with_audit(mut self, audit: AuditLogger) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Handle one upsert event to completion. Only the first envelope is used.
    pub async fn handle_upsert(
        &self,
        upsert: MessagesUpsert,
        replies: &dyn ReplyPort,
    ) -> HandleOutcome {
        if upsert.kind != UpsertKind::Notify {
            return HandleOutcome::IgnoredKind;
        }
        let Some(msg) = upsert.messages.into_iter().next() else {
            return HandleOutcome::Empty;
        };
        if msg.from_me {
            return HandleOutcome::FromSelf;
        }

        let Some(code) = msg.text.as_deref().and_then(extract_tracking_code) else {
            return HandleOutcome::NoCode;
        };

        debug!(chat = %msg.chat_id, group = msg.is_group(), code, "tracking code found");

        let records = self.store.load().await;
        let record = find_shipment(&code, &records);
        let found = record.is_some();
        let reply = format_reply(&code, record);

        self.audit(AuditEvent::lookup(
            &msg.chat_id.0,
            msg.push_name.as_deref(),
            &code,
            found,
            &reply,
        ));

        match replies.send_text(&msg.chat_id, &reply).await {
            Ok(()) => {
                info!(chat = %msg.chat_id, code, found, "replied to shipment lookup");
                HandleOutcome::Replied { code, found }
            }
            Err(e) => {
                warn!(chat = %msg.chat_id, code, error = %e, "failed to send reply");
                self.audit(AuditEvent::send_error(&msg.chat_id.0, &code, &e.to_string()));
                HandleOutcome::SendFailed { code, found }
            }
        }
    }

    fn audit(&self, event: AuditEvent) {
        let Some(audit) = &self.audit else {
            return;
        };
        if let Err(e) = audit.write(event) {
            warn!(path = %audit.path().display(), error = %e, "failed to write audit event");
        }
    }
}
