//! # Relay
//!
//! The event loop body shared by the chat bot and the spreadsheet poller:
//! classify, greet, build, dispatch.
//!
//! Every failure here is scoped to one event. It is logged, that event's job
//! is dropped, and the next event starts clean. Nothing is retried.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::builder::JobBuilder;
use super::events::{ChatEvent, SheetRow};
use crate::error::Result;
use crate::store::{GreetingSender, IdLedger};
use crate::transport::JobDispatch;

/// Welcome-message bookkeeping for direct messages.
struct Greeting {
    ledger: Arc<IdLedger>,
    sender: Arc<dyn GreetingSender>,
}

/// Turns events into dispatched jobs.
pub struct Relay {
    builder: JobBuilder,
    dispatch: Arc<dyn JobDispatch>,
    greeting: Option<Greeting>,
}

impl Relay {
    pub fn new(builder: JobBuilder, dispatch: Arc<dyn JobDispatch>) -> Self {
        Self {
            builder,
            dispatch,
            greeting: None,
        }
    }

    /// Greet first-time DM senders, remembering them in `ledger`.
    pub fn with_greeting(mut self, ledger: Arc<IdLedger>, sender: Arc<dyn GreetingSender>) -> Self {
        self.greeting = Some(Greeting { ledger, sender });
        self
    }

    /// Handle one chat event. Returns whether a job was dispatched.
    ///
    /// A failed greeting is logged and the message still prints.
    pub async fn on_event(&self, event: &ChatEvent) -> bool {
        if event.is_direct_message()
            && let Some(greeting) = &self.greeting
            && let Err(e) = greeting
                .ledger
                .greet_if_new(event.sender_id, greeting.sender.as_ref())
                .await
        {
            warn!(user_id = event.sender_id, error = %e, "failed to greet user");
        }

        let Some(spec) = self.builder.handle(event) else {
            return false;
        };
        info!(message_id = event.message_id, kind = %spec.kind, "relaying message");

        let result: Result<()> = async {
            let job = self.builder.build(spec).await?;
            self.dispatch.dispatch(&job).await
        }
        .await;
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(message_id = event.message_id, error = %e, "relay failed");
                false
            }
        }
    }

    /// Print every row not yet in `printed`, recording each one that was
    /// dispatched. Returns how many rows printed.
    ///
    /// A row whose dispatch fails stays out of the ledger, so the next poll
    /// tries it again.
    pub async fn print_new_rows(&self, rows: &[SheetRow], printed: &IdLedger) -> usize {
        let mut count = 0;
        for row in rows {
            if printed.contains(row.index).await {
                continue;
            }
            let Some(job) = self.builder.build_sheet_row(row).await else {
                continue;
            };
            if let Err(e) = self.dispatch.dispatch(&job).await {
                warn!(row = row.index, error = %e, "failed to send sheet row");
                continue;
            }
            count += 1;
            if let Err(e) = printed.insert(row.index).await {
                warn!(row = row.index, error = %e, "row printed but not recorded");
            }
        }
        debug!(printed = count, total = rows.len(), "sheet poll done");
        count
    }
}
