/// Polling client loops: cancellable periodic tasks that stand in for a
/// push channel.
///
/// Pollers are pure consumers of the sync service and hold no authoritative
/// state; closing a view and reopening it rebuilds identical history from a
/// fresh fetch at after_seq = 0. The staleness window is the poll interval.
use crate::sync::SyncService;
use crate::types::Message;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

/// Consecutive failed cycles before the loop reports degraded connectivity.
const DEGRADED_AFTER_FAILURES: u32 = 3;

/// Periodic fetch loop for one open conversation view.
pub struct ConversationPoller {
    cancelled: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl ConversationPoller {
    /// Start polling the conversation between `viewer_id` and
    /// `other_party_id`. New messages are delivered over `tx` in seq order;
    /// after each delivery the viewer's cursor is advanced to the newest seq
    /// actually observed — not the head "now", so a message landing between
    /// fetch and mark-read stays unread.
    pub fn spawn(
        service: SyncService,
        viewer_id: u64,
        other_party_id: u64,
        poll_interval: Duration,
        tx: mpsc::UnboundedSender<Message>,
    ) -> Self {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut after_seq = 0u64;
            let mut failures = 0u32;

            loop {
                ticker.tick().await;
                if flag.load(Ordering::SeqCst) {
                    break;
                }

                let result = service.fetch_conversation(viewer_id, other_party_id, after_seq);

                // The view may have closed while the request was in flight;
                // a cancelled poller must discard the result, not apply it.
                if flag.load(Ordering::SeqCst) {
                    break;
                }

                match result {
                    Ok(messages) => {
                        failures = 0;
                        let newest = match messages.last() {
                            Some(m) => m.seq,
                            None => continue,
                        };
                        for message in messages {
                            if tx.send(message).is_err() {
                                // View dropped its receiver
                                return;
                            }
                        }
                        if let Err(e) =
                            service.mark_read(viewer_id, other_party_id, Some(newest))
                        {
                            warn!(viewer = viewer_id, "mark-read failed: {}", e);
                        }
                        after_seq = newest;
                    }
                    Err(e) => {
                        failures += 1;
                        debug!(viewer = viewer_id, failures, "poll cycle failed: {}", e);
                        if failures == DEGRADED_AFTER_FAILURES {
                            warn!(
                                viewer = viewer_id,
                                other = other_party_id,
                                "connectivity degraded after {} consecutive poll failures",
                                failures
                            );
                        }
                    }
                }
            }
        });

        Self { cancelled, handle }
    }

    /// Cancel the loop. Takes effect before the next scheduled tick fires;
    /// an in-flight result is discarded rather than applied.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Cancel and wait for the task to wind down.
    pub async fn shutdown(self) {
        self.cancel();
        self.handle.abort();
        let _ = self.handle.await;
    }
}

/// Periodic unread-summary loop for the dialog-list view. Runs
/// independently of any conversation poller, on the same cadence.
pub struct DialogListPoller {
    cancelled: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl DialogListPoller {
    pub fn spawn(
        service: SyncService,
        viewer_id: u64,
        poll_interval: Duration,
        tx: mpsc::UnboundedSender<BTreeMap<String, u64>>,
    ) -> Self {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut failures = 0u32;

            loop {
                ticker.tick().await;
                if flag.load(Ordering::SeqCst) {
                    break;
                }

                let result = service.unread_summary(viewer_id);

                if flag.load(Ordering::SeqCst) {
                    break;
                }

                match result {
                    Ok(summary) => {
                        failures = 0;
                        if tx.send(summary).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        failures += 1;
                        debug!(viewer = viewer_id, failures, "summary poll failed: {}", e);
                        if failures == DEGRADED_AFTER_FAILURES {
                            warn!(
                                viewer = viewer_id,
                                "connectivity degraded after {} consecutive poll failures",
                                failures
                            );
                        }
                    }
                }
            }
        });

        Self { cancelled, handle }
    }

    /// Cancel the loop before its next tick; in-flight results are discarded.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub async fn shutdown(self) {
        self.cancel();
        self.handle.abort();
        let _ = self.handle.await;
    }
}
