//! Poll timer and push stream, both funnelled into one fetch loop.

use std::{future::Future, sync::Arc, time::Duration};

use futures::{StreamExt, stream::BoxStream};
use tokio::{
    sync::Notify,
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tracing::{debug, trace};

use crate::dao::room_store::StoreChange;

/// Owns the background tasks keeping one room in sync. Dropping it stops them.
pub struct Subscription {
    tasks: Vec<JoinHandle<()>>,
}

impl Subscription {
    /// Start the poll ticker, the change-stream listener and the fetch loop.
    ///
    /// Ticks and change notifications only raise a shared signal; `fetch` runs in a single
    /// task, so bursts coalesce and two fetches never overlap. Once `fetch` resolves to
    /// `false` the room is gone and every task stops.
    pub fn spawn<F, Fut>(
        changes: BoxStream<'static, StoreChange>,
        poll_interval: Duration,
        fetch: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let signal = Arc::new(Notify::new());

        let poll = {
            let signal = signal.clone();
            tokio::spawn(async move {
                let mut ticker = interval(poll_interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    signal.notify_one();
                }
            })
        };

        let push = {
            let signal = signal.clone();
            tokio::spawn(async move {
                let mut changes = changes;
                while let Some(change) = changes.next().await {
                    trace!(
                        room_id = %change.room_id,
                        table = ?change.table,
                        kind = ?change.kind,
                        "store change received"
                    );
                    signal.notify_one();
                }
                debug!("store change stream ended; relying on polling");
            })
        };

        let feeders = [poll.abort_handle(), push.abort_handle()];
        let fetcher = tokio::spawn(async move {
            loop {
                signal.notified().await;
                if !fetch().await {
                    debug!("room closed; stopping sync");
                    break;
                }
            }
            for feeder in feeders {
                feeder.abort();
            }
        });

        Self {
            tasks: vec![poll, push, fetcher],
        }
    }

    /// Whether any of the sync tasks is still running.
    pub fn is_active(&self) -> bool {
        self.tasks.iter().any(|task| !task.is_finished())
    }

    /// Stop every task now.
    pub fn cancel(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
