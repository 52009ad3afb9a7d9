//! Blocking source workers.
//!
//! Each sample source gets its own OS thread so a stalled driver read can
//! never stall the tick loop or the input task. The tick loop talks to a
//! worker through a request channel and waits on a oneshot reply under an
//! explicit timeout; a read that misses the deadline is reported as
//! Unavailable for that tick and its late reply is dropped.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::warn;
use wattop_sources::{
    PowerSample, PowerSource, SourceError, SourceResult, UtilizationSample, UtilizationSource,
};

type Reply<T> = oneshot::Sender<SourceResult<T>>;

pub struct SourceHandle<T> {
    tx: mpsc::Sender<Reply<T>>,
    name: &'static str,
}

impl<T: Send + 'static> SourceHandle<T> {
    pub(crate) fn spawn<F>(name: &'static str, mut read: F) -> Self
    where
        F: FnMut() -> SourceResult<T> + Send + 'static,
    {
        // Capacity 1: at most one read outstanding. If the worker is wedged
        // in a driver call, the next tick sees a full queue instead of
        // piling up requests behind it.
        let (tx, mut rx) = mpsc::channel::<Reply<T>>(1);

        let builder = std::thread::Builder::new().name(format!("wattop-src-{name}"));
        let spawned = builder.spawn(move || {
            while let Some(reply) = rx.blocking_recv() {
                // Receiver may have timed out and gone away; that is fine.
                let _ = reply.send(read());
            }
        });
        if let Err(e) = spawned {
            warn!(source = name, error = %e, "Failed to spawn source worker");
        }

        Self { tx, name }
    }

    /// Request one sample, waiting at most `timeout`.
    pub async fn read(&self, timeout: Duration) -> SourceResult<T> {
        let (reply_tx, reply_rx) = oneshot::channel();

        if self.tx.try_send(reply_tx).is_err() {
            warn!(source = self.name, "Previous read still in flight, skipping");
            return Err(SourceError::unavailable("previous read still in flight"));
        }

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(SourceError::unavailable("source worker exited")),
            Err(_) => {
                warn!(source = self.name, ?timeout, "Source read timed out");
                Err(SourceError::unavailable("read timed out"))
            }
        }
    }
}

pub fn spawn_power(mut source: Box<dyn PowerSource>) -> SourceHandle<PowerSample> {
    SourceHandle::spawn("power", move || source.read())
}

pub fn spawn_utilization(
    mut source: Box<dyn UtilizationSource>,
) -> SourceHandle<UtilizationSample> {
    SourceHandle::spawn("utilization", move || source.read())
}
