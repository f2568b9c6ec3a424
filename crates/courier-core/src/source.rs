//! The update source capability.
//!
//! A source pushes raw updates onto a channel until it is cancelled. The
//! long-poll and webhook sources live in `courier-transport`;
//! [`ChannelSource`] forwards from a channel the embedding application owns.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::bot::Bot;
use crate::error::SourceResult;
use crate::update::Update;

/// Produces updates for the worker pool.
///
/// Implementations must return promptly once `cancel` fires and must not
/// give up on transient failures; retrying is their own concern. Returning
/// `Ok(())` ends the stream normally.
#[async_trait]
pub trait UpdateSource: Send + 'static {
    /// A short name for logs.
    fn name(&self) -> &'static str;

    /// Runs until cancelled or until the stream ends.
    async fn run(
        &mut self,
        bot: Bot,
        sink: mpsc::Sender<Update>,
        cancel: CancellationToken,
    ) -> SourceResult<()>;
}

/// Boxed update source.
pub type BoxedSource = Box<dyn UpdateSource>;

/// Sends `update` to `sink`, giving up if `cancel` fires first.
///
/// Returns `false` when the update was not delivered (cancelled or the
/// receiving side is gone); the caller should stop producing.
pub async fn deliver(
    sink: &mpsc::Sender<Update>,
    update: Update,
    cancel: &CancellationToken,
) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = sink.send(update) => sent.is_ok(),
    }
}

/// Forwards updates from a user-owned channel.
///
/// The stream ends when the sending half is dropped.
#[derive(Debug)]
pub struct ChannelSource {
    rx: mpsc::Receiver<Update>,
}

impl ChannelSource {
    pub fn new(rx: mpsc::Receiver<Update>) -> Self {
        Self { rx }
    }

    /// Creates a source together with the sender that feeds it.
    pub fn channel(capacity: usize) -> (mpsc::Sender<Update>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl UpdateSource for ChannelSource {
    fn name(&self) -> &'static str {
        "channel"
    }

    async fn run(
        &mut self,
        _bot: Bot,
        sink: mpsc::Sender<Update>,
        cancel: CancellationToken,
    ) -> SourceResult<()> {
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = self.rx.recv() => next,
            };
            let Some(update) = next else {
                debug!("Channel source closed");
                break;
            };
            if !deliver(&sink, update, &cancel).await {
                break;
            }
        }
        Ok(())
    }
}
