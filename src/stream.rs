//! Streaming view of a session: emit file-list snapshots as they change.
//!
//! [`crate::session::IngestionSession::updates`] registers a channel-backed
//! listener and hands back the receiving end as a `Stream`. The first item is
//! the snapshot at subscription time; each later item corresponds to one
//! publish. The stream ends when the session is dropped.
//!
//! # Example
//! ```rust,no_run
//! use edgequake_ingest::{IngestConfig, IngestionSession, SourceFile};
//! use futures::StreamExt;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let session = std::sync::Arc::new(IngestionSession::with_defaults(IngestConfig::default())?);
//! let mut updates = session.updates();
//!
//! let worker = std::sync::Arc::clone(&session);
//! tokio::spawn(async move {
//!     worker.submit(vec![SourceFile::new("notes.txt", "text/plain", b"hello".to_vec())]).await
//! });
//!
//! while let Some(files) = updates.next().await {
//!     for f in &files {
//!         println!("{} {:?}", f.name, f.status());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use crate::model::{FileStatus, UploadedFile};
use crate::progress::{Listener, SessionListener};
use futures::channel::mpsc::{self, UnboundedSender};
use futures::StreamExt;
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;

/// A boxed stream of file-list snapshots.
pub type SnapshotStream = Pin<Box<dyn Stream<Item = Vec<UploadedFile>> + Send>>;

/// Forwards every snapshot into an unbounded channel.
struct ChannelListener {
    tx: UnboundedSender<Vec<UploadedFile>>,
}

impl SessionListener for ChannelListener {
    fn on_change(&self, files: &[UploadedFile]) {
        // A closed receiver is pruned on the next publish via `is_closed`.
        let _ = self.tx.unbounded_send(files.to_vec());
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Build a listener/stream pair, seeding the stream with `initial`.
pub(crate) fn snapshot_channel(initial: Vec<UploadedFile>) -> (Listener, SnapshotStream) {
    let (tx, rx) = mpsc::unbounded();
    let _ = tx.unbounded_send(initial);
    (Arc::new(ChannelListener { tx }), Box::pin(rx))
}

/// Keep only snapshots in which no file is Queued or Processing.
///
/// Useful for callers that only care about batch boundaries.
pub fn settled(updates: SnapshotStream) -> SnapshotStream {
    Box::pin(updates.filter(|files| {
        let idle = files.iter().all(|f| {
            !matches!(f.status(), FileStatus::Queued | FileStatus::Processing)
        });
        futures::future::ready(idle)
    }))
}
