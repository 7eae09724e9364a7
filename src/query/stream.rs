// ABOUTME: Boxed stream of pending-change query results
// Ends after the last change, or with a single error item when the server fails mid-query

use crate::models::PendingChange;
use crate::session::SessionError;
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

pub struct PendingChangeStream {
    inner: BoxStream<'static, Result<PendingChange, SessionError>>,
    failed: bool,
}

impl PendingChangeStream {
    pub(crate) fn new(
        inner: impl Stream<Item = Result<PendingChange, SessionError>> + Send + 'static,
    ) -> Self {
        Self {
            inner: inner.boxed(),
            failed: false,
        }
    }

    pub(crate) fn empty() -> Self {
        Self::new(stream::empty())
    }

    /// Drain the stream, stopping at the first error.
    pub async fn try_collect_all(mut self) -> Result<Vec<PendingChange>, SessionError> {
        let mut changes = Vec::new();
        while let Some(item) = self.next().await {
            changes.push(item?);
        }
        Ok(changes)
    }
}

impl Stream for PendingChangeStream {
    type Item = Result<PendingChange, SessionError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.failed {
            return Poll::Ready(None);
        }
        let polled = self.inner.poll_next_unpin(cx);
        if let Poll::Ready(Some(Err(_))) = &polled {
            self.failed = true;
        }
        polled
    }
}

impl fmt::Debug for PendingChangeStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingChangeStream")
            .field("failed", &self.failed)
            .finish_non_exhaustive()
    }
}
