use tokio_util::sync::CancellationToken;

/// A cancellation signal shared between the caller of a dispatch and its
/// units of work.
///
/// Clones observe the same signal. Signalling is idempotent and may happen
/// from any task, at any time.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Requests already sent finish normally.
    pub fn signal(&self) {
        if !self.token.is_cancelled() {
            tracing::debug!("Cancellation signalled.");
        }
        self.token.cancel();
    }

    pub fn is_signalled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes once the handle has been signalled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signal_is_idempotent_and_shared_by_clones() {
        let handle = CancelHandle::new();
        let clone = handle.clone();
        assert!(!clone.is_signalled());

        handle.signal();
        handle.signal();
        assert!(clone.is_signalled());
        clone.cancelled().await;
    }
}
