use tokio_util::sync::CancellationToken;

/// Couples a phase's deadline one-shot and its 1-Hz ticker under one
/// cancellation handle so early completion stops both atomically.
/// Cancelling an already-cancelled handle is a no-op.
#[derive(Debug)]
pub struct PhaseTimers {
    token: CancellationToken,
}

impl PhaseTimers {
    /// A handle that is already cancelled; used before any phase is armed.
    pub fn disarmed() -> Self {
        let token = CancellationToken::new();
        token.cancel();
        Self { token }
    }

    /// Fresh handle for a newly armed phase.
    pub fn arm() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}
