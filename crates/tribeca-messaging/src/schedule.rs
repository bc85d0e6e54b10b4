/*
[INPUT]:  Delayed UI callbacks (layout settle, resize notifications) and their owner scope
[OUTPUT]: Cancellable one-shot tasks on the local event loop
[POS]:    Lifetime layer - timers that never fire into a destroyed scope
[UPDATE]: When timer ownership or cancellation rules change
*/

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::scope::Scope;

/// Handle to a callback scheduled with [`schedule`].
#[derive(Debug)]
pub struct ScheduledTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Prevent the callback from running. Safe to call at any time.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The task has either fired or observed its cancellation.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Run `task` once after `delay` unless `scope` is torn down first.
///
/// Must be called from inside a [`tokio::task::LocalSet`].
pub fn schedule(scope: &Scope, delay: Duration, task: impl FnOnce() + 'static) -> ScheduledTask {
    let token = CancellationToken::new();

    let cancel = token.clone();
    let key = scope.register_on_teardown(move || cancel.cancel());

    let guard = token.clone();
    let owner = scope.downgrade();
    let handle = tokio::task::spawn_local(async move {
        tokio::select! {
            _ = guard.cancelled() => {
                if let Some(scope) = owner.upgrade() {
                    scope.cancel_teardown(key);
                }
                debug!("scheduled task cancelled");
            }
            _ = tokio::time::sleep(delay) => {
                let Some(scope) = owner.upgrade() else {
                    return;
                };
                scope.cancel_teardown(key);
                if !scope.is_destroyed() {
                    task();
                }
            }
        }
    });

    ScheduledTask { token, handle }
}
