// ABOUTME: Fan-out/fan-in coordinator running one operation per target concurrently.
// ABOUTME: Merges every failure onto one channel that closes after the last target finishes.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;

use super::error::{ShipError, ShipFailure};
use super::shipper::{Shipper, Target};

/// Run `op` against every target on its own task.
///
/// Failures are forwarded in arrival order, tagged with the target name. The
/// returned receiver yields `None` only after every operation has completed:
/// each task holds a sender clone and the channel closes when the last one
/// drops. A panicking operation is reported as `ShipError::Internal`.
pub fn fan_out<F, Fut>(targets: &[Target], op: F) -> mpsc::UnboundedReceiver<ShipFailure>
where
    F: Fn(Arc<dyn Shipper>) -> Fut,
    Fut: Future<Output = Result<(), ShipError>> + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();

    for target in targets {
        let tx = tx.clone();
        let name = target.name.clone();
        let kind = target.shipper.kind();
        let work = op(Arc::clone(&target.shipper));

        tokio::spawn(async move {
            tracing::info!(target_name = %name, kind, "running target");

            let result = match AssertUnwindSafe(work).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => Err(ShipError::Internal(panic_message(panic.as_ref()))),
            };

            match result {
                Ok(()) => tracing::info!(target_name = %name, "completed target"),
                Err(error) => {
                    tracing::warn!(target_name = %name, %error, "target failed");
                    // The engine may have stopped listening; nothing left to do then.
                    let _ = tx.send(ShipFailure::new(name, error));
                }
            }
        });
    }

    rx
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "shipper panicked with a non-string payload".to_string()
    }
}
