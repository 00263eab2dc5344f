use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Cancels `cancellation` once the process receives ctrl-c. Returns early when something else
/// cancels first, so it can be joined with the rest of the host.
pub async fn detect_shutdown(cancellation: CancellationToken) {
    select! {
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Received ctrl-c, shutting down"),
                Err(e) => error!("Failed to listen for ctrl-c {e:?}"),
            }
            cancellation.cancel();
        },
        _ = cancellation.cancelled() => (),
    };
}
