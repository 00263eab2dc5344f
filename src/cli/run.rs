use std::sync::Arc;

use anyhow::Result;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tokio_stream::wrappers::LinesStream;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    activity::{
        polling::{IdlePollingMonitor, DEFAULT_POLL_INTERVAL},
        ActivityMonitor, ManualActivityMonitor,
    },
    companion::{create_companion, event::Notifier, shutdown::detect_shutdown, CompanionConfig},
    storage::history_store::HistoryStore,
    utils::clock::{Clock, DefaultClock},
    window_api::GenericIdleSource,
};

use super::console::{print_notifications, run_console, CONSOLE_HELP};

/// Runs the companion in the current console until ctrl-c, `quit` or the end of input.
pub async fn start_companion(store: impl HistoryStore, config: CompanionConfig) -> Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let (sender, events) = mpsc::unbounded_channel();
    let (notifier, notifications) = Notifier::channel();
    let shutdown = CancellationToken::new();

    let (activity, console_activity) = match GenericIdleSource::new() {
        Ok(source) => {
            let monitor: Arc<dyn ActivityMonitor> = Arc::new(IdlePollingMonitor::new(
                Box::new(source),
                sender.clone(),
                clock.clone(),
                DEFAULT_POLL_INTERVAL,
            ));
            (monitor, None)
        }
        Err(e) => {
            warn!("Idle time is unavailable, only console input counts as activity: {e:?}");
            let monitor = ManualActivityMonitor::new(sender.clone());
            (monitor.clone() as Arc<dyn ActivityMonitor>, Some(monitor))
        }
    };

    let (mut companion, handle) = create_companion(
        (sender, events),
        store,
        activity,
        clock,
        config,
        notifier,
        shutdown.clone(),
    );

    println!("{CONSOLE_HELP}");
    let lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
    let (_, _, console_result, _) = tokio::join!(
        detect_shutdown(shutdown.clone()),
        companion.run(),
        run_console(lines, handle, console_activity, shutdown.clone()),
        print_notifications(notifications, shutdown.clone()),
    );
    info!("Companion host finished");
    console_result
}
