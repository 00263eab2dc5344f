use std::{str::FromStr, sync::Arc};

use anyhow::{anyhow, bail, Result};
use tokio::{select, sync::mpsc};
use tokio_stream::{wrappers::UnboundedReceiverStream, Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, trace};

use crate::{
    activity::ManualActivityMonitor,
    companion::{event::Notification, CompanionHandle},
    tracker::SessionState,
    utils::{percentage::Percentage, time::format_seconds},
};

/// One line of console input.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Click,
    Drag,
    Drop,
    Cpu(Percentage),
    Start,
    Stop,
    Preset(String),
    Clear,
    Today,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (name, argument) = s
            .split_once(char::is_whitespace)
            .map(|(name, argument)| (name, argument.trim()))
            .unwrap_or((s, ""));

        let command = match name {
            "click" => ConsoleCommand::Click,
            "drag" => ConsoleCommand::Drag,
            "drop" => ConsoleCommand::Drop,
            "cpu" => ConsoleCommand::Cpu(
                argument
                    .parse()
                    .map_err(|e| anyhow!("cpu expects a percentage between 0 and 100: {e}"))?,
            ),
            "start" => ConsoleCommand::Start,
            "stop" => ConsoleCommand::Stop,
            "preset" if argument.is_empty() => bail!("preset expects a name"),
            "preset" => return Ok(ConsoleCommand::Preset(argument.to_string())),
            "clear" => ConsoleCommand::Clear,
            "today" => ConsoleCommand::Today,
            "quit" | "exit" => ConsoleCommand::Quit,
            _ => bail!("Unknown command {name:?}"),
        };
        if !argument.is_empty() && !matches!(command, ConsoleCommand::Cpu(_)) {
            bail!("{name} doesn't take arguments");
        }
        Ok(command)
    }
}

pub const CONSOLE_HELP: &str =
    "Commands: click, drag, drop, cpu <percent>, start, stop, preset <name>, clear, today, quit";

/// Forwards console lines to the companion until input ends, `quit` is read or shutdown is
/// requested. Always requests shutdown when it returns.
pub async fn run_console(
    lines: impl Stream<Item = std::io::Result<String>> + Unpin,
    handle: CompanionHandle,
    activity: Option<Arc<ManualActivityMonitor>>,
    shutdown: CancellationToken,
) -> Result<()> {
    let result = read_commands(lines, &handle, activity.as_deref(), &shutdown).await;
    shutdown.cancel();
    result
}

async fn read_commands(
    mut lines: impl Stream<Item = std::io::Result<String>> + Unpin,
    handle: &CompanionHandle,
    activity: Option<&ManualActivityMonitor>,
    shutdown: &CancellationToken,
) -> Result<()> {
    loop {
        let line = select! {
            line = lines.next() => line,
            _ = shutdown.cancelled() => return Ok(()),
        };
        let Some(line) = line else {
            info!("Console input closed");
            return Ok(());
        };
        let line = line?;

        // Typing into the console is the only input we can see without an idle backend.
        if let Some(activity) = activity {
            activity.fire();
        }
        if line.trim().is_empty() {
            continue;
        }

        match line.parse::<ConsoleCommand>() {
            Ok(ConsoleCommand::Quit) => return Ok(()),
            Ok(command) => execute(handle, command).await?,
            Err(e) => println!("{e}. {CONSOLE_HELP}"),
        }
    }
}

async fn execute(handle: &CompanionHandle, command: ConsoleCommand) -> Result<()> {
    trace!("Console command {command:?}");
    match command {
        ConsoleCommand::Click => handle.click(),
        ConsoleCommand::Drag => handle.drag_started(),
        ConsoleCommand::Drop => handle.drag_ended(),
        ConsoleCommand::Cpu(usage) => handle.set_cpu_usage(usage),
        ConsoleCommand::Start => handle.start_tracking(),
        ConsoleCommand::Stop => handle.stop_tracking(),
        ConsoleCommand::Preset(name) => handle.switch_preset(name),
        ConsoleCommand::Clear => handle.clear_preset(),
        ConsoleCommand::Today => {
            let total = handle.today_total().await?;
            println!("today\t{}", format_seconds(total));
            Ok(())
        }
        ConsoleCommand::Quit => Ok(()),
    }
}

/// Session ticks are printed once a minute, everything else as it happens.
const TICK_PRINT_PERIOD: u64 = 60;

pub fn format_notification(notification: Notification) -> Option<String> {
    match notification {
        Notification::MoodChanged(mood) => Some(format!("mood\t{mood}")),
        Notification::SessionStateChanged(state) => Some(format!("session\t{state}")),
        Notification::SessionTick {
            elapsed_seconds,
            state: SessionState::Tracking,
        } if elapsed_seconds % TICK_PRINT_PERIOD == 0 => Some(format!(
            "session\ttracking\t{}",
            format_seconds(elapsed_seconds as f64)
        )),
        Notification::SessionTick { .. } => None,
    }
}

pub async fn print_notifications(
    receiver: mpsc::UnboundedReceiver<Notification>,
    shutdown: CancellationToken,
) {
    let mut notifications = UnboundedReceiverStream::new(receiver);
    loop {
        select! {
            notification = notifications.next() => match notification {
                Some(notification) => {
                    if let Some(line) = format_notification(notification) {
                        println!("{line}");
                    }
                }
                None => return,
            },
            _ = shutdown.cancelled() => return,
        }
    }
}
