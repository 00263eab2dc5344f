use std::fmt::Display;

use anyhow::Result;
use chrono::{DateTime, Local};
use chrono_english::parse_date_string;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};

use crate::{
    storage::{entities::DayHistory, history_store::HistoryStore},
    utils::time::{date_key, format_seconds},
};

use super::Args;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Parser)]
pub struct HistoryCommand {
    #[arg(
        long = "start",
        short,
        help = "First day to show. Examples are \"yesterday\", \"3 days ago\", \"15/03/2025\". Defaults to the last week"
    )]
    start_date: Option<String>,
    #[arg(
        long,
        default_value_t = DateStyle::Uk,
        help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year"
    )]
    date_style: DateStyle,
}

#[derive(Debug, Subcommand)]
pub enum PresetCommand {
    #[command(about = "List saved presets")]
    List,
    #[command(about = "Save a preset")]
    Add { name: String },
    #[command(about = "Forget a preset. Time already tracked under it is kept")]
    Remove { name: String },
}

const DEFAULT_HISTORY_DAYS: u32 = 7;

pub async fn process_today_command(store: &impl HistoryStore) -> Result<()> {
    let total = store.today_total().await?;
    println!("today\t{}", format_seconds(total));
    for (category, seconds) in store.today_breakdown().await? {
        println!("\t{}\t{}", format_seconds(seconds), category);
    }
    Ok(())
}

/// Prints every day with tracked time from `start_date` up to today, newest first.
pub async fn process_history_command(
    HistoryCommand {
        start_date,
        date_style,
    }: HistoryCommand,
    store: &impl HistoryStore,
) -> Result<()> {
    let days = history_days(start_date, date_style, Local::now())?;
    let history = store.recent_history(days).await?;
    if history.is_empty() {
        println!("Nothing was tracked in the last {days} days");
        return Ok(());
    }
    for day in history {
        print!("{}", format_day(&day));
    }
    Ok(())
}

pub async fn process_preset_command(
    command: PresetCommand,
    store: &impl HistoryStore,
) -> Result<()> {
    match command {
        PresetCommand::List => {
            for preset in store.presets().await? {
                println!("{preset}");
            }
        }
        PresetCommand::Add { name } => store.add_preset(&name).await?,
        PresetCommand::Remove { name } => store.remove_preset(&name).await?,
    }
    Ok(())
}

/// Number of days from the parsed start up to and including today.
fn history_days(
    start_date: Option<String>,
    date_style: DateStyle,
    now: DateTime<Local>,
) -> Result<u32> {
    let Some(start_date) = start_date else {
        return Ok(DEFAULT_HISTORY_DAYS);
    };
    let start = match parse_date_string(&start_date, now, date_style.into()) {
        Ok(v) => v,
        Err(e) => {
            return Err(Args::command()
                .error(
                    clap::error::ErrorKind::ValueValidation,
                    format!("Failed to validate start date {e}"),
                )
                .into());
        }
    };
    let days = (now.date_naive() - start.date_naive()).num_days() + 1;
    if days < 1 {
        return Err(Args::command()
            .error(
                clap::error::ErrorKind::ValueValidation,
                format!("Start date {} is in the future", start.date_naive()),
            )
            .into());
    }
    Ok(u32::try_from(days)?)
}

fn format_day(day: &DayHistory) -> String {
    let mut result = format!("{}\t{}\n", date_key(day.date), format_seconds(day.total));
    for (category, seconds) in &day.categories {
        result.push_str(&format!("\t{}\t{category}\n", format_seconds(*seconds)));
    }
    result
}
