//! chansync CLI: sync channels from exports, then view, search and inspect the local store.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chansync_cli::{Cli, Commands, SyncConfig};
use chansync_core::{init_tracing, ChannelId, ChannelRef, Message, TimeRange};
use chrono::{SubsecRound, Utc};
use clap::Parser;
use reconciler::{CancelHandle, RangeReconciler};
use storage::{ContextQuery, MessageQuery, MessageRepository, RetrievalRole};
use telegram_export::ExportDirSource;
use tracing::{info, warn};

const TEXT_PREVIEW_LEN: usize = 80;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = SyncConfig::load().context("Load config from .env / environment")?;
    cli.command.apply_overrides(&mut config);
    config.validate()?;
    init_tracing(&config.log_file).context("Initialize logging")?;

    match cli.command {
        Commands::Sync { channels, .. } => handle_sync(&config, &channels).await,
        Commands::View { channel, limit } => handle_view(&config, channel, limit).await,
        Commands::Stats => handle_stats(&config).await,
        Commands::Coverage { channel } => handle_coverage(&config, channel).await,
        Commands::Search {
            keywords,
            channel,
            limit,
            context: None,
            ..
        } => handle_search(&config, keywords, channel, limit).await,
        Commands::Search {
            keywords,
            channel: Some(channel),
            context: Some(count),
            reply_depth,
            ..
        } => handle_search_context(&config, keywords, channel, count, reply_depth).await,
        Commands::Search { context: Some(_), channel: None, .. } => {
            bail!("--context requires --channel")
        }
    }
}

async fn open_repository(config: &SyncConfig) -> Result<MessageRepository> {
    MessageRepository::new(&config.database_url)
        .await
        .with_context(|| format!("Open message store at {}", config.database_url))
}

/// Handle the sync command.
///
/// Reconciles `[now - days_back, now)` for every channel. Ctrl-C stops new gap fetches;
/// fetches in flight finish and are kept. Fails if any channel did not sync completely.
async fn handle_sync(config: &SyncConfig, channels: &[String]) -> Result<()> {
    let channels = channels
        .iter()
        .map(|c| ChannelRef::parse(c))
        .collect::<Result<Vec<_>, _>>()
        .context("Parse --channel")?;

    let repo = open_repository(config).await?;
    let source = ExportDirSource::new(&config.export_dir);
    let reconciler =
        RangeReconciler::with_config(Arc::new(repo), Arc::new(source), config.reconciler_config());

    let now = Utc::now().trunc_subsecs(0);
    let range = TimeRange::last_days(now, config.days_back)?;

    let (handle, token) = CancelHandle::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, waiting for in-flight fetches");
            handle.cancel();
        }
    });

    info!(channels = channels.len(), range = %range, "Starting sync");
    let results = reconciler.sync_channels(&channels, range, &token).await;

    let mut incomplete = 0;
    for (channel, result) in &results {
        match result {
            Ok(synced) => {
                let outcome = &synced.outcome;
                println!(
                    "{} ({}): {} message(s) in range, {} new, {} gap(s) fetched",
                    channel,
                    synced.info.title.as_deref().unwrap_or(synced.info.id.as_str()),
                    outcome.messages.len(),
                    outcome.inserted,
                    outcome.fetched.len()
                );
                for failure in &outcome.failed {
                    println!("  failed {}: {}", failure.range, failure.error);
                }
                if !outcome.is_complete() {
                    incomplete += 1;
                }
            }
            Err(e) => {
                println!("{}: {}", channel, e);
                incomplete += 1;
            }
        }
    }

    if incomplete > 0 {
        bail!(
            "{} of {} channel(s) did not sync completely; rerun to retry the missing ranges",
            incomplete,
            results.len()
        );
    }
    Ok(())
}

async fn handle_view(config: &SyncConfig, channel: Option<String>, limit: i64) -> Result<()> {
    let repo = open_repository(config).await?;
    let channel = channel.map(ChannelId::new);
    let messages = repo
        .recent_messages(channel.as_ref(), limit)
        .await
        .context("Query recent messages")?;

    if messages.is_empty() {
        println!("No messages (database: {}).", config.database_url);
        return Ok(());
    }

    println!("Recent {} message(s):\n", messages.len());
    print_messages(&messages);
    Ok(())
}

async fn handle_stats(config: &SyncConfig) -> Result<()> {
    let repo = open_repository(config).await?;
    let totals = repo.store_stats().await.context("Query store stats")?;
    let channels = repo.channel_stats().await.context("Query channel stats")?;

    println!("Channels: {}", totals.total_channels);
    println!("Messages: {}", totals.total_messages);
    if let (Some(oldest), Some(newest)) = (totals.oldest_message, totals.newest_message) {
        println!(
            "Span:     {} .. {}",
            oldest.format("%Y-%m-%d %H:%M:%S"),
            newest.format("%Y-%m-%d %H:%M:%S")
        );
    }
    if channels.is_empty() {
        return Ok(());
    }

    println!();
    println!("{:<20} {:<30} {:>8} {:<20} {:<20}", "channel", "title", "count", "oldest", "newest");
    println!("{}", "-".repeat(102));
    for stats in &channels {
        let format_ts = |ts: Option<chrono::DateTime<Utc>>| {
            ts.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string())
        };
        println!(
            "{:<20} {:<30} {:>8} {:<20} {:<20}",
            stats.channel_id.as_str(),
            stats.chat_title.as_deref().unwrap_or("-"),
            stats.message_count,
            format_ts(stats.oldest_message),
            format_ts(stats.newest_message)
        );
    }
    Ok(())
}

async fn handle_coverage(config: &SyncConfig, channel: String) -> Result<()> {
    let repo = open_repository(config).await?;
    let channel = ChannelId::new(channel);
    let coverage = repo.coverage(&channel).await.context("Query coverage")?;

    if coverage.is_empty() {
        println!("No coverage recorded for {}.", channel);
        return Ok(());
    }

    println!("Coverage of {} ({} interval(s)):", channel, coverage.len());
    for range in coverage.ranges() {
        println!("  {}", range);
    }
    Ok(())
}

async fn handle_search(
    config: &SyncConfig,
    keywords: Vec<String>,
    channel: Option<String>,
    limit: i64,
) -> Result<()> {
    let repo = open_repository(config).await?;
    let wanted = keywords.join("' | '");
    let mut query = MessageQuery::any_of(keywords).limit(limit);
    if let Some(channel) = channel {
        query = query.in_channel(ChannelId::new(channel));
    }
    let messages = repo.search_messages(&query).await.context("Search messages")?;

    if messages.is_empty() {
        println!("No messages matching '{}'.", wanted);
        return Ok(());
    }

    println!("{} message(s) matching '{}':\n", messages.len(), wanted);
    print_messages(&messages);
    Ok(())
}

/// Keyword hits of one channel with surrounding messages and reply chains, oldest first.
async fn handle_search_context(
    config: &SyncConfig,
    keywords: Vec<String>,
    channel: String,
    count: i64,
    reply_depth: usize,
) -> Result<()> {
    let repo = open_repository(config).await?;
    let query = ContextQuery::new(ChannelId::new(channel), keywords)
        .context_count(count)
        .reply_depth(reply_depth);
    let result = repo
        .messages_with_context(&query)
        .await
        .context("Search messages with context")?;

    if result.messages.is_empty() {
        println!("No messages matching in {}.", query.channel_id);
        return Ok(());
    }

    let stats = &result.stats;
    for keyword in &stats.by_keyword {
        println!("'{}': {} hit(s), {} chars", keyword.keyword, keyword.count, keyword.chars);
    }
    println!(
        "{} hit(s), {} context, {} answer(s); {} message(s), {} chars after dedup\n",
        stats.keyword_messages,
        stats.context_messages,
        stats.answer_messages,
        result.messages.len(),
        result.total_chars()
    );
    for retrieved in &result.messages {
        let marker = match retrieved.role {
            RetrievalRole::Keyword => "*",
            RetrievalRole::Context => " ",
            RetrievalRole::Answer => ">",
        };
        let m = &retrieved.message;
        println!(
            "{} {:<10} {:<20} {:<16} {}",
            marker,
            m.message_id,
            m.timestamp.format("%Y-%m-%d %H:%M:%S"),
            m.sender.as_deref().unwrap_or("-"),
            preview(&m.text)
        );
    }
    Ok(())
}

fn print_messages(messages: &[Message]) {
    println!(
        "{:<20} {:<10} {:<20} {:<16} {}",
        "channel", "id", "timestamp", "sender", "text_preview"
    );
    println!("{}", "-".repeat(120));

    for m in messages {
        println!(
            "{:<20} {:<10} {:<20} {:<16} {}",
            m.channel_id.as_str(),
            m.message_id,
            m.timestamp.format("%Y-%m-%d %H:%M:%S"),
            m.sender.as_deref().unwrap_or("-"),
            preview(&m.text)
        );
    }
}

fn preview(text: &str) -> String {
    text.chars()
        .take(TEXT_PREVIEW_LEN)
        .collect::<String>()
        .replace('\n', " ")
}
