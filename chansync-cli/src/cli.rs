//! CLI parser.

use clap::{Parser, Subcommand};

use crate::config::SyncConfig;

#[derive(Parser, Debug)]
#[command(name = "chansync")]
#[command(
    about = "Incremental Telegram channel sync: sync, view, stats, coverage, search",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch the last N days of each channel, downloading only what is not stored yet.
    Sync {
        /// Channel as a t.me link, @handle or bare handle. Repeatable.
        #[arg(short, long = "channel", required = true)]
        channels: Vec<String>,
        /// Overrides DAYS_BACK.
        #[arg(short, long)]
        days_back: Option<u32>,
        /// Overrides EXPORT_DIR.
        #[arg(long)]
        export_dir: Option<String>,
    },
    /// List recent stored messages, newest first.
    View {
        #[arg(short, long)]
        channel: Option<String>,
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },
    /// Store totals and per-channel statistics.
    Stats,
    /// Print the recorded coverage intervals of a channel.
    Coverage {
        #[arg(short, long)]
        channel: String,
    },
    /// Search stored messages containing any of the keywords.
    Search {
        /// Case-insensitive substring. Repeatable.
        #[arg(short, long = "keyword", required = true)]
        keywords: Vec<String>,
        #[arg(short, long)]
        channel: Option<String>,
        #[arg(short, long, default_value = "50")]
        limit: i64,
        /// Also show N messages around each hit and the replies to it.
        #[arg(long, requires = "channel")]
        context: Option<i64>,
        /// Messages along a reply chain, the hit included. Used with --context.
        #[arg(long, default_value = "2")]
        reply_depth: usize,
    },
}

impl Commands {
    /// Applies command-line overrides on top of the environment config.
    pub fn apply_overrides(&self, config: &mut SyncConfig) {
        if let Commands::Sync {
            days_back,
            export_dir,
            ..
        } = self
        {
            if let Some(days) = days_back {
                config.days_back = *days;
            }
            if let Some(dir) = export_dir {
                config.export_dir = dir.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> SyncConfig {
        SyncConfig {
            database_url: "./telegram_messages.db".to_string(),
            log_file: "logs/chansync.log".to_string(),
            export_dir: "./exports".to_string(),
            fetch_timeout_secs: 30,
            max_concurrent_fetches: 4,
            max_concurrent_channels: 4,
            days_back: 1,
        }
    }

    #[test]
    fn parses_sync_with_repeated_channels_and_overrides() {
        let cli = Cli::try_parse_from([
            "chansync",
            "sync",
            "--channel",
            "https://t.me/rust_news",
            "--channel",
            "@tokio",
            "--days-back",
            "3",
            "--export-dir",
            "/tmp/exports",
        ])
        .unwrap();

        let mut config = base_config();
        cli.command.apply_overrides(&mut config);

        match cli.command {
            Commands::Sync { channels, .. } => {
                assert_eq!(channels, vec!["https://t.me/rust_news", "@tokio"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(config.days_back, 3);
        assert_eq!(config.export_dir, "/tmp/exports");
    }

    #[test]
    fn sync_requires_a_channel() {
        assert!(Cli::try_parse_from(["chansync", "sync"]).is_err());
    }

    #[test]
    fn read_commands_keep_config() {
        let cli = Cli::try_parse_from(["chansync", "search", "--keyword", "release"]).unwrap();
        let mut config = base_config();
        cli.command.apply_overrides(&mut config);

        assert_eq!(config.days_back, 1);
        assert!(matches!(
            cli.command,
            Commands::Search { ref keywords, channel: None, limit: 50, context: None, .. }
                if keywords == &["release"]
        ));
    }

    #[test]
    fn search_with_context_needs_a_channel() {
        let missing_channel =
            Cli::try_parse_from(["chansync", "search", "-k", "tokio", "--context", "2"]);
        assert!(missing_channel.is_err());

        let cli = Cli::try_parse_from([
            "chansync", "search", "-k", "tokio", "-k", "async", "-c", "1001", "--context", "3",
        ])
        .unwrap();
        match cli.command {
            Commands::Search {
                keywords,
                context,
                reply_depth,
                ..
            } => {
                assert_eq!(keywords, vec!["tokio", "async"]);
                assert_eq!(context, Some(3));
                assert_eq!(reply_depth, 2);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
