//! Message repository: persistence of messages and coverage records.
//!
//! Uses SqlitePoolManager and the models (MessageRecord, MessageQuery, ChannelStats).
//! Implements [`MessageStore`] for the reconciler; read-side queries back the CLI.
//!
//! Timestamps are stored as INTEGER Unix milliseconds so the negative-infinity
//! sentinel (`DateTime::<Utc>::MIN_UTC`) orders below every real message. Stored
//! granularity is therefore one millisecond: recorded coverage is shrunk inward to whole
//! milliseconds, so it never claims time that was not fetched.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chansync_core::{ChannelId, Coverage, Message, MessageStore, SyncError, TimeRange};
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite};
use tracing::{debug, info, warn};

use crate::error::StorageError;
use crate::models::{
    text_chars, ChannelStats, ContextQuery, ContextualMessages, KeywordStats, MessageQuery,
    MessageRecord, RetrievalRole, RetrievalStats, RetrievedMessage, StoreStats,
};
use crate::sqlite_pool::SqlitePoolManager;

const MESSAGE_COLUMNS: &str =
    "channel_id, message_id, timestamp_ms, text, sender, chat_title, reply_to_message_id";

#[derive(Clone)]
pub struct MessageRepository {
    pool_manager: SqlitePoolManager,
}

impl MessageRepository {
    pub async fn new(database_url: &str) -> Result<Self, StorageError> {
        let pool_manager = SqlitePoolManager::new(database_url).await?;
        let repo = Self { pool_manager };
        repo.init().await?;
        Ok(repo)
    }

    async fn init(&self) -> Result<(), StorageError> {
        info!("Creating database tables if not exist");

        let pool = self.pool_manager.pool();

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                channel_id TEXT NOT NULL,
                message_id INTEGER NOT NULL,
                timestamp_ms INTEGER NOT NULL,
                text TEXT NOT NULL,
                sender TEXT,
                chat_title TEXT,
                reply_to_message_id INTEGER,
                PRIMARY KEY (channel_id, message_id)
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS coverage (
                channel_id TEXT NOT NULL,
                start_ms INTEGER NOT NULL,
                end_ms INTEGER NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        for index in [
            "CREATE INDEX IF NOT EXISTS idx_messages_channel_ts
             ON messages(channel_id, timestamp_ms)",
            "CREATE INDEX IF NOT EXISTS idx_messages_timestamp ON messages(timestamp_ms)",
            "CREATE INDEX IF NOT EXISTS idx_coverage_channel_start
             ON coverage(channel_id, start_ms)",
        ] {
            sqlx::query(index).execute(pool).await?;
        }

        info!("Database tables created successfully");
        Ok(())
    }

    /// Full recorded coverage of a channel.
    pub async fn coverage(&self, channel_id: &ChannelId) -> Result<Coverage, StorageError> {
        let rows: Vec<(i64, i64)> = sqlx::query_as(
            "SELECT start_ms, end_ms FROM coverage WHERE channel_id = ? ORDER BY start_ms",
        )
        .bind(channel_id.as_str())
        .fetch_all(self.pool_manager.pool())
        .await?;

        coverage_from_rows(rows)
    }

    /// Inserts `messages` under `channel_id`, skipping keys that already exist.
    pub async fn save_messages(
        &self,
        channel_id: &ChannelId,
        messages: &[Message],
    ) -> Result<u64, StorageError> {
        if messages.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool_manager.pool().begin().await?;
        let mut inserted = 0;

        for message in messages {
            let record = MessageRecord::from_message(channel_id, message);
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO messages
                    (channel_id, message_id, timestamp_ms, text, sender, chat_title,
                     reply_to_message_id)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&record.channel_id)
            .bind(record.message_id)
            .bind(record.timestamp_ms)
            .bind(&record.text)
            .bind(&record.sender)
            .bind(&record.chat_title)
            .bind(record.reply_to_message_id)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;

        info!(
            channel = %channel_id,
            received = messages.len(),
            inserted,
            "Saved messages"
        );
        Ok(inserted)
    }

    /// Merges `range` into the channel's coverage in a single transaction.
    ///
    /// The new interval is written first so the transaction holds the write lock
    /// before it reads; overlapping or adjacent rows are then collapsed into one.
    pub async fn record_coverage(
        &self,
        channel_id: &ChannelId,
        range: TimeRange,
    ) -> Result<(), StorageError> {
        let start_ms = ceil_millis(range.start());
        let end_ms = range.end().timestamp_millis();
        if start_ms >= end_ms {
            debug!(
                channel = %channel_id,
                range = %range,
                "Range holds no whole millisecond, coverage not recorded"
            );
            return Ok(());
        }

        let mut tx = self.pool_manager.pool().begin().await?;

        sqlx::query("INSERT INTO coverage (channel_id, start_ms, end_ms) VALUES (?, ?, ?)")
            .bind(channel_id.as_str())
            .bind(start_ms)
            .bind(end_ms)
            .execute(&mut *tx)
            .await?;

        let (merged_start, merged_end): (i64, i64) = sqlx::query_as(
            r#"
            SELECT MIN(start_ms), MAX(end_ms) FROM coverage
            WHERE channel_id = ? AND start_ms <= ? AND end_ms >= ?
            "#,
        )
        .bind(channel_id.as_str())
        .bind(end_ms)
        .bind(start_ms)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM coverage WHERE channel_id = ? AND start_ms <= ? AND end_ms >= ?")
            .bind(channel_id.as_str())
            .bind(end_ms)
            .bind(start_ms)
            .execute(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO coverage (channel_id, start_ms, end_ms) VALUES (?, ?, ?)")
            .bind(channel_id.as_str())
            .bind(merged_start)
            .bind(merged_end)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(
            channel = %channel_id,
            range = %range,
            merged_start_ms = merged_start,
            merged_end_ms = merged_end,
            "Recorded coverage"
        );
        Ok(())
    }

    /// Messages of a channel in `range`, oldest first.
    pub async fn messages_in_range(
        &self,
        channel_id: &ChannelId,
        range: TimeRange,
    ) -> Result<Vec<Message>, StorageError> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE channel_id = ? AND timestamp_ms >= ? AND timestamp_ms < ? \
             ORDER BY timestamp_ms ASC, message_id ASC"
        );
        let records: Vec<MessageRecord> = sqlx::query_as(&sql)
            .bind(channel_id.as_str())
            .bind(ceil_millis(range.start()))
            .bind(ceil_millis(range.end()))
            .fetch_all(self.pool_manager.pool())
            .await?;

        debug!(channel = %channel_id, count = records.len(), "Queried messages in range");
        records.into_iter().map(Message::try_from).collect()
    }

    /// Newest messages first, optionally for a single channel.
    pub async fn recent_messages(
        &self,
        channel_id: Option<&ChannelId>,
        limit: i64,
    ) -> Result<Vec<Message>, StorageError> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE (?1 IS NULL OR channel_id = ?1) \
             ORDER BY timestamp_ms DESC, message_id DESC LIMIT ?2"
        );
        let records: Vec<MessageRecord> = sqlx::query_as(&sql)
            .bind(channel_id.map(ChannelId::as_str))
            .bind(limit)
            .fetch_all(self.pool_manager.pool())
            .await?;

        info!("Retrieved {} recent messages", records.len());
        records.into_iter().map(Message::try_from).collect()
    }

    /// Case-insensitive search for messages containing any of the query's keywords,
    /// oldest first. A query without keywords matches nothing.
    pub async fn search_messages(
        &self,
        query: &MessageQuery,
    ) -> Result<Vec<Message>, StorageError> {
        if query.keywords.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE ("));
        {
            let mut any = builder.separated(" OR ");
            for keyword in &query.keywords {
                any.push("text LIKE ");
                any.push_bind_unseparated(format!("%{}%", escape_like(keyword)));
                any.push_unseparated(" ESCAPE '\\'");
            }
        }
        builder.push(")");

        if let Some(channel_id) = &query.channel_id {
            builder.push(" AND channel_id = ").push_bind(channel_id.as_str().to_string());
        }
        if let Some(range) = query.range {
            builder
                .push(" AND timestamp_ms >= ")
                .push_bind(ceil_millis(range.start()))
                .push(" AND timestamp_ms < ")
                .push_bind(ceil_millis(range.end()));
        }
        builder.push(" ORDER BY timestamp_ms ASC, message_id ASC");
        if let Some(limit) = query.limit {
            builder.push(" LIMIT ").push_bind(limit);
        }

        let records: Vec<MessageRecord> = builder
            .build_query_as::<MessageRecord>()
            .fetch_all(self.pool_manager.pool())
            .await?;

        info!("Found {} messages matching {:?}", records.len(), query.keywords);
        records.into_iter().map(Message::try_from).collect()
    }

    pub async fn message(
        &self,
        channel_id: &ChannelId,
        message_id: i64,
    ) -> Result<Option<Message>, StorageError> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE channel_id = ? AND message_id = ?"
        );
        let record: Option<MessageRecord> = sqlx::query_as(&sql)
            .bind(channel_id.as_str())
            .bind(message_id)
            .fetch_optional(self.pool_manager.pool())
            .await?;

        record.map(Message::try_from).transpose()
    }

    /// Up to `count` messages before and `count` after `message_id`, by message id,
    /// in message id order. The message itself is not included.
    pub async fn context_around(
        &self,
        channel_id: &ChannelId,
        message_id: i64,
        count: i64,
    ) -> Result<Vec<Message>, StorageError> {
        if count <= 0 {
            return Ok(Vec::new());
        }

        let before_sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE channel_id = ? AND message_id < ? ORDER BY message_id DESC LIMIT ?"
        );
        let after_sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE channel_id = ? AND message_id > ? ORDER BY message_id ASC LIMIT ?"
        );
        let pool = self.pool_manager.pool();

        let mut before: Vec<MessageRecord> = sqlx::query_as(&before_sql)
            .bind(channel_id.as_str())
            .bind(message_id)
            .bind(count)
            .fetch_all(pool)
            .await?;
        before.reverse();
        let after: Vec<MessageRecord> = sqlx::query_as(&after_sql)
            .bind(channel_id.as_str())
            .bind(message_id)
            .bind(count)
            .fetch_all(pool)
            .await?;

        before.into_iter().chain(after).map(Message::try_from).collect()
    }

    /// Direct replies to `message_id`, oldest first.
    pub async fn replies_to(
        &self,
        channel_id: &ChannelId,
        message_id: i64,
    ) -> Result<Vec<Message>, StorageError> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE channel_id = ? AND reply_to_message_id = ? \
             ORDER BY timestamp_ms ASC, message_id ASC"
        );
        let records: Vec<MessageRecord> = sqlx::query_as(&sql)
            .bind(channel_id.as_str())
            .bind(message_id)
            .fetch_all(self.pool_manager.pool())
            .await?;

        records.into_iter().map(Message::try_from).collect()
    }

    /// The message and the replies beneath it, depth first, with at most `depth` messages
    /// along any path (`1` returns just the message). Empty if the message is not stored.
    pub async fn reply_chain(
        &self,
        channel_id: &ChannelId,
        message_id: i64,
        depth: usize,
    ) -> Result<Vec<Message>, StorageError> {
        match self.message(channel_id, message_id).await? {
            Some(root) => self.chain_from(root, depth, &mut HashSet::new()).await,
            None => Ok(Vec::new()),
        }
    }

    async fn chain_from(
        &self,
        root: Message,
        depth: usize,
        visited: &mut HashSet<i64>,
    ) -> Result<Vec<Message>, StorageError> {
        let mut chain = Vec::new();
        let mut stack = vec![(root, 0usize)];

        while let Some((message, level)) = stack.pop() {
            if level >= depth || !visited.insert(message.message_id) {
                continue;
            }
            if level + 1 < depth {
                let replies = self
                    .replies_to(&message.channel_id, message.message_id)
                    .await?;
                stack.extend(replies.into_iter().rev().map(|reply| (reply, level + 1)));
            }
            chain.push(message);
        }

        Ok(chain)
    }

    /// Keyword hits in a channel plus the messages around each hit and the replies
    /// beneath it, deduplicated and ordered oldest first.
    pub async fn messages_with_context(
        &self,
        query: &ContextQuery,
    ) -> Result<ContextualMessages, StorageError> {
        let mut search = MessageQuery::any_of(query.keywords.iter().cloned())
            .in_channel(query.channel_id.clone());
        if let Some(range) = query.range {
            search = search.within(range);
        }
        let hits = self.search_messages(&search).await?;

        let mut context = Vec::new();
        let mut answers = Vec::new();
        for hit in &hits {
            context.extend(
                self.context_around(&query.channel_id, hit.message_id, query.context_count)
                    .await?,
            );

            let mut visited = HashSet::new();
            let chain = self.chain_from(hit.clone(), query.reply_depth, &mut visited).await?;
            answers.extend(chain.into_iter().filter(|m| m.message_id != hit.message_id));
        }

        let by_keyword = query
            .keywords
            .iter()
            .map(|keyword| {
                let needle = keyword.to_lowercase();
                let matching: Vec<&Message> = hits
                    .iter()
                    .filter(|m| m.text.to_lowercase().contains(&needle))
                    .collect();
                KeywordStats {
                    keyword: keyword.clone(),
                    count: matching.len(),
                    chars: matching.iter().map(|m| m.text.chars().count()).sum(),
                }
            })
            .collect();
        let stats = RetrievalStats {
            keyword_messages: hits.len(),
            keyword_chars: text_chars(&hits),
            by_keyword,
            context_messages: context.len(),
            context_chars: text_chars(&context),
            answer_messages: answers.len(),
            answer_chars: text_chars(&answers),
        };

        let mut merged: BTreeMap<i64, RetrievedMessage> = BTreeMap::new();
        let tagged = hits
            .into_iter()
            .map(|m| (m, RetrievalRole::Keyword))
            .chain(context.into_iter().map(|m| (m, RetrievalRole::Context)))
            .chain(answers.into_iter().map(|m| (m, RetrievalRole::Answer)));
        for (message, role) in tagged {
            merged
                .entry(message.message_id)
                .and_modify(|existing| existing.role = existing.role.min(role))
                .or_insert(RetrievedMessage { message, role });
        }
        let mut messages: Vec<RetrievedMessage> = merged.into_values().collect();
        messages.sort_by(|a, b| Message::chronological(&a.message, &b.message));

        info!(
            channel = %query.channel_id,
            keywords = stats.keyword_messages,
            context = stats.context_messages,
            answers = stats.answer_messages,
            total = messages.len(),
            "Retrieved messages with context"
        );
        Ok(ContextualMessages { messages, stats })
    }

    /// Per-channel statistics, busiest channel first.
    pub async fn channel_stats(&self) -> Result<Vec<ChannelStats>, StorageError> {
        let rows: Vec<(String, Option<String>, i64, Option<i64>, Option<i64>)> = sqlx::query_as(
            r#"
            SELECT channel_id, MAX(chat_title), COUNT(*), MIN(timestamp_ms), MAX(timestamp_ms)
            FROM messages
            GROUP BY channel_id
            ORDER BY COUNT(*) DESC, channel_id ASC
            "#,
        )
        .fetch_all(self.pool_manager.pool())
        .await?;

        rows.into_iter()
            .map(|(channel_id, chat_title, message_count, oldest, newest)| {
                Ok(ChannelStats {
                    channel_id: ChannelId::new(channel_id),
                    chat_title,
                    message_count,
                    oldest_message: millis_to_datetime(oldest)?,
                    newest_message: millis_to_datetime(newest)?,
                })
            })
            .collect()
    }

    pub async fn store_stats(&self) -> Result<StoreStats, StorageError> {
        let (total_channels, total_messages, oldest, newest): (i64, i64, Option<i64>, Option<i64>) =
            sqlx::query_as(
                "SELECT COUNT(DISTINCT channel_id), COUNT(*), MIN(timestamp_ms), MAX(timestamp_ms)
                 FROM messages",
            )
            .fetch_one(self.pool_manager.pool())
            .await?;

        Ok(StoreStats {
            total_channels,
            total_messages,
            oldest_message: millis_to_datetime(oldest)?,
            newest_message: millis_to_datetime(newest)?,
        })
    }
}

#[async_trait]
impl MessageStore for MessageRepository {
    async fn get_coverage(
        &self,
        channel_id: &ChannelId,
        range: TimeRange,
    ) -> Result<Coverage, SyncError> {
        let rows: Vec<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT start_ms, end_ms FROM coverage
            WHERE channel_id = ? AND start_ms < ? AND end_ms > ?
            ORDER BY start_ms
            "#,
        )
        .bind(channel_id.as_str())
        .bind(ceil_millis(range.end()))
        .bind(range.start().timestamp_millis())
        .fetch_all(self.pool_manager.pool())
        .await
        .map_err(StorageError::from)?;

        Ok(coverage_from_rows(rows)?.clip(&range))
    }

    async fn insert_messages(
        &self,
        channel_id: &ChannelId,
        messages: &[Message],
    ) -> Result<u64, SyncError> {
        Ok(self.save_messages(channel_id, messages).await?)
    }

    async fn add_coverage(
        &self,
        channel_id: &ChannelId,
        range: TimeRange,
    ) -> Result<(), SyncError> {
        Ok(self.record_coverage(channel_id, range).await?)
    }

    async fn query_messages(
        &self,
        channel_id: &ChannelId,
        range: TimeRange,
    ) -> Result<Vec<Message>, SyncError> {
        Ok(self.messages_in_range(channel_id, range).await?)
    }
}

/// Rows that do not form a non-empty range are skipped so one bad row cannot wedge a channel.
fn coverage_from_rows(rows: Vec<(i64, i64)>) -> Result<Coverage, StorageError> {
    let ranges = rows
        .into_iter()
        .filter(|&(start_ms, end_ms)| {
            if start_ms >= end_ms {
                warn!(start_ms, end_ms, "Skipping empty coverage row");
            }
            start_ms < end_ms
        })
        .map(|(start_ms, end_ms)| {
            let start = millis_to_datetime(Some(start_ms))?;
            let end = millis_to_datetime(Some(end_ms))?;
            match (start, end) {
                (Some(start), Some(end)) => TimeRange::new(start, end)
                    .map_err(|e| StorageError::InvalidData(e.to_string())),
                _ => Err(StorageError::InvalidData(format!(
                    "coverage row [{start_ms}, {end_ms}) is not a valid range"
                ))),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Coverage::from_ranges(ranges))
}

/// Smallest whole millisecond at or after `ts`.
fn ceil_millis(ts: DateTime<Utc>) -> i64 {
    let floor = ts.timestamp_millis();
    if ts.timestamp_subsec_nanos() % 1_000_000 == 0 {
        floor
    } else {
        floor + 1
    }
}

fn millis_to_datetime(ms: Option<i64>) -> Result<Option<DateTime<Utc>>, StorageError> {
    ms.map(|ms| {
        DateTime::from_timestamp_millis(ms)
            .ok_or_else(|| StorageError::InvalidData(format!("timestamp {ms} out of range")))
    })
    .transpose()
}

fn escape_like(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len());
    for c in keyword.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::{ceil_millis, escape_like};
    use chrono::{DateTime, Duration};

    #[test]
    fn ceil_millis_rounds_up_partial_milliseconds() {
        let t = DateTime::from_timestamp(100, 0).unwrap();
        assert_eq!(ceil_millis(t), 100_000);
        assert_eq!(ceil_millis(t + Duration::nanoseconds(1)), 100_001);
        assert_eq!(ceil_millis(t + Duration::milliseconds(1)), 100_001);
        assert_eq!(ceil_millis(t - Duration::nanoseconds(1)), 100_000);
        let min = DateTime::<chrono::Utc>::MIN_UTC;
        assert_eq!(ceil_millis(min), min.timestamp_millis());
    }

    #[test]
    fn escape_like_escapes_wildcards() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }
}
