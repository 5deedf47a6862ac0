//! [`MessageSource`] over a directory of Telegram Desktop exports.
//!
//! Layout: `<dir>/<handle>.json` or `<dir>/<handle>/result.json`. A handle resolves to
//! the export's numeric chat id; fetches locate the export by that id.
//!
//! An export is a snapshot: its horizon is the file's modification time, or the end of
//! its newest entry's second if that is later. Nothing past the horizon is claimed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chansync_core::{
    ChannelId, ChannelInfo, ChannelRef, Message, MessageSource, SyncError, TimeRange,
};
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::export::ExportedChat;

pub struct ExportDirSource {
    dir: PathBuf,
    /// Export file per resolved channel id.
    paths: RwLock<HashMap<ChannelId, PathBuf>>,
}

impl ExportDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            paths: RwLock::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn candidates(&self, handle: &str) -> [PathBuf; 2] {
        [
            self.dir.join(format!("{handle}.json")),
            self.dir.join(handle).join("result.json"),
        ]
    }

    async fn load(&self, channel: &str, path: &Path) -> Result<ExportedChat, SyncError> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            SyncError::source_unavailable(channel, format!("read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            SyncError::source_unavailable(channel, format!("parse {}: {e}", path.display()))
        })
    }

    /// Finds the export for `channel_id` among every export in the directory.
    async fn locate(&self, channel_id: &ChannelId) -> Result<PathBuf, SyncError> {
        if let Some(path) = self.paths.read().await.get(channel_id) {
            return Ok(path.clone());
        }

        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(|e| {
            let reason = format!("read dir {}: {e}", self.dir.display());
            SyncError::source_unavailable(channel_id, reason)
        })?;

        let mut found = None;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SyncError::source_unavailable(channel_id, e))?
        {
            let path = entry.path();
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            let path = if is_dir {
                path.join("result.json")
            } else if path.extension().is_some_and(|ext| ext == "json") {
                path
            } else {
                continue;
            };

            match self.load(channel_id.as_str(), &path).await {
                Ok(chat) if chat.channel_id() == *channel_id => {
                    found = Some(path);
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Skipping unreadable export")
                }
            }
        }

        let path = found.ok_or_else(|| {
            let reason = format!("no export found in {}", self.dir.display());
            SyncError::source_unavailable(channel_id, reason)
        })?;
        self.paths
            .write()
            .await
            .insert(channel_id.clone(), path.clone());
        Ok(path)
    }
}

#[async_trait]
impl MessageSource for ExportDirSource {
    async fn resolve_channel(&self, channel: &ChannelRef) -> Result<ChannelInfo, SyncError> {
        for path in self.candidates(channel.handle()) {
            if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                continue;
            }
            let chat = self.load(channel.handle(), &path).await?;
            let info = chat.info();
            info!(
                channel = %channel,
                id = %info.id,
                path = %path.display(),
                "Resolved channel from export"
            );
            self.paths.write().await.insert(info.id.clone(), path);
            return Ok(info);
        }

        warn!(channel = %channel, dir = %self.dir.display(), "No export for channel");
        Err(SyncError::source_unavailable(
            channel,
            format!("no export for {} in {}", channel.handle(), self.dir.display()),
        ))
    }

    async fn fetch(
        &self,
        channel_id: &ChannelId,
        range: TimeRange,
    ) -> Result<Vec<Message>, SyncError> {
        let path = self.locate(channel_id).await?;
        let chat = self.load(channel_id.as_str(), &path).await?;

        let messages: Vec<Message> = chat
            .to_core_messages()
            .into_iter()
            .filter(|m| range.contains(m.timestamp))
            .collect();

        info!(
            channel = %channel_id,
            range = %range,
            count = messages.len(),
            "Fetched messages from export"
        );
        Ok(messages)
    }

    async fn horizon(&self, channel_id: &ChannelId) -> Result<Option<DateTime<Utc>>, SyncError> {
        let path = self.locate(channel_id).await?;
        let modified = tokio::fs::metadata(&path)
            .await
            .and_then(|meta| meta.modified())
            .map_err(|e| {
                SyncError::source_unavailable(channel_id, format!("stat {}: {e}", path.display()))
            })?;
        let chat = self.load(channel_id.as_str(), &path).await?;

        let modified = DateTime::<Utc>::from(modified);
        let horizon = match chat.newest_entry_end() {
            Some(newest) if newest > modified => newest,
            _ => modified,
        };
        debug!(channel = %channel_id, horizon = %horizon, "Export horizon");
        Ok(Some(horizon))
    }
}
