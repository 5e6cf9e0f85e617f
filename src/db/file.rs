use serde::{de::DeserializeOwned, Serialize};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};
use tokio::{fs, io::AsyncWriteExt, sync::Mutex};

use crate::{
    db::{apply_limit, AnalyticsStore, UserStore},
    error::AppResult,
    models::{
        InteractionEvent, InteractionFilter, SessionFilter, SessionRecord, StoreCounts,
        UserPreferences, UserRecord,
    },
};

const INTERACTIONS_FILE: &str = "video_interactions.jsonl";
const SESSIONS_FILE: &str = "recommendation_sessions.jsonl";
const USERS_FILE: &str = "users.json";

/// Flat-file analytics and user store
///
/// Interactions and sessions are append-only JSON Lines files, users a single
/// JSON document rewritten through a temp file and rename. One mutex
/// serializes all writers inside the process.
pub struct FileStore {
    data_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Opens the store, creating `data_dir` when missing
    pub async fn open(data_dir: impl AsRef<Path>) -> AppResult<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir).await?;

        tracing::info!(data_dir = %data_dir.display(), "File store opened");

        Ok(Self {
            data_dir,
            write_lock: Mutex::new(()),
        })
    }

    fn path(&self, file: &str) -> PathBuf {
        self.data_dir.join(file)
    }

    async fn append_lines<T: Serialize>(&self, file: &str, rows: &[T]) -> AppResult<()> {
        let mut buf = String::new();
        for row in rows {
            buf.push_str(&serde_json::to_string(row)?);
            buf.push('\n');
        }

        let mut handle = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(file))
            .await?;
        handle.write_all(buf.as_bytes()).await?;
        handle.flush().await?;
        Ok(())
    }

    /// Reads every row of a JSON Lines file. Lines that fail to parse are
    /// skipped so one corrupt write cannot hide the rest of the history.
    async fn read_lines<T: DeserializeOwned>(&self, file: &str) -> AppResult<Vec<T>> {
        let path = self.path(file);
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };

        let mut rows = Vec::new();
        for (line_no, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(row) => rows.push(row),
                Err(e) => tracing::warn!(
                    file = %path.display(),
                    line = line_no + 1,
                    error = %e,
                    "Skipping malformed row"
                ),
            }
        }
        Ok(rows)
    }

    async fn load_users(&self) -> AppResult<BTreeMap<String, UserRecord>> {
        match fs::read_to_string(self.path(USERS_FILE)).await {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save_users(&self, users: &BTreeMap<String, UserRecord>) -> AppResult<()> {
        let tmp = self.path(&format!("{}.tmp", USERS_FILE));
        fs::write(&tmp, serde_json::to_vec_pretty(users)?).await?;
        fs::rename(&tmp, self.path(USERS_FILE)).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl AnalyticsStore for FileStore {
    async fn record_interactions(&self, events: &[InteractionEvent]) -> AppResult<usize> {
        if events.is_empty() {
            return Ok(0);
        }

        let _guard = self.write_lock.lock().await;
        self.append_lines(INTERACTIONS_FILE, events).await?;
        Ok(events.len())
    }

    async fn record_session_batch(
        &self,
        events: &[InteractionEvent],
        session: &SessionRecord,
    ) -> AppResult<()> {
        let _guard = self.write_lock.lock().await;
        if !events.is_empty() {
            self.append_lines(INTERACTIONS_FILE, events).await?;
        }
        self.append_lines(SESSIONS_FILE, std::slice::from_ref(session))
            .await?;
        Ok(())
    }

    async fn list_interactions(
        &self,
        filter: &InteractionFilter,
    ) -> AppResult<Vec<InteractionEvent>> {
        let mut rows: Vec<InteractionEvent> = self
            .read_lines::<InteractionEvent>(INTERACTIONS_FILE)
            .await?
            .into_iter()
            .filter(|e| filter.user_id.as_ref().map_or(true, |u| &e.user_id == u))
            .filter(|e| filter.session_id.as_ref().map_or(true, |s| &e.session_id == s))
            .collect();

        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(apply_limit(rows, filter.limit))
    }

    async fn list_sessions(&self, filter: &SessionFilter) -> AppResult<Vec<SessionRecord>> {
        let mut rows: Vec<SessionRecord> = self
            .read_lines::<SessionRecord>(SESSIONS_FILE)
            .await?
            .into_iter()
            .filter(|s| filter.user_id.as_ref().map_or(true, |u| &s.user_id == u))
            .collect();

        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(apply_limit(rows, filter.limit))
    }

    async fn counts(&self) -> AppResult<StoreCounts> {
        let interactions = self.read_lines::<InteractionEvent>(INTERACTIONS_FILE).await?;
        let sessions = self.read_lines::<SessionRecord>(SESSIONS_FILE).await?;

        Ok(StoreCounts {
            video_interactions: interactions.len(),
            recommendation_sessions: sessions.len(),
        })
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

#[async_trait::async_trait]
impl UserStore for FileStore {
    async fn create_user_if_missing(&self, user: UserRecord) -> AppResult<(UserRecord, bool)> {
        let _guard = self.write_lock.lock().await;
        let mut users = self.load_users().await?;

        if let Some(existing) = users.get(&user.user_id) {
            return Ok((existing.clone(), false));
        }

        users.insert(user.user_id.clone(), user.clone());
        self.save_users(&users).await?;
        Ok((user, true))
    }

    async fn get_user(&self, user_id: &str) -> AppResult<Option<UserRecord>> {
        Ok(self.load_users().await?.remove(user_id))
    }

    async fn update_preferences(
        &self,
        user_id: &str,
        preferences: &UserPreferences,
    ) -> AppResult<Option<UserRecord>> {
        let _guard = self.write_lock.lock().await;
        let mut users = self.load_users().await?;

        let updated = match users.get_mut(user_id) {
            Some(user) => {
                user.preferences = preferences.clone();
                user.clone()
            }
            None => return Ok(None),
        };

        self.save_users(&users).await?;
        Ok(Some(updated))
    }
}
