use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, types::Json, FromRow, PgPool, Postgres, QueryBuilder};

use crate::{
    db::{AnalyticsStore, UserStore},
    error::{AppError, AppResult},
    models::{
        InteractionEvent, InteractionFilter, SessionFilter, SessionRecord, StoreCounts,
        UserPreferences, UserRecord,
    },
};

/// Creates a PostgreSQL connection pool
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(pool)
}

#[derive(Debug, FromRow)]
struct InteractionRow {
    user_id: String,
    video_id: String,
    interaction_type: String,
    is_recommended: bool,
    session_id: String,
    timestamp: DateTime<Utc>,
}

impl TryFrom<InteractionRow> for InteractionEvent {
    type Error = AppError;

    fn try_from(row: InteractionRow) -> Result<Self, Self::Error> {
        Ok(InteractionEvent {
            interaction_type: row.interaction_type.parse().map_err(AppError::Internal)?,
            user_id: row.user_id,
            video_id: row.video_id,
            is_recommended: row.is_recommended,
            session_id: row.session_id,
            timestamp: row.timestamp,
        })
    }
}

#[derive(Debug, FromRow)]
struct SessionRow {
    user_id: String,
    session_id: String,
    recommended_videos: Vec<String>,
    selected_videos: Vec<String>,
    total_recommended: i32,
    selected_recommended: i32,
    recommendation_accuracy: f64,
    timestamp: DateTime<Utc>,
}

impl From<SessionRow> for SessionRecord {
    fn from(row: SessionRow) -> Self {
        SessionRecord {
            user_id: row.user_id,
            session_id: row.session_id,
            recommended_videos: row.recommended_videos,
            selected_videos: row.selected_videos,
            total_recommended: row.total_recommended,
            selected_recommended: row.selected_recommended,
            recommendation_accuracy: row.recommendation_accuracy,
            timestamp: row.timestamp,
        }
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    user_id: String,
    email: String,
    created_at: DateTime<Utc>,
    preferences: Json<UserPreferences>,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        UserRecord {
            user_id: row.user_id,
            email: row.email,
            created_at: row.created_at,
            preferences: row.preferences.0,
        }
    }
}

/// Postgres-backed analytics and user store
#[derive(Clone)]
pub struct PgStore {
    db_pool: PgPool,
}

impl PgStore {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    fn interactions_insert<'a>(events: &'a [InteractionEvent]) -> QueryBuilder<'a, Postgres> {
        let mut builder = QueryBuilder::new(
            "INSERT INTO video_interactions \
             (user_id, video_id, interaction_type, is_recommended, session_id, timestamp) ",
        );
        builder.push_values(events, |mut row, event| {
            row.push_bind(&event.user_id)
                .push_bind(&event.video_id)
                .push_bind(event.interaction_type.as_str())
                .push_bind(event.is_recommended)
                .push_bind(&event.session_id)
                .push_bind(event.timestamp);
        });
        builder
    }

    async fn fetch_user(&self, user_id: &str) -> AppResult<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT user_id, email, created_at, preferences
            FROM users
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(row.map(UserRecord::from))
    }
}

#[async_trait::async_trait]
impl AnalyticsStore for PgStore {
    async fn record_interactions(&self, events: &[InteractionEvent]) -> AppResult<usize> {
        if events.is_empty() {
            return Ok(0);
        }

        let result = Self::interactions_insert(events)
            .build()
            .execute(&self.db_pool)
            .await?;

        tracing::debug!(rows = result.rows_affected(), "Inserted interactions");
        Ok(result.rows_affected() as usize)
    }

    async fn record_session_batch(
        &self,
        events: &[InteractionEvent],
        session: &SessionRecord,
    ) -> AppResult<()> {
        let mut tx = self.db_pool.begin().await?;

        if !events.is_empty() {
            Self::interactions_insert(events)
                .build()
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO recommendation_sessions
                (user_id, session_id, recommended_videos, selected_videos,
                 total_recommended, selected_recommended, recommendation_accuracy, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&session.user_id)
        .bind(&session.session_id)
        .bind(&session.recommended_videos)
        .bind(&session.selected_videos)
        .bind(session.total_recommended)
        .bind(session.selected_recommended)
        .bind(session.recommendation_accuracy)
        .bind(session.timestamp)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn list_interactions(
        &self,
        filter: &InteractionFilter,
    ) -> AppResult<Vec<InteractionEvent>> {
        let rows = sqlx::query_as::<_, InteractionRow>(
            r#"
            SELECT user_id, video_id, interaction_type, is_recommended, session_id, timestamp
            FROM video_interactions
            WHERE ($1::text IS NULL OR user_id = $1)
              AND ($2::text IS NULL OR session_id = $2)
            ORDER BY timestamp DESC
            LIMIT $3
            "#,
        )
        .bind(filter.user_id.as_deref())
        .bind(filter.session_id.as_deref())
        .bind(filter.limit.map(|l| l as i64))
        .fetch_all(&self.db_pool)
        .await?;

        rows.into_iter().map(InteractionEvent::try_from).collect()
    }

    async fn list_sessions(&self, filter: &SessionFilter) -> AppResult<Vec<SessionRecord>> {
        let rows = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT user_id, session_id, recommended_videos, selected_videos,
                   total_recommended, selected_recommended, recommendation_accuracy, timestamp
            FROM recommendation_sessions
            WHERE ($1::text IS NULL OR user_id = $1)
            ORDER BY timestamp DESC
            LIMIT $2
            "#,
        )
        .bind(filter.user_id.as_deref())
        .bind(filter.limit.map(|l| l as i64))
        .fetch_all(&self.db_pool)
        .await?;

        Ok(rows.into_iter().map(SessionRecord::from).collect())
    }

    async fn counts(&self) -> AppResult<StoreCounts> {
        let interactions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM video_interactions")
            .fetch_one(&self.db_pool)
            .await?;
        let sessions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM recommendation_sessions")
            .fetch_one(&self.db_pool)
            .await?;

        Ok(StoreCounts {
            video_interactions: interactions as usize,
            recommendation_sessions: sessions as usize,
        })
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

#[async_trait::async_trait]
impl UserStore for PgStore {
    async fn create_user_if_missing(&self, user: UserRecord) -> AppResult<(UserRecord, bool)> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (user_id, email, created_at, preferences)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(&user.user_id)
        .bind(&user.email)
        .bind(user.created_at)
        .bind(Json(&user.preferences))
        .execute(&self.db_pool)
        .await?;

        let created = result.rows_affected() == 1;
        let stored = self
            .fetch_user(&user.user_id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("User {} vanished after insert", user.user_id)))?;

        Ok((stored, created))
    }

    async fn get_user(&self, user_id: &str) -> AppResult<Option<UserRecord>> {
        self.fetch_user(user_id).await
    }

    async fn update_preferences(
        &self,
        user_id: &str,
        preferences: &UserPreferences,
    ) -> AppResult<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
            SET preferences = $2
            WHERE user_id = $1
            RETURNING user_id, email, created_at, preferences
            "#,
        )
        .bind(user_id)
        .bind(Json(preferences))
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(row.map(UserRecord::from))
    }
}
