use crate::common::{
    build_product_query, row_to_field, row_to_offset, row_to_product, row_to_task, row_to_user,
    sqlx_error_to_agro_error, FIELD_COLUMNS, OFFSET_COLUMNS, PRODUCT_COLUMNS, TASK_COLUMNS,
    USER_COLUMNS,
};
use agro_core::{
    error::{AgroError, Result},
    models::{
        Field, NewField, NewProduct, NewTask, NewUser, Page, Product, ProductFilter,
        ProductListing, RequestOffset, Task, TaskStatus, UpdateField, UpdateProduct, UpdateTask,
        UpdateUser, User, UserCredentials,
    },
    repository::{
        FieldRepository, HealthCheck, OffsetRepository, ProductRepository, TaskRepository,
        TokenRepository, UserRepository,
    },
    Amount,
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{
    migrate::MigrateDatabase,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    QueryBuilder, Row, Sqlite, SqlitePool,
};
use std::{str::FromStr, time::Duration};

/// SQLite implementation of every repository trait
///
/// Soft-deleted rows stay in their tables with `deleted_at` set and are
/// filtered out of every read.
#[derive(Debug, Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Create a new SQLite repository with the given database URL
    ///
    /// # Arguments
    /// * `database_url` - SQLite database URL (file path or `:memory:`)
    ///
    /// # Returns
    /// * `Ok(SqliteRepository)` - Successfully connected repository
    /// * `Err(AgroError::Database)` - If connection fails
    ///
    /// # Examples
    /// ```rust,no_run
    /// use database::SqliteRepository;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// // In-memory database for testing
    /// let repo = SqliteRepository::new(":memory:").await?;
    ///
    /// // File-based database
    /// let repo = SqliteRepository::new("sqlite:///tmp/agroflex.db").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new(database_url: &str) -> Result<Self> {
        Self::with_pool_options(database_url, 5, Duration::from_secs(30)).await
    }

    /// Create a repository with explicit pool sizing
    pub async fn with_pool_options(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self> {
        let db_url = if database_url.starts_with(":memory:") {
            "sqlite::memory:".to_string()
        } else if database_url.starts_with("sqlite:") {
            database_url.to_string()
        } else {
            format!("sqlite://{database_url}")
        };
        let in_memory = db_url.contains(":memory:");

        // Create database if it doesn't exist (for file-based databases)
        if !in_memory && !Sqlite::database_exists(&db_url).await.unwrap_or(false) {
            match Sqlite::create_database(&db_url).await {
                Ok(_) => tracing::info!("Database created successfully"),
                Err(error) => {
                    tracing::error!("Error creating database: {}", error);
                    return Err(AgroError::Database(format!(
                        "Failed to create database: {error}"
                    )));
                }
            }
        }

        let connect_options = SqliteConnectOptions::from_str(&db_url)
            .map_err(sqlx_error_to_agro_error)?
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true);
        let connect_options = if in_memory {
            connect_options.journal_mode(SqliteJournalMode::Memory)
        } else {
            connect_options
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
        };

        // Every in-memory connection is its own database, so keep exactly one alive
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };

        let pool = pool_options
            .acquire_timeout(acquire_timeout)
            .connect_with(connect_options)
            .await
            .map_err(sqlx_error_to_agro_error)?;

        Ok(Self { pool })
    }

    /// Run database migrations
    ///
    /// # Returns
    /// * `Ok(())` - Migrations completed successfully
    /// * `Err(AgroError::Database)` - If migration fails
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations/sqlite")
            .run(&self.pool)
            .await
            .map_err(|e| AgroError::Database(format!("Migration failed: {e}")))?;

        tracing::info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get access to the underlying database pool for custom operations
    ///
    /// This method is primarily intended for testing scenarios where
    /// direct SQL execution is needed.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn live_field_exists<'e, E>(executor: E, field_id: i64) -> Result<bool>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let found = sqlx::query("SELECT 1 FROM fields WHERE id = ? AND deleted_at IS NULL")
            .bind(field_id)
            .fetch_optional(executor)
            .await
            .map_err(sqlx_error_to_agro_error)?;
        Ok(found.is_some())
    }
}

#[async_trait]
impl UserRepository for SqliteRepository {
    async fn create_user(&self, user: NewUser, password_hash: &str) -> Result<User> {
        let now = Utc::now();

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO users (username, email, password_hash, role, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(password_hash)
        .bind(user.role.as_str())
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_agro_error)?;

        tracing::debug!(user_id = row.get::<i64, _>("id"), "user created");
        row_to_user(&row)
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ? AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_error_to_agro_error)?
        .map(|row| row_to_user(&row))
        .transpose()
    }

    async fn get_credentials_by_email(&self, email: &str) -> Result<Option<UserCredentials>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = ? AND deleted_at IS NULL"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_error_to_agro_error)?;

        match row {
            Some(row) => Ok(Some(UserCredentials {
                user: row_to_user(&row)?,
                password_hash: row.get("password_hash"),
            })),
            None => Ok(None),
        }
    }

    async fn list_users(&self, page: Page) -> Result<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE deleted_at IS NULL ORDER BY id LIMIT ? OFFSET ?"
        ))
        .bind(i64::from(page.effective_limit()))
        .bind(i64::from(page.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_error_to_agro_error)?;

        rows.iter().map(row_to_user).collect()
    }

    async fn update_user(&self, id: i64, updates: UpdateUser) -> Result<User> {
        let mut query_builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE users SET updated_at = ");
        query_builder.push_bind(Utc::now());

        if let Some(username) = updates.username {
            query_builder.push(", username = ");
            query_builder.push_bind(username);
        }
        if let Some(email) = updates.email {
            query_builder.push(", email = ");
            query_builder.push_bind(email);
        }
        if let Some(role) = updates.role {
            query_builder.push(", role = ");
            query_builder.push_bind(role.as_str());
        }

        query_builder.push(" WHERE id = ");
        query_builder.push_bind(id);
        query_builder.push(format!(" AND deleted_at IS NULL RETURNING {USER_COLUMNS}"));

        let row = query_builder
            .build()
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_error_to_agro_error)?
            .ok_or_else(|| AgroError::not_found("user", id))?;

        row_to_user(&row)
    }

    async fn soft_delete_user(&self, id: i64) -> Result<()> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(sqlx_error_to_agro_error)?;

        let updated = sqlx::query(
            "UPDATE users SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(sqlx_error_to_agro_error)?;

        if updated.rows_affected() == 0 {
            return Err(AgroError::not_found("user", id));
        }

        sqlx::query("DELETE FROM auth_tokens WHERE user_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(sqlx_error_to_agro_error)?;

        tx.commit().await.map_err(sqlx_error_to_agro_error)?;
        Ok(())
    }

    async fn credit_access_units(&self, id: i64, amount: Amount) -> Result<User> {
        if !amount.is_positive() {
            return Err(AgroError::Validation(
                "Credited amount must be greater than 0".to_string(),
            ));
        }

        // SQLite widens an overflowing integer sum to REAL, so cap it here
        let row = sqlx::query(&format!(
            "UPDATE users SET access_units = access_units + ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL AND access_units <= ? RETURNING {USER_COLUMNS}"
        ))
        .bind(amount.scaled())
        .bind(Utc::now())
        .bind(id)
        .bind(i64::MAX - amount.scaled())
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_error_to_agro_error)?;

        match row {
            Some(row) => row_to_user(&row),
            None if self.get_user(id).await?.is_some() => {
                Err(AgroError::Validation("balance overflow".to_string()))
            }
            None => Err(AgroError::not_found("user", id)),
        }
    }
}

#[async_trait]
impl TokenRepository for SqliteRepository {
    async fn store_token(&self, user_id: i64, token_hash: &str) -> Result<()> {
        sqlx::query("INSERT INTO auth_tokens (token_hash, user_id, created_at) VALUES (?, ?, ?)")
            .bind(token_hash)
            .bind(user_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_agro_error)?;
        Ok(())
    }

    async fn user_for_token(&self, token_hash: &str) -> Result<Option<User>> {
        sqlx::query(&format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE id = (SELECT user_id FROM auth_tokens WHERE token_hash = ?)
              AND deleted_at IS NULL
              AND is_active = 1
            "#
        ))
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_error_to_agro_error)?
        .map(|row| row_to_user(&row))
        .transpose()
    }

    async fn revoke_tokens(&self, user_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM auth_tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_agro_error)?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl FieldRepository for SqliteRepository {
    async fn create_field(&self, owner: i64, field: NewField) -> Result<Field> {
        let now = Utc::now();
        let equipments = field.equipments.as_ref().map(|value| value.to_string());

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO fields (
                plant_specie, country, region, start_on, measure, prod_quantity_estimated,
                period, project_description, grow_speed, ground_ph, ground_type,
                organic_materials, longitude, latitude, equipments, status,
                created_by, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {FIELD_COLUMNS}
            "#
        ))
        .bind(&field.plant_specie)
        .bind(&field.country)
        .bind(&field.region)
        .bind(field.start_on)
        .bind(field.measure)
        .bind(field.prod_quantity_estimated)
        .bind(field.period.as_str())
        .bind(&field.project_description)
        .bind(field.grow_speed.as_str())
        .bind(field.ground_ph)
        .bind(field.ground_type.as_str())
        .bind(field.organic_materials)
        .bind(field.longitude)
        .bind(field.latitude)
        .bind(equipments)
        .bind(field.status.as_str())
        .bind(owner)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_agro_error)?;

        row_to_field(&row)
    }

    async fn get_field(&self, id: i64) -> Result<Option<Field>> {
        sqlx::query(&format!(
            "SELECT {FIELD_COLUMNS} FROM fields WHERE id = ? AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_error_to_agro_error)?
        .map(|row| row_to_field(&row))
        .transpose()
    }

    async fn list_fields(&self, page: Page) -> Result<Vec<Field>> {
        let rows = sqlx::query(&format!(
            "SELECT {FIELD_COLUMNS} FROM fields WHERE deleted_at IS NULL ORDER BY id LIMIT ? OFFSET ?"
        ))
        .bind(i64::from(page.effective_limit()))
        .bind(i64::from(page.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_error_to_agro_error)?;

        rows.iter().map(row_to_field).collect()
    }

    async fn list_fields_for_owner(&self, owner: i64) -> Result<Vec<Field>> {
        let rows = sqlx::query(&format!(
            "SELECT {FIELD_COLUMNS} FROM fields WHERE created_by = ? AND deleted_at IS NULL ORDER BY id"
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_error_to_agro_error)?;

        rows.iter().map(row_to_field).collect()
    }

    async fn update_field(&self, id: i64, updates: UpdateField) -> Result<Field> {
        let mut query_builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("UPDATE fields SET updated_at = ");
        query_builder.push_bind(Utc::now());

        if let Some(plant_specie) = updates.plant_specie {
            query_builder.push(", plant_specie = ");
            query_builder.push_bind(plant_specie);
        }
        if let Some(country) = updates.country {
            query_builder.push(", country = ");
            query_builder.push_bind(country);
        }
        if let Some(region) = updates.region {
            query_builder.push(", region = ");
            query_builder.push_bind(region);
        }
        if let Some(start_on) = updates.start_on {
            query_builder.push(", start_on = ");
            query_builder.push_bind(start_on);
        }
        if let Some(measure) = updates.measure {
            query_builder.push(", measure = ");
            query_builder.push_bind(measure);
        }
        if let Some(estimate) = updates.prod_quantity_estimated {
            query_builder.push(", prod_quantity_estimated = ");
            query_builder.push_bind(estimate);
        }
        if let Some(period) = updates.period {
            query_builder.push(", period = ");
            query_builder.push_bind(period.as_str());
        }
        if let Some(description) = updates.project_description {
            query_builder.push(", project_description = ");
            query_builder.push_bind(description);
        }
        if let Some(grow_speed) = updates.grow_speed {
            query_builder.push(", grow_speed = ");
            query_builder.push_bind(grow_speed.as_str());
        }
        if let Some(ground_ph) = updates.ground_ph {
            query_builder.push(", ground_ph = ");
            query_builder.push_bind(ground_ph);
        }
        if let Some(ground_type) = updates.ground_type {
            query_builder.push(", ground_type = ");
            query_builder.push_bind(ground_type.as_str());
        }
        if let Some(organic_materials) = updates.organic_materials {
            query_builder.push(", organic_materials = ");
            query_builder.push_bind(organic_materials);
        }
        if let Some(longitude) = updates.longitude {
            query_builder.push(", longitude = ");
            query_builder.push_bind(longitude);
        }
        if let Some(latitude) = updates.latitude {
            query_builder.push(", latitude = ");
            query_builder.push_bind(latitude);
        }
        if let Some(equipments) = updates.equipments {
            query_builder.push(", equipments = ");
            query_builder.push_bind(equipments.to_string());
        }
        if let Some(advices) = updates.advices {
            query_builder.push(", advices = ");
            query_builder.push_bind(advices);
        }
        if let Some(status) = updates.status {
            query_builder.push(", status = ");
            query_builder.push_bind(status.as_str());
        }
        if let Some(prod_quantity) = updates.prod_quantity {
            query_builder.push(", prod_quantity = ");
            query_builder.push_bind(prod_quantity);
        }

        query_builder.push(" WHERE id = ");
        query_builder.push_bind(id);
        query_builder.push(format!(" AND deleted_at IS NULL RETURNING {FIELD_COLUMNS}"));

        let row = query_builder
            .build()
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_error_to_agro_error)?
            .ok_or_else(|| AgroError::not_found("field", id))?;

        row_to_field(&row)
    }

    async fn soft_delete_field(&self, id: i64) -> Result<()> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(sqlx_error_to_agro_error)?;

        let updated = sqlx::query(
            "UPDATE fields SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(sqlx_error_to_agro_error)?;

        if updated.rows_affected() == 0 {
            return Err(AgroError::not_found("field", id));
        }

        let tasks = sqlx::query(
            "UPDATE tasks SET deleted_at = ?, updated_at = ? WHERE field_id = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(sqlx_error_to_agro_error)?;

        let products = sqlx::query("UPDATE products SET field_id = NULL, updated_at = ? WHERE field_id = ?")
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(sqlx_error_to_agro_error)?;

        tx.commit().await.map_err(sqlx_error_to_agro_error)?;

        tracing::debug!(
            field_id = id,
            tasks_deleted = tasks.rows_affected(),
            products_detached = products.rows_affected(),
            "field soft-deleted"
        );
        Ok(())
    }
}

#[async_trait]
impl TaskRepository for SqliteRepository {
    async fn create_task(&self, owner: i64, field_id: i64, task: NewTask) -> Result<Task> {
        if !Self::live_field_exists(&self.pool, field_id).await? {
            return Err(AgroError::not_found("field", field_id));
        }

        let now = Utc::now();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO tasks (title, frequency, description, field_id, status, generated, approved, created_by, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(&task.title)
        .bind(task.frequency.as_str())
        .bind(&task.description)
        .bind(field_id)
        .bind(TaskStatus::Planned.as_str())
        .bind(task.generated)
        .bind(!task.generated)
        .bind(owner)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_agro_error)?;

        row_to_task(&row)
    }

    async fn get_task(&self, id: i64) -> Result<Option<Task>> {
        sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE id = ? AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_error_to_agro_error)?
        .map(|row| row_to_task(&row))
        .transpose()
    }

    async fn list_tasks_for_field(&self, field_id: i64) -> Result<Vec<Task>> {
        let rows = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE field_id = ? AND deleted_at IS NULL ORDER BY id"
        ))
        .bind(field_id)
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_error_to_agro_error)?;

        rows.iter().map(row_to_task).collect()
    }

    async fn latest_done_task(&self, field_id: i64) -> Result<Option<Task>> {
        sqlx::query(&format!(
            r#"
            SELECT {TASK_COLUMNS} FROM tasks
            WHERE field_id = ? AND status = ? AND deleted_at IS NULL
            ORDER BY done_at DESC, id DESC
            LIMIT 1
            "#
        ))
        .bind(field_id)
        .bind(TaskStatus::Done.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_error_to_agro_error)?
        .map(|row| row_to_task(&row))
        .transpose()
    }

    async fn update_task(&self, id: i64, updates: UpdateTask) -> Result<Task> {
        let mut query_builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("UPDATE tasks SET updated_at = ");
        query_builder.push_bind(Utc::now());

        if let Some(title) = updates.title {
            query_builder.push(", title = ");
            query_builder.push_bind(title);
        }
        if let Some(frequency) = updates.frequency {
            query_builder.push(", frequency = ");
            query_builder.push_bind(frequency.as_str());
        }
        if let Some(description) = updates.description {
            query_builder.push(", description = ");
            query_builder.push_bind(description);
        }

        query_builder.push(" WHERE id = ");
        query_builder.push_bind(id);
        query_builder.push(format!(" AND deleted_at IS NULL RETURNING {TASK_COLUMNS}"));

        let row = query_builder
            .build()
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_error_to_agro_error)?
            .ok_or_else(|| AgroError::not_found("task", id))?;

        row_to_task(&row)
    }

    async fn set_task_status(&self, id: i64, status: TaskStatus) -> Result<Task> {
        let current = self
            .get_task(id)
            .await?
            .ok_or_else(|| AgroError::not_found("task", id))?;

        if !current.can_transition_to(status) {
            return Err(AgroError::InvalidStatusTransition(current.status, status));
        }

        let now = Utc::now();
        let done_at = if status == TaskStatus::Done {
            Some(now)
        } else {
            current.done_at
        };

        // Guard on the previous status so concurrent transitions cannot both win
        let row = sqlx::query(&format!(
            r#"
            UPDATE tasks SET status = ?, done_at = ?, updated_at = ?
            WHERE id = ? AND status = ? AND deleted_at IS NULL
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(status.as_str())
        .bind(done_at)
        .bind(now)
        .bind(id)
        .bind(current.status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_error_to_agro_error)?
        .ok_or(AgroError::InvalidStatusTransition(current.status, status))?;

        row_to_task(&row)
    }

    async fn approve_task(&self, id: i64) -> Result<Task> {
        let row = sqlx::query(&format!(
            "UPDATE tasks SET approved = 1, updated_at = ? WHERE id = ? AND deleted_at IS NULL RETURNING {TASK_COLUMNS}"
        ))
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_error_to_agro_error)?
        .ok_or_else(|| AgroError::not_found("task", id))?;

        row_to_task(&row)
    }

    async fn soft_delete_task(&self, id: i64) -> Result<()> {
        let now = Utc::now();
        let updated = sqlx::query(
            "UPDATE tasks SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(sqlx_error_to_agro_error)?;

        if updated.rows_affected() == 0 {
            return Err(AgroError::not_found("task", id));
        }
        Ok(())
    }
}

#[async_trait]
impl ProductRepository for SqliteRepository {
    async fn create_product_with_debit(
        &self,
        owner: i64,
        product: NewProduct,
        cost: Amount,
    ) -> Result<ProductListing> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(sqlx_error_to_agro_error)?;

        if let Some(field_id) = product.field_id {
            if !Self::live_field_exists(&mut *tx, field_id).await? {
                return Err(AgroError::not_found("field", field_id));
            }
        }

        // The balance check and the debit are one statement
        let debited = sqlx::query(
            r#"
            UPDATE users SET access_units = access_units - ?, updated_at = ?
            WHERE id = ? AND deleted_at IS NULL AND access_units >= ?
            RETURNING access_units
            "#,
        )
        .bind(cost.scaled())
        .bind(now)
        .bind(owner)
        .bind(cost.scaled())
        .fetch_optional(&mut *tx)
        .await
        .map_err(sqlx_error_to_agro_error)?;

        let remaining = match debited {
            Some(row) => Amount::from_scaled(row.get("access_units")),
            None => {
                let balance: Option<i64> = sqlx::query_scalar(
                    "SELECT access_units FROM users WHERE id = ? AND deleted_at IS NULL",
                )
                .bind(owner)
                .fetch_optional(&mut *tx)
                .await
                .map_err(sqlx_error_to_agro_error)?;

                return Err(match balance {
                    Some(balance) => AgroError::InsufficientAccessUnits {
                        required: cost,
                        available: Amount::from_scaled(balance),
                    },
                    None => AgroError::not_found("user", owner),
                });
            }
        };

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO products (field_id, name, product_type, country, region, quantity, unit, price, on_sale, created_by, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(product.field_id)
        .bind(&product.name)
        .bind(&product.product_type)
        .bind(&product.country)
        .bind(&product.region)
        .bind(product.quantity.scaled())
        .bind(product.unit.as_str())
        .bind(product.price.scaled())
        .bind(product.on_sale)
        .bind(owner)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(sqlx_error_to_agro_error)?;

        let created = row_to_product(&row)?;
        tx.commit().await.map_err(sqlx_error_to_agro_error)?;

        tracing::info!(
            product_id = created.id,
            owner,
            cost = %cost,
            remaining = %remaining,
            "product listed"
        );

        Ok(ProductListing {
            product: created,
            cost,
            remaining_access_units: remaining,
        })
    }

    async fn get_product(&self, id: i64) -> Result<Option<Product>> {
        sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ? AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_error_to_agro_error)?
        .map(|row| row_to_product(&row))
        .transpose()
    }

    async fn list_products(&self, filter: ProductFilter, page: Page) -> Result<Vec<Product>> {
        let mut query_builder = build_product_query(&filter, page);
        let rows = query_builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_agro_error)?;

        rows.iter().map(row_to_product).collect()
    }

    async fn update_product(&self, id: i64, updates: UpdateProduct) -> Result<Product> {
        let mut query_builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("UPDATE products SET updated_at = ");
        query_builder.push_bind(Utc::now());

        if let Some(name) = updates.name {
            query_builder.push(", name = ");
            query_builder.push_bind(name);
        }
        if let Some(product_type) = updates.product_type {
            query_builder.push(", product_type = ");
            query_builder.push_bind(product_type);
        }
        if let Some(country) = updates.country {
            query_builder.push(", country = ");
            query_builder.push_bind(country);
        }
        if let Some(region) = updates.region {
            query_builder.push(", region = ");
            query_builder.push_bind(region);
        }
        if let Some(price) = updates.price {
            query_builder.push(", price = ");
            query_builder.push_bind(price.scaled());
        }
        if let Some(on_sale) = updates.on_sale {
            query_builder.push(", on_sale = ");
            query_builder.push_bind(on_sale);
        }

        query_builder.push(" WHERE id = ");
        query_builder.push_bind(id);
        query_builder.push(format!(" AND deleted_at IS NULL RETURNING {PRODUCT_COLUMNS}"));

        let row = query_builder
            .build()
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_error_to_agro_error)?
            .ok_or_else(|| AgroError::not_found("product", id))?;

        row_to_product(&row)
    }

    async fn soft_delete_product(&self, id: i64) -> Result<()> {
        let now = Utc::now();
        let updated = sqlx::query(
            "UPDATE products SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(sqlx_error_to_agro_error)?;

        if updated.rows_affected() == 0 {
            return Err(AgroError::not_found("product", id));
        }
        Ok(())
    }
}

#[async_trait]
impl OffsetRepository for SqliteRepository {
    async fn init_offset(&self) -> Result<RequestOffset> {
        let row = sqlx::query(&format!(
            "INSERT INTO request_offsets (offset_value, created_at) VALUES (0, ?) RETURNING {OFFSET_COLUMNS}"
        ))
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_agro_error)?;

        row_to_offset(&row)
    }

    async fn current_offset(&self) -> Result<Option<RequestOffset>> {
        sqlx::query(&format!(
            "SELECT {OFFSET_COLUMNS} FROM request_offsets ORDER BY id DESC LIMIT 1"
        ))
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_error_to_agro_error)?
        .map(|row| row_to_offset(&row))
        .transpose()
    }

    async fn advance_offset(&self) -> Result<RequestOffset> {
        let advance = format!(
            r#"
            UPDATE request_offsets SET offset_value = offset_value + 1
            WHERE id = (SELECT MAX(id) FROM request_offsets)
            RETURNING {OFFSET_COLUMNS}
            "#
        );

        if let Some(row) = sqlx::query(&advance)
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_error_to_agro_error)?
        {
            return row_to_offset(&row);
        }

        self.init_offset().await?;
        let row = sqlx::query(&advance)
            .fetch_one(&self.pool)
            .await
            .map_err(sqlx_error_to_agro_error)?;
        row_to_offset(&row)
    }
}

#[async_trait]
impl HealthCheck for SqliteRepository {
    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_agro_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agro_core::models::{GroundType, Period};
    use chrono::NaiveDate;

    async fn setup() -> SqliteRepository {
        let repo = SqliteRepository::new(":memory:").await.unwrap();
        repo.migrate().await.unwrap();
        repo
    }

    fn new_field() -> NewField {
        NewField {
            plant_specie: "Sorghum".to_string(),
            country: "Niger".to_string(),
            region: "Maradi".to_string(),
            start_on: NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
            measure: 3.0,
            prod_quantity_estimated: 2.5,
            period: Period::Summer,
            project_description: "Rain-fed sorghum".to_string(),
            grow_speed: Default::default(),
            ground_ph: Some(7),
            ground_type: GroundType::Sand,
            organic_materials: None,
            longitude: 7.1,
            latitude: 13.5,
            equipments: Some(serde_json::json!(["hoe", "sprayer"])),
            status: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_health_check() {
        let repo = setup().await;
        assert!(repo.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_field_round_trip_keeps_equipment_json() {
        let repo = setup().await;
        let user = repo
            .create_user(NewUser::new("awa", "awa@example.com", "pw#123"), "hash")
            .await
            .unwrap();
        let field = repo.create_field(user.id, new_field()).await.unwrap();
        let loaded = repo.get_field(field.id).await.unwrap().unwrap();
        assert_eq!(loaded.equipment_names(), vec!["hoe", "sprayer"]);
        assert_eq!(loaded.period, Period::Summer);
        assert_eq!(loaded.created_by, user.id);
    }

    #[tokio::test]
    async fn test_status_transition_rejected() {
        let repo = setup().await;
        let user = repo
            .create_user(NewUser::new("awa", "awa@example.com", "pw#123"), "hash")
            .await
            .unwrap();
        let field = repo.create_field(user.id, new_field()).await.unwrap();
        let task = repo
            .create_task(user.id, field.id, NewTask::new("Weeding"))
            .await
            .unwrap();

        let done = repo.set_task_status(task.id, TaskStatus::Done).await.unwrap();
        assert!(done.done_at.is_some());

        let err = repo
            .set_task_status(task.id, TaskStatus::Executing)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AgroError::InvalidStatusTransition(TaskStatus::Done, TaskStatus::Executing)
        );
    }

    #[tokio::test]
    async fn test_advance_offset_initialises_when_empty() {
        let repo = setup().await;
        assert!(repo.current_offset().await.unwrap().is_none());
        let advanced = repo.advance_offset().await.unwrap();
        assert_eq!(advanced.offset, 1);
        let advanced = repo.advance_offset().await.unwrap();
        assert_eq!(advanced.offset, 2);

        let fresh = repo.init_offset().await.unwrap();
        assert_eq!(fresh.offset, 0);
        assert_eq!(repo.current_offset().await.unwrap().unwrap().id, fresh.id);
    }
}
