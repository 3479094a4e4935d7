use async_trait::async_trait;

use crate::{
    amount::Amount,
    error::Result,
    models::{
        Field, NewField, NewProduct, NewTask, NewUser, Page, Product, ProductFilter,
        ProductListing, RequestOffset, Task, TaskStatus, UpdateField, UpdateProduct, UpdateTask,
        UpdateUser, User, UserCredentials,
    },
};

/// Repository trait for user accounts
///
/// Every read excludes soft-deleted users.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user with a zero access-unit balance
    ///
    /// # Arguments
    /// * `user` - Registration data (the plain password is ignored)
    /// * `password_hash` - Already hashed password
    ///
    /// # Returns
    /// * `Ok(User)` - The created user
    /// * `Err(AgroError::Duplicate)` - If a live user already has this email
    /// * `Err(AgroError::Database)` - If the database operation fails
    async fn create_user(&self, user: NewUser, password_hash: &str) -> Result<User>;

    /// Get a live user by id
    async fn get_user(&self, id: i64) -> Result<Option<User>>;

    /// Get a live user and its password hash by email
    async fn get_credentials_by_email(&self, email: &str) -> Result<Option<UserCredentials>>;

    async fn list_users(&self, page: Page) -> Result<Vec<User>>;

    /// Update a user's profile
    ///
    /// # Returns
    /// * `Ok(User)` - The updated user
    /// * `Err(AgroError::NotFound)` - If the user doesn't exist or was deleted
    /// * `Err(AgroError::Duplicate)` - If the new email is taken
    async fn update_user(&self, id: i64, updates: UpdateUser) -> Result<User>;

    /// Soft delete a user
    ///
    /// # Returns
    /// * `Ok(())` - The user now carries a deletion timestamp
    /// * `Err(AgroError::NotFound)` - If the user doesn't exist or was already deleted
    async fn soft_delete_user(&self, id: i64) -> Result<()>;

    /// Add access units to a user's balance
    ///
    /// # Returns
    /// * `Ok(User)` - The user with its new balance
    /// * `Err(AgroError::Validation)` - If `amount` is not positive
    /// * `Err(AgroError::NotFound)` - If the user doesn't exist
    async fn credit_access_units(&self, id: i64, amount: Amount) -> Result<User>;
}

/// Repository trait for API tokens, stored as hashes only
#[async_trait]
pub trait TokenRepository: Send + Sync {
    async fn store_token(&self, user_id: i64, token_hash: &str) -> Result<()>;

    /// Resolve a token hash to its live, active user
    ///
    /// # Returns
    /// * `Ok(Some(User))` - The token belongs to an active, non-deleted user
    /// * `Ok(None)` - Unknown token, or the user is inactive or deleted
    async fn user_for_token(&self, token_hash: &str) -> Result<Option<User>>;

    /// Revoke every token of a user, returning how many were removed
    async fn revoke_tokens(&self, user_id: i64) -> Result<u64>;
}

/// Repository trait for fields
#[async_trait]
pub trait FieldRepository: Send + Sync {
    async fn create_field(&self, owner: i64, field: NewField) -> Result<Field>;

    async fn get_field(&self, id: i64) -> Result<Option<Field>>;

    async fn list_fields(&self, page: Page) -> Result<Vec<Field>>;

    async fn list_fields_for_owner(&self, owner: i64) -> Result<Vec<Field>>;

    /// # Returns
    /// * `Ok(Field)` - The updated field
    /// * `Err(AgroError::NotFound)` - If the field doesn't exist or was deleted
    async fn update_field(&self, id: i64, updates: UpdateField) -> Result<Field>;

    /// Soft delete a field together with its tasks.
    ///
    /// Products listed from the field stay on the market with their
    /// field reference cleared.
    ///
    /// # Returns
    /// * `Ok(())` - The field and its tasks are marked deleted
    /// * `Err(AgroError::NotFound)` - If the field doesn't exist or was already deleted
    async fn soft_delete_field(&self, id: i64) -> Result<()>;
}

/// Repository trait for field tasks
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Create a new task on a field
    ///
    /// Hand-written tasks are approved on creation, generated ones are not.
    ///
    /// # Returns
    /// * `Ok(Task)` - The created task in `Planned` status
    /// * `Err(AgroError::NotFound)` - If the field doesn't exist or was deleted
    /// * `Err(AgroError::Duplicate)` - If a live task with the same title exists on the field
    async fn create_task(&self, owner: i64, field_id: i64, task: NewTask) -> Result<Task>;

    async fn get_task(&self, id: i64) -> Result<Option<Task>>;

    async fn list_tasks_for_field(&self, field_id: i64) -> Result<Vec<Task>>;

    /// Most recently completed task of a field
    async fn latest_done_task(&self, field_id: i64) -> Result<Option<Task>>;

    /// # Returns
    /// * `Ok(Task)` - The updated task
    /// * `Err(AgroError::NotFound)` - If the task doesn't exist or was deleted
    /// * `Err(AgroError::Duplicate)` - If the new title clashes on the same field
    async fn update_task(&self, id: i64, updates: UpdateTask) -> Result<Task>;

    /// Move a task through its lifecycle
    ///
    /// # Returns
    /// * `Ok(Task)` - The updated task, with `done_at` set when moving to `Done`
    /// * `Err(AgroError::NotFound)` - If the task doesn't exist
    /// * `Err(AgroError::InvalidStatusTransition)` - If the lifecycle forbids the change
    async fn set_task_status(&self, id: i64, status: TaskStatus) -> Result<Task>;

    async fn approve_task(&self, id: i64) -> Result<Task>;

    async fn soft_delete_task(&self, id: i64) -> Result<()>;
}

/// Repository trait for marketplace products
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Debit `cost` from the owner's balance and insert the product, atomically
    ///
    /// # Arguments
    /// * `owner` - The paying user
    /// * `product` - The listing to create
    /// * `cost` - Access units to debit
    ///
    /// # Returns
    /// * `Ok(ProductListing)` - The product and the owner's remaining balance
    /// * `Err(AgroError::InsufficientAccessUnits)` - Nothing was written
    /// * `Err(AgroError::NotFound)` - If the owner or the referenced field doesn't exist
    async fn create_product_with_debit(
        &self,
        owner: i64,
        product: NewProduct,
        cost: Amount,
    ) -> Result<ProductListing>;

    async fn get_product(&self, id: i64) -> Result<Option<Product>>;

    /// List live products, on-sale ones only unless the filter says otherwise
    async fn list_products(&self, filter: ProductFilter, page: Page) -> Result<Vec<Product>>;

    async fn update_product(&self, id: i64, updates: UpdateProduct) -> Result<Product>;

    async fn soft_delete_product(&self, id: i64) -> Result<()>;
}

/// Repository trait for the plant database key rotation offset
#[async_trait]
pub trait OffsetRepository: Send + Sync {
    /// Insert a fresh offset row starting at zero
    async fn init_offset(&self) -> Result<RequestOffset>;

    /// Latest offset row, if any was initialised
    async fn current_offset(&self) -> Result<Option<RequestOffset>>;

    /// Increment the latest offset, initialising one first when none exists
    async fn advance_offset(&self) -> Result<RequestOffset>;
}

#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Get repository health status for monitoring
    ///
    /// # Returns
    /// * `Ok(())` - Repository is healthy and connected
    /// * `Err(AgroError::Database)` - Repository is unhealthy
    async fn health_check(&self) -> Result<()>;
}

/// Every repository the API needs, behind a single trait object
pub trait AgroStore:
    UserRepository
    + TokenRepository
    + FieldRepository
    + TaskRepository
    + ProductRepository
    + OffsetRepository
    + HealthCheck
{
}

impl<T> AgroStore for T where
    T: UserRepository
        + TokenRepository
        + FieldRepository
        + TaskRepository
        + ProductRepository
        + OffsetRepository
        + HealthCheck
{
}
