//! In-memory implementation of every repository trait
//!
//! Provides a thread-safe store with:
//! - Error injection capabilities
//! - Call tracking for verification
//! - The same soft-delete and uniqueness rules as the SQLite store

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
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

struct StoredUser {
    user: User,
    password_hash: String,
}

#[derive(Default)]
struct StoreState {
    users: BTreeMap<i64, StoredUser>,
    tokens: HashMap<String, i64>,
    fields: BTreeMap<i64, Field>,
    tasks: BTreeMap<i64, Task>,
    products: BTreeMap<i64, Product>,
    offsets: Vec<RequestOffset>,
    last_id: i64,
}

impl StoreState {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn live_user_mut(&mut self, id: i64) -> Result<&mut User> {
        self.users
            .get_mut(&id)
            .map(|stored| &mut stored.user)
            .filter(|user| user.deleted_at.is_none())
            .ok_or_else(|| AgroError::not_found("user", id))
    }

    fn live_field(&self, id: i64) -> Option<&Field> {
        self.fields.get(&id).filter(|field| field.deleted_at.is_none())
    }

    fn live_task_mut(&mut self, id: i64) -> Result<&mut Task> {
        self.tasks
            .get_mut(&id)
            .filter(|task| task.deleted_at.is_none())
            .ok_or_else(|| AgroError::not_found("task", id))
    }

    fn email_taken(&self, email: &str, except: Option<i64>) -> bool {
        self.users.values().any(|stored| {
            stored.user.deleted_at.is_none()
                && stored.user.email == email
                && Some(stored.user.id) != except
        })
    }

    fn title_taken(&self, field_id: i64, title: &str, except: Option<i64>) -> bool {
        self.tasks.values().any(|task| {
            task.deleted_at.is_none()
                && task.field_id == field_id
                && task.title == title
                && Some(task.id) != except
        })
    }
}

fn paginate<T>(items: impl Iterator<Item = T>, page: Page) -> Vec<T> {
    items
        .skip(page.offset as usize)
        .take(page.effective_limit() as usize)
        .collect()
}

/// In-memory store implementing every repository trait
///
/// Features:
/// - Thread-safe concurrent access
/// - Error injection for failure testing
/// - Call history tracking for verification
/// - Atomic balance debit when listing products
#[derive(Clone)]
pub struct MockAgroStore {
    state: Arc<Mutex<StoreState>>,
    error_injection: Arc<Mutex<Option<AgroError>>>,
    call_history: Arc<Mutex<Vec<String>>>,
}

impl Default for MockAgroStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAgroStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState::default())),
            error_injection: Arc::new(Mutex::new(None)),
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Insert a user directly, bypassing registration
    pub fn seed_user(
        &self,
        user: NewUser,
        password_hash: &str,
        access_units: Amount,
        is_admin: bool,
    ) -> User {
        let mut state = self.state.lock();
        let id = state.next_id();
        let now = Utc::now();
        let created = User {
            id,
            username: user.username,
            email: user.email,
            role: user.role,
            access_units,
            is_admin,
            is_active: true,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        state.users.insert(
            id,
            StoredUser {
                user: created.clone(),
                password_hash: password_hash.to_string(),
            },
        );
        created
    }

    /// Current balance of a user, including soft-deleted ones
    pub fn balance_of(&self, user_id: i64) -> Option<Amount> {
        self.state
            .lock()
            .users
            .get(&user_id)
            .map(|stored| stored.user.access_units)
    }

    /// Number of stored products, soft-deleted ones included
    pub fn product_count(&self) -> usize {
        self.state.lock().products.len()
    }

    /// Inject error for next operation
    pub fn inject_error(&self, error: AgroError) {
        *self.error_injection.lock() = Some(error);
    }

    /// Clear error injection
    pub fn clear_error(&self) {
        *self.error_injection.lock() = None;
    }

    /// Get history of called methods
    pub fn call_history(&self) -> Vec<String> {
        self.call_history.lock().clone()
    }

    /// Clear call history
    pub fn clear_history(&self) {
        self.call_history.lock().clear();
    }

    /// Assert method was called
    pub fn assert_called(&self, method: &str) {
        let history = self.call_history.lock();
        assert!(
            history.iter().any(|call| call.starts_with(method)),
            "Method '{}' was not called. Call history: {:?}",
            method,
            *history
        );
    }

    /// Assert method was never called
    pub fn assert_not_called(&self, method: &str) {
        let history = self.call_history.lock();
        assert!(
            !history.iter().any(|call| call.starts_with(method)),
            "Method '{}' was called. Call history: {:?}",
            method,
            *history
        );
    }

    /// Check if an error should be injected, consuming it if so
    fn check_error_injection(&self) -> Result<()> {
        if let Some(error) = self.error_injection.lock().take() {
            return Err(error);
        }
        Ok(())
    }

    /// Record a call and fail with the injected error, if any
    fn enter(&self, method: &str, params: &str) -> Result<()> {
        self.call_history.lock().push(format!("{method}({params})"));
        self.check_error_injection()
    }
}

#[async_trait]
impl UserRepository for MockAgroStore {
    async fn create_user(&self, user: NewUser, password_hash: &str) -> Result<User> {
        self.enter("create_user", &format!("email={}", user.email))?;

        if self.state.lock().email_taken(&user.email, None) {
            return Err(AgroError::Duplicate(
                "user with this email already exists".to_string(),
            ));
        }
        Ok(self.seed_user(user, password_hash, Amount::ZERO, false))
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        self.enter("get_user", &format!("id={id}"))?;

        let state = self.state.lock();
        Ok(state
            .users
            .get(&id)
            .map(|stored| stored.user.clone())
            .filter(|user| user.deleted_at.is_none()))
    }

    async fn get_credentials_by_email(&self, email: &str) -> Result<Option<UserCredentials>> {
        self.enter("get_credentials_by_email", &format!("email={email}"))?;

        let state = self.state.lock();
        Ok(state
            .users
            .values()
            .find(|stored| stored.user.deleted_at.is_none() && stored.user.email == email)
            .map(|stored| UserCredentials {
                user: stored.user.clone(),
                password_hash: stored.password_hash.clone(),
            }))
    }

    async fn list_users(&self, page: Page) -> Result<Vec<User>> {
        self.enter("list_users", "")?;

        let state = self.state.lock();
        Ok(paginate(
            state
                .users
                .values()
                .filter(|stored| stored.user.deleted_at.is_none())
                .map(|stored| stored.user.clone()),
            page,
        ))
    }

    async fn update_user(&self, id: i64, updates: UpdateUser) -> Result<User> {
        self.enter("update_user", &format!("id={id}"))?;

        let mut state = self.state.lock();
        if let Some(email) = &updates.email {
            if state.email_taken(email, Some(id)) {
                return Err(AgroError::Duplicate(
                    "user with this email already exists".to_string(),
                ));
            }
        }

        let user = state.live_user_mut(id)?;
        if let Some(username) = updates.username {
            user.username = username;
        }
        if let Some(email) = updates.email {
            user.email = email;
        }
        if let Some(role) = updates.role {
            user.role = role;
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn soft_delete_user(&self, id: i64) -> Result<()> {
        self.enter("soft_delete_user", &format!("id={id}"))?;

        let mut state = self.state.lock();
        let user = state.live_user_mut(id)?;
        user.deleted_at = Some(Utc::now());
        state.tokens.retain(|_, owner| *owner != id);
        Ok(())
    }

    async fn credit_access_units(&self, id: i64, amount: Amount) -> Result<User> {
        self.enter("credit_access_units", &format!("id={id}, amount={amount}"))?;

        if !amount.is_positive() {
            return Err(AgroError::Validation(
                "Credited amount must be greater than 0".to_string(),
            ));
        }

        let mut state = self.state.lock();
        let user = state.live_user_mut(id)?;
        user.access_units = user
            .access_units
            .checked_add(amount)
            .ok_or_else(|| AgroError::Validation("balance overflow".to_string()))?;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }
}

#[async_trait]
impl TokenRepository for MockAgroStore {
    async fn store_token(&self, user_id: i64, token_hash: &str) -> Result<()> {
        self.enter("store_token", &format!("user_id={user_id}"))?;

        self.state
            .lock()
            .tokens
            .insert(token_hash.to_string(), user_id);
        Ok(())
    }

    async fn user_for_token(&self, token_hash: &str) -> Result<Option<User>> {
        self.enter("user_for_token", "")?;

        let state = self.state.lock();
        Ok(state
            .tokens
            .get(token_hash)
            .and_then(|id| state.users.get(id))
            .map(|stored| stored.user.clone())
            .filter(|user| user.deleted_at.is_none() && user.is_active))
    }

    async fn revoke_tokens(&self, user_id: i64) -> Result<u64> {
        self.enter("revoke_tokens", &format!("user_id={user_id}"))?;

        let mut state = self.state.lock();
        let before = state.tokens.len();
        state.tokens.retain(|_, owner| *owner != user_id);
        Ok((before - state.tokens.len()) as u64)
    }
}

#[async_trait]
impl FieldRepository for MockAgroStore {
    async fn create_field(&self, owner: i64, field: NewField) -> Result<Field> {
        self.enter("create_field", &format!("owner={owner}"))?;

        let mut state = self.state.lock();
        if !state.users.contains_key(&owner) {
            return Err(AgroError::Validation(
                "referenced record does not exist".to_string(),
            ));
        }

        let id = state.next_id();
        let now = Utc::now();
        let created = Field {
            id,
            plant_specie: field.plant_specie,
            country: field.country,
            region: field.region,
            start_on: field.start_on,
            measure: field.measure,
            prod_quantity_estimated: field.prod_quantity_estimated,
            period: field.period,
            project_description: field.project_description,
            grow_speed: field.grow_speed,
            ground_ph: field.ground_ph,
            ground_type: field.ground_type,
            organic_materials: field.organic_materials,
            longitude: field.longitude,
            latitude: field.latitude,
            equipments: field.equipments,
            advices: None,
            status: field.status,
            prod_quantity: None,
            created_by: owner,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        state.fields.insert(id, created.clone());
        Ok(created)
    }

    async fn get_field(&self, id: i64) -> Result<Option<Field>> {
        self.enter("get_field", &format!("id={id}"))?;
        Ok(self.state.lock().live_field(id).cloned())
    }

    async fn list_fields(&self, page: Page) -> Result<Vec<Field>> {
        self.enter("list_fields", "")?;

        let state = self.state.lock();
        Ok(paginate(
            state
                .fields
                .values()
                .filter(|field| field.deleted_at.is_none())
                .cloned(),
            page,
        ))
    }

    async fn list_fields_for_owner(&self, owner: i64) -> Result<Vec<Field>> {
        self.enter("list_fields_for_owner", &format!("owner={owner}"))?;

        let state = self.state.lock();
        Ok(state
            .fields
            .values()
            .filter(|field| field.deleted_at.is_none() && field.created_by == owner)
            .cloned()
            .collect())
    }

    async fn update_field(&self, id: i64, updates: UpdateField) -> Result<Field> {
        self.enter("update_field", &format!("id={id}"))?;

        let mut state = self.state.lock();
        let field = state
            .fields
            .get_mut(&id)
            .filter(|field| field.deleted_at.is_none())
            .ok_or_else(|| AgroError::not_found("field", id))?;

        if let Some(v) = updates.plant_specie {
            field.plant_specie = v;
        }
        if let Some(v) = updates.country {
            field.country = v;
        }
        if let Some(v) = updates.region {
            field.region = v;
        }
        if let Some(v) = updates.start_on {
            field.start_on = v;
        }
        if let Some(v) = updates.measure {
            field.measure = v;
        }
        if let Some(v) = updates.prod_quantity_estimated {
            field.prod_quantity_estimated = v;
        }
        if let Some(v) = updates.period {
            field.period = v;
        }
        if let Some(v) = updates.project_description {
            field.project_description = v;
        }
        if let Some(v) = updates.grow_speed {
            field.grow_speed = v;
        }
        if let Some(v) = updates.ground_ph {
            field.ground_ph = Some(v);
        }
        if let Some(v) = updates.ground_type {
            field.ground_type = v;
        }
        if let Some(v) = updates.organic_materials {
            field.organic_materials = Some(v);
        }
        if let Some(v) = updates.longitude {
            field.longitude = v;
        }
        if let Some(v) = updates.latitude {
            field.latitude = v;
        }
        if let Some(v) = updates.equipments {
            field.equipments = Some(v);
        }
        if let Some(v) = updates.advices {
            field.advices = Some(v);
        }
        if let Some(v) = updates.status {
            field.status = v;
        }
        if let Some(v) = updates.prod_quantity {
            field.prod_quantity = Some(v);
        }
        field.updated_at = Utc::now();
        Ok(field.clone())
    }

    async fn soft_delete_field(&self, id: i64) -> Result<()> {
        self.enter("soft_delete_field", &format!("id={id}"))?;

        let mut state = self.state.lock();
        let now = Utc::now();
        let field = state
            .fields
            .get_mut(&id)
            .filter(|field| field.deleted_at.is_none())
            .ok_or_else(|| AgroError::not_found("field", id))?;
        field.deleted_at = Some(now);

        for task in state.tasks.values_mut() {
            if task.field_id == id && task.deleted_at.is_none() {
                task.deleted_at = Some(now);
            }
        }
        for product in state.products.values_mut() {
            if product.field_id == Some(id) {
                product.field_id = None;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TaskRepository for MockAgroStore {
    async fn create_task(&self, owner: i64, field_id: i64, task: NewTask) -> Result<Task> {
        self.enter("create_task", &format!("field_id={field_id}, title={}", task.title))?;

        let mut state = self.state.lock();
        if state.live_field(field_id).is_none() {
            return Err(AgroError::not_found("field", field_id));
        }
        if state.title_taken(field_id, &task.title, None) {
            return Err(AgroError::Duplicate(
                "task with this title already exists for this field".to_string(),
            ));
        }

        let id = state.next_id();
        let now = Utc::now();
        let created = Task {
            id,
            title: task.title,
            frequency: task.frequency,
            description: task.description,
            field_id,
            status: TaskStatus::Planned,
            generated: task.generated,
            approved: !task.generated,
            created_by: owner,
            created_at: now,
            updated_at: now,
            done_at: None,
            deleted_at: None,
        };
        state.tasks.insert(id, created.clone());
        Ok(created)
    }

    async fn get_task(&self, id: i64) -> Result<Option<Task>> {
        self.enter("get_task", &format!("id={id}"))?;

        let state = self.state.lock();
        Ok(state
            .tasks
            .get(&id)
            .filter(|task| task.deleted_at.is_none())
            .cloned())
    }

    async fn list_tasks_for_field(&self, field_id: i64) -> Result<Vec<Task>> {
        self.enter("list_tasks_for_field", &format!("field_id={field_id}"))?;

        let state = self.state.lock();
        Ok(state
            .tasks
            .values()
            .filter(|task| task.deleted_at.is_none() && task.field_id == field_id)
            .cloned()
            .collect())
    }

    async fn latest_done_task(&self, field_id: i64) -> Result<Option<Task>> {
        self.enter("latest_done_task", &format!("field_id={field_id}"))?;

        let state = self.state.lock();
        Ok(state
            .tasks
            .values()
            .filter(|task| {
                task.deleted_at.is_none()
                    && task.field_id == field_id
                    && task.status == TaskStatus::Done
            })
            .max_by_key(|task| (task.done_at, task.id))
            .cloned())
    }

    async fn update_task(&self, id: i64, updates: UpdateTask) -> Result<Task> {
        self.enter("update_task", &format!("id={id}"))?;

        let mut state = self.state.lock();
        let field_id = state.live_task_mut(id)?.field_id;
        if let Some(title) = &updates.title {
            if state.title_taken(field_id, title, Some(id)) {
                return Err(AgroError::Duplicate(
                    "task with this title already exists for this field".to_string(),
                ));
            }
        }

        let task = state.live_task_mut(id)?;
        if let Some(title) = updates.title {
            task.title = title;
        }
        if let Some(frequency) = updates.frequency {
            task.frequency = frequency;
        }
        if let Some(description) = updates.description {
            task.description = Some(description);
        }
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    async fn set_task_status(&self, id: i64, status: TaskStatus) -> Result<Task> {
        self.enter("set_task_status", &format!("id={id}, status={status}"))?;

        let mut state = self.state.lock();
        let task = state.live_task_mut(id)?;
        if !task.can_transition_to(status) {
            return Err(AgroError::InvalidStatusTransition(task.status, status));
        }

        let now = Utc::now();
        task.status = status;
        if status == TaskStatus::Done {
            task.done_at = Some(now);
        }
        task.updated_at = now;
        Ok(task.clone())
    }

    async fn approve_task(&self, id: i64) -> Result<Task> {
        self.enter("approve_task", &format!("id={id}"))?;

        let mut state = self.state.lock();
        let task = state.live_task_mut(id)?;
        task.approved = true;
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    async fn soft_delete_task(&self, id: i64) -> Result<()> {
        self.enter("soft_delete_task", &format!("id={id}"))?;

        let mut state = self.state.lock();
        state.live_task_mut(id)?.deleted_at = Some(Utc::now());
        Ok(())
    }
}

#[async_trait]
impl ProductRepository for MockAgroStore {
    async fn create_product_with_debit(
        &self,
        owner: i64,
        product: NewProduct,
        cost: Amount,
    ) -> Result<ProductListing> {
        self.enter(
            "create_product_with_debit",
            &format!("owner={owner}, cost={cost}"),
        )?;

        // One lock covers the balance check, the debit and the insert
        let mut state = self.state.lock();
        if let Some(field_id) = product.field_id {
            if state.live_field(field_id).is_none() {
                return Err(AgroError::not_found("field", field_id));
            }
        }

        let user = state.live_user_mut(owner)?;
        let remaining = match user.access_units.checked_sub(cost) {
            Some(remaining) if !remaining.is_negative() => remaining,
            _ => {
                return Err(AgroError::InsufficientAccessUnits {
                    required: cost,
                    available: user.access_units,
                })
            }
        };
        user.access_units = remaining;
        user.updated_at = Utc::now();

        let id = state.next_id();
        let now = Utc::now();
        let created = Product {
            id,
            field_id: product.field_id,
            name: product.name,
            product_type: product.product_type,
            country: product.country,
            region: product.region,
            quantity: product.quantity,
            unit: product.unit,
            price: product.price,
            on_sale: product.on_sale,
            created_by: owner,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        state.products.insert(id, created.clone());

        Ok(ProductListing {
            product: created,
            cost,
            remaining_access_units: remaining,
        })
    }

    async fn get_product(&self, id: i64) -> Result<Option<Product>> {
        self.enter("get_product", &format!("id={id}"))?;

        let state = self.state.lock();
        Ok(state
            .products
            .get(&id)
            .filter(|product| product.deleted_at.is_none())
            .cloned())
    }

    async fn list_products(&self, filter: ProductFilter, page: Page) -> Result<Vec<Product>> {
        self.enter("list_products", "")?;

        let state = self.state.lock();
        Ok(paginate(
            state
                .products
                .values()
                .filter(|product| {
                    product.deleted_at.is_none()
                        && (filter.include_off_sale || product.on_sale)
                        && filter.field_id.map_or(true, |id| product.field_id == Some(id))
                        && filter.created_by.map_or(true, |id| product.created_by == id)
                })
                .cloned(),
            page,
        ))
    }

    async fn update_product(&self, id: i64, updates: UpdateProduct) -> Result<Product> {
        self.enter("update_product", &format!("id={id}"))?;

        let mut state = self.state.lock();
        let product = state
            .products
            .get_mut(&id)
            .filter(|product| product.deleted_at.is_none())
            .ok_or_else(|| AgroError::not_found("product", id))?;

        if let Some(name) = updates.name {
            product.name = name;
        }
        if let Some(product_type) = updates.product_type {
            product.product_type = product_type;
        }
        if let Some(country) = updates.country {
            product.country = country;
        }
        if let Some(region) = updates.region {
            product.region = region;
        }
        if let Some(price) = updates.price {
            product.price = price;
        }
        if let Some(on_sale) = updates.on_sale {
            product.on_sale = on_sale;
        }
        product.updated_at = Utc::now();
        Ok(product.clone())
    }

    async fn soft_delete_product(&self, id: i64) -> Result<()> {
        self.enter("soft_delete_product", &format!("id={id}"))?;

        let mut state = self.state.lock();
        let product = state
            .products
            .get_mut(&id)
            .filter(|product| product.deleted_at.is_none())
            .ok_or_else(|| AgroError::not_found("product", id))?;
        product.deleted_at = Some(Utc::now());
        Ok(())
    }
}

#[async_trait]
impl OffsetRepository for MockAgroStore {
    async fn init_offset(&self) -> Result<RequestOffset> {
        self.enter("init_offset", "")?;

        let mut state = self.state.lock();
        let id = state.next_id();
        let offset = RequestOffset {
            id,
            offset: 0,
            created_at: Utc::now(),
        };
        state.offsets.push(offset.clone());
        Ok(offset)
    }

    async fn current_offset(&self) -> Result<Option<RequestOffset>> {
        self.enter("current_offset", "")?;
        Ok(self.state.lock().offsets.last().cloned())
    }

    async fn advance_offset(&self) -> Result<RequestOffset> {
        self.enter("advance_offset", "")?;

        let mut state = self.state.lock();
        if state.offsets.is_empty() {
            let id = state.next_id();
            state.offsets.push(RequestOffset {
                id,
                offset: 0,
                created_at: Utc::now(),
            });
        }
        let latest = state
            .offsets
            .last_mut()
            .ok_or_else(|| AgroError::Internal("offset row missing".to_string()))?;
        latest.offset += 1;
        Ok(latest.clone())
    }
}

#[async_trait]
impl HealthCheck for MockAgroStore {
    async fn health_check(&self) -> Result<()> {
        self.enter("health_check", "")?;

        // Mock always reports healthy
        Ok(())
    }
}
