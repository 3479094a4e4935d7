use agro_core::{
    error::{AgroError, Result},
    models::{Field, Page, Product, ProductFilter, RequestOffset, Task, User},
    Amount,
};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite};
use std::str::FromStr;

pub const USER_COLUMNS: &str = "id, username, email, role, access_units, is_admin, is_active, created_at, updated_at, deleted_at";

pub const FIELD_COLUMNS: &str = "id, plant_specie, country, region, start_on, measure, prod_quantity_estimated, period, project_description, grow_speed, ground_ph, ground_type, organic_materials, longitude, latitude, equipments, advices, status, prod_quantity, created_by, created_at, updated_at, deleted_at";

pub const TASK_COLUMNS: &str = "id, title, frequency, description, field_id, status, generated, approved, created_by, created_at, updated_at, done_at, deleted_at";

pub const PRODUCT_COLUMNS: &str = "id, field_id, name, product_type, country, region, quantity, unit, price, on_sale, created_by, created_at, updated_at, deleted_at";

pub const OFFSET_COLUMNS: &str = "id, offset_value, created_at";

/// Parse a stored choice code, reporting corrupt rows as database errors
fn parse_code<T>(row: &SqliteRow, column: &str) -> Result<T>
where
    T: FromStr<Err = AgroError>,
{
    let raw: String = row.get(column);
    raw.parse()
        .map_err(|_| AgroError::Database(format!("Invalid {column} in database: {raw}")))
}

/// Convert SQLite row to User model
pub fn row_to_user(row: &SqliteRow) -> Result<User> {
    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        role: parse_code(row, "role")?,
        access_units: Amount::from_scaled(row.get("access_units")),
        is_admin: row.get("is_admin"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        deleted_at: row.get("deleted_at"),
    })
}

/// Convert SQLite row to Field model
pub fn row_to_field(row: &SqliteRow) -> Result<Field> {
    let start_on: NaiveDate = row.get("start_on");

    // Equipment inventory is stored as JSON text
    let equipments = row
        .get::<Option<String>, _>("equipments")
        .map(|raw| {
            serde_json::from_str(&raw)
                .map_err(|e| AgroError::Database(format!("Invalid equipments JSON in database: {e}")))
        })
        .transpose()?;

    Ok(Field {
        id: row.get("id"),
        plant_specie: row.get("plant_specie"),
        country: row.get("country"),
        region: row.get("region"),
        start_on,
        measure: row.get("measure"),
        prod_quantity_estimated: row.get("prod_quantity_estimated"),
        period: parse_code(row, "period")?,
        project_description: row.get("project_description"),
        grow_speed: parse_code(row, "grow_speed")?,
        ground_ph: row.get("ground_ph"),
        ground_type: parse_code(row, "ground_type")?,
        organic_materials: row.get("organic_materials"),
        longitude: row.get("longitude"),
        latitude: row.get("latitude"),
        equipments,
        advices: row.get("advices"),
        status: parse_code(row, "status")?,
        prod_quantity: row.get("prod_quantity"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        deleted_at: row.get("deleted_at"),
    })
}

/// Convert SQLite row to Task model
pub fn row_to_task(row: &SqliteRow) -> Result<Task> {
    let done_at: Option<DateTime<Utc>> = row.get("done_at");

    Ok(Task {
        id: row.get("id"),
        title: row.get("title"),
        frequency: parse_code(row, "frequency")?,
        description: row.get("description"),
        field_id: row.get("field_id"),
        status: parse_code(row, "status")?,
        generated: row.get("generated"),
        approved: row.get("approved"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        done_at,
        deleted_at: row.get("deleted_at"),
    })
}

/// Convert SQLite row to Product model
pub fn row_to_product(row: &SqliteRow) -> Result<Product> {
    Ok(Product {
        id: row.get("id"),
        field_id: row.get("field_id"),
        name: row.get("name"),
        product_type: row.get("product_type"),
        country: row.get("country"),
        region: row.get("region"),
        quantity: Amount::from_scaled(row.get("quantity")),
        unit: parse_code(row, "unit")?,
        price: Amount::from_scaled(row.get("price")),
        on_sale: row.get("on_sale"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        deleted_at: row.get("deleted_at"),
    })
}

pub fn row_to_offset(row: &SqliteRow) -> Result<RequestOffset> {
    Ok(RequestOffset {
        id: row.get("id"),
        offset: row.get("offset_value"),
        created_at: row.get("created_at"),
    })
}

/// Convert SQLx error to AgroError
pub fn sqlx_error_to_agro_error(err: sqlx::Error) -> AgroError {
    match &err {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().unwrap_or_default();
            let message = db_err.message();

            // 2067: UNIQUE constraint, 787: FOREIGN KEY constraint
            if code == "2067" || message.contains("UNIQUE constraint failed") {
                if message.contains("users.email") {
                    AgroError::Duplicate("user with this email already exists".to_string())
                } else if message.contains("tasks.title") {
                    AgroError::Duplicate(
                        "task with this title already exists for this field".to_string(),
                    )
                } else {
                    AgroError::Duplicate(format!("record already exists: {message}"))
                }
            } else if code == "787" || message.contains("FOREIGN KEY constraint failed") {
                AgroError::Validation("referenced record does not exist".to_string())
            } else {
                AgroError::Database(format!("Database constraint error: {message}"))
            }
        }
        sqlx::Error::PoolTimedOut => AgroError::Database("Connection pool timeout".to_string()),
        sqlx::Error::Io(io_err) => AgroError::Database(format!("Database I/O error: {io_err}")),
        _ => AgroError::Database(format!("Database operation failed: {err}")),
    }
}

/// Build the product listing query, always excluding soft-deleted rows
pub fn build_product_query(filter: &ProductFilter, page: Page) -> QueryBuilder<'static, Sqlite> {
    let mut query_builder: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE deleted_at IS NULL"));

    if !filter.include_off_sale {
        query_builder.push(" AND on_sale = 1");
    }

    if let Some(field_id) = filter.field_id {
        query_builder.push(" AND field_id = ");
        query_builder.push_bind(field_id);
    }

    if let Some(created_by) = filter.created_by {
        query_builder.push(" AND created_by = ");
        query_builder.push_bind(created_by);
    }

    query_builder.push(" ORDER BY id LIMIT ");
    query_builder.push_bind(i64::from(page.effective_limit()));
    query_builder.push(" OFFSET ");
    query_builder.push_bind(i64::from(page.offset));

    query_builder
}
