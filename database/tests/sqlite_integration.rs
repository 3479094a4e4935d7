use agro_core::{AccessUnitPricing, Amount, MeasurementUnit, Page, ProductFilter, TaskStatus};
use database::{
    AgroError, FieldRepository, ProductRepository, SqliteRepository, TaskRepository,
    UserRepository,
};
use mocks::{create_new_field, create_new_task, create_new_user_with_email, NewProductBuilder};
use std::sync::Arc;

async fn create_test_repository() -> SqliteRepository {
    let repo = SqliteRepository::new(":memory:").await.unwrap();
    repo.migrate().await.unwrap();
    repo
}

#[tokio::test]
async fn test_file_database_persists_between_connections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("agroflex.db");
    let path = path.to_str().unwrap();

    let user_id = {
        let repo = SqliteRepository::new(path).await.unwrap();
        repo.migrate().await.unwrap();
        let user = repo
            .create_user(create_new_user_with_email("persist@example.com"), "hash")
            .await
            .unwrap();
        repo.pool().close().await;
        user.id
    };

    let reopened = SqliteRepository::new(path).await.unwrap();
    reopened.migrate().await.unwrap();
    let user = reopened.get_user(user_id).await.unwrap().expect("user survives reopen");
    assert_eq!(user.email, "persist@example.com");
}

#[tokio::test]
async fn test_soft_deleted_rows_stay_in_table() {
    let repo = create_test_repository().await;
    let owner = repo
        .create_user(create_new_user_with_email("soft@example.com"), "hash")
        .await
        .unwrap();
    let field = repo.create_field(owner.id, create_new_field()).await.unwrap();
    let task = repo
        .create_task(owner.id, field.id, create_new_task())
        .await
        .unwrap();

    repo.soft_delete_field(field.id).await.unwrap();

    let (count, deleted): (i64, Option<String>) =
        sqlx::query_as("SELECT COUNT(*), MAX(deleted_at) FROM fields WHERE id = ?")
            .bind(field.id)
            .fetch_one(repo.pool())
            .await
            .unwrap();
    assert_eq!(count, 1);
    assert!(deleted.is_some(), "Row should be marked, not removed");

    let task_deleted: Option<String> =
        sqlx::query_scalar("SELECT deleted_at FROM tasks WHERE id = ?")
            .bind(task.id)
            .fetch_one(repo.pool())
            .await
            .unwrap();
    assert!(task_deleted.is_some());

    assert!(repo.soft_delete_field(field.id).await.unwrap_err().is_not_found());
    assert!(repo
        .create_task(owner.id, field.id, create_new_task())
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn test_duplicate_email_maps_to_conflict() {
    let repo = create_test_repository().await;
    repo.create_user(create_new_user_with_email("dup@example.com"), "hash")
        .await
        .unwrap();

    let err = repo
        .create_user(create_new_user_with_email("dup@example.com"), "hash")
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 409);
    assert!(err.to_string().contains("email"));
}

#[tokio::test]
async fn test_duplicate_task_title_is_per_field() {
    let repo = create_test_repository().await;
    let owner = repo
        .create_user(create_new_user_with_email("titles@example.com"), "hash")
        .await
        .unwrap();
    let first = repo.create_field(owner.id, create_new_field()).await.unwrap();
    let second = repo.create_field(owner.id, create_new_field()).await.unwrap();

    repo.create_task(owner.id, first.id, create_new_task()).await.unwrap();
    repo.create_task(owner.id, second.id, create_new_task())
        .await
        .expect("Same title on another field is allowed");

    let err = repo
        .create_task(owner.id, first.id, create_new_task())
        .await
        .unwrap_err();
    assert!(matches!(err, AgroError::Duplicate(_)));
}

#[tokio::test]
async fn test_task_status_lifecycle() {
    let repo = create_test_repository().await;
    let owner = repo
        .create_user(create_new_user_with_email("lifecycle@example.com"), "hash")
        .await
        .unwrap();
    let field = repo.create_field(owner.id, create_new_field()).await.unwrap();
    let task = repo
        .create_task(owner.id, field.id, create_new_task())
        .await
        .unwrap();

    // Planned tasks may be closed directly
    let done = repo.set_task_status(task.id, TaskStatus::Done).await.unwrap();
    assert_eq!(done.status, TaskStatus::Done);
    assert!(done.done_at.is_some());

    let err = repo
        .set_task_status(task.id, TaskStatus::Executing)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 422);
}

#[tokio::test]
async fn test_insufficient_credit_writes_nothing() {
    let repo = create_test_repository().await;
    let owner = repo
        .create_user(create_new_user_with_email("poor@example.com"), "hash")
        .await
        .unwrap();
    repo.credit_access_units(owner.id, Amount::from_units(1))
        .await
        .unwrap();

    let pricing = AccessUnitPricing::default();
    let product = NewProductBuilder::new()
        .with_quantity(Amount::from_units(2), MeasurementUnit::Tonne)
        .build();
    let cost = pricing.cost(product.unit, product.quantity).unwrap();
    assert_eq!(cost, Amount::from_units(20));

    let err = repo
        .create_product_with_debit(owner.id, product, cost)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 403);

    let balance = repo.get_user(owner.id).await.unwrap().unwrap().access_units;
    assert_eq!(balance, Amount::from_units(1));
    let products: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
        .fetch_one(repo.pool())
        .await
        .unwrap();
    assert_eq!(products, 0);
}

#[tokio::test]
async fn test_concurrent_listings_never_overdraw() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("race.db");
    let repo = Arc::new(SqliteRepository::new(path.to_str().unwrap()).await.unwrap());
    repo.migrate().await.unwrap();

    let owner = repo
        .create_user(create_new_user_with_email("race@example.com"), "hash")
        .await
        .unwrap();
    repo.credit_access_units(owner.id, Amount::from_units(3))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..5 {
        let repo = repo.clone();
        handles.push(tokio::spawn(async move {
            repo.create_product_with_debit(
                owner.id,
                NewProductBuilder::new().with_name(format!("Lot {i}")).build(),
                Amount::from_units(1),
            )
            .await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(AgroError::InsufficientAccessUnits { .. }) => {}
            Err(other) => panic!("Unexpected error: {other:?}"),
        }
    }

    assert_eq!(succeeded, 3);
    let balance = repo.get_user(owner.id).await.unwrap().unwrap().access_units;
    assert_eq!(balance, Amount::ZERO);
}

#[tokio::test]
async fn test_product_listing_filters_and_pages() {
    let repo = create_test_repository().await;
    let owner = repo
        .create_user(create_new_user_with_email("lister@example.com"), "hash")
        .await
        .unwrap();
    let field = repo.create_field(owner.id, create_new_field()).await.unwrap();

    for i in 0..4 {
        let mut builder = NewProductBuilder::new().with_name(format!("Lot {i}"));
        if i % 2 == 0 {
            builder = builder.with_field(field.id);
        }
        repo.create_product_with_debit(owner.id, builder.build(), Amount::ZERO)
            .await
            .unwrap();
    }

    let on_field = repo
        .list_products(
            ProductFilter {
                field_id: Some(field.id),
                ..Default::default()
            },
            Page::default(),
        )
        .await
        .unwrap();
    assert_eq!(on_field.len(), 2);

    let page = repo
        .list_products(ProductFilter::default(), Page { limit: 3, offset: 2 })
        .await
        .unwrap();
    assert_eq!(page.len(), 2);

    let users = repo.list_users(Page { limit: 10, offset: 0 }).await.unwrap();
    assert_eq!(users.len(), 1);
}
