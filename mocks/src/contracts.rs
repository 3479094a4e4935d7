//! Contract test helpers for validating store implementations
//!
//! Provides standardized tests that any implementation of the repository
//! traits should pass, so the in-memory store and SQLite behave alike.

use crate::{create_new_field, create_new_task, create_new_user_with_email, NewProductBuilder};
use agro_core::{
    AgroError, AgroStore, Amount, MeasurementUnit, Page, ProductFilter, TaskStatus, UpdateField,
    UpdateProduct, UpdateTask, UpdateUser,
};

/// Test any store with comprehensive contract tests
///
/// The suite expects a fresh, empty store.
pub async fn test_store_contract<S: AgroStore>(store: &S) {
    test_user_contract(store).await;
    test_token_contract(store).await;
    test_field_contract(store).await;
    test_task_contract(store).await;
    test_product_contract(store).await;
    test_offset_contract(store).await;
    test_health_check_contract(store).await;
}

/// Users: unique live email, soft delete, credit
pub async fn test_user_contract<S: AgroStore>(store: &S) {
    let user = store
        .create_user(create_new_user_with_email("contract-user@example.com"), "hash")
        .await
        .expect("Create should succeed");
    assert!(user.id > 0, "Created user should have positive ID");
    assert_eq!(user.access_units, Amount::ZERO, "New users start without credit");

    let duplicate = store
        .create_user(create_new_user_with_email("contract-user@example.com"), "hash")
        .await;
    match duplicate {
        Err(AgroError::Duplicate(_)) => {}
        other => panic!("Expected Duplicate error, got: {other:?}"),
    }

    let credentials = store
        .get_credentials_by_email("contract-user@example.com")
        .await
        .expect("Lookup should succeed")
        .expect("User should exist");
    assert_eq!(credentials.user.id, user.id);
    assert_eq!(credentials.password_hash, "hash");

    let updated = store
        .update_user(
            user.id,
            UpdateUser {
                username: Some("renamed".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect("Update should succeed");
    assert_eq!(updated.username, "renamed");
    assert_eq!(updated.email, user.email, "Email should remain unchanged");

    let credited = store
        .credit_access_units(user.id, Amount::from_units(5))
        .await
        .expect("Credit should succeed");
    assert_eq!(credited.access_units, Amount::from_units(5));

    let rejected = store.credit_access_units(user.id, Amount::ZERO).await;
    assert!(
        matches!(rejected, Err(AgroError::Validation(_))),
        "Zero credit should be rejected"
    );

    let overflow = store
        .credit_access_units(user.id, Amount::from_scaled(i64::MAX))
        .await;
    assert!(
        matches!(overflow, Err(AgroError::Validation(_))),
        "Overflowing credit should be rejected"
    );
    let unchanged = store.get_user(user.id).await.unwrap().unwrap();
    assert_eq!(unchanged.access_units, Amount::from_units(5));

    store
        .soft_delete_user(user.id)
        .await
        .expect("Soft delete should succeed");
    assert!(store.get_user(user.id).await.unwrap().is_none());
    assert!(store
        .get_credentials_by_email("contract-user@example.com")
        .await
        .unwrap()
        .is_none());
    assert!(store.soft_delete_user(user.id).await.unwrap_err().is_not_found());

    // A deleted account frees its email
    store
        .create_user(create_new_user_with_email("contract-user@example.com"), "hash")
        .await
        .expect("Email should be reusable after soft delete");
}

/// Tokens resolve to live users only
pub async fn test_token_contract<S: AgroStore>(store: &S) {
    let user = store
        .create_user(create_new_user_with_email("contract-token@example.com"), "hash")
        .await
        .unwrap();
    store.store_token(user.id, "token-hash-1").await.unwrap();
    store.store_token(user.id, "token-hash-2").await.unwrap();

    let resolved = store.user_for_token("token-hash-1").await.unwrap();
    assert_eq!(resolved.map(|u| u.id), Some(user.id));
    assert!(store.user_for_token("unknown").await.unwrap().is_none());

    assert_eq!(store.revoke_tokens(user.id).await.unwrap(), 2);
    assert!(store.user_for_token("token-hash-2").await.unwrap().is_none());

    store.store_token(user.id, "token-hash-3").await.unwrap();
    store.soft_delete_user(user.id).await.unwrap();
    assert!(
        store.user_for_token("token-hash-3").await.unwrap().is_none(),
        "Tokens of deleted users must not authenticate"
    );
}

/// Fields: owner listing, partial update, cascading soft delete
pub async fn test_field_contract<S: AgroStore>(store: &S) {
    let owner = store
        .create_user(create_new_user_with_email("contract-field@example.com"), "hash")
        .await
        .unwrap();
    let field = store
        .create_field(owner.id, create_new_field())
        .await
        .expect("Create should succeed");
    assert_eq!(field.created_by, owner.id);

    let updated = store
        .update_field(
            field.id,
            UpdateField {
                region: Some("Alibori".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect("Update should succeed");
    assert_eq!(updated.region, "Alibori");
    assert_eq!(updated.plant_specie, field.plant_specie);

    let owned = store.list_fields_for_owner(owner.id).await.unwrap();
    assert_eq!(owned.len(), 1);

    let task = store
        .create_task(owner.id, field.id, create_new_task())
        .await
        .unwrap();
    store
        .credit_access_units(owner.id, Amount::from_units(10))
        .await
        .unwrap();
    let listing = store
        .create_product_with_debit(
            owner.id,
            NewProductBuilder::new().with_field(field.id).build(),
            Amount::from_units(1),
        )
        .await
        .unwrap();

    store
        .soft_delete_field(field.id)
        .await
        .expect("Soft delete should succeed");
    assert!(store.get_field(field.id).await.unwrap().is_none());
    assert!(store.get_task(task.id).await.unwrap().is_none(), "Tasks go with their field");
    assert!(store.list_fields_for_owner(owner.id).await.unwrap().is_empty());
    assert!(store.list_fields(Page::default()).await.unwrap().iter().all(|f| f.id != field.id));

    let product = store
        .get_product(listing.product.id)
        .await
        .unwrap()
        .expect("Products outlive their field");
    assert_eq!(product.field_id, None);

    assert!(store
        .update_field(field.id, UpdateField::default())
        .await
        .unwrap_err()
        .is_not_found());
}

/// Tasks: unique live title per field, lifecycle, approval
pub async fn test_task_contract<S: AgroStore>(store: &S) {
    let owner = store
        .create_user(create_new_user_with_email("contract-task@example.com"), "hash")
        .await
        .unwrap();
    let field = store.create_field(owner.id, create_new_field()).await.unwrap();

    let task = store
        .create_task(owner.id, field.id, create_new_task())
        .await
        .expect("Create should succeed");
    assert_eq!(task.status, TaskStatus::Planned);
    assert!(task.approved, "Hand-written tasks are approved");

    match store.create_task(owner.id, field.id, create_new_task()).await {
        Err(AgroError::Duplicate(_)) => {}
        other => panic!("Expected Duplicate error, got: {other:?}"),
    }

    let missing = store.create_task(owner.id, 999_999, create_new_task()).await;
    assert!(missing.unwrap_err().is_not_found());

    let mut generated = create_new_task();
    generated.title = "Scout for pests".to_string();
    generated.generated = true;
    let generated = store.create_task(owner.id, field.id, generated).await.unwrap();
    assert!(!generated.approved, "Generated tasks wait for approval");
    let approved = store.approve_task(generated.id).await.unwrap();
    assert!(approved.approved);

    let renamed = store
        .update_task(
            generated.id,
            UpdateTask {
                title: Some(task.title.clone()),
                ..Default::default()
            },
        )
        .await;
    assert!(
        matches!(renamed, Err(AgroError::Duplicate(_))),
        "Renaming onto a live title should fail"
    );

    let executing = store
        .set_task_status(task.id, TaskStatus::Executing)
        .await
        .unwrap();
    assert_eq!(executing.status, TaskStatus::Executing);
    assert!(store.latest_done_task(field.id).await.unwrap().is_none());

    let done = store.set_task_status(task.id, TaskStatus::Done).await.unwrap();
    assert!(done.done_at.is_some(), "Done task should have done_at timestamp");
    assert_eq!(
        store.latest_done_task(field.id).await.unwrap().map(|t| t.id),
        Some(task.id)
    );

    match store.set_task_status(task.id, TaskStatus::Planned).await {
        Err(AgroError::InvalidStatusTransition(TaskStatus::Done, TaskStatus::Planned)) => {}
        other => panic!("Expected InvalidStatusTransition error, got: {other:?}"),
    }

    store.soft_delete_task(task.id).await.unwrap();
    assert!(store.get_task(task.id).await.unwrap().is_none());
    assert_eq!(store.list_tasks_for_field(field.id).await.unwrap().len(), 1);

    // The title is free again once the task is deleted
    store
        .create_task(owner.id, field.id, create_new_task())
        .await
        .expect("Title should be reusable after soft delete");
}

/// Products: atomic debit, visibility, immutable quantity
pub async fn test_product_contract<S: AgroStore>(store: &S) {
    let owner = store
        .create_user(create_new_user_with_email("contract-product@example.com"), "hash")
        .await
        .unwrap();
    store
        .credit_access_units(owner.id, Amount::from_units(3))
        .await
        .unwrap();

    let listing = store
        .create_product_with_debit(owner.id, NewProductBuilder::new().build(), Amount::from_units(2))
        .await
        .expect("Affordable listing should succeed");
    assert_eq!(listing.remaining_access_units, Amount::from_units(1));
    assert_eq!(listing.cost, Amount::from_units(2));

    let refused = store
        .create_product_with_debit(
            owner.id,
            NewProductBuilder::new().with_name("Second").build(),
            Amount::from_units(2),
        )
        .await;
    match refused {
        Err(AgroError::InsufficientAccessUnits { required, available }) => {
            assert_eq!(required, Amount::from_units(2));
            assert_eq!(available, Amount::from_units(1));
        }
        other => panic!("Expected InsufficientAccessUnits error, got: {other:?}"),
    }
    let balance = store.get_user(owner.id).await.unwrap().unwrap().access_units;
    assert_eq!(balance, Amount::from_units(1), "A refused listing must not debit");

    let off_sale = store
        .create_product_with_debit(
            owner.id,
            NewProductBuilder::new()
                .with_name("Stored seed")
                .with_quantity(Amount::from_units(1), MeasurementUnit::Kilogram)
                .on_sale(false)
                .build(),
            Amount::ZERO,
        )
        .await
        .unwrap();

    let public = store
        .list_products(ProductFilter::default(), Page::default())
        .await
        .unwrap();
    assert!(public.iter().any(|p| p.id == listing.product.id));
    assert!(public.iter().all(|p| p.id != off_sale.product.id));

    let own = store
        .list_products(
            ProductFilter {
                created_by: Some(owner.id),
                include_off_sale: true,
                ..Default::default()
            },
            Page::default(),
        )
        .await
        .unwrap();
    assert!(own.iter().any(|p| p.id == off_sale.product.id));

    let updated = store
        .update_product(
            listing.product.id,
            UpdateProduct {
                price: Some(Amount::from_units(300)),
                on_sale: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.price, Amount::from_units(300));
    assert_eq!(updated.quantity, listing.product.quantity);
    assert!(!updated.on_sale);

    store.soft_delete_product(listing.product.id).await.unwrap();
    assert!(store.get_product(listing.product.id).await.unwrap().is_none());
    assert!(store
        .soft_delete_product(listing.product.id)
        .await
        .unwrap_err()
        .is_not_found());
}

/// Offsets: lazily initialised, monotonically advanced
pub async fn test_offset_contract<S: AgroStore>(store: &S) {
    assert!(store.current_offset().await.unwrap().is_none());

    let first = store.advance_offset().await.unwrap();
    assert_eq!(first.offset, 1);
    let second = store.advance_offset().await.unwrap();
    assert_eq!(second.offset, 2);
    assert_eq!(second.id, first.id);

    let fresh = store.init_offset().await.unwrap();
    assert_eq!(fresh.offset, 0);
    assert_eq!(store.current_offset().await.unwrap().map(|o| o.id), Some(fresh.id));
}

/// Test health check contract
pub async fn test_health_check_contract<S: AgroStore>(store: &S) {
    store
        .health_check()
        .await
        .expect("Health check should succeed for a working store");
}
