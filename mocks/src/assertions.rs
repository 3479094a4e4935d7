//! Custom assertion helpers for testing
//!
//! Provides specialized assertions for:
//! - Error kinds and their HTTP status
//! - Task status transition rules
//! - Product listing visibility

use agro_core::{AgroError, Product, TaskStatus};

use crate::fixtures::create_test_task_with_status;

/// Assert an error maps to the expected HTTP status
pub fn assert_error_status(error: &AgroError, expected: u16) {
    assert_eq!(
        error.status_code(),
        expected,
        "Expected status {expected} for error {error:?}, got {}",
        error.status_code()
    );
}

/// Assert state transition is valid according to business rules
pub fn assert_transition_valid(from: TaskStatus, to: TaskStatus) {
    let task = create_test_task_with_status(from);
    assert!(
        task.can_transition_to(to),
        "Expected transition from {from:?} to {to:?} to be valid, but it's not"
    );
}

/// Assert state transition is invalid according to business rules
pub fn assert_transition_invalid(from: TaskStatus, to: TaskStatus) {
    let task = create_test_task_with_status(from);
    assert!(
        !task.can_transition_to(to),
        "Expected transition from {from:?} to {to:?} to be invalid, but it's valid"
    );
}

/// Assert every product in a public listing is live and on sale
pub fn assert_public_listing(products: &[Product]) {
    for product in products {
        assert!(
            product.on_sale && product.deleted_at.is_none(),
            "Product {} should not appear in a public listing (on_sale={}, deleted_at={:?})",
            product.id,
            product.on_sale,
            product.deleted_at
        );
    }
}
