//! Runs the shared store contract against SQLite
//!
//! The same suite runs against `mocks::MockAgroStore`, so both stores are
//! held to identical soft-delete, uniqueness and debit semantics.

use database::SqliteRepository;
use mocks::{
    test_field_contract, test_offset_contract, test_product_contract, test_store_contract,
    test_task_contract, test_token_contract, test_user_contract,
};

async fn fresh_repository() -> SqliteRepository {
    let repo = SqliteRepository::new(":memory:").await.unwrap();
    repo.migrate().await.unwrap();
    repo
}

#[tokio::test]
async fn test_sqlite_passes_full_contract() {
    let repo = fresh_repository().await;
    test_store_contract(&repo).await;
}

#[tokio::test]
async fn test_sqlite_user_contract() {
    test_user_contract(&fresh_repository().await).await;
}

#[tokio::test]
async fn test_sqlite_token_contract() {
    test_token_contract(&fresh_repository().await).await;
}

#[tokio::test]
async fn test_sqlite_field_contract() {
    test_field_contract(&fresh_repository().await).await;
}

#[tokio::test]
async fn test_sqlite_task_contract() {
    test_task_contract(&fresh_repository().await).await;
}

#[tokio::test]
async fn test_sqlite_product_contract() {
    test_product_contract(&fresh_repository().await).await;
}

#[tokio::test]
async fn test_sqlite_offset_contract() {
    test_offset_contract(&fresh_repository().await).await;
}
