//! Integration tests for `PgProjectionStore`.
//!
//! These need a live database (`DATABASE_URL`) and are ignored by default:
//! `cargo test -p accounts-store -- --ignored`.

use accounts_core::account::{Account, PartialAccount};
use accounts_core::store::{AccountFilter, ProjectionStore, StoreError};
use accounts_store::pg_projection_store::PgProjectionStore;
use sqlx::PgPool;
use uuid::Uuid;

/// Helper to build an `Account` with sensible defaults.
fn make_account(user_name: &str) -> Account {
    Account {
        account_id: Uuid::new_v4(),
        email: format!("{user_name}@example.com"),
        first_name: "Test".to_owned(),
        last_name: "User".to_owned(),
        user_name: user_name.to_owned(),
        password: "$2b$04$hash".to_owned(),
        role: "member".to_owned(),
    }
}

// --- insert_one + find_one ---

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_insert_and_find_by_user_name(pool: PgPool) {
    let store = PgProjectionStore::new(pool);
    let account = make_account("ada");

    store.insert_one(&account).await.unwrap();

    let found = store
        .find_one(&PartialAccount::by_user_name("ada").into())
        .await
        .unwrap();
    assert_eq!(found, Some(account));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_insert_rejects_duplicate_user_name(pool: PgPool) {
    let store = PgProjectionStore::new(pool);
    store.insert_one(&make_account("ada")).await.unwrap();

    let result = store.insert_one(&make_account("ada")).await;

    assert!(matches!(result, Err(StoreError::Duplicate(_))));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_find_one_any_of_matches_either_field(pool: PgPool) {
    let store = PgProjectionStore::new(pool);
    let account = make_account("ada");
    store.insert_one(&account).await.unwrap();

    let filter = AccountFilter::AnyOf(vec![
        PartialAccount::by_account_id(Uuid::new_v4()),
        PartialAccount::by_user_name("ada"),
    ]);

    assert!(store.find_one(&filter).await.unwrap().is_some());
}

// --- update_many ---

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_update_many_changes_only_mutable_fields(pool: PgPool) {
    let store = PgProjectionStore::new(pool);
    let account = make_account("ada");
    store.insert_one(&account).await.unwrap();

    let update = PartialAccount {
        first_name: Some("Augusta".to_owned()),
        user_name: Some("hijacked".to_owned()),
        ..PartialAccount::default()
    };
    let matched = store
        .update_many(&PartialAccount::by_account_id(account.account_id).into(), &update)
        .await
        .unwrap();

    assert_eq!(matched, 1);
    let found = store
        .find_one(&PartialAccount::by_account_id(account.account_id).into())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.first_name, "Augusta");
    assert_eq!(found.user_name, "ada");
}

// --- delete_many ---

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_delete_many_returns_removed_count(pool: PgPool) {
    let store = PgProjectionStore::new(pool);
    store.insert_one(&make_account("ada")).await.unwrap();
    store.insert_one(&make_account("grace")).await.unwrap();

    let filter = PartialAccount {
        role: Some("member".to_owned()),
        ..PartialAccount::default()
    };
    let removed = store.delete_many(&filter.clone().into()).await.unwrap();

    assert_eq!(removed, 2);
    assert!(store.find(&filter.into()).await.unwrap().is_empty());
}
