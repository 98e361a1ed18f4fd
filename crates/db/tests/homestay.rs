//! Integration tests for the cached homestay store.
//!
//! Exercises `HomestayRepo` against a real database to verify that:
//! - Point lookups are cached and invalidated by updates
//! - Soft-deleted rows read as not found but stay in the table
//! - Cursor pagination is newest-first and skips soft-deleted rows
//! - Transactions commit or roll back as a unit
//! - Reads made while a transaction is open do not leave stale cache
//!   entries behind once it commits

use std::sync::Arc;

use assert_matches::assert_matches;
use lodging_core::del_state::DelState;
use lodging_db::cache::{CacheConf, MemoryCache};
use lodging_db::models::homestay::{Homestay, ROW_STATE_OFF_SHELF, ROW_STATE_ON_SHELF};
use lodging_db::repositories::HomestayRepo;
use lodging_db::ModelError;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn repo(pool: PgPool) -> HomestayRepo<MemoryCache> {
    HomestayRepo::new(pool, Arc::new(MemoryCache::new()), CacheConf::default())
}

fn new_homestay(title: &str, business_id: i64) -> Homestay {
    Homestay {
        title: title.to_string(),
        sub_title: "by the lake".to_string(),
        banner: "https://img.example/cover.jpg".to_string(),
        info: "two bedrooms".to_string(),
        people_num: 4,
        homestay_business_id: business_id,
        user_id: 7,
        row_state: ROW_STATE_ON_SHELF,
        food_info: "breakfast".to_string(),
        food_price: 3_000,
        homestay_price: 45_000,
        market_homestay_price: 52_000,
        ..Homestay::default()
    }
}

async fn insert(repo: &HomestayRepo<MemoryCache>, title: &str, business_id: i64) -> Homestay {
    let id = repo
        .insert(repo.pool(), &new_homestay(title, business_id))
        .await
        .unwrap();
    repo.find_one(id).await.unwrap()
}

// ---------------------------------------------------------------------------
// Point lookups
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn test_find_one_unknown_id_is_not_found(pool: PgPool) {
    let repo = repo(pool);
    assert_matches!(repo.find_one(999_999).await, Err(ModelError::NotFound));
}

#[sqlx::test(migrations = "./migrations")]
async fn test_lifecycle_insert_update_delete(pool: PgPool) {
    let repo = repo(pool);

    let mut a = insert(&repo, "A", 1).await;
    assert_eq!(a.title, "A");
    assert_eq!(a.row_state, ROW_STATE_ON_SHELF);
    assert_eq!(a.del_state, DelState::No.id());

    a.row_state = ROW_STATE_OFF_SHELF;
    repo.update(repo.pool(), &a).await.unwrap();
    let found = repo.find_one(a.id).await.unwrap();
    assert_eq!(found.row_state, ROW_STATE_OFF_SHELF);
    assert_eq!(found.version, a.version + 1);

    repo.delete(repo.pool(), &mut a).await.unwrap();
    assert_eq!(a.del_state, DelState::Yes.id());
    assert_matches!(repo.find_one(a.id).await, Err(ModelError::NotFound));

    // The physical row is still there.
    let raw = repo.find_one_no_cache(a.id).await.unwrap();
    assert_eq!(raw.del_state, DelState::Yes.id());
    assert!(raw.delete_time.is_some());

    let page = repo.find_page_list(0, 10).await.unwrap();
    assert!(page.iter().all(|row| row.id != a.id));
}

#[sqlx::test(migrations = "./migrations")]
async fn test_find_one_is_served_from_cache_until_update(pool: PgPool) {
    let repo = repo(pool.clone());
    let mut row = insert(&repo, "Cached", 1).await;

    // Change the row behind the store's back: the cached copy wins.
    sqlx::query("UPDATE homestay SET title = 'Sneaky' WHERE id = $1")
        .bind(row.id)
        .execute(&pool)
        .await
        .unwrap();
    assert_eq!(repo.find_one(row.id).await.unwrap().title, "Cached");

    // A store update invalidates, so the next read sees the new value.
    row.title = "Renamed".to_string();
    repo.update(repo.pool(), &row).await.unwrap();
    assert_eq!(repo.find_one(row.id).await.unwrap().title, "Renamed");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_lookup_before_insert_does_not_hide_new_row(pool: PgPool) {
    let repo = repo(pool);
    // BIGSERIAL starts at 1 on a fresh database.
    assert_matches!(repo.find_one(1).await, Err(ModelError::NotFound));

    let id = repo
        .insert(repo.pool(), &new_homestay("First", 1))
        .await
        .unwrap();
    assert_eq!(id, 1);
    assert_eq!(repo.find_one(id).await.unwrap().title, "First");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_update_unknown_id_is_not_found(pool: PgPool) {
    let repo = repo(pool);
    let ghost = Homestay {
        id: 424_242,
        ..new_homestay("Ghost", 1)
    };
    assert_matches!(
        repo.update(repo.pool(), &ghost).await,
        Err(ModelError::NotFound)
    );
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn test_page_list_walks_newest_first(pool: PgPool) {
    let repo = repo(pool);
    let mut ids = Vec::new();
    for i in 0..5 {
        ids.push(insert(&repo, &format!("Row {i}"), 1).await.id);
    }

    let first = repo.find_page_list(0, 3).await.unwrap();
    let first_ids: Vec<i64> = first.iter().map(|row| row.id).collect();
    assert_eq!(first_ids, vec![ids[4], ids[3], ids[2]]);

    let last_id = *first_ids.last().unwrap();
    let second = repo.find_page_list(last_id, 3).await.unwrap();
    let second_ids: Vec<i64> = second.iter().map(|row| row.id).collect();
    assert_eq!(second_ids, vec![ids[1], ids[0]]);
    assert!(second_ids.iter().all(|id| *id < last_id));

    let empty = repo.find_page_list(ids[0], 3).await.unwrap();
    assert!(empty.is_empty());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_page_list_skips_soft_deleted_and_zero_page_size(pool: PgPool) {
    let repo = repo(pool);
    let keep = insert(&repo, "Keep", 1).await;
    let mut gone = insert(&repo, "Gone", 1).await;
    repo.delete(repo.pool(), &mut gone).await.unwrap();

    let page = repo.find_page_list(0, 10).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, keep.id);
    assert!(page.iter().all(|row| row.del_state == DelState::No.id()));

    assert!(repo.find_page_list(0, 0).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_page_list_by_business_id(pool: PgPool) {
    let repo = repo(pool);
    let a1 = insert(&repo, "A1", 10).await;
    insert(&repo, "B1", 20).await;
    let a2 = insert(&repo, "A2", 10).await;

    let page = repo.find_page_list_by_business_id(0, 10, 10).await.unwrap();
    let ids: Vec<i64> = page.iter().map(|row| row.id).collect();
    assert_eq!(ids, vec![a2.id, a1.id]);

    let rest = repo
        .find_page_list_by_business_id(a2.id, 10, 10)
        .await
        .unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].id, a1.id);

    assert!(repo
        .find_page_list_by_business_id(0, 10, 30)
        .await
        .unwrap()
        .is_empty());
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn test_trans_commits_all_writes(pool: PgPool) {
    let repo = repo(pool);
    let r = &repo;

    let (first, second) = repo
        .trans(|session| async move {
            let first = r.insert(&session, &new_homestay("One", 1)).await?;
            let second = r.insert(&session, &new_homestay("Two", 1)).await?;
            let mut row = new_homestay("One, edited", 1);
            row.id = first;
            r.update(&session, &row).await?;
            Ok((first, second))
        })
        .await
        .unwrap();

    assert_eq!(repo.find_one(first).await.unwrap().title, "One, edited");
    assert_eq!(repo.find_one(second).await.unwrap().title, "Two");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_trans_rolls_back_on_error(pool: PgPool) {
    let repo = repo(pool);
    let r = &repo;

    let result: Result<(), ModelError> = repo
        .trans(|session| async move {
            r.insert(&session, &new_homestay("Doomed", 1)).await?;
            Err(ModelError::NotFound)
        })
        .await;

    assert_matches!(result, Err(ModelError::NotFound));
    assert!(repo.find_page_list(0, 10).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_update_in_session_invalidates_cache(pool: PgPool) {
    let repo = repo(pool);
    let mut row = insert(&repo, "Before", 1).await;
    row.title = "After".to_string();

    let r = &repo;
    let edited = &row;
    repo.trans(|session| async move {
        r.update(&session, edited).await?;
        Ok(())
    })
    .await
    .unwrap();

    assert_eq!(repo.find_one(row.id).await.unwrap().title, "After");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_read_before_commit_does_not_outlive_session_update(pool: PgPool) {
    let repo = repo(pool);
    let mut row = insert(&repo, "Before", 1).await;
    row.title = "After".to_string();

    let r = &repo;
    let edited = &row;
    repo.trans(|session| async move {
        r.update(&session, edited).await?;
        // Outside the transaction the old row is still current and gets
        // cached again.
        assert_eq!(r.find_one(edited.id).await?.title, "Before");
        Ok(())
    })
    .await
    .unwrap();

    assert_eq!(repo.find_one(row.id).await.unwrap().title, "After");
    assert_eq!(repo.find_one_no_cache(row.id).await.unwrap().title, "After");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_lookup_before_commit_does_not_hide_session_insert(pool: PgPool) {
    let repo = repo(pool);
    let r = &repo;

    let id = repo
        .trans(|session| async move {
            let id = r.insert(&session, &new_homestay("Fresh", 1)).await?;
            // Not committed yet: the lookup caches a not-found placeholder.
            assert_matches!(r.find_one(id).await, Err(ModelError::NotFound));
            Ok(id)
        })
        .await
        .unwrap();

    assert_eq!(repo.find_one(id).await.unwrap().title, "Fresh");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_rolled_back_update_keeps_committed_row(pool: PgPool) {
    let repo = repo(pool);
    let mut row = insert(&repo, "Kept", 1).await;
    row.title = "Discarded".to_string();

    let r = &repo;
    let edited = &row;
    let result: Result<(), ModelError> = repo
        .trans(|session| async move {
            r.update(&session, edited).await?;
            Err(ModelError::NotFound)
        })
        .await;

    assert_matches!(result, Err(ModelError::NotFound));
    assert_eq!(repo.find_one(row.id).await.unwrap().title, "Kept");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_session_is_closed_after_trans(pool: PgPool) {
    let repo = repo(pool);

    let leaked = repo
        .trans(|session| async move { Ok(session) })
        .await
        .unwrap();

    assert_matches!(leaked.conn().await, Err(ModelError::TransactionClosed));
    assert_matches!(
        repo.insert(&leaked, &new_homestay("Late", 1)).await,
        Err(ModelError::TransactionClosed)
    );
}
