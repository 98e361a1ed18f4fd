//! Repository for the `homestay` table.
//!
//! Point lookups go through the cache; page scans always hit the database.
//! Every update invalidates the row's cache key, and deletes are soft:
//! they flip `del_state` and go through the update path. Writes made
//! through a [`Session`] invalidate again after the commit.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use lodging_core::del_state::DelState;
use lodging_core::types::DbId;
use sqlx::PgExecutor;

use crate::builder::{bind_values, build_select, Where};
use crate::cache::{Cache, CacheAside, CacheConf, Invalidate};
use crate::error::ModelError;
use crate::models::homestay::Homestay;
use crate::models::SoftDelete;
use crate::session::{transact, Session, WriteExecutor};
use crate::DbPool;

const TABLE: &str = "homestay";

/// Every column, in `Homestay` field order.
const FIELD_NAMES: &[&str] = &[
    "id",
    "create_time",
    "update_time",
    "delete_time",
    "del_state",
    "version",
    "title",
    "sub_title",
    "banner",
    "info",
    "people_num",
    "homestay_business_id",
    "user_id",
    "row_state",
    "row_type",
    "food_info",
    "food_price",
    "homestay_price",
    "market_homestay_price",
];

const CACHE_ID_PREFIX: &str = "cache:lodging:homestay:id:";

/// Writable columns are bound as `$1..$15` in this order:
/// delete_time, del_state, title, sub_title, banner, info, people_num,
/// homestay_business_id, user_id, row_state, row_type, food_info,
/// food_price, homestay_price, market_homestay_price.
const INSERT_SQL: &str = "INSERT INTO homestay (
        delete_time, del_state, title, sub_title, banner, info, people_num,
        homestay_business_id, user_id, row_state, row_type, food_info,
        food_price, homestay_price, market_homestay_price)
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
     RETURNING id";

/// Same positional order as [`INSERT_SQL`], with the id as `$16`.
const UPDATE_SQL: &str = "UPDATE homestay SET
        delete_time = $1, del_state = $2, title = $3, sub_title = $4,
        banner = $5, info = $6, people_num = $7, homestay_business_id = $8,
        user_id = $9, row_state = $10, row_type = $11, food_info = $12,
        food_price = $13, homestay_price = $14, market_homestay_price = $15,
        update_time = NOW(), version = version + 1
     WHERE id = $16";

/// Cached store for homestay listings.
pub struct HomestayRepo<C> {
    pool: DbPool,
    cache: CacheAside<C>,
}

impl<C> Clone for HomestayRepo<C> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            cache: self.cache.clone(),
        }
    }
}

impl<C: Cache> HomestayRepo<C> {
    pub fn new(pool: DbPool, cache: Arc<C>, conf: CacheConf) -> Self {
        Self {
            pool,
            cache: CacheAside::new(cache, conf),
        }
    }

    /// The pooled connection, for writes outside a transaction.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn cache(&self) -> &CacheAside<C> {
        &self.cache
    }

    /// Cache key for the row with primary key `id`.
    pub fn format_primary(id: DbId) -> String {
        format!("{CACHE_ID_PREFIX}{id}")
    }

    /// Find a live homestay by id, serving from the cache when possible.
    ///
    /// Returns [`ModelError::NotFound`] for unknown ids and for
    /// soft-deleted rows, whether the row came from the cache or not.
    pub async fn find_one(&self, id: DbId) -> Result<Homestay, ModelError> {
        let key = Self::format_primary(id);
        let row: Homestay = self
            .cache
            .query_row(&key, || self.query_primary(id))
            .await?;
        if !row.is_present() {
            return Err(ModelError::NotFound);
        }
        Ok(row)
    }

    /// Read a row straight from the database, soft-deleted rows included.
    pub async fn find_one_no_cache(&self, id: DbId) -> Result<Homestay, ModelError> {
        self.query_primary(id).await
    }

    /// Newest-first page of live homestays with `id < last_id`.
    ///
    /// `last_id == 0` starts from the newest row. Never cached.
    pub async fn find_page_list(
        &self,
        last_id: DbId,
        page_size: i64,
    ) -> Result<Vec<Homestay>, ModelError> {
        self.query_page(Where::new(), last_id, page_size).await
    }

    /// Like [`find_page_list`](Self::find_page_list), restricted to one
    /// homestay business.
    pub async fn find_page_list_by_business_id(
        &self,
        last_id: DbId,
        page_size: i64,
        homestay_business_id: DbId,
    ) -> Result<Vec<Homestay>, ModelError> {
        let conditions = Where::new().and("homestay_business_id", homestay_business_id);
        self.query_page(conditions, last_id, page_size).await
    }

    /// Insert a row, returning the generated id.
    ///
    /// `executor` is the pool or a [`Session`]. The row is not cached; the
    /// first [`find_one`](Self::find_one) fills it. A not-found placeholder
    /// cached for the id before it existed is cleared, and inside a session
    /// cleared again after the commit.
    pub async fn insert<X>(&self, executor: &X, data: &Homestay) -> Result<DbId, ModelError>
    where
        X: WriteExecutor,
    {
        let mut conn = executor.write_conn().await?;
        let id = sqlx::query_scalar::<_, DbId>(INSERT_SQL)
            .bind(data.delete_time)
            .bind(data.del_state)
            .bind(&data.title)
            .bind(&data.sub_title)
            .bind(&data.banner)
            .bind(&data.info)
            .bind(data.people_num)
            .bind(data.homestay_business_id)
            .bind(data.user_id)
            .bind(data.row_state)
            .bind(data.row_type)
            .bind(&data.food_info)
            .bind(data.food_price)
            .bind(data.homestay_price)
            .bind(data.market_homestay_price)
            .fetch_one(&mut *conn)
            .await?;
        drop(conn);
        let key = Self::format_primary(id);
        executor.defer_invalidate(self.invalidator(), vec![key.clone()]);
        if self.cache.del(&[key]).await.is_err() {
            tracing::warn!(id, "Inserted homestay but could not clear its cache key");
        }
        tracing::debug!(id, "Inserted homestay");
        Ok(id)
    }

    /// Write every writable column of `data` and invalidate its cache key.
    ///
    /// Returns [`ModelError::NotFound`] if no row has `data.id`. If the
    /// write succeeds but the cache cannot be reached, the write stands and
    /// [`ModelError::Cache`] is returned. Inside a session the key is
    /// deleted both now and after the commit.
    pub async fn update<X>(&self, executor: &X, data: &Homestay) -> Result<(), ModelError>
    where
        X: WriteExecutor,
    {
        let key = Self::format_primary(data.id);
        executor.defer_invalidate(self.invalidator(), vec![key.clone()]);
        let mut conn = executor.write_conn().await?;
        self.cache
            .exec(Self::exec_update(&mut *conn, data), &[key])
            .await?;
        tracing::debug!(id = data.id, "Updated homestay");
        Ok(())
    }

    /// Soft-delete: flag `data` as deleted and persist it through
    /// [`update`](Self::update). The physical row stays.
    pub async fn delete<X>(&self, executor: &X, data: &mut Homestay) -> Result<(), ModelError>
    where
        X: WriteExecutor,
    {
        data.del_state = DelState::Yes.id();
        data.delete_time = Some(Utc::now());
        self.update(executor, data).await
    }

    /// Run `f` in a transaction on this repository's pool.
    ///
    /// Pass the session `f` receives to [`insert`](Self::insert),
    /// [`update`](Self::update) and [`delete`](Self::delete).
    pub async fn trans<T, F, Fut>(&self, f: F) -> Result<T, ModelError>
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = Result<T, ModelError>>,
    {
        transact(&self.pool, f).await
    }

    fn invalidator(&self) -> Arc<dyn Invalidate> {
        Arc::new(self.cache.clone())
    }

    async fn exec_update<'e, E>(executor: E, data: &Homestay) -> Result<(), ModelError>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(UPDATE_SQL)
            .bind(data.delete_time)
            .bind(data.del_state)
            .bind(&data.title)
            .bind(&data.sub_title)
            .bind(&data.banner)
            .bind(&data.info)
            .bind(data.people_num)
            .bind(data.homestay_business_id)
            .bind(data.user_id)
            .bind(data.row_state)
            .bind(data.row_type)
            .bind(&data.food_info)
            .bind(data.food_price)
            .bind(data.homestay_price)
            .bind(data.market_homestay_price)
            .bind(data.id)
            .execute(executor)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ModelError::NotFound);
        }
        Ok(())
    }

    async fn query_primary(&self, id: DbId) -> Result<Homestay, ModelError> {
        let conditions = Where::new().and("id", id).limit(0, 1);
        let (query, values) = build_select(TABLE, &conditions, FIELD_NAMES)?;
        let row = bind_values(sqlx::query_as::<_, Homestay>(&query), values)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn query_page(
        &self,
        conditions: Where,
        last_id: DbId,
        page_size: i64,
    ) -> Result<Vec<Homestay>, ModelError> {
        if page_size <= 0 {
            return Ok(Vec::new());
        }
        let last_id = if last_id == 0 { DbId::MAX } else { last_id };

        let conditions = conditions
            .and("del_state", DelState::No)
            .and("id <", last_id)
            .order_by("id DESC")
            .limit(0, page_size);
        let (query, values) = build_select(TABLE, &conditions, FIELD_NAMES)?;

        let mut rows = bind_values(sqlx::query_as::<_, Homestay>(&query), values)
            .fetch_all(&self.pool)
            .await?;
        rows.retain(Homestay::is_present);
        Ok(rows)
    }
}
