use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};

use super::{CreateOutcome, OrderStorage, StorageError};
use crate::config::DatabaseConfig;
use crate::domain::order::{Delivery, Item, Order, Payment};

// ============================================================================
// PostgreSQL Order Store
// ============================================================================
//
// Layout (1:1:1:N, see migrations/):
//   orders   (order_uid PK, ...)
//   delivery (order_uid FK UNIQUE, ...)
//   payment  (order_uid FK UNIQUE, ...)
//   items    (order_uid FK, ...)
//
// Idempotency covers the whole aggregate: the root insert reports whether it
// wrote a row, and child rows are only written when it did. A redelivered
// order therefore commits an empty transaction instead of duplicating
// delivery/payment/item rows. Concurrent creates of the same uid serialize on
// the primary key, so the loser also sees "no row" and skips its children.
//
// ============================================================================

const INSERT_ORDER: &str = r#"
    INSERT INTO orders (
        order_uid, track_number, entry, locale, internal_signature,
        customer_id, delivery_service, shardkey, sm_id, date_created, oof_shard
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
    ON CONFLICT (order_uid) DO NOTHING
    RETURNING order_uid
"#;

const INSERT_DELIVERY: &str = r#"
    INSERT INTO delivery (order_uid, name, phone, zip, city, address, region, email)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
"#;

const INSERT_PAYMENT: &str = r#"
    INSERT INTO payment (
        order_uid, transaction, request_id, currency, provider, amount,
        payment_dt, bank, delivery_cost, goods_total, custom_fee
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
"#;

const INSERT_ITEM: &str = r#"
    INSERT INTO items (
        order_uid, chrt_id, track_number, price, rid, name,
        sale, size, total_price, nm_id, brand, status
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
"#;

const SELECT_ORDER: &str = r#"
    SELECT order_uid, track_number, entry, locale, internal_signature,
           customer_id, delivery_service, shardkey, sm_id, date_created, oof_shard
    FROM orders
    WHERE order_uid = $1
"#;

const SELECT_DELIVERY: &str = r#"
    SELECT name, phone, zip, city, address, region, email
    FROM delivery
    WHERE order_uid = $1
"#;

const SELECT_PAYMENT: &str = r#"
    SELECT transaction, request_id, currency, provider, amount,
           payment_dt, bank, delivery_cost, goods_total, custom_fee
    FROM payment
    WHERE order_uid = $1
"#;

const SELECT_ITEMS: &str = r#"
    SELECT chrt_id, track_number, price, rid, name,
           sale, size, total_price, nm_id, brand, status
    FROM items
    WHERE order_uid = $1
"#;

const SELECT_ORDER_UIDS: &str = "SELECT order_uid FROM orders";

pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(&config.url)
            .await
            .map_err(StorageError::database("storage.postgres.connect"))?;

        tracing::info!(
            max_connections = config.max_connections,
            "Connected to PostgreSQL"
        );

        Ok(Self { pool })
    }
}

#[async_trait]
impl OrderStorage for PostgresStorage {
    async fn create_order(&self, order: &Order) -> Result<CreateOutcome, StorageError> {
        const OP: &str = "storage.postgres.create_order";

        let mut tx = self.pool.begin().await.map_err(StorageError::database(OP))?;

        let inserted: Option<(String,)> = sqlx::query_as(INSERT_ORDER)
            .bind(&order.order_uid)
            .bind(&order.track_number)
            .bind(&order.entry)
            .bind(&order.locale)
            .bind(&order.internal_signature)
            .bind(&order.customer_id)
            .bind(&order.delivery_service)
            .bind(&order.shardkey)
            .bind(order.sm_id)
            .bind(order.date_created)
            .bind(&order.oof_shard)
            .fetch_optional(&mut *tx)
            .await
            .map_err(StorageError::database("storage.postgres.create_order: insert order"))?;

        if inserted.is_none() {
            tx.commit().await.map_err(StorageError::database(OP))?;
            tracing::debug!(order_uid = %order.order_uid, "Order already stored, skipping aggregate insert");
            return Ok(CreateOutcome::AlreadyExists);
        }

        let delivery = &order.delivery;
        sqlx::query(INSERT_DELIVERY)
            .bind(&order.order_uid)
            .bind(&delivery.name)
            .bind(&delivery.phone)
            .bind(&delivery.zip)
            .bind(&delivery.city)
            .bind(&delivery.address)
            .bind(&delivery.region)
            .bind(&delivery.email)
            .execute(&mut *tx)
            .await
            .map_err(StorageError::database("storage.postgres.create_order: insert delivery"))?;

        let payment = &order.payment;
        sqlx::query(INSERT_PAYMENT)
            .bind(&order.order_uid)
            .bind(&payment.transaction)
            .bind(&payment.request_id)
            .bind(&payment.currency)
            .bind(&payment.provider)
            .bind(payment.amount)
            .bind(payment.payment_dt)
            .bind(&payment.bank)
            .bind(payment.delivery_cost)
            .bind(payment.goods_total)
            .bind(payment.custom_fee)
            .execute(&mut *tx)
            .await
            .map_err(StorageError::database("storage.postgres.create_order: insert payment"))?;

        for item in &order.items {
            sqlx::query(INSERT_ITEM)
                .bind(&order.order_uid)
                .bind(item.chrt_id)
                .bind(&item.track_number)
                .bind(item.price)
                .bind(&item.rid)
                .bind(&item.name)
                .bind(item.sale)
                .bind(&item.size)
                .bind(item.total_price)
                .bind(item.nm_id)
                .bind(&item.brand)
                .bind(item.status)
                .execute(&mut *tx)
                .await
                .map_err(StorageError::database("storage.postgres.create_order: insert item"))?;
        }

        // Dropping `tx` on any early return above rolls the aggregate back.
        tx.commit()
            .await
            .map_err(StorageError::database("storage.postgres.create_order: commit"))?;

        Ok(CreateOutcome::Created)
    }

    async fn get_order(&self, order_uid: &str) -> Result<Order, StorageError> {
        let mut order: Order = sqlx::query_as(SELECT_ORDER)
            .bind(order_uid)
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::database("storage.postgres.get_order"))?
            .ok_or(StorageError::NotFound)?;

        order.delivery = sqlx::query_as::<_, Delivery>(SELECT_DELIVERY)
            .bind(order_uid)
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::database("storage.postgres.get_order: get delivery"))?
            .ok_or(StorageError::NotFound)?;

        order.payment = sqlx::query_as::<_, Payment>(SELECT_PAYMENT)
            .bind(order_uid)
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::database("storage.postgres.get_order: get payment"))?
            .ok_or(StorageError::NotFound)?;

        // No rows is a valid, empty item list.
        order.items = sqlx::query_as::<_, Item>(SELECT_ITEMS)
            .bind(order_uid)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::database("storage.postgres.get_order: get items"))?;

        Ok(order)
    }

    async fn list_order_uids(&self) -> Result<Vec<String>, StorageError> {
        sqlx::query_scalar(SELECT_ORDER_UIDS)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::database("storage.postgres.list_order_uids"))
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.pool.close().await;
        tracing::info!("PostgreSQL pool closed");
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
//
// Statement shape only; round trips against a live database belong to the
// deployment's integration environment.
//
// ============================================================================
