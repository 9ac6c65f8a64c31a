use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BookId, CartItemId, OrderId, StoreId, TransactionId, UserId};
use domain::{
    Book, CartItem, CartLine, FeePercentage, Money, Order, OrderItem, OrderStatus, ShippingInfo,
    SiteConfig, Transaction, TransactionStatus,
};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    store::{MarketplaceStore, UnitOfWork},
};

const ORDER_COLUMNS: &str = "id, customer_id, store_id, total_price, order_status, \
    payment_method, payment_status, address, phone, payment_session, created_at";

const TRANSACTION_COLUMNS: &str = "id, order_id, store_id, amount, admin_fee, store_earnings, \
    payment_method, status, created_at, updated_at";

const BOOK_COLUMNS: &str = "id, store_id, title, price, stock_quantity";

/// PostgreSQL-backed marketplace store.
///
/// Units of work map onto database transactions. Books and orders read through
/// `lock_*` are held with `SELECT ... FOR UPDATE`.
#[derive(Clone)]
pub struct PostgresMarketplaceStore {
    pool: PgPool,
}

impl PostgresMarketplaceStore {
    /// Creates a new PostgreSQL marketplace store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::debug!("Marketplace migrations applied");
        Ok(())
    }

    /// Adds or replaces a catalog book, registering its store if needed.
    pub async fn insert_book(&self, book: &Book) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO stores (id) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(book.store_id.as_uuid())
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO books (id, store_id, title, price, stock_quantity)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET title = EXCLUDED.title, price = EXCLUDED.price, stock_quantity = EXCLUDED.stock_quantity
            "#,
        )
        .bind(book.id.as_uuid())
        .bind(book.store_id.as_uuid())
        .bind(&book.title)
        .bind(book.price.to_decimal())
        .bind(to_sql_int(book.stock_quantity, "books")?)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Deletes a catalog book. Cart lines holding it go with it; order items
    /// referencing it block the delete.
    pub async fn remove_book(&self, book_id: BookId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(book_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_foreign_key_violation()
                {
                    return StoreError::BookReferenced(book_id);
                }
                StoreError::Database(e)
            })?;
        Ok(result.rows_affected() > 0)
    }

    /// Returns the current stock of a book.
    pub async fn stock_of(&self, book_id: BookId) -> Result<Option<u32>> {
        let stock: Option<i32> =
            sqlx::query_scalar("SELECT stock_quantity FROM books WHERE id = $1")
                .bind(book_id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;
        stock.map(|s| from_sql_int(s, "books")).transpose()
    }
}

#[async_trait]
impl MarketplaceStore for PostgresMarketplaceStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let rows = sqlx::query(&sql)
            .bind(order_id.as_uuid())
            .fetch_all(&mut *conn)
            .await?;
        Ok(with_items(&mut *conn, rows).await?.pop())
    }

    async fn orders_for_customer(&self, customer_id: UserId) -> Result<Vec<Order>> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE customer_id = $1 \
             ORDER BY created_at DESC, seq DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(customer_id.as_uuid())
            .fetch_all(&mut *conn)
            .await?;
        with_items(&mut *conn, rows).await
    }

    async fn orders_for_store(&self, store_id: StoreId) -> Result<Vec<Order>> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE store_id = $1 \
             ORDER BY created_at DESC, seq DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(store_id.as_uuid())
            .fetch_all(&mut *conn)
            .await?;
        with_items(&mut *conn, rows).await
    }

    async fn orders_for_session(&self, session_id: &str) -> Result<Vec<Order>> {
        let mut conn = self.pool.acquire().await?;
        let sql =
            format!("SELECT {ORDER_COLUMNS} FROM orders WHERE payment_session = $1 ORDER BY seq");
        let rows = sqlx::query(&sql)
            .bind(session_id)
            .fetch_all(&mut *conn)
            .await?;
        with_items(&mut *conn, rows).await
    }

    async fn transaction(&self, transaction_id: TransactionId) -> Result<Option<Transaction>> {
        let sql = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1");
        sqlx::query(&sql)
            .bind(transaction_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(|row| row_to_transaction(&row))
            .transpose()
    }

    async fn transaction_for_order(&self, order_id: OrderId) -> Result<Option<Transaction>> {
        let sql = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE order_id = $1");
        sqlx::query(&sql)
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(|row| row_to_transaction(&row))
            .transpose()
    }

    async fn transactions(&self, store_id: Option<StoreId>) -> Result<Vec<Transaction>> {
        let sql = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions \
             WHERE ($1::uuid IS NULL OR store_id = $1) \
             ORDER BY created_at DESC, seq DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(store_id.map(|s| s.as_uuid()))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_transaction).collect()
    }

    async fn book(&self, book_id: BookId) -> Result<Option<Book>> {
        let sql = format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = $1");
        sqlx::query(&sql)
            .bind(book_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(|row| row_to_book(&row))
            .transpose()
    }

    async fn cart(&self, customer_id: UserId) -> Result<Vec<CartLine>> {
        let mut conn = self.pool.acquire().await?;
        cart_lines(&mut *conn, customer_id, false).await
    }
}

struct PgUnitOfWork {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn cart_lines(&mut self, customer_id: UserId) -> Result<Vec<CartLine>> {
        cart_lines(&mut *self.tx, customer_id, true).await
    }

    async fn add_to_cart(
        &mut self,
        customer_id: UserId,
        book: &Book,
        quantity: u32,
    ) -> Result<CartItem> {
        sqlx::query("INSERT INTO carts (customer_id) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(customer_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;

        let row = sqlx::query(
            r#"
            INSERT INTO cart_items (id, customer_id, book_id, quantity, unit_price)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (customer_id, book_id) DO UPDATE
            SET quantity = cart_items.quantity + EXCLUDED.quantity,
                unit_price = EXCLUDED.unit_price
            RETURNING id, book_id, quantity, unit_price
            "#,
        )
        .bind(CartItemId::new().as_uuid())
        .bind(customer_id.as_uuid())
        .bind(book.id.as_uuid())
        .bind(to_sql_int(quantity, "cart_items")?)
        .bind(book.price.to_decimal())
        .fetch_one(&mut *self.tx)
        .await?;

        row_to_cart_item(&row)
    }

    async fn set_cart_quantity(
        &mut self,
        customer_id: UserId,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<bool> {
        let result = if quantity == 0 {
            sqlx::query("DELETE FROM cart_items WHERE id = $1 AND customer_id = $2")
                .bind(item_id.as_uuid())
                .bind(customer_id.as_uuid())
                .execute(&mut *self.tx)
                .await?
        } else {
            sqlx::query("UPDATE cart_items SET quantity = $3 WHERE id = $1 AND customer_id = $2")
                .bind(item_id.as_uuid())
                .bind(customer_id.as_uuid())
                .bind(to_sql_int(quantity, "cart_items")?)
                .execute(&mut *self.tx)
                .await?
        };
        Ok(result.rows_affected() > 0)
    }

    async fn remove_cart_items(
        &mut self,
        customer_id: UserId,
        item_ids: &[CartItemId],
    ) -> Result<u64> {
        let ids: Vec<Uuid> = item_ids.iter().map(|id| id.as_uuid()).collect();
        let result = sqlx::query("DELETE FROM cart_items WHERE customer_id = $1 AND id = ANY($2)")
            .bind(customer_id.as_uuid())
            .bind(&ids)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn clear_cart(&mut self, customer_id: UserId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cart_items WHERE customer_id = $1")
            .bind(customer_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn lock_book(&mut self, book_id: BookId) -> Result<Option<Book>> {
        let sql = format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = $1 FOR UPDATE");
        sqlx::query(&sql)
            .bind(book_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?
            .map(|row| row_to_book(&row))
            .transpose()
    }

    async fn take_stock(&mut self, book_id: BookId, quantity: u32) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE books SET stock_quantity = stock_quantity - $2 \
             WHERE id = $1 AND stock_quantity >= $2",
        )
        .bind(book_id.as_uuid())
        .bind(to_sql_int(quantity, "books")?)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn restore_stock(&mut self, book_id: BookId, quantity: u32) -> Result<()> {
        let result =
            sqlx::query("UPDATE books SET stock_quantity = stock_quantity + $2 WHERE id = $1")
                .bind(book_id.as_uuid())
                .bind(to_sql_int(quantity, "books")?)
                .execute(&mut *self.tx)
                .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::corrupt(
                "books",
                format!("book {book_id} is missing"),
            ));
        }
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, customer_id, store_id, total_price, order_status,
                                payment_method, payment_status, address, phone,
                                payment_session, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.customer_id.as_uuid())
        .bind(order.store_id.as_uuid())
        .bind(order.total_price.to_decimal())
        .bind(order.status.as_str())
        .bind(order.payment_method.as_str())
        .bind(order.payment_status.as_str())
        .bind(&order.shipping.address)
        .bind(&order.shipping.phone)
        .bind(order.payment_session.as_deref())
        .bind(order.created_at)
        .execute(&mut *self.tx)
        .await?;

        for (line_no, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, line_no, book_id, quantity, unit_price)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(order.id.as_uuid())
            .bind(line_no as i32)
            .bind(item.book_id.as_uuid())
            .bind(to_sql_int(item.quantity, "order_items")?)
            .bind(item.unit_price.to_decimal())
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    async fn insert_transaction(&mut self, transaction: &Transaction) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions (id, order_id, store_id, amount, admin_fee, store_earnings,
                                      payment_method, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(transaction.id.as_uuid())
        .bind(transaction.order_id.as_uuid())
        .bind(transaction.store_id.as_uuid())
        .bind(transaction.amount.to_decimal())
        .bind(transaction.admin_fee.to_decimal())
        .bind(transaction.store_earnings.to_decimal())
        .bind(transaction.payment_method.as_str())
        .bind(transaction.status.as_str())
        .bind(transaction.created_at)
        .bind(transaction.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn lock_order(&mut self, order_id: OrderId) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE");
        let rows = sqlx::query(&sql)
            .bind(order_id.as_uuid())
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(with_items(&mut *self.tx, rows).await?.pop())
    }

    async fn lock_orders_for_session(&mut self, session_id: &str) -> Result<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE payment_session = $1 ORDER BY seq FOR UPDATE"
        );
        let rows = sqlx::query(&sql)
            .bind(session_id)
            .fetch_all(&mut *self.tx)
            .await?;
        with_items(&mut *self.tx, rows).await
    }

    async fn update_order(&mut self, order: &Order, expected: OrderStatus) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET order_status = $2, payment_status = $3, payment_session = $4
            WHERE id = $1 AND order_status = $5
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.payment_session.as_deref())
        .bind(expected.as_str())
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn update_transaction_status(
        &mut self,
        order_id: OrderId,
        status: TransactionStatus,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let result =
            sqlx::query("UPDATE transactions SET status = $2, updated_at = $3 WHERE order_id = $1")
                .bind(order_id.as_uuid())
                .bind(status.as_str())
                .bind(now)
                .execute(&mut *self.tx)
                .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::corrupt(
                "transactions",
                format!("order {order_id} has no transaction"),
            ));
        }
        Ok(())
    }

    async fn site_config(&mut self) -> Result<SiteConfig> {
        site_config(&mut *self.tx, false).await
    }

    async fn lock_site_config(&mut self) -> Result<SiteConfig> {
        site_config(&mut *self.tx, true).await
    }

    async fn save_site_config(&mut self, config: &SiteConfig) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO site_config (id, admin_fee_percentage, updated_at)
            VALUES (1, $1, $2)
            ON CONFLICT (id) DO UPDATE
            SET admin_fee_percentage = EXCLUDED.admin_fee_percentage,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(config.admin_fee_percentage.to_decimal())
        .bind(config.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

/// Reads the singleton configuration row, inserting the default first if it
/// is missing. Only `lock` readers block each other.
async fn site_config(conn: &mut PgConnection, lock: bool) -> Result<SiteConfig> {
    let sql = format!(
        "SELECT admin_fee_percentage, updated_at FROM site_config WHERE id = 1{}",
        if lock { " FOR UPDATE" } else { "" }
    );

    let row = match sqlx::query(&sql).fetch_optional(&mut *conn).await? {
        Some(row) => row,
        None => {
            sqlx::query("INSERT INTO site_config (id) VALUES (1) ON CONFLICT DO NOTHING")
                .execute(&mut *conn)
                .await?;
            sqlx::query(&sql).fetch_one(&mut *conn).await?
        }
    };

    let percentage: Decimal = row.try_get("admin_fee_percentage")?;
    Ok(SiteConfig {
        admin_fee_percentage: FeePercentage::new(percentage)
            .map_err(|e| StoreError::corrupt("site_config", e.to_string()))?,
        updated_at: row.try_get("updated_at")?,
    })
}

async fn cart_lines(
    conn: &mut PgConnection,
    customer_id: UserId,
    lock: bool,
) -> Result<Vec<CartLine>> {
    let sql = format!(
        "SELECT ci.id, ci.book_id, ci.quantity, ci.unit_price, b.store_id \
         FROM cart_items ci JOIN books b ON b.id = ci.book_id \
         WHERE ci.customer_id = $1 ORDER BY ci.position{}",
        if lock { " FOR UPDATE OF ci" } else { "" }
    );
    let rows = sqlx::query(&sql)
        .bind(customer_id.as_uuid())
        .fetch_all(&mut *conn)
        .await?;

    rows.iter()
        .map(|row| {
            Ok(CartLine {
                item: row_to_cart_item(row)?,
                store_id: StoreId::from_uuid(row.try_get("store_id")?),
            })
        })
        .collect()
}

/// Maps order rows and loads their items in one query, preserving row order.
async fn with_items(conn: &mut PgConnection, rows: Vec<PgRow>) -> Result<Vec<Order>> {
    let mut orders = rows.iter().map(row_to_order).collect::<Result<Vec<_>>>()?;
    if orders.is_empty() {
        return Ok(orders);
    }

    let ids: Vec<Uuid> = orders.iter().map(|o| o.id.as_uuid()).collect();
    let item_rows = sqlx::query(
        r#"
        SELECT order_id, book_id, quantity, unit_price
        FROM order_items
        WHERE order_id = ANY($1)
        ORDER BY order_id, line_no
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut items: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for row in &item_rows {
        let order_id: Uuid = row.try_get("order_id")?;
        items.entry(order_id).or_default().push(OrderItem {
            book_id: BookId::from_uuid(row.try_get("book_id")?),
            quantity: from_sql_int(row.try_get("quantity")?, "order_items")?,
            unit_price: money(row, "unit_price", "order_items")?,
        });
    }

    for order in &mut orders {
        order.items = items.remove(&order.id.as_uuid()).unwrap_or_default();
    }
    Ok(orders)
}

fn row_to_order(row: &PgRow) -> Result<Order> {
    let shipping = ShippingInfo::new(
        Some(row.try_get::<String, _>("address")?),
        Some(row.try_get::<String, _>("phone")?),
    )
    .map_err(|e| StoreError::corrupt("orders", e.to_string()))?;

    Ok(Order {
        id: OrderId::from_uuid(row.try_get("id")?),
        customer_id: UserId::from_uuid(row.try_get("customer_id")?),
        store_id: StoreId::from_uuid(row.try_get("store_id")?),
        total_price: money(row, "total_price", "orders")?,
        status: parse(row, "order_status", "orders")?,
        payment_method: parse(row, "payment_method", "orders")?,
        payment_status: parse(row, "payment_status", "orders")?,
        shipping,
        payment_session: row.try_get("payment_session")?,
        created_at: row.try_get("created_at")?,
        items: Vec::new(),
    })
}

fn row_to_transaction(row: &PgRow) -> Result<Transaction> {
    Ok(Transaction {
        id: TransactionId::from_uuid(row.try_get("id")?),
        order_id: OrderId::from_uuid(row.try_get("order_id")?),
        store_id: StoreId::from_uuid(row.try_get("store_id")?),
        amount: money(row, "amount", "transactions")?,
        admin_fee: money(row, "admin_fee", "transactions")?,
        store_earnings: money(row, "store_earnings", "transactions")?,
        payment_method: parse(row, "payment_method", "transactions")?,
        status: parse(row, "status", "transactions")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_book(row: &PgRow) -> Result<Book> {
    Ok(Book {
        id: BookId::from_uuid(row.try_get("id")?),
        store_id: StoreId::from_uuid(row.try_get("store_id")?),
        title: row.try_get("title")?,
        price: money(row, "price", "books")?,
        stock_quantity: from_sql_int(row.try_get("stock_quantity")?, "books")?,
    })
}

fn row_to_cart_item(row: &PgRow) -> Result<CartItem> {
    Ok(CartItem {
        id: CartItemId::from_uuid(row.try_get("id")?),
        book_id: BookId::from_uuid(row.try_get("book_id")?),
        quantity: from_sql_int(row.try_get("quantity")?, "cart_items")?,
        unit_price: money(row, "unit_price", "cart_items")?,
    })
}

fn money(row: &PgRow, column: &str, table: &'static str) -> Result<Money> {
    let value: Decimal = row.try_get(column)?;
    Money::from_decimal(value)
        .ok_or_else(|| StoreError::corrupt(table, format!("{column} = {value} is out of range")))
}

fn parse<T>(row: &PgRow, column: &str, table: &'static str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let value: String = row.try_get(column)?;
    value
        .parse()
        .map_err(|e: T::Err| StoreError::corrupt(table, format!("{column}: {e}")))
}

fn from_sql_int(value: i32, table: &'static str) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::corrupt(table, format!("negative count {value}")))
}

fn to_sql_int(value: u32, table: &'static str) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| StoreError::corrupt(table, format!("count {value} exceeds column range")))
}
