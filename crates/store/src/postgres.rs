use async_trait::async_trait;
use common::{
    Money, OrderId, OrderStatus, PaymentMethod, PaymentStatus, ProductId, TransactionId,
    TransactionType, UserId,
};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow, types::Json};
use uuid::Uuid;

use crate::{
    CustomerInfo, LineItemRecord, MethodRevenue, OrderDetails, OrderLine, OrderQuery,
    OrderRecord, ProductRecord, Result, StockCounts, StockFilter, StockOrder, StockQuery,
    StockStats, StoreError, TransactionDetails, TransactionQuery, TransactionRecord,
    TransactionStats,
    store::{Store, StoreTx},
};

const ORDER_DETAILS_SELECT: &str = r#"
    SELECT o.order_id, o.order_number, o.customer_fullname, o.customer_email,
           o.customer_phone, o.shipping_address,
           o.status::text AS status, o.payment_status::text AS payment_status,
           o.method_of_payment::text AS method_of_payment,
           o.total_amount, o.notes, o.placed_at, o.delivered_at, o.updated_at,
           COALESCE(
               jsonb_agg(
                   jsonb_build_object(
                       'product', jsonb_build_object(
                           'productId', p.product_id,
                           'name', p.name,
                           'price', p.selling_price,
                           'images', to_jsonb(p.images)
                       ),
                       'unitPrice', oi.unit_price,
                       'quantity', oi.quantity,
                       'subtotal', oi.subtotal
                   ) ORDER BY oi.position
               ) FILTER (WHERE oi.order_item_id IS NOT NULL),
               '[]'::jsonb
           ) AS items
    FROM orders o
    LEFT JOIN order_items oi ON oi.order_id = o.order_id
    LEFT JOIN products p ON p.product_id = oi.product_id
"#;

const ORDER_HEADER_SELECT: &str = r#"
    SELECT order_id, order_number, customer_fullname, customer_email,
           customer_phone, shipping_address,
           status::text AS status, payment_status::text AS payment_status,
           method_of_payment::text AS method_of_payment,
           total_amount, notes, placed_at, delivered_at, updated_at
    FROM orders
"#;

const PRODUCT_SELECT: &str = r#"
    SELECT product_id, name, slug, stock, low_stock_threshold, total_sold,
           selling_price, buying_price, images, status, created_at, updated_at
    FROM products
"#;

const TRANSACTION_SELECT: &str = r#"
    SELECT t.transaction_id, t.transaction_number, t.order_id,
           t.customer_fullname, t.customer_email, t.customer_phone,
           t.method_of_payment::text AS method_of_payment,
           t.transaction_type::text AS transaction_type,
           t.payment_status::text AS payment_status,
           t.total_amount, t.refund_of, t.reconciled, t.reconciled_by, t.reconciled_at,
           t.created_at, t.updated_at,
           d.transaction_details_id,
           d.method_of_payment::text AS details_method,
           d.total_amount_received, d.received_by, d.notes
    FROM transactions t
    JOIN transaction_details d ON d.transaction_details_id = t.transaction_details_id
"#;

/// Maps driver errors onto the store taxonomy. Serialization failures and
/// deadlocks become retryable conflicts.
fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err {
        match db_err.code().as_deref() {
            Some("40001") | Some("40P01") => {
                metrics::counter!("store_conflicts_total").increment(1);
                tracing::warn!(code = ?db_err.code(), "transaction aborted by concurrent writer");
                return StoreError::Conflict(db_err.message().to_string());
            }
            Some("23503") => {
                let entity = match db_err.constraint() {
                    Some("order_items_product_fk") => "product",
                    Some("order_items_order_fk") | Some("transactions_order_fk") => "order",
                    _ => "row",
                };
                return StoreError::MissingReference {
                    entity,
                    detail: db_err.message().to_string(),
                };
            }
            Some("23514") => {
                return StoreError::ConstraintViolation(
                    db_err
                        .constraint()
                        .unwrap_or_else(|| db_err.message())
                        .to_string(),
                );
            }
            _ => {}
        }
    }
    StoreError::Database(err)
}

fn quantity_from(value: i64) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| StoreError::ConstraintViolation("order_items_quantity_check".to_string()))
}

fn row_to_order(row: &PgRow) -> Result<OrderRecord> {
    Ok(OrderRecord {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        order_number: row.try_get("order_number")?,
        customer: CustomerInfo {
            name: row.try_get("customer_fullname")?,
            email: row.try_get("customer_email")?,
            phone: row.try_get("customer_phone")?,
            address: row.try_get("shipping_address")?,
        },
        status: row.try_get::<String, _>("status")?.parse::<OrderStatus>()?,
        payment_status: row
            .try_get::<String, _>("payment_status")?
            .parse::<PaymentStatus>()?,
        payment_method: row
            .try_get::<String, _>("method_of_payment")?
            .parse::<PaymentMethod>()?,
        total_amount: Money::from_cents(row.try_get("total_amount")?),
        notes: row.try_get("notes")?,
        placed_at: row.try_get("placed_at")?,
        delivered_at: row.try_get("delivered_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_details(row: &PgRow) -> Result<OrderDetails> {
    let Json(items) = row.try_get::<Json<Vec<OrderLine>>, _>("items")?;
    Ok(OrderDetails {
        order: row_to_order(row)?,
        items,
    })
}

fn row_to_product(row: &PgRow) -> Result<ProductRecord> {
    Ok(ProductRecord {
        id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        stock: row.try_get("stock")?,
        low_stock_threshold: row.try_get("low_stock_threshold")?,
        total_sold: row.try_get("total_sold")?,
        selling_price: Money::from_cents(row.try_get("selling_price")?),
        buying_price: Money::from_cents(row.try_get("buying_price")?),
        images: row.try_get("images")?,
        status: row.try_get("status")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_transaction(row: &PgRow) -> Result<TransactionRecord> {
    Ok(TransactionRecord {
        id: TransactionId::from_uuid(row.try_get::<Uuid, _>("transaction_id")?),
        transaction_number: row.try_get("transaction_number")?,
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        customer_name: row.try_get("customer_fullname")?,
        customer_email: row.try_get("customer_email")?,
        customer_phone: row.try_get("customer_phone")?,
        method: row
            .try_get::<String, _>("method_of_payment")?
            .parse::<PaymentMethod>()?,
        transaction_type: row
            .try_get::<String, _>("transaction_type")?
            .parse::<TransactionType>()?,
        payment_status: row
            .try_get::<String, _>("payment_status")?
            .parse::<PaymentStatus>()?,
        amount: Money::from_cents(row.try_get("total_amount")?),
        refund_of: row
            .try_get::<Option<Uuid>, _>("refund_of")?
            .map(TransactionId::from_uuid),
        details: TransactionDetails {
            id: row.try_get("transaction_details_id")?,
            method: row
                .try_get::<String, _>("details_method")?
                .parse::<PaymentMethod>()?,
            amount_received: row
                .try_get::<Option<i64>, _>("total_amount_received")?
                .map(Money::from_cents),
            received_by: row.try_get("received_by")?,
            notes: row.try_get("notes")?,
        },
        reconciled: row.try_get("reconciled")?,
        reconciled_by: row
            .try_get::<Option<Uuid>, _>("reconciled_by")?
            .map(UserId::from_uuid),
        reconciled_at: row.try_get("reconciled_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
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
        Ok(())
    }

    /// Inserts or replaces a catalogue product.
    pub async fn insert_product(&self, product: &ProductRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (product_id, name, slug, stock, low_stock_threshold, total_sold,
                                  selling_price, buying_price, images, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (product_id) DO UPDATE
            SET name = EXCLUDED.name, stock = EXCLUDED.stock,
                low_stock_threshold = EXCLUDED.low_stock_threshold,
                total_sold = EXCLUDED.total_sold, selling_price = EXCLUDED.selling_price,
                buying_price = EXCLUDED.buying_price, images = EXCLUDED.images,
                status = EXCLUDED.status, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.slug)
        .bind(product.stock)
        .bind(product.low_stock_threshold)
        .bind(product.total_sold)
        .bind(product.selling_price.cents())
        .bind(product.buying_price.cents())
        .bind(&product.images)
        .bind(&product.status)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn method_revenue(&self) -> Result<Vec<MethodRevenue>> {
        let rows = sqlx::query(
            r#"
            SELECT method_of_payment::text AS method, SUM(total_amount)::BIGINT AS revenue
            FROM transactions
            WHERE transaction_type = 'order_payment' AND payment_status = 'paid'
            GROUP BY method_of_payment
            ORDER BY method_of_payment::text
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;

        rows.iter()
            .map(|row| -> Result<MethodRevenue> {
                Ok(MethodRevenue {
                    method: row.try_get::<String, _>("method")?.parse()?,
                    revenue: Money::from_cents(row.try_get("revenue")?),
                })
            })
            .collect()
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await.map_err(classify)?;
        Ok(Box::new(PostgresTx { tx }))
    }

    async fn order_details(&self, id: OrderId) -> Result<Option<OrderDetails>> {
        let sql = format!("{ORDER_DETAILS_SELECT} WHERE o.order_id = $1 GROUP BY o.order_id");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?;
        row.as_ref().map(row_to_details).transpose()
    }

    async fn list_orders(&self, query: &OrderQuery) -> Result<Vec<OrderDetails>> {
        let sql = format!(
            "{ORDER_DETAILS_SELECT}
             WHERE ($1::text IS NULL OR o.status = $1::order_status_enum)
               AND ($2::text IS NULL OR lower(o.customer_email) = lower($2))
             GROUP BY o.order_id
             ORDER BY o.placed_at DESC
             LIMIT $3 OFFSET $4"
        );
        let rows = sqlx::query(&sql)
            .bind(query.status.map(|s| s.as_str()))
            .bind(query.customer_email.as_deref())
            .bind(query.limit as i64)
            .bind(query.offset as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;
        rows.iter().map(row_to_details).collect()
    }

    async fn product(&self, id: ProductId) -> Result<Option<ProductRecord>> {
        let sql = format!("{PRODUCT_SELECT} WHERE product_id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?;
        row.as_ref().map(row_to_product).transpose()
    }

    async fn list_stock(&self, query: &StockQuery) -> Result<Vec<ProductRecord>> {
        let filter = match query.filter {
            None => "TRUE",
            Some(StockFilter::InStock) => "stock > low_stock_threshold",
            Some(StockFilter::LowStock) => "stock > 0 AND stock <= low_stock_threshold",
            Some(StockFilter::OutOfStock) => "stock = 0",
            Some(StockFilter::Selling) => "total_sold > 0",
        };
        let order = match query.order {
            StockOrder::Name => "name ASC",
            StockOrder::StockAscending => "stock ASC, name ASC",
            StockOrder::RecentlyUpdated => "updated_at DESC",
            StockOrder::TopSelling => "total_sold DESC, name ASC",
        };
        let sql = format!(
            "{PRODUCT_SELECT}
             WHERE status <> 'deleted'
               AND ($1::text IS NULL OR name ILIKE '%' || $1 || '%')
               AND {filter}
             ORDER BY {order}
             LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query(&sql)
            .bind(query.search.as_deref())
            .bind(query.limit as i64)
            .bind(query.offset as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;
        rows.iter().map(row_to_product).collect()
    }

    async fn stock_stats(&self) -> Result<StockStats> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total_products,
                   COUNT(*) FILTER (WHERE stock = 0) AS out_of_stock,
                   COUNT(*) FILTER (WHERE stock > 0 AND stock <= low_stock_threshold) AS low_stock,
                   COUNT(*) FILTER (WHERE stock > low_stock_threshold) AS healthy_stock,
                   COALESCE(SUM(stock), 0)::BIGINT AS total_units
            FROM products
            WHERE status <> 'deleted'
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(classify)?;

        let total_products: i64 = row.try_get("total_products")?;
        let total_units: i64 = row.try_get("total_units")?;
        Ok(StockStats {
            total_products,
            out_of_stock: row.try_get("out_of_stock")?,
            low_stock: row.try_get("low_stock")?,
            healthy_stock: row.try_get("healthy_stock")?,
            total_units,
            average_units: if total_products > 0 {
                total_units as f64 / total_products as f64
            } else {
                0.0
            },
        })
    }

    async fn transaction(&self, id: TransactionId) -> Result<Option<TransactionRecord>> {
        let sql = format!("{TRANSACTION_SELECT} WHERE t.transaction_id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?;
        row.as_ref().map(row_to_transaction).transpose()
    }

    async fn transactions_for_order(&self, order_id: OrderId) -> Result<Vec<TransactionRecord>> {
        let sql = format!("{TRANSACTION_SELECT} WHERE t.order_id = $1 ORDER BY t.created_at DESC");
        let rows = sqlx::query(&sql)
            .bind(order_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;
        rows.iter().map(row_to_transaction).collect()
    }

    async fn list_transactions(&self, query: &TransactionQuery) -> Result<Vec<TransactionRecord>> {
        let sql = format!(
            "{TRANSACTION_SELECT}
             WHERE ($1::text IS NULL OR t.payment_status = $1::payment_status_enum)
               AND ($2::text IS NULL OR t.transaction_type = $2::transaction_type_enum)
               AND ($3::text IS NULL OR t.method_of_payment = $3::method_of_payment_enum)
             ORDER BY t.created_at DESC
             LIMIT $4 OFFSET $5"
        );
        let rows = sqlx::query(&sql)
            .bind(query.status.map(|s| s.as_str()))
            .bind(query.transaction_type.map(|t| t.as_str()))
            .bind(query.method.map(|m| m.as_str()))
            .bind(query.limit as i64)
            .bind(query.offset as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;
        rows.iter().map(row_to_transaction).collect()
    }

    async fn transaction_stats(&self) -> Result<TransactionStats> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE payment_status = 'paid') AS paid,
                   COUNT(*) FILTER (WHERE payment_status = 'pending') AS pending,
                   COUNT(*) FILTER (WHERE payment_status = 'failed') AS failed,
                   COUNT(*) FILTER (WHERE payment_status = 'refunded') AS refunded,
                   COUNT(*) FILTER (WHERE reconciled) AS reconciled,
                   COUNT(*) FILTER (
                       WHERE transaction_type = 'order_payment' AND payment_status = 'paid'
                   ) AS paid_payments,
                   COALESCE(SUM(total_amount) FILTER (
                       WHERE transaction_type = 'order_payment' AND payment_status = 'paid'
                   ), 0)::BIGINT AS total_revenue,
                   COALESCE(SUM(ABS(total_amount)) FILTER (
                       WHERE transaction_type = 'order_refund'
                   ), 0)::BIGINT AS total_refunds
            FROM transactions
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(classify)?;

        let paid_payments: i64 = row.try_get("paid_payments")?;
        let total_revenue: i64 = row.try_get("total_revenue")?;
        Ok(TransactionStats {
            total: row.try_get("total")?,
            paid: row.try_get("paid")?,
            pending: row.try_get("pending")?,
            failed: row.try_get("failed")?,
            refunded: row.try_get("refunded")?,
            reconciled: row.try_get("reconciled")?,
            total_revenue: Money::from_cents(total_revenue),
            revenue_by_method: self.method_revenue().await?,
            total_refunds: Money::from_cents(row.try_get("total_refunds")?),
            average_order_value: if paid_payments > 0 {
                Money::from_cents(total_revenue / paid_payments)
            } else {
                Money::zero()
            },
        })
    }
}

/// A PostgreSQL transaction. Dropping it without commit rolls back.
pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PostgresTx {
    async fn insert_order(&mut self, order: &OrderRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (order_id, order_number, customer_fullname, customer_email,
                                customer_phone, shipping_address, status, payment_status,
                                method_of_payment, total_amount, notes, placed_at,
                                delivered_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7::order_status_enum, $8::payment_status_enum,
                    $9::method_of_payment_enum, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(&order.order_number)
        .bind(&order.customer.name)
        .bind(&order.customer.email)
        .bind(&order.customer.phone)
        .bind(&order.customer.address)
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.payment_method.as_str())
        .bind(order.total_amount.cents())
        .bind(&order.notes)
        .bind(order.placed_at)
        .bind(order.delivered_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn insert_line_item(&mut self, order_id: OrderId, item: &LineItemRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, product_id, position, quantity, unit_price, subtotal)
            VALUES ($1, $2,
                    (SELECT COALESCE(MAX(position), 0) + 1 FROM order_items WHERE order_id = $1),
                    $3, $4, $5)
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(item.product_id.as_uuid())
        .bind(i64::from(item.quantity))
        .bind(item.unit_price.cents())
        .bind(item.subtotal.cents())
        .execute(&mut *self.tx)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<OrderRecord>> {
        let sql = format!("{ORDER_HEADER_SELECT} WHERE order_id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(classify)?;
        row.as_ref().map(row_to_order).transpose()
    }

    async fn update_order(&mut self, order: &OrderRecord) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE orders
            SET status = $2::order_status_enum,
                payment_status = $3::payment_status_enum,
                notes = $4,
                delivered_at = $5,
                updated_at = $6
            WHERE order_id = $1
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(&order.notes)
        .bind(order.delivered_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn line_items(&mut self, order_id: OrderId) -> Result<Vec<LineItemRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, quantity, unit_price, subtotal
            FROM order_items
            WHERE order_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(classify)?;

        rows.iter()
            .map(|row| -> Result<LineItemRecord> {
                Ok(LineItemRecord {
                    product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
                    quantity: quantity_from(row.try_get("quantity")?)?,
                    unit_price: Money::from_cents(row.try_get("unit_price")?),
                    subtotal: Money::from_cents(row.try_get("subtotal")?),
                })
            })
            .collect()
    }

    async fn lock_stock(&mut self, product_id: ProductId) -> Result<Option<StockCounts>> {
        let row = sqlx::query(
            "SELECT stock, total_sold FROM products WHERE product_id = $1 FOR UPDATE",
        )
        .bind(product_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(classify)?;

        row.map(|row| -> Result<StockCounts> {
            Ok(StockCounts {
                stock: row.try_get("stock")?,
                total_sold: row.try_get("total_sold")?,
            })
        })
        .transpose()
    }

    async fn decrement_stock(&mut self, product_id: ProductId, quantity: u32) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock = stock - $2, total_sold = total_sold + $2, updated_at = NOW()
            WHERE product_id = $1 AND stock >= $2
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(i64::from(quantity))
        .execute(&mut *self.tx)
        .await
        .map_err(classify)?;
        Ok(result.rows_affected() == 1)
    }

    async fn restore_stock(&mut self, product_id: ProductId, quantity: u32) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock = stock + $2, total_sold = GREATEST(total_sold - $2, 0), updated_at = NOW()
            WHERE product_id = $1
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(i64::from(quantity))
        .execute(&mut *self.tx)
        .await
        .map_err(classify)?;
        Ok(result.rows_affected() == 1)
    }

    async fn set_stock(&mut self, product_id: ProductId, stock: i64) -> Result<()> {
        sqlx::query("UPDATE products SET stock = $2, updated_at = NOW() WHERE product_id = $1")
            .bind(product_id.as_uuid())
            .bind(stock)
            .execute(&mut *self.tx)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn insert_transaction(&mut self, record: &TransactionRecord) -> Result<()> {
        let details = &record.details;
        sqlx::query(
            r#"
            INSERT INTO transaction_details (transaction_details_id, method_of_payment,
                                             total_amount_received, received_by, notes,
                                             created_at, updated_at)
            VALUES ($1, $2::method_of_payment_enum, $3, $4, $5, $6, $6)
            "#,
        )
        .bind(details.id)
        .bind(details.method.as_str())
        .bind(details.amount_received.map(|m| m.cents()))
        .bind(&details.received_by)
        .bind(&details.notes)
        .bind(record.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(classify)?;

        sqlx::query(
            r#"
            INSERT INTO transactions (transaction_id, transaction_number, transaction_details_id,
                                      order_id, customer_fullname, customer_email, customer_phone,
                                      method_of_payment, transaction_type, payment_status,
                                      total_amount, refund_of, reconciled, reconciled_by,
                                      reconciled_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8::method_of_payment_enum,
                    $9::transaction_type_enum, $10::payment_status_enum,
                    $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(&record.transaction_number)
        .bind(details.id)
        .bind(record.order_id.as_uuid())
        .bind(&record.customer_name)
        .bind(&record.customer_email)
        .bind(&record.customer_phone)
        .bind(record.method.as_str())
        .bind(record.transaction_type.as_str())
        .bind(record.payment_status.as_str())
        .bind(record.amount.cents())
        .bind(record.refund_of.map(|t| t.as_uuid()))
        .bind(record.reconciled)
        .bind(record.reconciled_by.map(|u| u.as_uuid()))
        .bind(record.reconciled_at)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn lock_transaction(&mut self, id: TransactionId) -> Result<Option<TransactionRecord>> {
        let sql = format!("{TRANSACTION_SELECT} WHERE t.transaction_id = $1 FOR UPDATE OF t");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(classify)?;
        row.as_ref().map(row_to_transaction).transpose()
    }

    async fn update_reconciliation(&mut self, record: &TransactionRecord) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE transactions
            SET reconciled = $2, reconciled_by = $3, reconciled_at = $4,
                payment_status = $5::payment_status_enum, updated_at = $6
            WHERE transaction_id = $1
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.reconciled)
        .bind(record.reconciled_by.map(|u| u.as_uuid()))
        .bind(record.reconciled_at)
        .bind(record.payment_status.as_str())
        .bind(record.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(classify)?;

        sqlx::query(
            "UPDATE transaction_details SET notes = $2, updated_at = $3 WHERE transaction_details_id = $1",
        )
        .bind(record.details.id)
        .bind(&record.details.notes)
        .bind(record.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn refunded_total(&mut self, original: TransactionId) -> Result<Money> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(ABS(total_amount)), 0)::BIGINT
            FROM transactions
            WHERE refund_of = $1 AND transaction_type = 'order_refund'
            "#,
        )
        .bind(original.as_uuid())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(classify)?;
        Ok(Money::from_cents(total))
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.map_err(classify)
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await.map_err(classify)
    }
}
