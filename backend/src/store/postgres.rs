//! PostgreSQL store
//!
//! A unit of work is one database transaction. Ledger rows are serialized per
//! key with a transaction-scoped advisory lock followed by `SELECT ... FOR
//! UPDATE`, so a first receipt for a product cannot race another one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{types::Json, FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{InventoryStore, UnitOfWork};
use crate::error::{AppError, AppResult};
use crate::models::{
    AuditEntry, CompanyDetails, ConsumedProduct, DomainEventKind, IssuedCode, LedgerKey,
    LedgerToggle, LineStatus, MovementStatus, MovementType, NewAuditEntry, NewOutboxEvent,
    NewReceiptHeader, NewReceiptLine, OutboxEvent, ProductInfo, ReceiptFilter, ReceiptHeader,
    ReceiptLine, ReceiptStatus, ShopDetails, StockDirection, StockLedgerEntry, StockMovement,
    SupplierDetails, GRN_TRANSACTION_TYPE,
};

const LEDGER_COLUMNS: &str = "company_id, shop_id, category_id, product_id, total_quantity, \
    weighted_average_cost, last_purchase_cost, minimum_quantity, supplier_ids, toggle, \
    created_by, version, created_at, updated_at";

const HEADER_COLUMNS: &str = "id, transaction_code, company_id, shop_id, supplier_id, \
    transaction_date_time, transaction_type, direction, status, total_cost, \
    outstanding_amount, created_by, created_at, updated_at";

const LINE_COLUMNS: &str = "id, transaction_code, company_id, shop_id, supplier_id, category_id, \
    product_id, unit_cost, quantity, total_cost, direction, status, transaction_date_time, \
    created_by, remarks, created_at, updated_at";

const MOVEMENT_COLUMNS: &str = "id, company_id, shop_id, transaction_code, movement_type, \
    direction, status, product_id, product_quantity, consumed, transaction_date_time, created_by";

// ============================================================================
// Row types
// ============================================================================

fn corrupt(column: &str, value: &str) -> AppError {
    AppError::Internal(format!("Unexpected {} value '{}' in database", column, value))
}

fn direction(value: &str) -> AppResult<StockDirection> {
    StockDirection::parse(value).ok_or_else(|| corrupt("direction", value))
}

#[derive(Debug, FromRow)]
struct LedgerRow {
    company_id: String,
    shop_id: String,
    category_id: String,
    product_id: String,
    total_quantity: Decimal,
    weighted_average_cost: Decimal,
    last_purchase_cost: Decimal,
    minimum_quantity: Decimal,
    supplier_ids: Vec<String>,
    toggle: String,
    created_by: String,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<LedgerRow> for StockLedgerEntry {
    type Error = AppError;

    fn try_from(row: LedgerRow) -> AppResult<Self> {
        Ok(Self {
            toggle: LedgerToggle::parse(&row.toggle).ok_or_else(|| corrupt("toggle", &row.toggle))?,
            company_id: row.company_id,
            shop_id: row.shop_id,
            category_id: row.category_id,
            product_id: row.product_id,
            total_quantity: row.total_quantity,
            weighted_average_cost: row.weighted_average_cost,
            last_purchase_cost: row.last_purchase_cost,
            minimum_quantity: row.minimum_quantity,
            supplier_ids: row.supplier_ids,
            created_by: row.created_by,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct HeaderRow {
    id: i64,
    transaction_code: String,
    company_id: String,
    shop_id: String,
    supplier_id: String,
    transaction_date_time: DateTime<Utc>,
    transaction_type: String,
    direction: String,
    status: String,
    total_cost: Decimal,
    outstanding_amount: Decimal,
    created_by: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<HeaderRow> for ReceiptHeader {
    type Error = AppError;

    fn try_from(row: HeaderRow) -> AppResult<Self> {
        Ok(Self {
            direction: direction(&row.direction)?,
            status: ReceiptStatus::parse(&row.status).ok_or_else(|| corrupt("status", &row.status))?,
            id: row.id,
            transaction_code: row.transaction_code,
            company_id: row.company_id,
            shop_id: row.shop_id,
            supplier_id: row.supplier_id,
            transaction_date_time: row.transaction_date_time,
            transaction_type: row.transaction_type,
            total_cost: row.total_cost,
            outstanding_amount: row.outstanding_amount,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct LineRow {
    id: i64,
    transaction_code: String,
    company_id: String,
    shop_id: String,
    supplier_id: String,
    category_id: String,
    product_id: String,
    unit_cost: Decimal,
    quantity: Decimal,
    total_cost: Decimal,
    direction: String,
    status: String,
    transaction_date_time: DateTime<Utc>,
    created_by: String,
    remarks: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<LineRow> for ReceiptLine {
    type Error = AppError;

    fn try_from(row: LineRow) -> AppResult<Self> {
        Ok(Self {
            direction: direction(&row.direction)?,
            status: LineStatus::parse(&row.status).ok_or_else(|| corrupt("status", &row.status))?,
            id: row.id,
            transaction_code: row.transaction_code,
            company_id: row.company_id,
            shop_id: row.shop_id,
            supplier_id: row.supplier_id,
            category_id: row.category_id,
            product_id: row.product_id,
            unit_cost: row.unit_cost,
            quantity: row.quantity,
            total_cost: row.total_cost,
            transaction_date_time: row.transaction_date_time,
            created_by: row.created_by,
            remarks: row.remarks,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct MovementRow {
    id: i64,
    company_id: String,
    shop_id: String,
    transaction_code: String,
    movement_type: String,
    direction: String,
    status: String,
    product_id: Option<String>,
    product_quantity: Decimal,
    consumed: Json<Vec<ConsumedProduct>>,
    transaction_date_time: DateTime<Utc>,
    created_by: String,
}

impl TryFrom<MovementRow> for StockMovement {
    type Error = AppError;

    fn try_from(row: MovementRow) -> AppResult<Self> {
        Ok(Self {
            movement_type: MovementType::parse(&row.movement_type)
                .ok_or_else(|| corrupt("movement_type", &row.movement_type))?,
            direction: direction(&row.direction)?,
            status: MovementStatus::parse(&row.status)
                .ok_or_else(|| corrupt("status", &row.status))?,
            id: row.id,
            company_id: row.company_id,
            shop_id: row.shop_id,
            transaction_code: row.transaction_code,
            product_id: row.product_id,
            product_quantity: row.product_quantity,
            consumed: row.consumed.0,
            transaction_date_time: row.transaction_date_time,
            created_by: row.created_by,
        })
    }
}

#[derive(Debug, FromRow)]
struct OutboxRow {
    id: Uuid,
    event: String,
    company_id: String,
    shop_id: String,
    payload: serde_json::Value,
    created_at: DateTime<Utc>,
    dispatched_at: Option<DateTime<Utc>>,
}

impl TryFrom<OutboxRow> for OutboxEvent {
    type Error = AppError;

    fn try_from(row: OutboxRow) -> AppResult<Self> {
        Ok(Self {
            event: DomainEventKind::parse(&row.event).ok_or_else(|| corrupt("event", &row.event))?,
            id: row.id,
            company_id: row.company_id,
            shop_id: row.shop_id,
            payload: row.payload,
            created_at: row.created_at,
            dispatched_at: row.dispatched_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ProductRow {
    product_id: String,
    company_id: String,
    name: String,
    product_type: String,
    requires_grn: bool,
    uom_id: Option<String>,
    bom_id: Option<String>,
}

impl From<ProductRow> for ProductInfo {
    fn from(row: ProductRow) -> Self {
        Self {
            product_id: row.product_id,
            company_id: row.company_id,
            name: row.name,
            product_type: row.product_type,
            requires_grn: row.requires_grn,
            uom_id: row.uom_id,
            bom_id: row.bom_id,
        }
    }
}

#[derive(Debug, FromRow)]
struct IssuedCodeRow {
    company_id: String,
    shop_id: String,
    prefix: String,
    value: i64,
    code: String,
    description: String,
    created_by: String,
    created_at: DateTime<Utc>,
}

impl From<IssuedCodeRow> for IssuedCode {
    fn from(row: IssuedCodeRow) -> Self {
        Self {
            company_id: row.company_id,
            shop_id: row.shop_id,
            prefix: row.prefix,
            value: row.value,
            code: row.code,
            description: row.description,
            created_by: row.created_by,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct AuditRow {
    id: i64,
    company_id: String,
    shop_id: String,
    created_by: String,
    message: String,
    created_at: DateTime<Utc>,
}

impl From<AuditRow> for AuditEntry {
    fn from(row: AuditRow) -> Self {
        Self {
            id: row.id,
            company_id: row.company_id,
            shop_id: row.shop_id,
            created_by: row.created_by,
            message: row.message,
            created_at: row.created_at,
        }
    }
}

fn convert<R, T>(rows: Vec<R>) -> AppResult<Vec<T>>
where
    T: TryFrom<R, Error = AppError>,
{
    rows.into_iter().map(T::try_from).collect()
}

// ============================================================================
// Store
// ============================================================================

/// Store backed by a PostgreSQL connection pool
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }
}

#[async_trait]
impl InventoryStore for PgStore {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let tx = self.db.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }

    async fn find_product(&self, product_id: &str) -> AppResult<Option<ProductInfo>> {
        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT product_id, company_id, name, product_type, requires_grn, uom_id, bom_id
            FROM products
            WHERE product_id = $1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(ProductInfo::from))
    }

    async fn find_company(&self, company_id: &str) -> AppResult<Option<CompanyDetails>> {
        let row = sqlx::query_as::<_, (String, String)>(
            "SELECT company_id, name FROM companies WHERE company_id = $1",
        )
        .bind(company_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(|(company_id, name)| CompanyDetails { company_id, name }))
    }

    async fn find_shop(&self, company_id: &str, shop_id: &str) -> AppResult<Option<ShopDetails>> {
        let row = sqlx::query_as::<_, (String, String, String)>(
            "SELECT company_id, shop_id, name FROM shops WHERE company_id = $1 AND shop_id = $2",
        )
        .bind(company_id)
        .bind(shop_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(|(company_id, shop_id, name)| ShopDetails {
            company_id,
            shop_id,
            name,
        }))
    }

    async fn find_supplier(&self, supplier_id: &str) -> AppResult<Option<SupplierDetails>> {
        let row = sqlx::query_as::<_, (String, String, Option<String>)>(
            "SELECT supplier_id, name, contact FROM suppliers WHERE supplier_id = $1",
        )
        .bind(supplier_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(|(supplier_id, name, contact)| SupplierDetails {
            supplier_id,
            name,
            contact,
        }))
    }

    async fn get_ledger_entry(&self, key: &LedgerKey) -> AppResult<Option<StockLedgerEntry>> {
        let query = format!(
            "SELECT {} FROM stock_ledger \
             WHERE company_id = $1 AND shop_id = $2 AND category_id = $3 AND product_id = $4",
            LEDGER_COLUMNS
        );
        let row = sqlx::query_as::<_, LedgerRow>(&query)
            .bind(&key.company_id)
            .bind(&key.shop_id)
            .bind(&key.category_id)
            .bind(&key.product_id)
            .fetch_optional(&self.db)
            .await?;

        row.map(StockLedgerEntry::try_from).transpose()
    }

    async fn list_ledger_entries(
        &self,
        company_id: &str,
        shop_id: &str,
        category_id: Option<&str>,
    ) -> AppResult<Vec<StockLedgerEntry>> {
        let query = format!(
            "SELECT {} FROM stock_ledger \
             WHERE company_id = $1 AND shop_id = $2 AND ($3::TEXT IS NULL OR category_id = $3) \
             ORDER BY category_id, product_id",
            LEDGER_COLUMNS
        );
        let rows = sqlx::query_as::<_, LedgerRow>(&query)
            .bind(company_id)
            .bind(shop_id)
            .bind(category_id)
            .fetch_all(&self.db)
            .await?;

        convert(rows)
    }

    async fn find_header(
        &self,
        company_id: &str,
        shop_id: &str,
        transaction_code: &str,
    ) -> AppResult<Option<ReceiptHeader>> {
        let query = format!(
            "SELECT {} FROM receipt_headers \
             WHERE company_id = $1 AND shop_id = $2 AND transaction_code = $3",
            HEADER_COLUMNS
        );
        let row = sqlx::query_as::<_, HeaderRow>(&query)
            .bind(company_id)
            .bind(shop_id)
            .bind(transaction_code)
            .fetch_optional(&self.db)
            .await?;

        row.map(ReceiptHeader::try_from).transpose()
    }

    async fn list_headers(&self, filter: &ReceiptFilter) -> AppResult<Vec<ReceiptHeader>> {
        let query = format!(
            "SELECT {} FROM receipt_headers \
             WHERE ($1::TEXT IS NULL OR company_id = $1) \
               AND ($2::TEXT IS NULL OR shop_id = $2) \
               AND ($3::TEXT IS NULL OR supplier_id = $3) \
               AND ($4::TIMESTAMPTZ IS NULL OR transaction_date_time >= $4) \
               AND ($5::TIMESTAMPTZ IS NULL OR transaction_date_time < $5) \
             ORDER BY id DESC",
            HEADER_COLUMNS
        );
        let rows = sqlx::query_as::<_, HeaderRow>(&query)
            .bind(filter.company_id.as_deref())
            .bind(filter.shop_id.as_deref())
            .bind(filter.supplier_id.as_deref())
            .bind(filter.from)
            .bind(filter.to)
            .fetch_all(&self.db)
            .await?;

        convert(rows)
    }

    async fn list_lines(
        &self,
        company_id: &str,
        shop_id: &str,
        transaction_code: &str,
    ) -> AppResult<Vec<ReceiptLine>> {
        let query = format!(
            "SELECT {} FROM receipt_lines \
             WHERE company_id = $1 AND shop_id = $2 AND transaction_code = $3 ORDER BY id",
            LINE_COLUMNS
        );
        let rows = sqlx::query_as::<_, LineRow>(&query)
            .bind(company_id)
            .bind(shop_id)
            .bind(transaction_code)
            .fetch_all(&self.db)
            .await?;

        convert(rows)
    }

    async fn list_shop_lines(
        &self,
        company_id: &str,
        shop_id: &str,
    ) -> AppResult<Vec<ReceiptLine>> {
        let query = format!(
            "SELECT {} FROM receipt_lines WHERE company_id = $1 AND shop_id = $2 ORDER BY id",
            LINE_COLUMNS
        );
        let rows = sqlx::query_as::<_, LineRow>(&query)
            .bind(company_id)
            .bind(shop_id)
            .fetch_all(&self.db)
            .await?;

        convert(rows)
    }

    async fn list_movements(
        &self,
        company_id: &str,
        shop_id: &str,
    ) -> AppResult<Vec<StockMovement>> {
        let query = format!(
            "SELECT {} FROM stock_movements \
             WHERE company_id = $1 AND shop_id = $2 ORDER BY transaction_date_time, id",
            MOVEMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, MovementRow>(&query)
            .bind(company_id)
            .bind(shop_id)
            .fetch_all(&self.db)
            .await?;

        convert(rows)
    }

    async fn list_issued_codes(
        &self,
        company_id: &str,
        shop_id: &str,
        prefix: &str,
    ) -> AppResult<Vec<IssuedCode>> {
        let rows = sqlx::query_as::<_, IssuedCodeRow>(
            r#"
            SELECT company_id, shop_id, prefix, value, code, description, created_by, created_at
            FROM code_history
            WHERE company_id = $1 AND shop_id = $2 AND prefix = $3
            ORDER BY value
            "#,
        )
        .bind(company_id)
        .bind(shop_id)
        .bind(prefix)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(IssuedCode::from).collect())
    }

    async fn append_audit(&self, entry: NewAuditEntry) -> AppResult<AuditEntry> {
        let row = sqlx::query_as::<_, AuditRow>(
            r#"
            INSERT INTO audit_logs (company_id, shop_id, created_by, message)
            VALUES ($1, $2, $3, $4)
            RETURNING id, company_id, shop_id, created_by, message, created_at
            "#,
        )
        .bind(&entry.company_id)
        .bind(&entry.shop_id)
        .bind(&entry.created_by)
        .bind(&entry.message)
        .fetch_one(&self.db)
        .await?;

        Ok(row.into())
    }

    async fn list_audit(&self, company_id: &str, shop_id: &str) -> AppResult<Vec<AuditEntry>> {
        let rows = sqlx::query_as::<_, AuditRow>(
            r#"
            SELECT id, company_id, shop_id, created_by, message, created_at
            FROM audit_logs
            WHERE company_id = $1 AND shop_id = $2
            ORDER BY id
            "#,
        )
        .bind(company_id)
        .bind(shop_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(AuditEntry::from).collect())
    }

    async fn pending_events(&self, limit: i64) -> AppResult<Vec<OutboxEvent>> {
        let rows = sqlx::query_as::<_, OutboxRow>(
            r#"
            SELECT id, event, company_id, shop_id, payload, created_at, dispatched_at
            FROM outbox_events
            WHERE dispatched_at IS NULL
            ORDER BY created_at, id
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        convert(rows)
    }

    async fn mark_event_dispatched(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("UPDATE outbox_events SET dispatched_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Outbox event {}", id)));
        }
        Ok(())
    }
}

// ============================================================================
// Unit of work
// ============================================================================

/// Unit of work over one PostgreSQL transaction
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn next_code_value(
        &mut self,
        company_id: &str,
        shop_id: &str,
        prefix: &str,
    ) -> AppResult<i64> {
        let value = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO code_sequences (company_id, shop_id, prefix, last_value)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (company_id, shop_id, prefix)
            DO UPDATE SET last_value = code_sequences.last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(company_id)
        .bind(shop_id)
        .bind(prefix)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(value)
    }

    async fn record_code(&mut self, code: &IssuedCode) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO code_history
                (company_id, shop_id, prefix, value, code, description, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&code.company_id)
        .bind(&code.shop_id)
        .bind(&code.prefix)
        .bind(code.value)
        .bind(&code.code)
        .bind(&code.description)
        .bind(&code.created_by)
        .bind(code.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn lock_ledger_entry(&mut self, key: &LedgerKey) -> AppResult<Option<StockLedgerEntry>> {
        // Advisory lock covers the not-yet-existing row as well
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(key.lock_key())
            .execute(&mut *self.tx)
            .await?;

        let query = format!(
            "SELECT {} FROM stock_ledger \
             WHERE company_id = $1 AND shop_id = $2 AND category_id = $3 AND product_id = $4 \
             FOR UPDATE",
            LEDGER_COLUMNS
        );
        let row = sqlx::query_as::<_, LedgerRow>(&query)
            .bind(&key.company_id)
            .bind(&key.shop_id)
            .bind(&key.category_id)
            .bind(&key.product_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        row.map(StockLedgerEntry::try_from).transpose()
    }

    async fn put_ledger_entry(&mut self, entry: &StockLedgerEntry) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stock_ledger (
                company_id, shop_id, category_id, product_id, total_quantity,
                weighted_average_cost, last_purchase_cost, minimum_quantity, supplier_ids,
                toggle, created_by, version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (company_id, shop_id, category_id, product_id) DO UPDATE SET
                total_quantity = EXCLUDED.total_quantity,
                weighted_average_cost = EXCLUDED.weighted_average_cost,
                last_purchase_cost = EXCLUDED.last_purchase_cost,
                minimum_quantity = EXCLUDED.minimum_quantity,
                supplier_ids = EXCLUDED.supplier_ids,
                toggle = EXCLUDED.toggle,
                version = EXCLUDED.version,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&entry.company_id)
        .bind(&entry.shop_id)
        .bind(&entry.category_id)
        .bind(&entry.product_id)
        .bind(entry.total_quantity)
        .bind(entry.weighted_average_cost)
        .bind(entry.last_purchase_cost)
        .bind(entry.minimum_quantity)
        .bind(&entry.supplier_ids)
        .bind(entry.toggle.as_str())
        .bind(&entry.created_by)
        .bind(entry.version)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn lock_header(
        &mut self,
        company_id: &str,
        shop_id: &str,
        transaction_code: &str,
    ) -> AppResult<Option<ReceiptHeader>> {
        let query = format!(
            "SELECT {} FROM receipt_headers \
             WHERE company_id = $1 AND shop_id = $2 AND transaction_code = $3 \
             FOR UPDATE",
            HEADER_COLUMNS
        );
        let row = sqlx::query_as::<_, HeaderRow>(&query)
            .bind(company_id)
            .bind(shop_id)
            .bind(transaction_code)
            .fetch_optional(&mut *self.tx)
            .await?;

        row.map(ReceiptHeader::try_from).transpose()
    }

    async fn insert_header(&mut self, header: NewReceiptHeader) -> AppResult<ReceiptHeader> {
        let query = format!(
            "INSERT INTO receipt_headers (transaction_code, company_id, shop_id, supplier_id, \
                 transaction_date_time, transaction_type, direction, status, total_cost, \
                 outstanding_amount, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9, $10) \
             RETURNING {}",
            HEADER_COLUMNS
        );
        let row = sqlx::query_as::<_, HeaderRow>(&query)
            .bind(&header.transaction_code)
            .bind(&header.company_id)
            .bind(&header.shop_id)
            .bind(&header.supplier_id)
            .bind(header.transaction_date_time)
            .bind(GRN_TRANSACTION_TYPE)
            .bind(StockDirection::In.as_str())
            .bind(ReceiptStatus::Pending.as_str())
            .bind(header.total_cost)
            .bind(&header.created_by)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict {
                    resource: header.transaction_code.clone(),
                    message: "A receipt with this code already exists".to_string(),
                },
                other => AppError::from(other),
            })?;

        row.try_into()
    }

    async fn update_header(&mut self, header: &ReceiptHeader) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE receipt_headers
            SET supplier_id = $2, transaction_date_time = $3, status = $4, total_cost = $5,
                outstanding_amount = $6, created_by = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(header.id)
        .bind(&header.supplier_id)
        .bind(header.transaction_date_time)
        .bind(header.status.as_str())
        .bind(header.total_cost)
        .bind(header.outstanding_amount)
        .bind(&header.created_by)
        .bind(header.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn lines_for(
        &mut self,
        company_id: &str,
        shop_id: &str,
        transaction_code: &str,
    ) -> AppResult<Vec<ReceiptLine>> {
        let query = format!(
            "SELECT {} FROM receipt_lines \
             WHERE company_id = $1 AND shop_id = $2 AND transaction_code = $3 \
             ORDER BY id FOR UPDATE",
            LINE_COLUMNS
        );
        let rows = sqlx::query_as::<_, LineRow>(&query)
            .bind(company_id)
            .bind(shop_id)
            .bind(transaction_code)
            .fetch_all(&mut *self.tx)
            .await?;

        convert(rows)
    }

    async fn insert_line(&mut self, line: NewReceiptLine) -> AppResult<ReceiptLine> {
        let query = format!(
            "INSERT INTO receipt_lines (transaction_code, company_id, shop_id, supplier_id, \
                 category_id, product_id, unit_cost, quantity, total_cost, direction, status, \
                 transaction_date_time, created_by, remarks) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             RETURNING {}",
            LINE_COLUMNS
        );
        let row = sqlx::query_as::<_, LineRow>(&query)
            .bind(&line.transaction_code)
            .bind(&line.company_id)
            .bind(&line.shop_id)
            .bind(&line.supplier_id)
            .bind(&line.category_id)
            .bind(&line.product_id)
            .bind(line.unit_cost)
            .bind(line.quantity)
            .bind(line.unit_cost * line.quantity)
            .bind(line.direction.as_str())
            .bind(line.status.as_str())
            .bind(line.transaction_date_time)
            .bind(&line.created_by)
            .bind(&line.remarks)
            .fetch_one(&mut *self.tx)
            .await?;

        row.try_into()
    }

    async fn update_line(&mut self, line: &ReceiptLine) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE receipt_lines
            SET direction = $2, status = $3, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(line.id)
        .bind(line.direction.as_str())
        .bind(line.status.as_str())
        .bind(line.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn delete_lines(
        &mut self,
        company_id: &str,
        shop_id: &str,
        transaction_code: &str,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM receipt_lines
            WHERE company_id = $1 AND shop_id = $2 AND transaction_code = $3
            "#,
        )
        .bind(company_id)
        .bind(shop_id)
        .bind(transaction_code)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn insert_movement(&mut self, movement: StockMovement) -> AppResult<StockMovement> {
        let query = format!(
            "INSERT INTO stock_movements (company_id, shop_id, transaction_code, movement_type, \
                 direction, status, product_id, product_quantity, consumed, \
                 transaction_date_time, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {}",
            MOVEMENT_COLUMNS
        );
        let row = sqlx::query_as::<_, MovementRow>(&query)
            .bind(&movement.company_id)
            .bind(&movement.shop_id)
            .bind(&movement.transaction_code)
            .bind(movement.movement_type.as_str())
            .bind(movement.direction.as_str())
            .bind(movement.status.as_str())
            .bind(&movement.product_id)
            .bind(movement.product_quantity)
            .bind(Json(&movement.consumed))
            .bind(movement.transaction_date_time)
            .bind(&movement.created_by)
            .fetch_one(&mut *self.tx)
            .await?;

        row.try_into()
    }

    async fn enqueue_event(&mut self, event: NewOutboxEvent) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO outbox_events (id, event, company_id, shop_id, payload)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(event.event.as_str())
        .bind(&event.company_id)
        .bind(&event.shop_id)
        .bind(&event.payload)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
