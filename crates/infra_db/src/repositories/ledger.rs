//! Ledger repository
//!
//! SQL for patient accounts, ledger entries, payments and receivables.
//! Every function runs on a connection borrowed from an open transaction;
//! the caller owns commit and rollback.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, Postgres, QueryBuilder};
use tracing::{debug, instrument};
use uuid::Uuid;

use core_kernel::{Currency, LedgerEntryId, Money, PatientAccountId, PaymentId, ReceivableId, ReceivablePaymentId};
use domain_billing::{
    AccountState, AccountStatus, LedgerEntry, PatientAccount, Payment, ReceivablePayment, ReceivableQuery,
    ReceivableRecord, TotalsSnapshot,
};

use crate::error::DatabaseError;

const ACCOUNT_COLUMNS: &str = r#"
    id, patient_ref, currency, advance_amount, status, opened_at, opened_by, closed_at,
    snapshot_advance, snapshot_total_services, snapshot_total_products,
    snapshot_partial_payments, snapshot_paid_at_close, snapshot_pending_balance
"#;

const RECEIVABLE_COLUMNS: &str = r#"
    id, account_id, original_amount, remaining_amount, state, authorized_by, reason, created_at, updated_at
"#;

/// Database row for the patient_accounts table
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccountRow {
    pub id: Uuid,
    pub patient_ref: String,
    pub currency: String,
    pub advance_amount: Decimal,
    pub status: String,
    pub opened_at: DateTime<Utc>,
    pub opened_by: String,
    pub closed_at: Option<DateTime<Utc>>,
    pub snapshot_advance: Option<Decimal>,
    pub snapshot_total_services: Option<Decimal>,
    pub snapshot_total_products: Option<Decimal>,
    pub snapshot_partial_payments: Option<Decimal>,
    pub snapshot_paid_at_close: Option<Decimal>,
    pub snapshot_pending_balance: Option<Decimal>,
}

fn currency(code: &str) -> Result<Currency, DatabaseError> {
    code.trim()
        .parse::<Currency>()
        .map_err(|e| DatabaseError::SerializationError(e.to_string()))
}

fn decode<T: std::str::FromStr>(value: &str) -> Result<T, DatabaseError>
where
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| DatabaseError::SerializationError(e.to_string()))
}

impl AccountRow {
    /// Converts the row into the domain account
    ///
    /// A closed row must carry every snapshot column; the schema enforces
    /// this, so a gap here means the row was written outside the service.
    pub fn into_domain(self) -> Result<PatientAccount, DatabaseError> {
        let currency = currency(&self.currency)?;
        let money = |v: Decimal| Money::new(v, currency);

        let state = match decode::<AccountStatus>(&self.status)? {
            AccountStatus::Open => AccountState::Open,
            AccountStatus::Closed => {
                let missing = || DatabaseError::SerializationError(format!("closed account {} lacks its snapshot", self.id));
                AccountState::Closed {
                    closed_at: self.closed_at.ok_or_else(missing)?,
                    snapshot: TotalsSnapshot {
                        advance: money(self.snapshot_advance.ok_or_else(missing)?),
                        total_services: money(self.snapshot_total_services.ok_or_else(missing)?),
                        total_products: money(self.snapshot_total_products.ok_or_else(missing)?),
                        total_partial_payments: money(self.snapshot_partial_payments.ok_or_else(missing)?),
                        amount_paid_at_close: money(self.snapshot_paid_at_close.ok_or_else(missing)?),
                        pending_balance: money(self.snapshot_pending_balance.ok_or_else(missing)?),
                    },
                }
            }
        };

        Ok(PatientAccount {
            id: PatientAccountId::from_uuid(self.id),
            patient_ref: self.patient_ref,
            currency,
            advance_amount: money(self.advance_amount),
            state,
            opened_at: self.opened_at,
            opened_by: self.opened_by,
        })
    }
}

/// Database row for the ledger_entries table
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EntryRow {
    pub id: Uuid,
    pub account_id: Uuid,
    pub kind: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    pub description: Option<String>,
    pub item_ref: Option<String>,
    pub actor_ref: String,
    pub recorded_at: DateTime<Utc>,
    pub currency: String,
}

impl EntryRow {
    fn into_domain(self) -> Result<LedgerEntry, DatabaseError> {
        let currency = currency(&self.currency)?;
        Ok(LedgerEntry {
            id: LedgerEntryId::from_uuid(self.id),
            account_id: PatientAccountId::from_uuid(self.account_id),
            kind: decode(&self.kind)?,
            quantity: self.quantity,
            unit_price: Money::new(self.unit_price, currency),
            subtotal: Money::new(self.subtotal, currency),
            description: self.description,
            item_ref: self.item_ref,
            actor_ref: self.actor_ref,
            recorded_at: self.recorded_at,
        })
    }
}

/// Database row for the account_payments table
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PaymentRow {
    pub id: Uuid,
    pub account_id: Uuid,
    pub amount: Decimal,
    pub method: String,
    pub kind: String,
    pub actor_ref: String,
    pub paid_at: DateTime<Utc>,
    pub currency: String,
}

impl PaymentRow {
    fn into_domain(self) -> Result<Payment, DatabaseError> {
        let currency = currency(&self.currency)?;
        Ok(Payment {
            id: PaymentId::from_uuid(self.id),
            account_id: PatientAccountId::from_uuid(self.account_id),
            amount: Money::new(self.amount, currency),
            method: decode(&self.method)?,
            kind: decode(&self.kind)?,
            actor_ref: self.actor_ref,
            paid_at: self.paid_at,
        })
    }
}

/// Database row for the receivables table, joined with the account currency
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReceivableRow {
    pub id: Uuid,
    pub account_id: Uuid,
    pub original_amount: Decimal,
    pub remaining_amount: Decimal,
    pub state: String,
    pub authorized_by: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub currency: String,
}

impl ReceivableRow {
    fn into_domain(self) -> Result<ReceivableRecord, DatabaseError> {
        let currency = currency(&self.currency)?;
        Ok(ReceivableRecord {
            id: ReceivableId::from_uuid(self.id),
            account_id: PatientAccountId::from_uuid(self.account_id),
            original_amount: Money::new(self.original_amount, currency),
            remaining_amount: Money::new(self.remaining_amount, currency),
            state: decode(&self.state)?,
            authorized_by: self.authorized_by,
            reason: self.reason,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Database row for the receivable_payments table, joined with the currency
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReceivablePaymentRow {
    pub id: Uuid,
    pub receivable_id: Uuid,
    pub amount: Decimal,
    pub method: String,
    pub actor_ref: String,
    pub remaining_after: Decimal,
    pub paid_at: DateTime<Utc>,
    pub currency: String,
}

impl ReceivablePaymentRow {
    fn into_domain(self) -> Result<ReceivablePayment, DatabaseError> {
        let currency = currency(&self.currency)?;
        Ok(ReceivablePayment {
            id: ReceivablePaymentId::from_uuid(self.id),
            receivable_id: ReceivableId::from_uuid(self.receivable_id),
            amount: Money::new(self.amount, currency),
            method: decode(&self.method)?,
            actor_ref: self.actor_ref,
            remaining_after: Money::new(self.remaining_after, currency),
            paid_at: self.paid_at,
        })
    }
}

/// SQL for the ledger tables
pub struct LedgerRepository;

impl LedgerRepository {
    #[instrument(skip(conn, account), fields(account_id = %account.id))]
    pub async fn insert_account(conn: &mut PgConnection, account: &PatientAccount) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO patient_accounts (id, patient_ref, currency, advance_amount, status, opened_at, opened_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(*account.id.as_uuid())
        .bind(&account.patient_ref)
        .bind(account.currency.code())
        .bind(account.advance_amount.amount())
        .bind(account.status().as_str())
        .bind(account.opened_at)
        .bind(&account.opened_by)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Reads an account, optionally taking its row lock
    #[instrument(skip(conn))]
    pub async fn find_account(
        conn: &mut PgConnection,
        id: PatientAccountId,
        for_update: bool,
    ) -> Result<Option<PatientAccount>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM patient_accounts WHERE id = $1{}",
            ACCOUNT_COLUMNS,
            if for_update { " FOR UPDATE" } else { "" }
        );
        let row = sqlx::query_as::<Postgres, AccountRow>(&sql)
            .bind(*id.as_uuid())
            .fetch_optional(&mut *conn)
            .await?;
        row.map(AccountRow::into_domain).transpose()
    }

    /// Writes the account's mutable columns: advance, status and snapshot
    #[instrument(skip(conn, account), fields(account_id = %account.id))]
    pub async fn update_account(conn: &mut PgConnection, account: &PatientAccount) -> Result<(), DatabaseError> {
        let snapshot = account.snapshot();

        let result = sqlx::query(
            r#"
            UPDATE patient_accounts
            SET advance_amount = $2,
                status = $3,
                closed_at = $4,
                snapshot_advance = $5,
                snapshot_total_services = $6,
                snapshot_total_products = $7,
                snapshot_partial_payments = $8,
                snapshot_paid_at_close = $9,
                snapshot_pending_balance = $10
            WHERE id = $1
            "#,
        )
        .bind(*account.id.as_uuid())
        .bind(account.advance_amount.amount())
        .bind(account.status().as_str())
        .bind(account.closed_at())
        .bind(snapshot.map(|s| s.advance.amount()))
        .bind(snapshot.map(|s| s.total_services.amount()))
        .bind(snapshot.map(|s| s.total_products.amount()))
        .bind(snapshot.map(|s| s.total_partial_payments.amount()))
        .bind(snapshot.map(|s| s.amount_paid_at_close.amount()))
        .bind(snapshot.map(|s| s.pending_balance.amount()))
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("PatientAccount", account.id));
        }
        Ok(())
    }

    #[instrument(skip(conn))]
    pub async fn entries(conn: &mut PgConnection, account_id: PatientAccountId) -> Result<Vec<LedgerEntry>, DatabaseError> {
        let rows = sqlx::query_as::<Postgres, EntryRow>(
            r#"
            SELECT e.id, e.account_id, e.kind, e.quantity, e.unit_price, e.subtotal,
                   e.description, e.item_ref, e.actor_ref, e.recorded_at, a.currency
            FROM ledger_entries e
            JOIN patient_accounts a ON a.id = e.account_id
            WHERE e.account_id = $1
            ORDER BY e.recorded_at, e.id
            "#,
        )
        .bind(*account_id.as_uuid())
        .fetch_all(&mut *conn)
        .await?;

        debug!(count = rows.len(), "Loaded ledger entries");
        rows.into_iter().map(EntryRow::into_domain).collect()
    }

    #[instrument(skip(conn, entry), fields(entry_id = %entry.id))]
    pub async fn insert_entry(conn: &mut PgConnection, entry: &LedgerEntry) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO ledger_entries
                (id, account_id, kind, quantity, unit_price, subtotal, description, item_ref, actor_ref, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(*entry.id.as_uuid())
        .bind(*entry.account_id.as_uuid())
        .bind(entry.kind.as_str())
        .bind(entry.quantity)
        .bind(entry.unit_price.amount())
        .bind(entry.subtotal.amount())
        .bind(&entry.description)
        .bind(&entry.item_ref)
        .bind(&entry.actor_ref)
        .bind(entry.recorded_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    #[instrument(skip(conn))]
    pub async fn payments(conn: &mut PgConnection, account_id: PatientAccountId) -> Result<Vec<Payment>, DatabaseError> {
        let rows = sqlx::query_as::<Postgres, PaymentRow>(
            r#"
            SELECT p.id, p.account_id, p.amount, p.method, p.kind, p.actor_ref, p.paid_at, a.currency
            FROM account_payments p
            JOIN patient_accounts a ON a.id = p.account_id
            WHERE p.account_id = $1
            ORDER BY p.paid_at, p.id
            "#,
        )
        .bind(*account_id.as_uuid())
        .fetch_all(&mut *conn)
        .await?;

        rows.into_iter().map(PaymentRow::into_domain).collect()
    }

    #[instrument(skip(conn, payment), fields(payment_id = %payment.id))]
    pub async fn insert_payment(conn: &mut PgConnection, payment: &Payment) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO account_payments (id, account_id, amount, method, kind, actor_ref, paid_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(*payment.id.as_uuid())
        .bind(*payment.account_id.as_uuid())
        .bind(payment.amount.amount())
        .bind(payment.method.as_str())
        .bind(payment.kind.as_str())
        .bind(&payment.actor_ref)
        .bind(payment.paid_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    #[instrument(skip(conn, receivable), fields(receivable_id = %receivable.id))]
    pub async fn insert_receivable(conn: &mut PgConnection, receivable: &ReceivableRecord) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO receivables
                (id, account_id, original_amount, remaining_amount, state, authorized_by, reason, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(*receivable.id.as_uuid())
        .bind(*receivable.account_id.as_uuid())
        .bind(receivable.original_amount.amount())
        .bind(receivable.remaining_amount.amount())
        .bind(receivable.state.as_str())
        .bind(&receivable.authorized_by)
        .bind(&receivable.reason)
        .bind(receivable.created_at)
        .bind(receivable.updated_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Reads a receivable, optionally taking its row lock
    #[instrument(skip(conn))]
    pub async fn find_receivable(
        conn: &mut PgConnection,
        id: ReceivableId,
        for_update: bool,
    ) -> Result<Option<ReceivableRecord>, DatabaseError> {
        // FOR UPDATE OF r: lock the receivable row only, not the joined account
        let sql = format!(
            "SELECT {}, a.currency FROM receivables r JOIN patient_accounts a ON a.id = r.account_id WHERE r.id = $1{}",
            prefixed(RECEIVABLE_COLUMNS, "r"),
            if for_update { " FOR UPDATE OF r" } else { "" }
        );
        let row = sqlx::query_as::<Postgres, ReceivableRow>(&sql)
            .bind(*id.as_uuid())
            .fetch_optional(&mut *conn)
            .await?;
        row.map(ReceivableRow::into_domain).transpose()
    }

    #[instrument(skip(conn))]
    pub async fn receivable_for_account(
        conn: &mut PgConnection,
        account_id: PatientAccountId,
    ) -> Result<Option<ReceivableRecord>, DatabaseError> {
        let sql = format!(
            "SELECT {}, a.currency FROM receivables r JOIN patient_accounts a ON a.id = r.account_id WHERE r.account_id = $1",
            prefixed(RECEIVABLE_COLUMNS, "r"),
        );
        let row = sqlx::query_as::<Postgres, ReceivableRow>(&sql)
            .bind(*account_id.as_uuid())
            .fetch_optional(&mut *conn)
            .await?;
        row.map(ReceivableRow::into_domain).transpose()
    }

    #[instrument(skip(conn, receivable), fields(receivable_id = %receivable.id))]
    pub async fn update_receivable(conn: &mut PgConnection, receivable: &ReceivableRecord) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE receivables
            SET remaining_amount = $2, state = $3, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(*receivable.id.as_uuid())
        .bind(receivable.remaining_amount.amount())
        .bind(receivable.state.as_str())
        .bind(receivable.updated_at)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Receivable", receivable.id));
        }
        Ok(())
    }

    /// Receivables matching the query, oldest first
    #[instrument(skip(conn))]
    pub async fn find_receivables(
        conn: &mut PgConnection,
        query: &ReceivableQuery,
    ) -> Result<Vec<ReceivableRecord>, DatabaseError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {}, a.currency FROM receivables r JOIN patient_accounts a ON a.id = r.account_id WHERE ",
            prefixed(RECEIVABLE_COLUMNS, "r"),
        ));

        match query.state {
            Some(state) => {
                builder.push("r.state = ").push_bind(state.as_str());
            }
            None => {
                builder.push("r.state <> 'fully_paid'");
            }
        }
        if let Some(account_id) = query.account_id {
            builder.push(" AND r.account_id = ").push_bind(*account_id.as_uuid());
        }
        if let Some(from) = query.created_from {
            builder.push(" AND r.created_at >= ").push_bind(from);
        }
        if let Some(to) = query.created_to {
            builder.push(" AND r.created_at <= ").push_bind(to);
        }
        builder.push(" ORDER BY r.created_at, r.id");
        if let Some(limit) = query.limit {
            builder.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows = builder
            .build_query_as::<ReceivableRow>()
            .fetch_all(&mut *conn)
            .await?;

        debug!(count = rows.len(), "Loaded receivables");
        rows.into_iter().map(ReceivableRow::into_domain).collect()
    }

    #[instrument(skip(conn, payment), fields(receivable_id = %payment.receivable_id))]
    pub async fn insert_receivable_payment(
        conn: &mut PgConnection,
        payment: &ReceivablePayment,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO receivable_payments (id, receivable_id, amount, method, actor_ref, remaining_after, paid_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(*payment.id.as_uuid())
        .bind(*payment.receivable_id.as_uuid())
        .bind(payment.amount.amount())
        .bind(payment.method.as_str())
        .bind(&payment.actor_ref)
        .bind(payment.remaining_after.amount())
        .bind(payment.paid_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    #[instrument(skip(conn))]
    pub async fn receivable_payments(
        conn: &mut PgConnection,
        receivable_id: ReceivableId,
    ) -> Result<Vec<ReceivablePayment>, DatabaseError> {
        let rows = sqlx::query_as::<Postgres, ReceivablePaymentRow>(
            r#"
            SELECT p.id, p.receivable_id, p.amount, p.method, p.actor_ref, p.remaining_after, p.paid_at, a.currency
            FROM receivable_payments p
            JOIN receivables r ON r.id = p.receivable_id
            JOIN patient_accounts a ON a.id = r.account_id
            WHERE p.receivable_id = $1
            ORDER BY p.paid_at, p.id
            "#,
        )
        .bind(*receivable_id.as_uuid())
        .fetch_all(&mut *conn)
        .await?;

        rows.into_iter().map(ReceivablePaymentRow::into_domain).collect()
    }
}

/// Qualifies a comma-separated column list with a table alias
fn prefixed(columns: &str, alias: &str) -> String {
    columns
        .split(',')
        .map(|c| format!("{}.{}", alias, c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}
