//! Resource repository
//!
//! SQL for rooms, operating theaters, their allocations and the stock journal.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Postgres};
use tracing::instrument;
use uuid::Uuid;

use core_kernel::{AllocationId, ResourceId, StockMovementId};
use domain_resources::{Allocation, Resource, StockMovement};

use crate::error::DatabaseError;

/// Database row for the resources table
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ResourceRow {
    pub id: Uuid,
    pub kind: String,
    pub name: String,
    pub state: String,
    pub stock: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ResourceRow> for Resource {
    type Error = DatabaseError;

    fn try_from(row: ResourceRow) -> Result<Self, Self::Error> {
        Ok(Resource {
            id: ResourceId::from_uuid(row.id),
            kind: row.kind.parse().map_err(|e| DatabaseError::SerializationError(format!("{}", e)))?,
            name: row.name,
            state: row.state.parse().map_err(|e| DatabaseError::SerializationError(format!("{}", e)))?,
            stock: row.stock,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Database row for the resource_allocations table
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AllocationRow {
    pub id: Uuid,
    pub resource_id: Uuid,
    pub purpose: String,
    pub reference_id: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub released_at: Option<DateTime<Utc>>,
}

impl TryFrom<AllocationRow> for Allocation {
    type Error = DatabaseError;

    fn try_from(row: AllocationRow) -> Result<Self, Self::Error> {
        Ok(Allocation {
            id: AllocationId::from_uuid(row.id),
            resource_id: ResourceId::from_uuid(row.resource_id),
            purpose: row.purpose.parse().map_err(|e| DatabaseError::SerializationError(format!("{}", e)))?,
            reference_id: row.reference_id,
            starts_at: row.starts_at,
            ends_at: row.ends_at,
            active: row.active,
            created_by: row.created_by,
            created_at: row.created_at,
            released_at: row.released_at,
        })
    }
}

/// Database row for the stock_movements table
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MovementRow {
    pub id: Uuid,
    pub resource_id: Uuid,
    pub quantity_delta: i64,
    pub balance_after: i64,
    pub reason: String,
    pub reference_id: Option<String>,
    pub actor_ref: String,
    pub created_at: DateTime<Utc>,
}

impl From<MovementRow> for StockMovement {
    fn from(row: MovementRow) -> Self {
        StockMovement {
            id: StockMovementId::from_uuid(row.id),
            resource_id: ResourceId::from_uuid(row.resource_id),
            quantity_delta: row.quantity_delta,
            balance_after: row.balance_after,
            reason: row.reason,
            reference_id: row.reference_id,
            actor_ref: row.actor_ref,
            created_at: row.created_at,
        }
    }
}

/// SQL for the resource tables
pub struct ResourceRepository;

impl ResourceRepository {
    #[instrument(skip(conn, resource), fields(resource_id = %resource.id))]
    pub async fn insert_resource(conn: &mut PgConnection, resource: &Resource) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO resources (id, kind, name, state, stock, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(*resource.id.as_uuid())
        .bind(resource.kind.as_str())
        .bind(&resource.name)
        .bind(resource.state.as_str())
        .bind(resource.stock)
        .bind(resource.created_at)
        .bind(resource.updated_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Reads a resource, optionally taking its row lock
    #[instrument(skip(conn))]
    pub async fn find_resource(
        conn: &mut PgConnection,
        id: ResourceId,
        for_update: bool,
    ) -> Result<Option<Resource>, DatabaseError> {
        let sql = if for_update {
            "SELECT id, kind, name, state, stock, created_at, updated_at FROM resources WHERE id = $1 FOR UPDATE"
        } else {
            "SELECT id, kind, name, state, stock, created_at, updated_at FROM resources WHERE id = $1"
        };
        let row = sqlx::query_as::<Postgres, ResourceRow>(sql)
            .bind(*id.as_uuid())
            .fetch_optional(&mut *conn)
            .await?;
        row.map(Resource::try_from).transpose()
    }

    #[instrument(skip(conn, resource), fields(resource_id = %resource.id))]
    pub async fn update_resource(conn: &mut PgConnection, resource: &Resource) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE resources
            SET state = $2, stock = $3, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(*resource.id.as_uuid())
        .bind(resource.state.as_str())
        .bind(resource.stock)
        .bind(resource.updated_at)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Resource", resource.id));
        }
        Ok(())
    }

    #[instrument(skip(conn))]
    pub async fn active_allocations(
        conn: &mut PgConnection,
        resource_id: ResourceId,
    ) -> Result<Vec<Allocation>, DatabaseError> {
        let rows = sqlx::query_as::<Postgres, AllocationRow>(
            r#"
            SELECT id, resource_id, purpose, reference_id, starts_at, ends_at, active, created_by, created_at, released_at
            FROM resource_allocations
            WHERE resource_id = $1 AND active
            ORDER BY starts_at
            "#,
        )
        .bind(*resource_id.as_uuid())
        .fetch_all(&mut *conn)
        .await?;

        rows.into_iter().map(Allocation::try_from).collect()
    }

    #[instrument(skip(conn, allocation), fields(allocation_id = %allocation.id))]
    pub async fn insert_allocation(conn: &mut PgConnection, allocation: &Allocation) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO resource_allocations
                (id, resource_id, purpose, reference_id, starts_at, ends_at, active, created_by, created_at, released_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(*allocation.id.as_uuid())
        .bind(*allocation.resource_id.as_uuid())
        .bind(allocation.purpose.as_str())
        .bind(&allocation.reference_id)
        .bind(allocation.starts_at)
        .bind(allocation.ends_at)
        .bind(allocation.active)
        .bind(&allocation.created_by)
        .bind(allocation.created_at)
        .bind(allocation.released_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    #[instrument(skip(conn, allocation), fields(allocation_id = %allocation.id))]
    pub async fn update_allocation(conn: &mut PgConnection, allocation: &Allocation) -> Result<(), DatabaseError> {
        let result = sqlx::query("UPDATE resource_allocations SET active = $2, released_at = $3 WHERE id = $1")
            .bind(*allocation.id.as_uuid())
            .bind(allocation.active)
            .bind(allocation.released_at)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Allocation", allocation.id));
        }
        Ok(())
    }

    #[instrument(skip(conn, movement), fields(resource_id = %movement.resource_id))]
    pub async fn insert_movement(conn: &mut PgConnection, movement: &StockMovement) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO stock_movements
                (id, resource_id, quantity_delta, balance_after, reason, reference_id, actor_ref, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(*movement.id.as_uuid())
        .bind(*movement.resource_id.as_uuid())
        .bind(movement.quantity_delta)
        .bind(movement.balance_after)
        .bind(&movement.reason)
        .bind(&movement.reference_id)
        .bind(&movement.actor_ref)
        .bind(movement.created_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    #[instrument(skip(conn))]
    pub async fn movements(conn: &mut PgConnection, resource_id: ResourceId) -> Result<Vec<StockMovement>, DatabaseError> {
        let rows = sqlx::query_as::<Postgres, MovementRow>(
            r#"
            SELECT id, resource_id, quantity_delta, balance_after, reason, reference_id, actor_ref, created_at
            FROM stock_movements
            WHERE resource_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(*resource_id.as_uuid())
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows.into_iter().map(StockMovement::from).collect())
    }
}
