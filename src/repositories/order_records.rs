use crate::entities::order_record::{self, Column, Entity as OrderRecordEntity};
use crate::errors::ServiceError;
use crate::models::OrderRecord;
use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use sea_orm::{
    sea_query::OnConflict, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Result of an idempotent insert. `AlreadyExists` carries the stored record,
/// not the one that was offered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(OrderRecord),
    AlreadyExists(OrderRecord),
}

impl InsertOutcome {
    pub fn record(&self) -> &OrderRecord {
        match self {
            InsertOutcome::Inserted(record) | InsertOutcome::AlreadyExists(record) => record,
        }
    }

    pub fn into_record(self) -> OrderRecord {
        match self {
            InsertOutcome::Inserted(record) | InsertOutcome::AlreadyExists(record) => record,
        }
    }

    pub fn was_inserted(&self) -> bool {
        matches!(self, InsertOutcome::Inserted(_))
    }
}

/// Order records keyed by `(order_id, payment_id)`.
#[async_trait]
pub trait OrderRecordRepository: Send + Sync {
    /// Stores `record` unless one already exists for its key.
    async fn insert_if_absent(&self, record: OrderRecord) -> Result<InsertOutcome, ServiceError>;

    async fn find(
        &self,
        order_id: &str,
        payment_id: &str,
    ) -> Result<Option<OrderRecord>, ServiceError>;

    /// All records for one gateway order, oldest first.
    async fn find_by_order_id(&self, order_id: &str) -> Result<Vec<OrderRecord>, ServiceError>;
}

#[derive(Debug, Default)]
pub struct InMemoryOrderRecordRepository {
    records: DashMap<(String, String), OrderRecord>,
}

impl InMemoryOrderRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl OrderRecordRepository for InMemoryOrderRecordRepository {
    async fn insert_if_absent(&self, record: OrderRecord) -> Result<InsertOutcome, ServiceError> {
        let key = (record.order_id.clone(), record.payment_id.clone());
        match self.records.entry(key) {
            Entry::Occupied(existing) => Ok(InsertOutcome::AlreadyExists(existing.get().clone())),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(InsertOutcome::Inserted(record))
            }
        }
    }

    async fn find(
        &self,
        order_id: &str,
        payment_id: &str,
    ) -> Result<Option<OrderRecord>, ServiceError> {
        Ok(self
            .records
            .get(&(order_id.to_string(), payment_id.to_string()))
            .map(|entry| entry.value().clone()))
    }

    async fn find_by_order_id(&self, order_id: &str) -> Result<Vec<OrderRecord>, ServiceError> {
        let mut records: Vec<OrderRecord> = self
            .records
            .iter()
            .filter(|entry| entry.key().0 == order_id)
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by_key(|record| record.created_at);
        Ok(records)
    }
}

/// Database-backed store over the `order_records` table.
#[derive(Debug, Clone)]
pub struct SeaOrmOrderRecordRepository {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmOrderRecordRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl OrderRecordRepository for SeaOrmOrderRecordRepository {
    #[instrument(
        skip(self, record),
        fields(order_id = %record.order_id, payment_id = %record.payment_id)
    )]
    async fn insert_if_absent(&self, record: OrderRecord) -> Result<InsertOutcome, ServiceError> {
        let active = order_record::ActiveModel::try_from(&record)?;

        let inserted = OrderRecordEntity::insert(active)
            .on_conflict(
                OnConflict::columns([Column::GatewayOrderId, Column::GatewayPaymentId])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await?;

        if inserted > 0 {
            return Ok(InsertOutcome::Inserted(record));
        }

        debug!("order record already present");
        match self.find(&record.order_id, &record.payment_id).await? {
            Some(existing) => Ok(InsertOutcome::AlreadyExists(existing)),
            None => Err(ServiceError::InternalError(format!(
                "order record {}/{} neither inserted nor found",
                record.order_id, record.payment_id
            ))),
        }
    }

    async fn find(
        &self,
        order_id: &str,
        payment_id: &str,
    ) -> Result<Option<OrderRecord>, ServiceError> {
        let model = OrderRecordEntity::find_by_id((order_id.to_string(), payment_id.to_string()))
            .one(self.db.as_ref())
            .await?;
        Ok(model.map(|m| m.into_record()).transpose()?)
    }

    async fn find_by_order_id(&self, order_id: &str) -> Result<Vec<OrderRecord>, ServiceError> {
        let models = OrderRecordEntity::find()
            .filter(Column::GatewayOrderId.eq(order_id))
            .order_by_asc(Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;

        models
            .into_iter()
            .map(|m| m.into_record().map_err(ServiceError::from))
            .collect()
    }
}
