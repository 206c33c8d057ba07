use crate::models::{CustomerData, OrderLineItem, OrderRecord, OrderStatus};
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub gateway_order_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub gateway_payment_id: String,

    pub gateway_signature: String,
    pub customer: Json,
    pub items: Json,
    pub subtotal: i64,
    pub discount: i64,
    pub coupon_code: Option<String>,
    pub total_amount: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Decodes the JSON columns back into the domain record.
    pub fn into_record(self) -> Result<OrderRecord, DbErr> {
        let customer: CustomerData = serde_json::from_value(self.customer)
            .map_err(|e| DbErr::Json(format!("customer column: {}", e)))?;
        let items: Vec<OrderLineItem> = serde_json::from_value(self.items)
            .map_err(|e| DbErr::Json(format!("items column: {}", e)))?;
        let status = OrderStatus::parse(&self.status)
            .ok_or_else(|| DbErr::Custom(format!("unknown order status '{}'", self.status)))?;

        Ok(OrderRecord {
            order_id: self.gateway_order_id,
            payment_id: self.gateway_payment_id,
            signature: self.gateway_signature,
            customer,
            items,
            subtotal: self.subtotal,
            discount: self.discount,
            coupon_code: self.coupon_code,
            total_amount: self.total_amount,
            status,
            created_at: self.created_at,
        })
    }
}

impl TryFrom<&OrderRecord> for ActiveModel {
    type Error = DbErr;

    fn try_from(record: &OrderRecord) -> Result<Self, Self::Error> {
        let customer =
            serde_json::to_value(&record.customer).map_err(|e| DbErr::Json(e.to_string()))?;
        let items = serde_json::to_value(&record.items).map_err(|e| DbErr::Json(e.to_string()))?;

        Ok(ActiveModel {
            gateway_order_id: Set(record.order_id.clone()),
            gateway_payment_id: Set(record.payment_id.clone()),
            gateway_signature: Set(record.signature.clone()),
            customer: Set(customer),
            items: Set(items),
            subtotal: Set(record.subtotal),
            discount: Set(record.discount),
            coupon_code: Set(record.coupon_code.clone()),
            total_amount: Set(record.total_amount),
            status: Set(record.status.as_str().to_string()),
            created_at: Set(record.created_at),
        })
    }
}
