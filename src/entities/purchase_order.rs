use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{Display, EnumString};
use uuid::Uuid;
use validator::Validate;

/// Lifecycle states of a purchase order. Orders are created as `Pending`;
/// moving to `Completed` or `Canceled` is a plain update, there is no
/// enforced transition table.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    Default,
    utoipa::ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Completed,
    Canceled,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "purchase_orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[validate(length(
        min = 1,
        max = 100,
        message = "PO number must be between 1 and 100 characters"
    ))]
    pub po_number: String,

    pub vendor_id: Uuid,

    pub order_date: DateTime<Utc>,
    /// Expected delivery date, promised at ordering time.
    pub delivery_date: DateTime<Utc>,
    /// Actual delivery date. Must be stamped when the goods arrive, not at
    /// row creation; the on-time computation compares it against
    /// `delivery_date` directly.
    pub delivered_date: Option<DateTime<Utc>>,

    pub items: Json,
    pub quantity: i32,
    pub status: String,

    pub quality_rating: Option<f64>,
    pub issue_date: DateTime<Utc>,
    /// One-way acknowledgment stamp; set once by the acknowledge operation.
    pub acknowledgment_date: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    /// Parsed status; unknown strings degrade to `Pending` rather than
    /// failing a read path.
    pub fn order_status(&self) -> OrderStatus {
        OrderStatus::from_str(&self.status).unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::vendor::Entity",
        from = "Column::VendorId",
        to = "super::vendor::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Vendor,
}

impl Related<super::vendor::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vendor.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        assert_eq!(OrderStatus::Pending.to_string(), "pending");
        assert_eq!(OrderStatus::Completed.to_string(), "completed");
        assert_eq!(OrderStatus::Canceled.to_string(), "canceled");
        assert_eq!(
            OrderStatus::from_str("completed").unwrap(),
            OrderStatus::Completed
        );
    }

    #[test]
    fn unknown_status_degrades_to_pending() {
        let order = Model {
            id: Uuid::new_v4(),
            po_number: "PO-1".into(),
            vendor_id: Uuid::new_v4(),
            order_date: Utc::now(),
            delivery_date: Utc::now(),
            delivered_date: None,
            items: serde_json::json!([]),
            quantity: 1,
            status: "garbled".into(),
            quality_rating: None,
            issue_date: Utc::now(),
            acknowledgment_date: None,
            created_at: Utc::now(),
            updated_at: None,
        };
        assert_eq!(order.order_status(), OrderStatus::Pending);
    }
}
