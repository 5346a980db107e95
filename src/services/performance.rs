use crate::{
    db::DbPool,
    entities::{historical_performance, purchase_order, vendor, OrderStatus},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use slog::Logger;
use std::sync::Arc;
use tracing::{instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// The four derived vendor metrics. Rates are percentages in [0, 100];
/// response time is hours, rounded to two decimals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VendorMetrics {
    pub on_time_delivery_rate: f64,
    pub quality_rating_avg: f64,
    pub average_response_time: f64,
    pub fulfillment_rate: f64,
}

impl From<&vendor::Model> for VendorMetrics {
    fn from(v: &vendor::Model) -> Self {
        Self {
            on_time_delivery_rate: v.on_time_delivery_rate,
            quality_rating_avg: v.quality_rating_avg,
            average_response_time: v.average_response_time,
            fulfillment_rate: v.fulfillment_rate,
        }
    }
}

/// Recompute a vendor's metrics from an immutable snapshot of its complete
/// order set. Always a full scan, never incremental.
///
/// The completion-gated metrics (on-time rate, fulfillment rate, quality
/// average) are only recomputed when the order that triggered the refresh is
/// completed; otherwise the previous values carry over. The response-time
/// average is recomputed on every trigger.
///
/// On-time detection compares `delivered_date` against the promised
/// `delivery_date` directly, so it is only as accurate as the stamping of
/// `delivered_date` at actual delivery time. An order without a
/// `delivered_date` never counts as on time.
pub fn recompute(
    current: &VendorMetrics,
    orders: &[purchase_order::Model],
    changed_status: OrderStatus,
) -> VendorMetrics {
    let mut next = current.clone();

    if changed_status == OrderStatus::Completed {
        let completed: Vec<&purchase_order::Model> = orders
            .iter()
            .filter(|o| o.order_status() == OrderStatus::Completed)
            .collect();

        let on_time = completed
            .iter()
            .filter(|o| o.delivered_date.map_or(false, |d| d <= o.delivery_date))
            .count();
        next.on_time_delivery_rate = if completed.is_empty() {
            0.0
        } else {
            on_time as f64 / completed.len() as f64 * 100.0
        };

        // Denominator counts orders of any status.
        let fulfilled = completed
            .iter()
            .filter(|o| o.quality_rating.map_or(false, |q| q > 0.0))
            .count();
        next.fulfillment_rate = if orders.is_empty() {
            0.0
        } else {
            fulfilled as f64 / orders.len() as f64 * 100.0
        };

        let ratings: Vec<f64> = completed.iter().filter_map(|o| o.quality_rating).collect();
        next.quality_rating_avg = if ratings.is_empty() {
            0.0
        } else {
            ratings.iter().sum::<f64>() / ratings.len() as f64
        };
    }

    let response_secs: Vec<i64> = orders
        .iter()
        .filter_map(|o| {
            o.acknowledgment_date
                .map(|ack| (ack - o.issue_date).num_seconds())
        })
        .collect();
    next.average_response_time = if response_secs.is_empty() {
        0.0
    } else {
        let mean_secs = response_secs.iter().sum::<i64>() as f64 / response_secs.len() as f64;
        (mean_secs / 3600.0 * 100.0).round() / 100.0
    };

    next
}

/// Owns the recompute-and-snapshot flow triggered after every purchase-order
/// write and, optionally, on performance reads.
///
/// There is deliberately no transaction or version token around the
/// read-recompute-write of the vendor aggregates; concurrent writes to the
/// same vendor's orders can lose an aggregate update. Accepted limitation.
#[derive(Clone)]
pub struct PerformanceService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    snapshot_on_read: bool,
    logger: Logger,
}

impl PerformanceService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        snapshot_on_read: bool,
        logger: Logger,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            snapshot_on_read,
            logger,
        }
    }

    /// Post-write hook: recompute the owning vendor's metrics from its full
    /// order set, persist them and append a snapshot row.
    #[instrument(skip(self), fields(vendor_id = %vendor_id))]
    pub async fn refresh_for_order(
        &self,
        vendor_id: Uuid,
        changed_status: OrderStatus,
    ) -> Result<VendorMetrics, ServiceError> {
        let db = &*self.db_pool;

        let vendor = vendor::Entity::find_by_id(vendor_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Vendor {} not found", vendor_id)))?;

        let orders = purchase_order::Entity::find()
            .filter(purchase_order::Column::VendorId.eq(vendor_id))
            .all(db)
            .await?;

        let metrics = recompute(&VendorMetrics::from(&vendor), &orders, changed_status);

        let mut active: vendor::ActiveModel = vendor.into();
        active.on_time_delivery_rate = Set(metrics.on_time_delivery_rate);
        active.quality_rating_avg = Set(metrics.quality_rating_avg);
        active.average_response_time = Set(metrics.average_response_time);
        active.fulfillment_rate = Set(metrics.fulfillment_rate);
        active.updated_at = Set(Some(Utc::now()));
        active.update(db).await?;

        self.append_snapshot(vendor_id, &metrics).await?;

        slog::info!(self.logger, "vendor metrics recomputed";
            "vendor_id" => vendor_id.to_string(),
            "orders" => orders.len(),
            "on_time_delivery_rate" => metrics.on_time_delivery_rate,
        );

        Ok(metrics)
    }

    /// Current metrics for a vendor; `None` when the vendor does not exist.
    /// When snapshot-on-read is enabled a snapshot row is appended even
    /// though nothing changed, so history also grows from read traffic.
    #[instrument(skip(self), fields(vendor_id = %vendor_id))]
    pub async fn vendor_performance(
        &self,
        vendor_id: Uuid,
    ) -> Result<Option<VendorMetrics>, ServiceError> {
        let db = &*self.db_pool;

        let vendor = match vendor::Entity::find_by_id(vendor_id).one(db).await? {
            Some(v) => v,
            None => return Ok(None),
        };

        let metrics = VendorMetrics::from(&vendor);

        if self.snapshot_on_read {
            self.append_snapshot(vendor_id, &metrics).await?;
        }

        Ok(Some(metrics))
    }

    /// Snapshot history for a vendor, newest first. `None` when the vendor
    /// does not exist.
    #[instrument(skip(self), fields(vendor_id = %vendor_id))]
    pub async fn history(
        &self,
        vendor_id: Uuid,
    ) -> Result<Option<Vec<historical_performance::Model>>, ServiceError> {
        let db = &*self.db_pool;

        if vendor::Entity::find_by_id(vendor_id).one(db).await?.is_none() {
            return Ok(None);
        }

        let rows = historical_performance::Entity::find()
            .filter(historical_performance::Column::VendorId.eq(vendor_id))
            .order_by_desc(historical_performance::Column::Date)
            .all(db)
            .await?;

        Ok(Some(rows))
    }

    async fn append_snapshot(
        &self,
        vendor_id: Uuid,
        metrics: &VendorMetrics,
    ) -> Result<(), ServiceError> {
        let snapshot = historical_performance::ActiveModel {
            id: Set(Uuid::new_v4()),
            vendor_id: Set(vendor_id),
            date: Set(Utc::now()),
            on_time_delivery_rate: Set(metrics.on_time_delivery_rate),
            quality_rating_avg: Set(metrics.quality_rating_avg),
            average_response_time: Set(metrics.average_response_time),
            fulfillment_rate: Set(metrics.fulfillment_rate),
        };
        snapshot.insert(&*self.db_pool).await?;

        if let Err(e) = self
            .event_sender
            .send(Event::VendorMetricsRecorded { vendor_id })
            .await
        {
            warn!(vendor_id = %vendor_id, error = %e, "failed to emit metrics event");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use rstest::rstest;

    fn base_time() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    struct OrderFixture {
        status: OrderStatus,
        delivered_offset_hours: Option<i64>,
        quality_rating: Option<f64>,
        ack_offset_hours: Option<i64>,
    }

    impl Default for OrderFixture {
        fn default() -> Self {
            Self {
                status: OrderStatus::Pending,
                delivered_offset_hours: None,
                quality_rating: None,
                ack_offset_hours: None,
            }
        }
    }

    fn order(fx: OrderFixture) -> purchase_order::Model {
        let t = base_time();
        purchase_order::Model {
            id: Uuid::new_v4(),
            po_number: Uuid::new_v4().to_string(),
            vendor_id: Uuid::new_v4(),
            order_date: t,
            delivery_date: t + Duration::days(7),
            delivered_date: fx
                .delivered_offset_hours
                .map(|h| t + Duration::days(7) + Duration::hours(h)),
            items: serde_json::json!([{"item_name": "widget", "quantity": 5}]),
            quantity: 5,
            status: fx.status.to_string(),
            quality_rating: fx.quality_rating,
            issue_date: t,
            acknowledgment_date: fx.ack_offset_hours.map(|h| t + Duration::hours(h)),
            created_at: t,
            updated_at: None,
        }
    }

    #[test]
    fn no_orders_yields_zero_metrics() {
        let metrics = recompute(&VendorMetrics::default(), &[], OrderStatus::Completed);
        assert_eq!(metrics, VendorMetrics::default());
    }

    #[test]
    fn single_on_time_completed_order_scores_100() {
        let orders = vec![order(OrderFixture {
            status: OrderStatus::Completed,
            delivered_offset_hours: Some(-24),
            ..Default::default()
        })];
        let metrics = recompute(&VendorMetrics::default(), &orders, OrderStatus::Completed);
        assert_eq!(metrics.on_time_delivery_rate, 100.0);
    }

    #[test]
    fn single_late_completed_order_scores_0() {
        let orders = vec![order(OrderFixture {
            status: OrderStatus::Completed,
            delivered_offset_hours: Some(24),
            ..Default::default()
        })];
        let metrics = recompute(&VendorMetrics::default(), &orders, OrderStatus::Completed);
        assert_eq!(metrics.on_time_delivery_rate, 0.0);
    }

    #[test]
    fn on_time_rate_mixes_to_50_percent() {
        let orders = vec![
            order(OrderFixture {
                status: OrderStatus::Completed,
                delivered_offset_hours: Some(-24),
                ..Default::default()
            }),
            order(OrderFixture {
                status: OrderStatus::Completed,
                delivered_offset_hours: Some(24),
                ..Default::default()
            }),
        ];
        let metrics = recompute(&VendorMetrics::default(), &orders, OrderStatus::Completed);
        assert_eq!(metrics.on_time_delivery_rate, 50.0);
    }

    #[test]
    fn completed_order_without_delivered_date_is_not_on_time() {
        let orders = vec![order(OrderFixture {
            status: OrderStatus::Completed,
            delivered_offset_hours: None,
            ..Default::default()
        })];
        let metrics = recompute(&VendorMetrics::default(), &orders, OrderStatus::Completed);
        assert_eq!(metrics.on_time_delivery_rate, 0.0);
    }

    #[test]
    fn delivery_exactly_on_the_deadline_counts_as_on_time() {
        let orders = vec![order(OrderFixture {
            status: OrderStatus::Completed,
            delivered_offset_hours: Some(0),
            ..Default::default()
        })];
        let metrics = recompute(&VendorMetrics::default(), &orders, OrderStatus::Completed);
        assert_eq!(metrics.on_time_delivery_rate, 100.0);
    }

    #[test]
    fn fulfillment_denominator_counts_all_statuses() {
        // One rated completed order out of four orders total.
        let orders = vec![
            order(OrderFixture {
                status: OrderStatus::Completed,
                quality_rating: Some(4.0),
                ..Default::default()
            }),
            order(OrderFixture {
                status: OrderStatus::Pending,
                ..Default::default()
            }),
            order(OrderFixture {
                status: OrderStatus::Canceled,
                ..Default::default()
            }),
            order(OrderFixture {
                status: OrderStatus::Completed,
                quality_rating: None,
                ..Default::default()
            }),
        ];
        let metrics = recompute(&VendorMetrics::default(), &orders, OrderStatus::Completed);
        assert_eq!(metrics.fulfillment_rate, 25.0);
    }

    #[test]
    fn zero_quality_rating_does_not_count_as_fulfilled() {
        let orders = vec![order(OrderFixture {
            status: OrderStatus::Completed,
            quality_rating: Some(0.0),
            ..Default::default()
        })];
        let metrics = recompute(&VendorMetrics::default(), &orders, OrderStatus::Completed);
        assert_eq!(metrics.fulfillment_rate, 0.0);
    }

    #[test]
    fn quality_average_ignores_unrated_and_non_completed_orders() {
        let orders = vec![
            order(OrderFixture {
                status: OrderStatus::Completed,
                quality_rating: Some(3.0),
                ..Default::default()
            }),
            order(OrderFixture {
                status: OrderStatus::Completed,
                quality_rating: Some(5.0),
                ..Default::default()
            }),
            order(OrderFixture {
                status: OrderStatus::Completed,
                quality_rating: None,
                ..Default::default()
            }),
            order(OrderFixture {
                status: OrderStatus::Pending,
                quality_rating: Some(1.0),
                ..Default::default()
            }),
        ];
        let metrics = recompute(&VendorMetrics::default(), &orders, OrderStatus::Completed);
        assert_eq!(metrics.quality_rating_avg, 4.0);
    }

    #[test]
    fn response_time_is_mean_hours_rounded_to_two_decimals() {
        // 90 minutes and 30 minutes -> mean 60 minutes -> 1.0h
        let orders = vec![
            order(OrderFixture {
                ack_offset_hours: None,
                ..Default::default()
            }),
            {
                let mut o = order(OrderFixture::default());
                o.acknowledgment_date = Some(o.issue_date + Duration::minutes(90));
                o
            },
            {
                let mut o = order(OrderFixture::default());
                o.acknowledgment_date = Some(o.issue_date + Duration::minutes(30));
                o
            },
        ];
        let metrics = recompute(&VendorMetrics::default(), &orders, OrderStatus::Pending);
        assert_eq!(metrics.average_response_time, 1.0);
    }

    #[test]
    fn response_time_rounding_keeps_two_decimals() {
        // 100 minutes = 1.666..h -> 1.67
        let mut o = order(OrderFixture::default());
        o.acknowledgment_date = Some(o.issue_date + Duration::minutes(100));
        let metrics = recompute(&VendorMetrics::default(), &[o], OrderStatus::Pending);
        assert_eq!(metrics.average_response_time, 1.67);
    }

    #[test]
    fn non_completed_trigger_carries_prior_completion_metrics() {
        let current = VendorMetrics {
            on_time_delivery_rate: 100.0,
            quality_rating_avg: 4.5,
            average_response_time: 2.0,
            fulfillment_rate: 75.0,
        };
        // Order set that would change every completion metric if recomputed.
        let orders = vec![order(OrderFixture {
            status: OrderStatus::Pending,
            ..Default::default()
        })];
        let metrics = recompute(&current, &orders, OrderStatus::Pending);
        assert_eq!(metrics.on_time_delivery_rate, 100.0);
        assert_eq!(metrics.quality_rating_avg, 4.5);
        assert_eq!(metrics.fulfillment_rate, 75.0);
        // Response time is always recomputed; no acknowledgments here.
        assert_eq!(metrics.average_response_time, 0.0);
    }

    #[rstest]
    #[case(1, 0, 0.0)]
    #[case(1, 1, 50.0)]
    #[case(3, 1, 75.0)]
    fn on_time_rate_cases(
        #[case] on_time: usize,
        #[case] late: usize,
        #[case] expected: f64,
    ) {
        let mut orders = Vec::new();
        for _ in 0..on_time {
            orders.push(order(OrderFixture {
                status: OrderStatus::Completed,
                delivered_offset_hours: Some(-1),
                ..Default::default()
            }));
        }
        for _ in 0..late {
            orders.push(order(OrderFixture {
                status: OrderStatus::Completed,
                delivered_offset_hours: Some(1),
                ..Default::default()
            }));
        }
        let metrics = recompute(&VendorMetrics::default(), &orders, OrderStatus::Completed);
        assert!((metrics.on_time_delivery_rate - expected).abs() < 1e-9);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_order() -> impl Strategy<Value = purchase_order::Model> {
            (
                prop_oneof![
                    Just(OrderStatus::Pending),
                    Just(OrderStatus::Completed),
                    Just(OrderStatus::Canceled),
                ],
                proptest::option::of(-240i64..240),
                proptest::option::of(0.0f64..=5.0),
                proptest::option::of(0i64..720),
            )
                .prop_map(|(status, delivered, rating, ack)| {
                    order(OrderFixture {
                        status,
                        delivered_offset_hours: delivered,
                        quality_rating: rating,
                        ack_offset_hours: ack,
                    })
                })
        }

        proptest! {
            #[test]
            fn rates_stay_bounded(orders in proptest::collection::vec(arb_order(), 0..24)) {
                let metrics = recompute(
                    &VendorMetrics::default(),
                    &orders,
                    OrderStatus::Completed,
                );
                prop_assert!((0.0..=100.0).contains(&metrics.on_time_delivery_rate));
                prop_assert!((0.0..=100.0).contains(&metrics.fulfillment_rate));
                prop_assert!(metrics.quality_rating_avg >= 0.0);
                prop_assert!(metrics.average_response_time >= 0.0);
            }

            #[test]
            fn recompute_is_deterministic(orders in proptest::collection::vec(arb_order(), 0..12)) {
                let a = recompute(&VendorMetrics::default(), &orders, OrderStatus::Completed);
                let b = recompute(&VendorMetrics::default(), &orders, OrderStatus::Completed);
                prop_assert_eq!(a, b);
            }
        }
    }
}
