pub mod common;
pub mod purchase_orders;
pub mod vendors;

use crate::db::DbPool;
use crate::events::EventSender;
use crate::message_queue::MessageQueue;
use crate::notifications::EmailDispatcher;
use slog::Logger;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub vendors: Arc<crate::services::vendors::VendorService>,
    pub purchase_orders: Arc<crate::services::purchase_orders::PurchaseOrderService>,
    pub performance: Arc<crate::services::performance::PerformanceService>,
    pub email: EmailDispatcher,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        message_queue: Arc<dyn MessageQueue>,
        base_logger: Logger,
        snapshot_on_performance_read: bool,
    ) -> Self {
        let vendors_logger = base_logger.new(slog::o!("component" => "vendor_service"));
        let orders_logger = base_logger.new(slog::o!("component" => "purchase_order_service"));
        let performance_logger = base_logger.new(slog::o!("component" => "performance_service"));
        let email_logger = base_logger.new(slog::o!("component" => "email_dispatcher"));

        let email = EmailDispatcher::new(message_queue, email_logger);

        let performance = Arc::new(crate::services::performance::PerformanceService::new(
            db_pool.clone(),
            event_sender.clone(),
            snapshot_on_performance_read,
            performance_logger,
        ));

        let vendors = Arc::new(crate::services::vendors::VendorService::new(
            db_pool.clone(),
            event_sender.clone(),
            vendors_logger,
        ));

        let purchase_orders = Arc::new(
            crate::services::purchase_orders::PurchaseOrderService::new(
                db_pool,
                event_sender,
                performance.clone(),
                email.clone(),
                orders_logger,
            ),
        );

        Self {
            vendors,
            purchase_orders,
            performance,
            email,
        }
    }
}
