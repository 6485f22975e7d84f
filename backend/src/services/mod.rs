//! Business logic services for the POS inventory engine

pub mod audit;
pub mod code_allocator;
pub mod events;
pub mod grn;
pub mod inventory_report;
pub mod ledger;
pub mod stock_movement;

pub use audit::AuditLog;
pub use code_allocator::CodeAllocator;
pub use events::{EventBus, OutboxDispatcher};
pub use grn::GrnService;
pub use inventory_report::StockReportService;
pub use ledger::{LedgerChange, LedgerService};
pub use stock_movement::StockMovementService;

use serde::Serialize;

use crate::error::AppResult;
use crate::models::{DomainEventKind, NewOutboxEvent};
use crate::store::UnitOfWork;

/// Write an event to the outbox of the given (company, shop)
pub(crate) async fn enqueue<T: Serialize + Sync>(
    uow: &mut dyn UnitOfWork,
    event: DomainEventKind,
    (company_id, shop_id): (&str, &str),
    payload: &T,
) -> AppResult<()> {
    let event = NewOutboxEvent::new(event, company_id, shop_id, payload)?;
    uow.enqueue_event(event).await
}
