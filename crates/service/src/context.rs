use std::sync::Arc;

use crate::broker::MessageBroker;
use crate::notification::Notifier;
use crate::unit_of_work::UnitOfWork;

/// Dependencies handed to every handler of one dispatch.
pub struct HandlerContext {
    pub uow: UnitOfWork,
    pub broker: Arc<dyn MessageBroker>,
    pub notifier: Arc<dyn Notifier>,
    /// Where administrator notices go.
    pub admin_address: Arc<str>,
}
