use std::sync::Arc;

use crate::config::TransferPolicy;
use crate::notify::Publisher;
use crate::settlement::ShareSettlement;
use crate::store::Db;
use crate::types::ProtocolConstants;

/// Everything a handler needs besides the event itself.
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub constants: Arc<ProtocolConstants>,
    pub settlement: Arc<dyn ShareSettlement>,
    pub publisher: Arc<dyn Publisher>,
    pub transfer_policy: TransferPolicy,
}

impl AppState {
    pub fn new(
        db: Db,
        settlement: Arc<dyn ShareSettlement>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            db,
            constants: Arc::new(ProtocolConstants::default()),
            settlement,
            publisher,
            transfer_policy: TransferPolicy::default(),
        }
    }

    pub fn with_transfer_policy(mut self, policy: TransferPolicy) -> Self {
        self.transfer_policy = policy;
        self
    }
}
