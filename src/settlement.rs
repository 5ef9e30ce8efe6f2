//! Share-token settlement hook run after outcome-share transfers.

use async_trait::async_trait;
use ethers::types::Address;
use tracing::debug;

use crate::error::Result;
use crate::store::Db;
use crate::types::hex_id;

#[async_trait]
pub trait ShareSettlement: Send + Sync {
    async fn settle(&self, db: &Db, market: Address, from: Address, to: Address) -> Result<()>;
}

/// Settlement that does nothing, for running without position tracking.
#[derive(Debug, Default, Clone)]
pub struct NoopSettlement;

#[async_trait]
impl ShareSettlement for NoopSettlement {
    async fn settle(&self, _db: &Db, market: Address, from: Address, to: Address) -> Result<()> {
        debug!(
            market = %hex_id(market),
            from = %hex_id(from),
            to = %hex_id(to),
            "share settlement skipped"
        );
        Ok(())
    }
}
