pub mod config;
pub mod error;
pub mod ledger;
pub mod market;
pub mod notify;
pub mod payout;
pub mod processors;
pub mod settlement;
pub mod state;
pub mod store;
pub mod types;

pub use error::{Error, Result};
pub use processors::route;
pub use state::AppState;
