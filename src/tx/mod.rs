//! Transaction submission module: gas planning and the sign-broadcast-confirm
//! pipeline

mod executor;
mod gas;

pub use executor::{CallRequest, TxFailure, TxOutcome, VaultExecutor};
pub use gas::GasPlan;
