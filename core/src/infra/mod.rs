//! Infrastructure layer - storage, logging and the sync ledger

pub mod db;
pub mod logging;
pub mod sync;
