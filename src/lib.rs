pub mod append;
pub mod compare;
pub mod discrepancy;
pub mod error;
pub mod export;
pub mod index;
pub mod joins;
pub mod loaders;
pub mod logging;
pub mod matcher;
pub mod models;
pub mod reconcile;
pub mod registration;
pub mod report;
pub mod table;
pub mod vault;
pub mod window;
