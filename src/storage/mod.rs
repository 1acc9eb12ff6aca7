//! Persistence for thresholds, breaches, notifications and subscriptions
//!
//! The `AlertStore` trait is the only thing the rest of the crate sees;
//! `SqliteStore` is the implementation used by the hub.
//!
//! ## Usage
//!
//! ```no_run
//! use citywatch::storage::{AlertStore, sqlite::SqliteStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = SqliteStore::new("./citywatch.db").await?;
//!     let thresholds = store.list_thresholds().await?;
//!     println!("{} thresholds configured", thresholds.len());
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod schema;
pub mod sqlite;

pub use backend::{AlertStore, HealthStatus};
pub use error::{StorageError, StorageResult};
pub use schema::{
    AckedBreach, Breach, BreachFilter, BreachSeverity, Channel, DeliveryReport, DeliveryResult,
    Notification, NotificationSeverity, NotificationStatus, OperatorContact, PushSubscription,
    Threshold,
};
