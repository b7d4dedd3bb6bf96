pub mod cli;
pub mod config;
pub mod media;
pub mod models;
pub mod persist;
pub mod store;
pub mod summary;
pub mod totals;
pub mod utils;

pub use config::{BusinessInfo, Config};
pub use models::{Client, Invoice, LineItem, Note, ScheduleEntry, TotalsBreakdown, Weekday};
pub use persist::{BlobStore, MemoryBlobStore, SqliteBlobStore};
pub use store::{RecordStore, StoreError};
pub use totals::compute_totals;
pub use utils::Profile;
