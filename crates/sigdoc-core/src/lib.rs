pub mod assemble;
pub mod cache;
pub mod csv;
pub mod error;
pub mod id;
pub mod model;
pub mod records;

pub use assemble::{PageLayout, assemble, assemble_with, format_long_date};
pub use cache::{CacheConfig, InputMode, KeyValueStore, MemoryStore, RestoredSelection, SelectionCache};
pub use csv::parse_csv;
pub use error::{Error, Result};
pub use id::SessionId;
pub use model::*;
pub use records::{RecordBatch, RecordDraft, filter_records};
