//! JSON Lines dataset storage.
//!
//! # Overview
//!
//! - **Pending pool**: tasks waiting for generation (`pending.jsonl`)
//! - **Partitions**: one append-only file per disposition (see [`Partition`])
//! - **Primitives**: single-write appends, tolerant reads and atomic rewrites
//!
//! # Usage
//!
//! ```rust,ignore
//! use script_forge::storage::{DatasetStore, Partition};
//!
//! let store = DatasetStore::in_dir("data");
//! store.append(Partition::Accepted, &sample).await?;
//! let accepted = store.read(Partition::Accepted).await?;
//! ```

pub mod jsonl;
pub mod partition;
pub mod store;

pub use jsonl::{append_record, ensure_parent, read_records, rewrite_records};
pub use partition::{Partition, PartitionPaths};
pub use store::DatasetStore;
