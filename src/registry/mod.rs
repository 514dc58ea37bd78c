//! Frame distribution
//!
//! The distributor tracks which consumers are subscribed to which stream
//! (device × tier) and pushes every assembled frame to them.
//!
//! # Architecture
//!
//! ```text
//!                          Arc<Distributor>
//!                     ┌─────────────────────────┐
//!                     │ streams: HashMap<Key,   │
//!                     │   StreamEntry {         │
//!                     │     subscribers,        │
//!                     │     live, counters,     │
//!                     │   }                     │
//!                     │ >                       │
//!                     └───────────┬─────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         │                       │                       │
//!         ▼                       ▼                       ▼
//!   [FrameAssembler]         [Consumer]              [Consumer]
//!   dispatch()               rx.recv()               rx.recv()
//!         │                       │                       │
//!         └──► try_send() ────────┴──► connection ──► TCP
//! ```
//!
//! # Zero-Copy Design
//!
//! `bytes::Bytes` uses reference counting, so all subscribers share the same
//! payload allocation. Each delivery clones the `Frame`, but the inner
//! `Bytes` data is only reference-counted, not copied.

pub mod entry;
pub mod error;
pub mod frame;
pub mod store;

pub use entry::{DispatchReport, StreamEntry, StreamStats};
pub use error::RegistryError;
pub use frame::{ConsumerHandle, ConsumerId, Delivery, StreamKey};
pub use store::Distributor;
