//! Table layer: seats, sessions, bots and the outbound transport seam.

pub mod bots;
pub mod registry;
pub mod supervisor;
pub mod transport;

pub use registry::TableRegistry;
pub use supervisor::{NoopObserver, SessionObserver, Table, TableConfig, TableContext, TableStage};
pub use transport::{ChannelTransport, CollectingTransport, Transport};
