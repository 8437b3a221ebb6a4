// tests/common/mod.rs
//! Common test utilities for session and API integration testing.

pub mod mock_sources;
pub mod mock_transport;

#[allow(unused_imports)]
pub use mock_sources::{status, ChannelStreamSource, ScriptedSnapshotSource};
#[allow(unused_imports)]
pub use mock_transport::{wait_until, CountingTransport};
