//! Consumer bindings.
//!
//! - `subscribers`: synchronous callbacks with RAII [`Subscription`] handles
//! - `event_bus`: broadcast feed of accepted mutations with sequence numbers

mod event_bus;
mod subscribers;

pub use event_bus::{ChangeBus, StateChange};
pub use subscribers::{Callback, SubscriberSet, Subscription};
