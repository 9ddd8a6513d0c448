//! Service worker runtime
//!
//! Lifecycle, fetch interception and retention for one scope. The host
//! delivers [`Event`]s; [`Registration`] decides which worker generation
//! receives them.

pub mod clients;
pub mod controller;
pub mod notify;
pub mod registration;
pub mod request;
pub mod response;
pub mod sweeper;

pub use clients::ClientRegistry;
pub use controller::{
    ClientMessage, Event, EventOutcome, MessageReply, ResponseSource, Served, ServiceWorker,
    SweepReport,
};
pub use notify::{ClickOutcome, NotificationClick, PushEvent};
pub use registration::{RegisterOutcome, Registration};
pub use request::{InterceptedRequest, RequestCategory};
pub use sweeper::Sweeper;
