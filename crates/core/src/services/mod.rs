//! Engines.
//!
//! Each service borrows a store (and, for payments, a gateway) for the
//! duration of a request, in the same way the HTTP handlers borrow the
//! shared state.

pub mod addresses;
pub mod cart;
pub mod catalog;
pub mod orders;
pub mod payments;
pub mod settings;

pub use addresses::{AddressBook, MAX_ADDRESSES_PER_USER};
pub use cart::CartService;
pub use catalog::CatalogService;
pub use orders::OrderService;
pub use payments::{Buyer, PaymentService, PaymentSignal, ReconcileOutcome, SignalSource, WebhookOutcome};
pub use settings::SettingsService;
