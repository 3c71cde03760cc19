//! Core types for the Texos commerce engine.
//!
//! Type-safe wrappers for identifiers, emails, money and the persisted
//! status vocabularies.

pub mod email;
pub mod id;
pub mod money;
pub mod page;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{from_minor_units, round_money, to_minor_units};
pub use page::{Page, PageRequest};
pub use status::*;
