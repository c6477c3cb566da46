//! # Snaptree DOM
//!
//! Element trees and the stable addressing scheme used to refer to their
//! nodes across edits.
//!
//! ```text
//! Element tree ──address_of(locator)──▶ NodeAddress ("./root/views/view[@name=\"v\"]")
//!      ▲                                    │
//!      └──────────locate(address)───────────┘
//! ```
//!
//! A [`Locator`] is a positional handle into one tree shape; a
//! [`NodeAddress`] is recomputed from names and keys, so it still designates
//! the same logical node after siblings are inserted or removed.

mod address;
mod element;
mod error;
mod schema;

pub use address::{NodeAddress, Segment};
pub use element::{Element, Locator};
pub use error::{AddressError, DomResult};
pub use schema::AddressSchema;
