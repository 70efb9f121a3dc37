//! NVMe admin command set
//!
//! Builds [AdminCommand](crate::AdminCommand)s from semantic parameters.
//! All functions here are pure, they only pack fields into command dwords.
//!
//! The specification documents can be found at <https://nvmexpress.org/specifications/>
//! specifically: NVM Express Base Specification

mod features;
mod identify;
mod log_page;

pub use features::*;
pub use identify::*;
pub use log_page::*;
