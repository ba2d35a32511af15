//! Inventory data model module.
//!
//! # Purpose
//! Re-exports the variant models shared by the API and store layers.
mod variant;

pub use variant::{Variant, VariantDraft};
