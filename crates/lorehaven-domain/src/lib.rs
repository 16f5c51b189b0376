//! Domain types shared across Lorehaven services.
//!
//! This crate contains only pure types with no framework dependencies.
//! Import in `usecase/` and `domain/` layers; never depend on `infra/` from here.

pub mod id;
pub mod verification;
