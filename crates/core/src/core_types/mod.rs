//! Core types and utilities

pub mod atom;
pub mod units;
pub mod vec3;

pub use atom::*;
pub use units::*;
pub use vec3::{Offset, Vec3};
