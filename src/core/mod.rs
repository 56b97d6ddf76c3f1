//! Core template logic — value model, tag normalization, resolution, binding.

pub mod binder;
pub mod decoder;
pub mod intrinsics;
pub mod markup;
pub mod model;
pub mod resolver;
pub mod value;
