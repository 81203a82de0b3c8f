//! Rendering of computed tiles into response bodies.

mod png;

pub use png::{encode_png, to_uint8};
