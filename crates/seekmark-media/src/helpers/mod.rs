// crates/seekmark-media/src/helpers/mod.rs
//
// Internal utilities shared between the stream backends and the seek engine.

pub mod seek;
