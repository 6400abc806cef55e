// crates/seekmark-core/src/helpers/mod.rs
//
// Small pure helpers shared by seekmark-media and the front end.

pub mod time;
