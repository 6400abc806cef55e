// crates/seekmark-cli/src/helpers/mod.rs

pub mod format;
