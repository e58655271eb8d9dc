//! tec-sample: mate-paired downsampling of aligned read files
//!
//! Streams a coordinate-sorted BAM once and retains pairs to a target
//! count, deciding each pair's fate on first sight so the sibling
//! mate always follows it.

pub mod cli;
pub mod core;
