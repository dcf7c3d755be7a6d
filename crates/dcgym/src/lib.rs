#![doc = include_str!("../readme.md")]

pub mod core;
pub mod env;
pub mod workload;
