#![allow(dead_code)]

pub mod alloc_meter;
pub mod fixtures;
