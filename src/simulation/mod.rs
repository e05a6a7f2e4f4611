//! Channel simulation helpers for tests

pub mod noise;
