//! Storage domain: tables, keys and row types.

pub mod rows;
pub mod tables;
