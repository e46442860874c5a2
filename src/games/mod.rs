//! Game implementations.

pub mod avalon;
