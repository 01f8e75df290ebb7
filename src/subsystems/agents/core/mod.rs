//! Shared agent building blocks.

pub mod prompt;
