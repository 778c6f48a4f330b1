//! Command implementations for the Tally CLI

pub mod check;
pub mod dead_letters;
pub mod run;
