//! The DNAStore application: command-line surface and the textual
//! command loop driving the storage engine.

pub mod cli;
pub mod commands;
pub mod controller;
