//! annograph-cli: batch front end over the annograph crates.
//!
//! The offline subcommands live in [`commands`] so they can be tested
//! without a database; `main.rs` only parses arguments and prints.

pub mod commands;
