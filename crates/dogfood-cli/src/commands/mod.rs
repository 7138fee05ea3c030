//! Subcommands of the `dogfood` tool.

pub mod bundle;
pub mod inspect;
pub mod run;
