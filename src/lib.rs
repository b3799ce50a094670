#![allow(
    clippy::upper_case_acronyms,
    non_camel_case_types,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::too_many_lines,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation
)]

pub mod blocks;
pub mod config;
pub mod core;
pub mod error;
pub mod fetch;
pub mod fifo;
pub mod gate;
pub mod instruction;
pub mod line;
pub mod packet;
pub mod port;
pub mod shader;
pub mod translation;

#[cfg(test)]
pub mod testing;

pub use self::core::{Core, FetchState, RecvStatus};
pub use error::Error;

/// Virtual or physical byte address.
pub type address = u64;
