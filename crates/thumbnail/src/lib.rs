//! Converts cached thumbnails from a legacy image format to a new one, in
//! place, using a small pool of worker threads around an external image tool.
//!
//! Every thumbnail is handled on its own: a failed conversion is logged and
//! leaves the legacy file where it was, so the sweep can simply be run again.

mod converter;
pub mod error;
mod pool;

pub use crate::converter::{Converter, Magick};
pub use crate::pool::{PoolOptions, Report, WorkItem, convert_all, discover};
