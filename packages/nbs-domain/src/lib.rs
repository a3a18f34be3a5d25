pub mod cell;
pub mod import_path;
pub mod notebook;
pub mod nq;
pub mod page;
pub mod pipeline;
pub mod target;
pub mod value;

mod error;

pub use error::{Error, Result, TraversalReason};
pub use nq::Nq;

/// Array field holding a notebook's cells.
pub const CELLS_FIELD: &str = "cells";
/// Lineage tag fields, addressed relative to a cell.
pub const MEME_CURRENT_FIELD: &str = "metadata.lc_cell_meme.current";
pub const MEME_PREVIOUS_FIELD: &str = "metadata.lc_cell_meme.previous";
pub const MEME_NEXT_FIELD: &str = "metadata.lc_cell_meme.next";
