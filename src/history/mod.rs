//! Cursor-based pagination over unbounded histories
//!
//! Applies to address transactions, block transactions, mining rewards and
//! the pending pool. Cursors are stateless: the server keeps no session and a
//! cursor is always re-derivable from the last item of the previous page.

pub mod cursor;
pub mod page;

pub use cursor::{Cursor, CursorError};
pub use page::{paginate, Anchored, HistoryPage, DEFAULT_PAGE_SIZE};
