//! Appending to existing PDF documents.
//!
//! ```text
//! PdfDocument (read-only source)
//!     ↓
//! [IncrementalUpdate] (snapshot: reserve / register / put)
//!     ↓
//! original bytes + new objects + xref section + trailer
//! ```

mod incremental;

pub use incremental::{IncrementalUpdate, WrittenUpdate};
