//! Fixed-format batch files
//!
//! Files that arrive without a header and are cleaned by a fixed policy
//! rather than reconciled against the expected columns.

pub mod ordens_filhas;

pub use ordens_filhas::{process_ordens_filhas, BASE_LABEL, DEFAULT_INPUT};
