//! CLI command implementations.

pub(crate) mod stream;
pub(crate) mod url;
