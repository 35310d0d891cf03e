/// This module provides the lazy CSV item reader.
pub mod csv;
