//! File I/O: instrument `.dat` parsing, exports, and sequence generation.

pub mod cursor;
pub mod dat;
pub mod export;
pub mod irmdcd;
pub mod sequence;
