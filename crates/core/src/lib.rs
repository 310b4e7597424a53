//! Domain types and pure logic for the Wan2GP generation gateway.
//!
//! Nothing in this crate performs I/O: the job model, the engine parameter
//! table, and the request normalizer are all plain data and functions so
//! they can be tested exhaustively without a backend.

pub mod error;
pub mod job;
pub mod modes;
pub mod normalize;
pub mod params;
pub mod resolution;
pub mod types;
