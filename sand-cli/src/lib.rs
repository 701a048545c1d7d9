//! Command-line front ends for the SAND conformance client.
//!
//! - `sand-client`: runs one conformance check against a DANE ([`cli`]).
//! - `sand-header`: sends SAND messages as request headers ([`inject`]).

pub mod cli;
pub mod inject;
pub mod logging;
