//! # cfdi-cli: command line for the CFDI stamping stack
//!
//! Provides the `cfdi` binary. Transactions, profiles, concepts and issued
//! documents live in a JSON ledger file (see [`ledger`]); every subcommand
//! loads it, runs one lifecycle operation and writes it back if anything
//! changed.
//!
//! ```bash
//! cfdi validate 6f1c...
//! cfdi --sandbox stamp 6f1c...
//! cfdi cancel 6f1c... --reason 01 --replacement 8a3e...
//! cfdi status 6f1c... --reconcile
//! ```
//!
//! Output is always the JSON form of an operation outcome on stdout; logs
//! go to stderr. The exit code is 0 when the outcome succeeded and 1
//! otherwise.
//!
//! Without `--sandbox`, commands that reach the stamping authority read
//! their provider configuration from `PAC_*` environment variables.

pub mod authority;
pub mod commands;
pub mod ledger;
