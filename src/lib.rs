//! wb-bridge: drive workbench-style simulation tools over their scripting socket
//!
//! The workbench and its design tools run an embedded interpreter that accepts
//! plaintext statements on a TCP port. Each statement is terminated by `<EOF>`
//! and answered with `<OK>` on success or an error text otherwise.
//!
//! # Architecture
//!
//! - **Client**: socket exchange, readiness polling, launching the
//!   executable in server mode
//! - **Session**: project operations (open, save, export design points),
//!   coupled structural and thermal systems, and the solver scripts they
//!   run, built as statements on top of the client
//! - **Property bags**: local copies of component properties whose writes
//!   are forwarded to the remote editor
//!
//! # Modules
//!
//! - [`client`]: connection, protocol and process handling
//! - [`config`]: configuration loading and validation
//! - [`error`]: configuration errors
//! - [`property`]: parameter mirror and component definitions
//! - [`script`]: rendering values and calls as statements
//! - [`session`]: project-level operations

pub mod client;
pub mod config;
pub mod error;
pub mod property;
pub mod script;
pub mod session;
