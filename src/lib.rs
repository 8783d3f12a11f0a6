//! Session gateway and guard for the admin back office.
//!
//! The crate sits between the admin pages and a hosted identity provider:
//! the edge gateway classifies every inbound request and validates or
//! refreshes the session before a page handler runs, the auth handlers
//! mutate the session, and the client guard keeps an already-rendered view
//! in sync with out-of-band session changes.

pub mod cli;
pub mod guard;
pub mod identity;
pub mod soglia;
