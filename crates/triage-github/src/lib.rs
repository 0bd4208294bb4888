//! GitHub backends for triage-sync.
//!
//! - [`GhCli`] drives the `gh` command line tool and implements every
//!   collaborator, boards included.
//! - [`RestClient`] talks to the REST API for repository enumeration and
//!   item fetching only.

pub mod gh;
pub mod rest;
pub mod wire;

pub use gh::{is_gh_available, GhCli, GhExec, GhOutput, ProcessExec, ScriptedExec};
pub use rest::{RestClient, DEFAULT_API_URL};
