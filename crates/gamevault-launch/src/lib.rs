//! Launch resolution for GameVault
//!
//! Stored launch commands come from vendor data and from the user, so they are validated
//! before anything is started: URIs must use a known launcher scheme, and program paths
//! must exist, must not be a shell or script host, and must not live in the OS system
//! directory. When the stored command cannot be used the game's executable is started
//! directly from its own folder.

mod directive;
mod policy;
mod resolver;
mod spawner;

pub use directive::{DirectiveError, LaunchDirective, parse_directive, uri_scheme};
pub use policy::{DEFAULT_DENIED_INTERPRETERS, DEFAULT_URI_SCHEMES, LaunchPolicy};
pub use resolver::{LaunchOutcome, LaunchRequest, LaunchResolver};
pub use spawner::{OsSpawner, ProcessSpawner, mock};
