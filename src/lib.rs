//! Lock-protected, remotely-sourced artifacts with change notification
//!
//! An *artifact* is a mutable value fetched from a remote source that can be
//! safely read and updated across concurrent tasks, and that notifies
//! registered listener channels whenever its content changes. A [`Poller`]
//! tracks any number of artifacts under logical names and conditionally
//! re-fetches each one on an interval, applying new content only when the
//! source reports a modification time strictly newer than the artifact's
//! own.
//!
//! ```text
//! application ── ArtifactCell::new ──► Poller::register (initial fetch)
//!                                              │
//!                                              ▼
//!                  monitor_updates tick ──► conditional fetch per name
//!                                              │ header newer than local?
//!                                              ▼
//!                  exclusive lock ──► Artifact::update ──► notify fan-out
//!                                                          (try-send, never blocks)
//! ```
//!
//! ## Modules
//!
//! - [`artifact`]: the artifact capability set, the `Notifier` base state,
//!   and the shared `ArtifactCell` handle
//! - [`poller`]: registration and the background refresh loop
//! - [`clock`]: injectable time source for deterministic tests
//! - [`config`]: TOML-loadable poller configuration
//! - [`error`]: crate error type

pub mod artifact;
pub mod clock;
pub mod config;
pub mod error;
pub mod poller;

pub use artifact::{Artifact, ArtifactCell, Notifier};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::PollerConfig;
pub use error::{Error, Result};
pub use poller::{Poller, PollerBuilder};
