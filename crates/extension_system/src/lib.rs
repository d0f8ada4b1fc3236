//! # Extension System
//!
//! Composition framework for the gamedock companion server. Extensions are
//! statically linked units of optional server behavior with a defined
//! lifecycle and, optionally, an HTTP surface and client scripts injected
//! into the game shell.
//!
//! ## Architecture
//!
//! * **Contract**: the [`Extension`] lifecycle trait plus capability
//!   handles ([`HttpCapability`]) resolved once at construction time.
//! * **Registry**: an explicit, insertion-ordered collection of
//!   [`ExtensionInfo`] descriptors assembled at process entry and threaded
//!   into the manager. Registration order is significant: it fixes the
//!   order of construction, startup, and script aggregation.
//! * **Manager**: the [`ExtensionsManager`] instantiates only configured
//!   extensions, starts and stops them concurrently, mounts their routers
//!   under `/x/<id>`, and aggregates script paths for the host page.
//!
//! Extensions never learn about each other; the only shared surface is the
//! per-request [`RequestContext`] the manager injects before dispatch.

pub use context::RequestContext;
pub use error::{ExtensionError, ManagerError};
pub use extension::{
    BuildFn, BuiltExtension, Extension, ExtensionInfo, ExtensionRegistry, HttpCapability,
};
pub use manager::{ExtensionConfigs, ExtensionsManager};

pub mod context;
pub mod error;
pub mod extension;
pub mod manager;
pub mod serve;
