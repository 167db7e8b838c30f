//! Reconcile declared network-security objects against a manager that only
//! offers whole-document replace, name-based identity and optimistic
//! concurrency tokens.
//!
//! Each resource kind has a [`Lifecycle`] controller. The [`Engine`] owns a
//! [`Transport`](nsxkit::Transport) and dispatches over [`DesiredResource`].
//!
//! # Example
//!
//! ```
//! use nsxkit::{Method, MockTransport, Response};
//! use reconcile::{DesiredResource, Engine, EngineOptions, IpSetSpec};
//!
//! let mock = MockTransport::new();
//! mock.respond(Method::Get, "/api/2.0/services/ipset/scope/globalroot-0", Response::ok("[]"));
//! mock.respond(
//!     Method::Post,
//!     "/api/2.0/services/ipset/globalroot-0",
//!     Response::new(201, "ipset-7"),
//! );
//!
//! let engine = Engine::new(mock, EngineOptions::default());
//! let web = DesiredResource::IpSet(IpSetSpec {
//!     scope: "globalroot-0".into(),
//!     name: "web".into(),
//!     description: String::new(),
//!     value: "10.0.0.0/24".into(),
//!     object_id: None,
//! });
//! let tracked = engine.create(&web).unwrap();
//! assert_eq!(tracked.handle, "globalroot-0_web");
//! ```

#[macro_use]
mod wire;

pub mod coordinator;
pub mod drift;
pub mod element;
pub mod engine;
pub mod error;
pub mod handle;
pub mod kind;
pub mod lifecycle;
pub mod poller;
pub mod resolver;
pub mod resources;

mod remote;

pub use coordinator::{RevisionPolicy, Snapshot, VersionToken, with_current_version};
pub use drift::FieldChange;
pub use element::{ElementCollection, ElementSet, ElementType, TypedElement};
pub use engine::{Engine, EngineOptions};
pub use error::{Error, ErrorCategory, Result};
pub use kind::ResourceKind;
pub use lifecycle::{Deletion, Lifecycle, Phase, Tracked};
pub use poller::PollOptions;
pub use resources::{
    DesiredResource, EdgeFirewallRuleSpec, FirewallRuleSpec, IpSetSpec, SecurityPolicyRuleSpec,
    ServiceSpec,
};
pub use wire::UnknownVariant;
