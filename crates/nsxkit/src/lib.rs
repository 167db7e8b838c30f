//! Client for an NSX-style network security configuration API.
//!
//! This crate is deliberately thin. It knows the wire model and paths of each
//! object family and how to send a request; it does not interpret status
//! codes or retry anything.
//!
//! # Example
//!
//! ```
//! use nsxkit::api::ipset;
//! use nsxkit::{Method, MockTransport, Response, Transport};
//!
//! let mock = MockTransport::new();
//! mock.respond(
//!     Method::Get,
//!     "/api/2.0/services/ipset/scope/globalroot-0",
//!     Response::ok(r#"[{"objectId":"ipset-1","name":"web","value":"10.0.0.1"}]"#),
//! );
//!
//! let sets: Vec<ipset::IpSet> = mock.send(&ipset::get_all("globalroot-0")).unwrap().json().unwrap();
//! assert_eq!(sets[0].name, "web");
//! ```

pub mod api;
pub mod error;
pub mod transport;

pub use error::{Error, Result};
pub use transport::http::{HttpOptions, HttpTransport};
pub use transport::{Method, MockTransport, Request, Response, Transport};
