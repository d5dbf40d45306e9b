//! `courier-client` — authenticated platform sessions and the single-writer
//! client actor.
//!
//! The remote messaging platform is consumed through the [`api::PlatformClient`]
//! capability trait; production deployments plug an MTProto-backed connector,
//! while the bundled [`sandbox`] driver implements the full contract
//! in-process for development and tests.
//!
//! All live client handles are owned by one [`actor::ClientActor`] task.
//! Callers — request handlers and the scheduler loop alike — go through a
//! cloneable [`actor::ClientHandle`], which marshals every operation onto the
//! actor's context and awaits the reply under a bounded timeout. That is the
//! whole concurrency story: one task touches the connections, everyone else
//! sends messages.

pub mod actor;
pub mod api;
pub mod error;
pub mod registry;
pub mod resolve;
pub mod sandbox;
pub mod types;

pub use actor::{ClientActor, ClientHandle};
pub use api::{PlatformClient, PlatformConnector};
pub use error::{ClientError, Result};
pub use registry::SessionRegistry;
pub use types::{Attachment, AuthResult, CodeChallenge, Credentials, Dialog, Peer, PeerKind};
