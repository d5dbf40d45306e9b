//! The opaque capability boundary to the remote messaging platform.
//!
//! Everything Courier needs from the platform fits in [`PlatformClient`]:
//! the 2–3 step login, dialog listing, identifier resolution, and sending.
//! [`PlatformConnector`] is the factory that opens (or restores) one client
//! per account from a session artifact on disk.

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Attachment, CodeChallenge, Credentials, Dialog, Peer, SignIn};

/// One live connection to the platform on behalf of a single account.
///
/// Methods take `&mut self` — a client handle is never used concurrently;
/// the [`ClientActor`](crate::actor::ClientActor) serializes all access.
#[async_trait]
pub trait PlatformClient: Send {
    /// Whether the session artifact carries a valid authorization.
    async fn is_authorized(&mut self) -> Result<bool>;

    /// Ask the platform to send a one-time code to the account's device.
    ///
    /// Fails with [`ClientError::InvalidPhone`](crate::ClientError::InvalidPhone)
    /// before any challenge is issued when the phone format is rejected.
    async fn request_code(&mut self, phone: &str) -> Result<CodeChallenge>;

    /// Submit the one-time code. `SignIn::PasswordNeeded` means 2FA is
    /// enabled and [`sign_in_password`](Self::sign_in_password) must follow.
    async fn sign_in_code(&mut self, challenge: &CodeChallenge, code: &str) -> Result<SignIn>;

    /// Complete a 2FA login.
    async fn sign_in_password(&mut self, password: &str) -> Result<()>;

    /// The account's known conversation list.
    async fn dialogs(&mut self) -> Result<Vec<Dialog>>;

    /// Resolve a public handle (leading `@` included). `Ok(None)` when the
    /// platform knows no such handle.
    async fn resolve_handle(&mut self, handle: &str) -> Result<Option<Peer>>;

    /// Resolve a numeric id the account can address. `Ok(None)` when unknown.
    async fn resolve_id(&mut self, id: i64) -> Result<Option<Peer>>;

    /// Send one message to one peer. All attachments travel in a single
    /// outgoing message.
    async fn send(&mut self, peer: &Peer, body: &str, media: &[Attachment]) -> Result<()>;

    /// Close the connection. Errors are not interesting at this point.
    async fn disconnect(&mut self);
}

/// Opens platform clients. One implementation per driver (`sandbox` in-tree;
/// MTProto out of tree).
#[async_trait]
pub trait PlatformConnector: Send + Sync {
    /// Open a connection for `creds`, loading the session artifact at
    /// `session_path` if one exists (and creating it on successful login).
    async fn open(&self, creds: &Credentials, session_path: &Path)
        -> Result<Box<dyn PlatformClient>>;
}
