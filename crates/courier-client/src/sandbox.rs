//! In-process platform driver for development and end-to-end tests.
//!
//! Implements the full [`PlatformClient`] contract against a fixture dialog
//! list: the login code is always [`VALID_CODE`], the 2FA password (when the
//! connector is built `with_two_factor`) is [`VALID_PASSWORD`], and the
//! session artifact is a marker file so restore-at-startup behaves like the
//! real thing. Sent messages land in a shared outbox instead of the network.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::info;

use crate::api::{PlatformClient, PlatformConnector};
use crate::error::{ClientError, Result};
use crate::types::{
    Attachment, CodeChallenge, Credentials, Dialog, Peer, PeerKind, SignIn,
};

/// The one-time code the sandbox accepts.
pub const VALID_CODE: &str = "000000";
/// The 2FA password the sandbox accepts.
pub const VALID_PASSWORD: &str = "sandbox";

/// A message captured by the sandbox instead of being sent.
#[derive(Debug, Clone)]
pub struct SandboxSent {
    pub account: String,
    pub peer_id: i64,
    pub body: String,
    pub media_names: Vec<String>,
}

#[derive(Clone)]
pub struct SandboxConnector {
    two_factor: bool,
    outbox: Arc<Mutex<Vec<SandboxSent>>>,
}

impl SandboxConnector {
    pub fn new() -> Self {
        Self {
            two_factor: false,
            outbox: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Sandbox accounts with 2FA enabled — exercises the password step.
    pub fn with_two_factor(mut self) -> Self {
        self.two_factor = true;
        self
    }

    /// Shared handle to the captured outbox.
    pub fn outbox(&self) -> Arc<Mutex<Vec<SandboxSent>>> {
        Arc::clone(&self.outbox)
    }
}

impl Default for SandboxConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformConnector for SandboxConnector {
    async fn open(
        &self,
        creds: &Credentials,
        session_path: &Path,
    ) -> Result<Box<dyn PlatformClient>> {
        Ok(Box::new(SandboxClient {
            account: creds.account.clone(),
            session_path: session_path.to_path_buf(),
            authorized: session_path.exists(),
            two_factor: self.two_factor,
            outbox: Arc::clone(&self.outbox),
        }))
    }
}

struct SandboxClient {
    account: String,
    session_path: PathBuf,
    authorized: bool,
    two_factor: bool,
    outbox: Arc<Mutex<Vec<SandboxSent>>>,
}

impl SandboxClient {
    fn require_auth(&self) -> Result<()> {
        if self.authorized {
            Ok(())
        } else {
            Err(ClientError::NotConnected {
                account: self.account.clone(),
            })
        }
    }

    fn finish_login(&mut self) -> Result<()> {
        // The marker file is the sandbox's session artifact.
        std::fs::write(&self.session_path, &self.account)?;
        self.authorized = true;
        Ok(())
    }
}

#[async_trait]
impl PlatformClient for SandboxClient {
    async fn is_authorized(&mut self) -> Result<bool> {
        Ok(self.authorized)
    }

    async fn request_code(&mut self, phone: &str) -> Result<CodeChallenge> {
        let digits = phone.strip_prefix('+').unwrap_or("");
        if digits.len() < 7 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(ClientError::InvalidPhone(phone.to_string()));
        }
        Ok(CodeChallenge(format!("sandbox:{phone}")))
    }

    async fn sign_in_code(&mut self, _challenge: &CodeChallenge, code: &str) -> Result<SignIn> {
        if code != VALID_CODE {
            return Err(ClientError::InvalidCode);
        }
        if self.two_factor {
            return Ok(SignIn::PasswordNeeded);
        }
        self.finish_login()?;
        Ok(SignIn::Done)
    }

    async fn sign_in_password(&mut self, password: &str) -> Result<()> {
        if password != VALID_PASSWORD {
            return Err(ClientError::InvalidPassword);
        }
        self.finish_login()
    }

    async fn dialogs(&mut self) -> Result<Vec<Dialog>> {
        self.require_auth()?;
        Ok(fixture_dialogs())
    }

    async fn resolve_handle(&mut self, handle: &str) -> Result<Option<Peer>> {
        self.require_auth()?;
        let wanted = handle.strip_prefix('@').unwrap_or(handle);
        Ok(fixture_dialogs()
            .into_iter()
            .find(|d| {
                d.username
                    .as_deref()
                    .is_some_and(|u| u.eq_ignore_ascii_case(wanted))
            })
            .map(|d| d.to_peer()))
    }

    async fn resolve_id(&mut self, id: i64) -> Result<Option<Peer>> {
        self.require_auth()?;
        Ok(fixture_dialogs()
            .into_iter()
            .find(|d| d.id == id)
            .map(|d| d.to_peer()))
    }

    async fn send(&mut self, peer: &Peer, body: &str, media: &[Attachment]) -> Result<()> {
        self.require_auth()?;
        info!(
            account = %self.account,
            peer_id = peer.id,
            media = media.len(),
            "sandbox send"
        );
        self.outbox.lock().unwrap().push(SandboxSent {
            account: self.account.clone(),
            peer_id: peer.id,
            body: body.to_string(),
            media_names: media.iter().map(|m| m.file_name.clone()).collect(),
        });
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.authorized = false;
    }
}

/// The sandbox account's conversation list.
pub fn fixture_dialogs() -> Vec<Dialog> {
    vec![
        Dialog {
            id: 1001,
            kind: PeerKind::User,
            username: Some("alice".to_string()),
            title: "Alice".to_string(),
            participants: None,
        },
        Dialog {
            id: 1002,
            kind: PeerKind::User,
            username: Some("bob".to_string()),
            title: "Bob".to_string(),
            participants: None,
        },
        Dialog {
            id: 2001,
            kind: PeerKind::Group,
            username: None,
            title: "Friends".to_string(),
            participants: Some(4),
        },
        Dialog {
            id: -1001000000001,
            kind: PeerKind::Supergroup,
            username: None,
            title: "Ops Room".to_string(),
            participants: Some(25),
        },
        Dialog {
            id: -1001000000002,
            kind: PeerKind::Channel,
            username: Some("announce".to_string()),
            title: "Announcements".to_string(),
            participants: Some(1200),
        },
    ]
}
