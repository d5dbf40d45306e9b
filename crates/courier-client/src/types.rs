use serde::{Deserialize, Serialize};

/// Per-account platform credentials, supplied at login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub account: String,
    pub api_id: String,
    pub api_hash: String,
}

/// Outcome of a login or verification step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AuthResult {
    /// Registry entry created; the account can send.
    Authenticated,
    /// A one-time code was sent to the account's device.
    CodeRequired { message: String },
    /// The code was valid but the account has 2FA enabled.
    PasswordRequired,
    /// Invalid input — pending state unchanged, caller should retry.
    Rejected { reason: String },
}

/// Opaque challenge token issued alongside a verification code request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeChallenge(pub String);

/// Result of submitting a verification code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignIn {
    Done,
    /// Two-factor auth enabled — a password step follows.
    PasswordNeeded,
}

/// The platform's entity kinds — a closed set, matched exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerKind {
    User,
    Group,
    Channel,
    Supergroup,
}

/// A concrete addressable recipient, produced by resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub id: i64,
    pub kind: PeerKind,
    pub username: Option<String>,
    pub title: String,
}

/// One entry of the account's known conversation list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dialog {
    pub id: i64,
    pub kind: PeerKind,
    pub username: Option<String>,
    pub title: String,
    pub participants: Option<u32>,
}

impl Dialog {
    pub fn to_peer(&self) -> Peer {
        Peer {
            id: self.id,
            kind: self.kind,
            username: self.username.clone(),
            title: self.title.clone(),
        }
    }
}

pub use courier_core::types::Attachment;
