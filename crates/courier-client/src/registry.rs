//! The account → live-connection registry and the 2–3 step login state
//! machine.
//!
//! States: `Unauthenticated → CodeSent → (PasswordRequired →) Authenticated`.
//! Half-authenticated connections wait in the pending-verification map, which
//! is in-memory only and never persisted; a new login attempt for the same
//! account overwrites the previous pending entry.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::api::{PlatformClient, PlatformConnector};
use crate::error::{ClientError, Result};
use crate::resolve;
use crate::types::{Attachment, AuthResult, CodeChallenge, Credentials, Dialog, Peer, SignIn};

/// A half-authenticated connection awaiting its one-time code (and possibly
/// a 2FA password).
struct PendingVerification {
    client: Box<dyn PlatformClient>,
    challenge: CodeChallenge,
    creds: Credentials,
}

/// Owns every live platform connection. Not `Sync` by design — the registry
/// lives inside the client actor task and is never shared.
pub struct SessionRegistry {
    connector: Arc<dyn PlatformConnector>,
    sessions_dir: PathBuf,
    clients: HashMap<String, Box<dyn PlatformClient>>,
    pending: HashMap<String, PendingVerification>,
}

impl SessionRegistry {
    pub fn new(connector: Arc<dyn PlatformConnector>, sessions_dir: impl Into<PathBuf>) -> Self {
        Self {
            connector,
            sessions_dir: sessions_dir.into(),
            clients: HashMap::new(),
            pending: HashMap::new(),
        }
    }

    fn session_path(&self, account: &str) -> PathBuf {
        self.sessions_dir.join(format!("{account}.session"))
    }

    /// Begin (or short-circuit) a login.
    ///
    /// With a valid session artifact on disk the account is `Authenticated`
    /// immediately; otherwise a code challenge is issued and the half-open
    /// connection parks in the pending map.
    pub async fn login(&mut self, creds: Credentials) -> Result<AuthResult> {
        std::fs::create_dir_all(&self.sessions_dir)?;
        let session_path = self.session_path(&creds.account);
        let mut client = self.connector.open(&creds, &session_path).await?;

        if client.is_authorized().await? {
            info!(account = %creds.account, "login: existing session still authorized");
            self.clients.insert(creds.account.clone(), client);
            self.pending.remove(&creds.account);
            return Ok(AuthResult::Authenticated);
        }

        let challenge = match client.request_code(&creds.account).await {
            Ok(c) => c,
            Err(ClientError::InvalidPhone(p)) => {
                // Fails before CodeSent — nothing to park.
                return Ok(AuthResult::Rejected {
                    reason: format!("invalid phone number format: {p}"),
                });
            }
            Err(e) => return Err(e),
        };

        info!(account = %creds.account, "login: verification code requested");
        self.pending.insert(
            creds.account.clone(),
            PendingVerification {
                client,
                challenge,
                creds,
            },
        );
        Ok(AuthResult::CodeRequired {
            message: "Verification code sent to your device.".to_string(),
        })
    }

    /// Credentials parked with the pending verification, if any. Read by the
    /// caller before [`verify`](Self::verify) so it can persist them once the
    /// login completes.
    pub fn pending_credentials(&self, account: &str) -> Option<Credentials> {
        self.pending.get(account).map(|p| p.creds.clone())
    }

    /// Drive the state machine forward with a code or a 2FA password.
    ///
    /// Invalid input leaves the pending state unchanged so the caller can
    /// retry; only success or a superseding login clears it.
    pub async fn verify(
        &mut self,
        account: &str,
        code: &str,
        password: Option<&str>,
    ) -> Result<AuthResult> {
        let pending = self
            .pending
            .get_mut(account)
            .ok_or_else(|| ClientError::NoPendingVerification {
                account: account.to_string(),
            })?;

        if let Some(pw) = password {
            match pending.client.sign_in_password(pw).await {
                Ok(()) => {}
                Err(ClientError::InvalidPassword) => {
                    return Ok(AuthResult::Rejected {
                        reason: "invalid password".to_string(),
                    })
                }
                Err(e) => return Err(e),
            }
        } else {
            let challenge = pending.challenge.clone();
            match pending.client.sign_in_code(&challenge, code).await {
                Ok(SignIn::Done) => {}
                Ok(SignIn::PasswordNeeded) => return Ok(AuthResult::PasswordRequired),
                Err(ClientError::InvalidCode) => {
                    return Ok(AuthResult::Rejected {
                        reason: "invalid verification code".to_string(),
                    })
                }
                Err(e) => return Err(e),
            }
        }

        // Authenticated: promote the connection out of the pending map.
        let promoted = match self.pending.remove(account) {
            Some(p) => p,
            None => {
                return Err(ClientError::NoPendingVerification {
                    account: account.to_string(),
                })
            }
        };
        self.clients.insert(account.to_string(), promoted.client);
        info!(account, "verification complete, session registered");
        Ok(AuthResult::Authenticated)
    }

    pub fn is_connected(&self, account: &str) -> bool {
        self.clients.contains_key(account)
    }

    fn client_mut(&mut self, account: &str) -> Result<&mut Box<dyn PlatformClient>> {
        self.clients
            .get_mut(account)
            .ok_or_else(|| ClientError::NotConnected {
                account: account.to_string(),
            })
    }

    pub async fn dialogs(&mut self, account: &str) -> Result<Vec<Dialog>> {
        self.client_mut(account)?.dialogs().await
    }

    pub async fn resolve(&mut self, account: &str, identifier: &str) -> Result<Peer> {
        let client = self.client_mut(account)?;
        resolve::resolve(client.as_mut(), identifier).await
    }

    pub async fn send(
        &mut self,
        account: &str,
        peer: &Peer,
        body: &str,
        media: &[Attachment],
    ) -> Result<()> {
        self.client_mut(account)?.send(peer, body, media).await
    }

    /// Restore every previously authenticated account at startup.
    ///
    /// An account whose session artifact is missing or no longer authorized
    /// is logged and skipped — never fatal. Returns the restored count.
    pub async fn restore_all(&mut self, accounts: Vec<Credentials>) -> usize {
        let mut restored = 0;
        for creds in accounts {
            let session_path = self.session_path(&creds.account);
            if !session_path.exists() {
                warn!(account = %creds.account, "restore: session artifact not found, skipping");
                continue;
            }
            match self.restore_one(&creds, &session_path).await {
                Ok(true) => {
                    info!(account = %creds.account, "restore: session restored");
                    restored += 1;
                }
                Ok(false) => {
                    warn!(account = %creds.account, "restore: session expired, skipping");
                }
                Err(e) => {
                    warn!(account = %creds.account, error = %e, "restore: failed, skipping");
                }
            }
        }
        restored
    }

    async fn restore_one(&mut self, creds: &Credentials, session_path: &Path) -> Result<bool> {
        let mut client = self.connector.open(creds, session_path).await?;
        if client.is_authorized().await? {
            self.clients.insert(creds.account.clone(), client);
            Ok(true)
        } else {
            client.disconnect().await;
            Ok(false)
        }
    }

    /// Close every live connection and drop all pending verifications.
    pub async fn disconnect_all(&mut self) {
        for (account, client) in self.clients.iter_mut() {
            info!(account = %account, "disconnecting session");
            client.disconnect().await;
        }
        self.clients.clear();
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::{SandboxConnector, VALID_CODE, VALID_PASSWORD};

    fn creds(account: &str) -> Credentials {
        Credentials {
            account: account.to_string(),
            api_id: "12345".to_string(),
            api_hash: "deadbeef".to_string(),
        }
    }

    fn registry(connector: SandboxConnector, dir: &tempfile::TempDir) -> SessionRegistry {
        SessionRegistry::new(Arc::new(connector), dir.path())
    }

    #[tokio::test]
    async fn login_then_code_authenticates() {
        let dir = tempfile::tempdir().unwrap();
        let mut reg = registry(SandboxConnector::new(), &dir);

        let res = reg.login(creds("+15550001")).await.unwrap();
        assert!(matches!(res, AuthResult::CodeRequired { .. }));
        assert!(!reg.is_connected("+15550001"));

        let res = reg.verify("+15550001", VALID_CODE, None).await.unwrap();
        assert!(matches!(res, AuthResult::Authenticated));
        assert!(reg.is_connected("+15550001"));
    }

    #[tokio::test]
    async fn invalid_code_leaves_pending_for_retry() {
        let dir = tempfile::tempdir().unwrap();
        let mut reg = registry(SandboxConnector::new(), &dir);
        reg.login(creds("+15550002")).await.unwrap();

        let res = reg.verify("+15550002", "999999", None).await.unwrap();
        assert!(matches!(res, AuthResult::Rejected { .. }));

        // Retry with the right code still works.
        let res = reg.verify("+15550002", VALID_CODE, None).await.unwrap();
        assert!(matches!(res, AuthResult::Authenticated));
    }

    #[tokio::test]
    async fn two_factor_requires_password_step() {
        let dir = tempfile::tempdir().unwrap();
        let mut reg = registry(SandboxConnector::new().with_two_factor(), &dir);
        reg.login(creds("+15550003")).await.unwrap();

        let res = reg.verify("+15550003", VALID_CODE, None).await.unwrap();
        assert!(matches!(res, AuthResult::PasswordRequired));
        assert!(!reg.is_connected("+15550003"));

        let res = reg
            .verify("+15550003", "", Some(VALID_PASSWORD))
            .await
            .unwrap();
        assert!(matches!(res, AuthResult::Authenticated));
        assert!(reg.is_connected("+15550003"));
    }

    #[tokio::test]
    async fn invalid_phone_rejected_before_code_sent() {
        let dir = tempfile::tempdir().unwrap();
        let mut reg = registry(SandboxConnector::new(), &dir);

        let res = reg.login(creds("not-a-phone")).await.unwrap();
        assert!(matches!(res, AuthResult::Rejected { .. }));
        assert!(reg.pending_credentials("not-a-phone").is_none());
    }

    #[tokio::test]
    async fn verify_without_login_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut reg = registry(SandboxConnector::new(), &dir);
        let err = reg.verify("+15550004", VALID_CODE, None).await.unwrap_err();
        assert!(matches!(err, ClientError::NoPendingVerification { .. }));
    }

    #[tokio::test]
    async fn restore_skips_missing_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let connector = SandboxConnector::new();

        // First registry authenticates and writes the session artifact.
        let mut reg = registry(connector.clone(), &dir);
        reg.login(creds("+15550005")).await.unwrap();
        reg.verify("+15550005", VALID_CODE, None).await.unwrap();

        // A fresh registry restores it; an unknown account is skipped.
        let mut fresh = registry(connector, &dir);
        let restored = fresh
            .restore_all(vec![creds("+15550005"), creds("+15559999")])
            .await;
        assert_eq!(restored, 1);
        assert!(fresh.is_connected("+15550005"));
        assert!(!fresh.is_connected("+15559999"));
    }

    #[tokio::test]
    async fn disconnect_all_clears_registry() {
        let dir = tempfile::tempdir().unwrap();
        let mut reg = registry(SandboxConnector::new(), &dir);
        reg.login(creds("+15550006")).await.unwrap();
        reg.verify("+15550006", VALID_CODE, None).await.unwrap();

        reg.disconnect_all().await;
        assert!(!reg.is_connected("+15550006"));
    }
}
