//! The single-writer client actor.
//!
//! Exactly one task — the [`ClientActor`] — touches the platform connections.
//! Request handlers and the scheduler loop hold a cloneable [`ClientHandle`]
//! and marshal every operation onto the actor via an mpsc command with a
//! oneshot reply, awaited under a bounded timeout. A timeout surfaces as a
//! login/dispatch failure, never a crash.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use courier_core::config::CLIENT_CALL_TIMEOUT_SECS;

use crate::error::{ClientError, Result};
use crate::registry::SessionRegistry;
use crate::types::{Attachment, AuthResult, Credentials, Dialog, Peer};

/// Command channel depth. Senders back-pressure once the actor falls behind.
const COMMAND_BUFFER: usize = 64;

enum Command {
    Login {
        creds: Credentials,
        reply: oneshot::Sender<Result<AuthResult>>,
    },
    PendingCredentials {
        account: String,
        reply: oneshot::Sender<Option<Credentials>>,
    },
    Verify {
        account: String,
        code: String,
        password: Option<String>,
        reply: oneshot::Sender<Result<AuthResult>>,
    },
    IsConnected {
        account: String,
        reply: oneshot::Sender<bool>,
    },
    Dialogs {
        account: String,
        reply: oneshot::Sender<Result<Vec<Dialog>>>,
    },
    Resolve {
        account: String,
        identifier: String,
        reply: oneshot::Sender<Result<Peer>>,
    },
    Send {
        account: String,
        peer: Peer,
        body: String,
        media: Vec<Attachment>,
        reply: oneshot::Sender<Result<()>>,
    },
    RestoreAll {
        accounts: Vec<Credentials>,
        reply: oneshot::Sender<usize>,
    },
    DisconnectAll {
        reply: oneshot::Sender<()>,
    },
}

/// Task that owns the [`SessionRegistry`] and drains the command channel.
pub struct ClientActor {
    registry: SessionRegistry,
    rx: mpsc::Receiver<Command>,
}

impl ClientActor {
    /// Spawn the actor onto the current runtime and return the handle all
    /// callers share. The task exits when the last handle is dropped.
    pub fn spawn(registry: SessionRegistry) -> ClientHandle {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        tokio::spawn(ClientActor { registry, rx }.run());
        ClientHandle { tx }
    }

    async fn run(mut self) {
        info!("client actor started");
        while let Some(cmd) = self.rx.recv().await {
            self.handle(cmd).await;
        }
        debug!("client actor channel closed, shutting down");
        self.registry.disconnect_all().await;
    }

    async fn handle(&mut self, cmd: Command) {
        // A dropped reply receiver just means the caller timed out; the
        // send results are discarded in that case.
        match cmd {
            Command::Login { creds, reply } => {
                let _ = reply.send(self.registry.login(creds).await);
            }
            Command::PendingCredentials { account, reply } => {
                let _ = reply.send(self.registry.pending_credentials(&account));
            }
            Command::Verify {
                account,
                code,
                password,
                reply,
            } => {
                let res = self
                    .registry
                    .verify(&account, &code, password.as_deref())
                    .await;
                let _ = reply.send(res);
            }
            Command::IsConnected { account, reply } => {
                let _ = reply.send(self.registry.is_connected(&account));
            }
            Command::Dialogs { account, reply } => {
                let _ = reply.send(self.registry.dialogs(&account).await);
            }
            Command::Resolve {
                account,
                identifier,
                reply,
            } => {
                let _ = reply.send(self.registry.resolve(&account, &identifier).await);
            }
            Command::Send {
                account,
                peer,
                body,
                media,
                reply,
            } => {
                let res = self.registry.send(&account, &peer, &body, &media).await;
                let _ = reply.send(res);
            }
            Command::RestoreAll { accounts, reply } => {
                let _ = reply.send(self.registry.restore_all(accounts).await);
            }
            Command::DisconnectAll { reply } => {
                self.registry.disconnect_all().await;
                let _ = reply.send(());
            }
        }
    }
}

/// Cloneable entry point to the client actor.
#[derive(Clone)]
pub struct ClientHandle {
    tx: mpsc::Sender<Command>,
}

impl ClientHandle {
    async fn call<T>(
        &self,
        cmd: Command,
        rx: oneshot::Receiver<T>,
    ) -> Result<T> {
        self.tx.send(cmd).await.map_err(|_| ClientError::ActorClosed)?;
        let timeout = Duration::from_secs(CLIENT_CALL_TIMEOUT_SECS);
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(ClientError::ActorClosed),
            Err(_) => Err(ClientError::Timeout {
                ms: timeout.as_millis() as u64,
            }),
        }
    }

    pub async fn login(&self, creds: Credentials) -> Result<AuthResult> {
        let (reply, rx) = oneshot::channel();
        self.call(Command::Login { creds, reply }, rx).await?
    }

    pub async fn pending_credentials(&self, account: &str) -> Result<Option<Credentials>> {
        let (reply, rx) = oneshot::channel();
        self.call(
            Command::PendingCredentials {
                account: account.to_string(),
                reply,
            },
            rx,
        )
        .await
    }

    pub async fn verify(
        &self,
        account: &str,
        code: &str,
        password: Option<&str>,
    ) -> Result<AuthResult> {
        let (reply, rx) = oneshot::channel();
        self.call(
            Command::Verify {
                account: account.to_string(),
                code: code.to_string(),
                password: password.map(String::from),
                reply,
            },
            rx,
        )
        .await?
    }

    pub async fn is_connected(&self, account: &str) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.call(
            Command::IsConnected {
                account: account.to_string(),
                reply,
            },
            rx,
        )
        .await
    }

    pub async fn dialogs(&self, account: &str) -> Result<Vec<Dialog>> {
        let (reply, rx) = oneshot::channel();
        self.call(
            Command::Dialogs {
                account: account.to_string(),
                reply,
            },
            rx,
        )
        .await?
    }

    pub async fn resolve(&self, account: &str, identifier: &str) -> Result<Peer> {
        let (reply, rx) = oneshot::channel();
        self.call(
            Command::Resolve {
                account: account.to_string(),
                identifier: identifier.to_string(),
                reply,
            },
            rx,
        )
        .await?
    }

    pub async fn send(
        &self,
        account: &str,
        peer: Peer,
        body: &str,
        media: Vec<Attachment>,
    ) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.call(
            Command::Send {
                account: account.to_string(),
                peer,
                body: body.to_string(),
                media,
                reply,
            },
            rx,
        )
        .await?
    }

    pub async fn restore_all(&self, accounts: Vec<Credentials>) -> Result<usize> {
        let (reply, rx) = oneshot::channel();
        self.call(Command::RestoreAll { accounts, reply }, rx).await
    }

    pub async fn disconnect_all(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.call(Command::DisconnectAll { reply }, rx).await
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::api::{PlatformClient, PlatformConnector};
    use crate::registry::SessionRegistry;
    use crate::sandbox::{SandboxConnector, VALID_CODE};
    use crate::types::{CodeChallenge, PeerKind, SignIn};

    fn creds(account: &str) -> Credentials {
        Credentials {
            account: account.to_string(),
            api_id: "1".to_string(),
            api_hash: "h".to_string(),
        }
    }

    async fn connected_handle(dir: &tempfile::TempDir) -> (ClientHandle, SandboxConnector) {
        let connector = SandboxConnector::new();
        let registry = SessionRegistry::new(Arc::new(connector.clone()), dir.path());
        let handle = ClientActor::spawn(registry);
        handle.login(creds("+15552000")).await.unwrap();
        handle.verify("+15552000", VALID_CODE, None).await.unwrap();
        (handle, connector)
    }

    #[tokio::test]
    async fn marshals_auth_and_send_through_one_task() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, connector) = connected_handle(&dir).await;

        assert!(handle.is_connected("+15552000").await.unwrap());

        let peer = handle.resolve("+15552000", "@alice").await.unwrap();
        assert_eq!(peer.kind, PeerKind::User);
        handle
            .send("+15552000", peer, "hello from the actor", Vec::new())
            .await
            .unwrap();

        let outbox = connector.outbox();
        let sent = outbox.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].body, "hello from the actor");
    }

    #[tokio::test]
    async fn concurrent_callers_share_the_handle() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, connector) = connected_handle(&dir).await;

        let mut tasks = Vec::new();
        for i in 0..8 {
            let h = handle.clone();
            tasks.push(tokio::spawn(async move {
                let peer = h.resolve("+15552000", "@bob").await.unwrap();
                h.send("+15552000", peer, &format!("msg {i}"), Vec::new())
                    .await
                    .unwrap();
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }

        assert_eq!(connector.outbox().lock().unwrap().len(), 8);
    }

    /// Authorized on open, then every platform call hangs forever.
    struct StallClient;

    #[async_trait]
    impl PlatformClient for StallClient {
        async fn is_authorized(&mut self) -> Result<bool> {
            Ok(true)
        }
        async fn request_code(&mut self, _phone: &str) -> Result<CodeChallenge> {
            unimplemented!()
        }
        async fn sign_in_code(&mut self, _c: &CodeChallenge, _code: &str) -> Result<SignIn> {
            unimplemented!()
        }
        async fn sign_in_password(&mut self, _password: &str) -> Result<()> {
            unimplemented!()
        }
        async fn dialogs(&mut self) -> Result<Vec<Dialog>> {
            std::future::pending().await
        }
        async fn resolve_handle(&mut self, _handle: &str) -> Result<Option<Peer>> {
            std::future::pending().await
        }
        async fn resolve_id(&mut self, _id: i64) -> Result<Option<Peer>> {
            std::future::pending().await
        }
        async fn send(&mut self, _peer: &Peer, _body: &str, _media: &[Attachment]) -> Result<()> {
            std::future::pending().await
        }
        async fn disconnect(&mut self) {}
    }

    struct StallConnector;

    #[async_trait]
    impl PlatformConnector for StallConnector {
        async fn open(
            &self,
            _creds: &Credentials,
            _path: &Path,
        ) -> Result<Box<dyn PlatformClient>> {
            Ok(Box::new(StallClient))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_platform_call_surfaces_as_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let registry = SessionRegistry::new(Arc::new(StallConnector), dir.path());
        let handle = ClientActor::spawn(registry);

        let auth = handle.login(creds("+15552000")).await.unwrap();
        assert!(matches!(auth, AuthResult::Authenticated));

        let err = handle.dialogs("+15552000").await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout { ms: 30_000 }));
    }

    #[tokio::test]
    async fn disconnect_all_reports_not_connected() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, _connector) = connected_handle(&dir).await;

        handle.disconnect_all().await.unwrap();
        assert!(!handle.is_connected("+15552000").await.unwrap());

        let err = handle.dialogs("+15552000").await.unwrap_err();
        assert!(matches!(err, ClientError::NotConnected { .. }));
    }
}
