//! Recipient resolution — turning the raw identifier strings callers supply
//! into concrete [`Peer`]s.
//!
//! Identifiers arrive in several ambiguous shapes (`@handle`, `-100…`
//! supergroup ids, bare numeric ids, bare handles), so resolution is a
//! first-success-wins cascade, with a dialog-list scan as the final
//! fallback. A miss is reported per recipient and never aborts a batch.

use tracing::debug;

use crate::api::PlatformClient;
use crate::error::{ClientError, Result};
use crate::types::Peer;

/// Prefix convention for supergroup/channel ids.
const SUPERGROUP_PREFIX: &str = "-100";

/// The shape of a raw identifier, decided by inspection alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentifierKind {
    /// Starts with `@` — a public handle.
    Handle(String),
    /// `-100…` signed numeric id.
    SupergroupId(i64),
    /// Any other signed or unsigned integer string.
    NumericId(i64),
    /// Neither — retried as a handle with `@` prepended.
    BareHandle(String),
}

/// Classify a raw identifier into its primary resolution strategy.
pub fn classify(raw: &str) -> IdentifierKind {
    if raw.starts_with('@') {
        return IdentifierKind::Handle(raw.to_string());
    }
    if raw.starts_with(SUPERGROUP_PREFIX) {
        if let Ok(id) = raw.parse::<i64>() {
            return IdentifierKind::SupergroupId(id);
        }
    }
    if is_integer(raw) {
        if let Ok(id) = raw.parse::<i64>() {
            return IdentifierKind::NumericId(id);
        }
    }
    IdentifierKind::BareHandle(format!("@{raw}"))
}

fn is_integer(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

/// Resolve `identifier` against the platform, first by its classified
/// strategy, then by scanning the account's dialog list.
pub async fn resolve(client: &mut dyn PlatformClient, identifier: &str) -> Result<Peer> {
    let direct = match classify(identifier) {
        IdentifierKind::Handle(h) | IdentifierKind::BareHandle(h) => {
            client.resolve_handle(&h).await
        }
        IdentifierKind::SupergroupId(id) | IdentifierKind::NumericId(id) => {
            client.resolve_id(id).await
        }
    };

    match direct {
        Ok(Some(peer)) => return Ok(peer),
        Ok(None) => {}
        // A transport failure on the direct path still gets a chance at the
        // dialog scan; the scan's own error is the one that propagates.
        Err(e) => debug!(identifier, error = %e, "direct resolution failed, scanning dialogs"),
    }

    scan_dialogs(client, identifier).await
}

/// Fallback: match the dialog list by numeric id, handle, or exact title
/// (title match is case-insensitive).
async fn scan_dialogs(client: &mut dyn PlatformClient, identifier: &str) -> Result<Peer> {
    let wanted_handle = identifier.strip_prefix('@').unwrap_or(identifier);

    for dialog in client.dialogs().await? {
        if dialog.id.to_string() == identifier {
            return Ok(dialog.to_peer());
        }
        if let Some(ref username) = dialog.username {
            if username.eq_ignore_ascii_case(wanted_handle) {
                return Ok(dialog.to_peer());
            }
        }
        if dialog.title.eq_ignore_ascii_case(identifier) {
            return Ok(dialog.to_peer());
        }
    }

    Err(ClientError::ResolutionFailed {
        identifier: identifier.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::types::{Attachment, CodeChallenge, Dialog, PeerKind, SignIn};

    #[test]
    fn handle_marker_wins() {
        assert_eq!(
            classify("@alice"),
            IdentifierKind::Handle("@alice".to_string())
        );
    }

    #[test]
    fn supergroup_prefix_parses_whole_string() {
        assert_eq!(
            classify("-1001234567890"),
            IdentifierKind::SupergroupId(-1001234567890)
        );
    }

    #[test]
    fn plain_and_negative_integers_are_numeric_ids() {
        assert_eq!(classify("42"), IdentifierKind::NumericId(42));
        assert_eq!(classify("-42"), IdentifierKind::NumericId(-42));
    }

    #[test]
    fn anything_else_retries_as_handle() {
        assert_eq!(
            classify("alice"),
            IdentifierKind::BareHandle("@alice".to_string())
        );
        assert_eq!(
            classify("12a4"),
            IdentifierKind::BareHandle("@12a4".to_string())
        );
        assert_eq!(classify("-"), IdentifierKind::BareHandle("@-".to_string()));
    }

    /// Dialog-only client: every direct strategy misses, forcing the scan.
    struct ScanOnly {
        dialogs: Vec<Dialog>,
    }

    #[async_trait]
    impl PlatformClient for ScanOnly {
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
            Ok(self.dialogs.clone())
        }
        async fn resolve_handle(&mut self, _handle: &str) -> Result<Option<Peer>> {
            Ok(None)
        }
        async fn resolve_id(&mut self, _id: i64) -> Result<Option<Peer>> {
            Ok(None)
        }
        async fn send(&mut self, _p: &Peer, _b: &str, _m: &[Attachment]) -> Result<()> {
            Ok(())
        }
        async fn disconnect(&mut self) {}
    }

    fn fixture() -> ScanOnly {
        ScanOnly {
            dialogs: vec![
                Dialog {
                    id: 7,
                    kind: PeerKind::User,
                    username: Some("alice".into()),
                    title: "Alice A.".into(),
                    participants: None,
                },
                Dialog {
                    id: -100555,
                    kind: PeerKind::Supergroup,
                    username: None,
                    title: "Ops Room".into(),
                    participants: Some(12),
                },
            ],
        }
    }

    #[tokio::test]
    async fn scan_matches_numeric_id() {
        let mut client = fixture();
        let peer = resolve(&mut client, "-100555").await.unwrap();
        assert_eq!(peer.id, -100555);
    }

    #[tokio::test]
    async fn scan_matches_handle_case_insensitive() {
        let mut client = fixture();
        let peer = resolve(&mut client, "@Alice").await.unwrap();
        assert_eq!(peer.id, 7);
    }

    #[tokio::test]
    async fn scan_matches_title_case_insensitive() {
        let mut client = fixture();
        let peer = resolve(&mut client, "ops room").await.unwrap();
        assert_eq!(peer.id, -100555);
    }

    #[tokio::test]
    async fn miss_reports_resolution_failure() {
        let mut client = fixture();
        let err = resolve(&mut client, "@nobody").await.unwrap_err();
        assert!(matches!(err, ClientError::ResolutionFailed { .. }));
    }
}
