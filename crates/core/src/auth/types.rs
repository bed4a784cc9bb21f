use serde::{Deserialize, Serialize};

/// Management credentials, as issued by the external document system.
///
/// Presented as `token_id:token_secret` and forwarded to the document API
/// for validation; the core never stores them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagementCredentials {
    pub token_id: String,
    pub token_secret: String,
}

impl ManagementCredentials {
    pub fn new(token_id: impl Into<String>, token_secret: impl Into<String>) -> Self {
        Self {
            token_id: token_id.into(),
            token_secret: token_secret.into(),
        }
    }

    /// Parses the `token_id:token_secret` wire form.
    pub fn parse(raw: &str) -> Option<Self> {
        let (token_id, token_secret) = raw.split_once(':')?;
        if token_id.is_empty() || token_secret.is_empty() {
            return None;
        }
        Some(Self::new(token_id, token_secret))
    }

    /// Authorization header value for document API requests.
    pub fn header_value(&self) -> String {
        format!("Token {}:{}", self.token_id, self.token_secret)
    }
}

/// Who is asking for a token or a stream.
#[derive(Debug, Clone)]
pub enum Caller {
    /// No credentials presented.
    Anonymous,
    /// Management credentials presented (not yet verified).
    Manager(ManagementCredentials),
}

impl Caller {
    pub fn credentials(&self) -> Option<&ManagementCredentials> {
        match self {
            Caller::Anonymous => None,
            Caller::Manager(credentials) => Some(credentials),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Caller::Anonymous)
    }
}

/// A verified manager identity from the document system.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Identity {
    pub user_id: i64,
    pub name: String,
    pub email: String,
}

/// Claims carried by a validated viewer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerToken {
    /// Video the token grants playback of.
    pub video_id: String,
    /// Page scope, when the token was issued in a page context.
    pub page_id: Option<i64>,
    /// Expiry as a unix timestamp in seconds.
    pub expires_at: i64,
}

/// A freshly minted viewer token.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: i64,
    pub video_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_management_credentials() {
        let creds = ManagementCredentials::parse("abc:xyz").unwrap();
        assert_eq!(creds.token_id, "abc");
        assert_eq!(creds.token_secret, "xyz");
        assert_eq!(creds.header_value(), "Token abc:xyz");
    }

    #[test]
    fn test_parse_rejects_malformed_credentials() {
        assert!(ManagementCredentials::parse("no-separator").is_none());
        assert!(ManagementCredentials::parse(":secret").is_none());
        assert!(ManagementCredentials::parse("id:").is_none());
        assert!(ManagementCredentials::parse("").is_none());
    }

    #[test]
    fn test_parse_keeps_colons_in_secret() {
        let creds = ManagementCredentials::parse("id:se:cr:et").unwrap();
        assert_eq!(creds.token_id, "id");
        assert_eq!(creds.token_secret, "se:cr:et");
    }

    #[test]
    fn test_caller_credentials() {
        assert!(Caller::Anonymous.credentials().is_none());
        assert!(Caller::Anonymous.is_anonymous());

        let caller = Caller::Manager(ManagementCredentials::new("a", "b"));
        assert_eq!(caller.credentials().unwrap().token_id, "a");
        assert!(!caller.is_anonymous());
    }
}
