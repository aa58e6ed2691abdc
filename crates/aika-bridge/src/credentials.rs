use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Deserialize;

use aika_core::AuthError;
use aika_core::session::{CredentialProvider, SessionToken};

/// Where session tokens come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSource {
    Inline(String),
    /// JSON cache file, re-read on every attempt so a refreshed login is picked up.
    File(PathBuf),
    /// No authentication: the server runs in offline mode.
    Offline,
}

/// On-disk token cache.
#[derive(Debug, Deserialize)]
struct CachedToken {
    token: String,
    /// Seconds since the Unix epoch.
    #[serde(default)]
    expires_at: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct TokenCacheProvider {
    source: TokenSource,
}

impl TokenCacheProvider {
    pub fn new(source: TokenSource) -> Self {
        Self { source }
    }

    /// Picks the source from config: offline mode wins, then an inline token, then the
    /// cache file.
    pub fn from_settings(
        offline: bool,
        token: Option<String>,
        token_file: Option<PathBuf>,
    ) -> Result<Self, AuthError> {
        let source = match (offline, token, token_file) {
            (true, _, _) => TokenSource::Offline,
            (false, Some(token), _) => TokenSource::Inline(token),
            (false, None, Some(path)) => TokenSource::File(path),
            (false, None, None) => {
                return Err(AuthError::Misconfigured(
                    "no session token: set AIKA_SESSION_TOKEN, AIKA_TOKEN_FILE or [auth] token_file"
                        .to_string(),
                ));
            }
        };
        Ok(Self::new(source))
    }

    pub fn source(&self) -> &TokenSource {
        &self.source
    }

    async fn load(&self) -> Result<SessionToken, AuthError> {
        match &self.source {
            TokenSource::Offline => Ok(SessionToken::new("", None)),
            TokenSource::Inline(token) => validate(token.clone(), None),
            TokenSource::File(path) => {
                let text = tokio::fs::read_to_string(path).await.map_err(|err| {
                    AuthError::Misconfigured(format!(
                        "cannot read token cache {}: {err}",
                        path.display()
                    ))
                })?;
                let cached: CachedToken = serde_json::from_str(&text).map_err(|err| {
                    AuthError::Misconfigured(format!(
                        "token cache {} is not valid JSON: {err}",
                        path.display()
                    ))
                })?;
                let expires_at = cached
                    .expires_at
                    .map(|secs| UNIX_EPOCH + Duration::from_secs(secs));
                validate(cached.token, expires_at)
            }
        }
    }
}

fn validate(token: String, expires_at: Option<SystemTime>) -> Result<SessionToken, AuthError> {
    if token.trim().is_empty() {
        return Err(AuthError::InvalidCredentials("session token is empty".to_string()));
    }
    let token = SessionToken::new(token, expires_at);
    if token.is_expired(SystemTime::now()) {
        return Err(AuthError::InvalidCredentials(
            "session token has expired".to_string(),
        ));
    }
    Ok(token)
}

impl CredentialProvider for TokenCacheProvider {
    fn get_token<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<SessionToken, AuthError>> + Send + 'a>> {
        Box::pin(async move {
            let result = self.load().await;
            if let Err(err) = &result {
                tracing::warn!(error = %err, "auth.token.unavailable");
            }
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_file(name: &str, body: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("aika-{}-{name}.json", std::process::id()));
        std::fs::write(&path, body).unwrap();
        path
    }

    #[tokio::test]
    async fn reads_token_from_cache() {
        let path = cache_file("ok", r#"{"token": "abc", "expires_at": 32503680000}"#);
        let provider = TokenCacheProvider::new(TokenSource::File(path.clone()));
        let token = provider.get_token().await.unwrap();
        assert_eq!(token.secret(), "abc");
        assert!(token.expires_at().is_some());
        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn expired_cache_is_invalid_credentials() {
        let path = cache_file("expired", r#"{"token": "abc", "expires_at": 1}"#);
        let provider = TokenCacheProvider::new(TokenSource::File(path.clone()));
        assert!(matches!(
            provider.get_token().await,
            Err(AuthError::InvalidCredentials(_))
        ));
        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn unreadable_cache_is_misconfigured() {
        let provider =
            TokenCacheProvider::new(TokenSource::File(PathBuf::from("/nonexistent/aika.json")));
        assert!(matches!(
            provider.get_token().await,
            Err(AuthError::Misconfigured(_))
        ));

        let path = cache_file("garbage", "not json");
        let provider = TokenCacheProvider::new(TokenSource::File(path.clone()));
        assert!(matches!(
            provider.get_token().await,
            Err(AuthError::Misconfigured(_))
        ));
        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn inline_and_offline_sources() {
        let inline = TokenCacheProvider::new(TokenSource::Inline("xyz".to_string()));
        assert_eq!(inline.get_token().await.unwrap().secret(), "xyz");

        let blank = TokenCacheProvider::new(TokenSource::Inline(" ".to_string()));
        assert!(matches!(
            blank.get_token().await,
            Err(AuthError::InvalidCredentials(_))
        ));

        let offline = TokenCacheProvider::new(TokenSource::Offline);
        assert!(offline.get_token().await.is_ok());
    }

    #[test]
    fn settings_precedence() {
        let p = TokenCacheProvider::from_settings(true, Some("t".into()), None).unwrap();
        assert_eq!(p.source(), &TokenSource::Offline);
        let p = TokenCacheProvider::from_settings(
            false,
            Some("t".into()),
            Some(PathBuf::from("/x")),
        )
        .unwrap();
        assert_eq!(p.source(), &TokenSource::Inline("t".to_string()));
        assert!(matches!(
            TokenCacheProvider::from_settings(false, None, None),
            Err(AuthError::Misconfigured(_))
        ));
    }
}
