//! Connecting to the backend and opening documents.

use anyhow::{Result, bail};
use draftwise::{Applied, Session, SessionBackend, SessionId};
use draftwise_http::{ClientConfig, HttpBackend};
use std::time::Duration;
use tracing::debug;

/// Chat turns run a model workflow server-side and can take a while.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

pub struct Remote {
    config: ClientConfig,
}

impl Remote {
    pub fn new(api_url: &str, token: Option<&str>) -> Self {
        let mut config = ClientConfig::new(api_url).with_timeout(REQUEST_TIMEOUT);
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            config = config.with_token(token);
        }
        Self { config }
    }

    pub fn connect(&self) -> Result<Session<HttpBackend>> {
        debug!(base_url = %self.config.base_url, "connecting");
        Ok(Session::new(HttpBackend::new(self.config.clone())?))
    }
}

/// Unwrap an applied result. Nothing else drives the session in a CLI
/// run, so a stale result means something went wrong.
pub fn applied<T>(applied: Applied<T>) -> Result<T> {
    match applied {
        Applied::Done(value) => Ok(value),
        Applied::Stale => bail!("session changed while the request was in flight"),
    }
}

/// Open persisted document `id`.
pub async fn open<B: SessionBackend>(session: &Session<B>, id: u64) -> Result<()> {
    applied(session.open(SessionId::Persisted(id)).await?)
}
