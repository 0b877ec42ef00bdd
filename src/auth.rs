// ABOUTME: Pocket authorization and static key discovery
// ABOUTME: Three-legged token exchange plus CLI flag → env var → key file lookup

use crate::{
    api::PocketClient,
    callback::CallbackListener,
    storage::{read_key_file, CredentialStore, Paths, CONSUMER_KEY_FILE, NOTION_TOKEN_FILE},
    Credential, Error, Result,
};
use std::cell::Cell;
use std::env;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const CONSUMER_KEY_ENV: &str = "POCKET_CONSUMER_KEY";
pub const NOTION_TOKEN_ENV: &str = "NOTION_TOKEN";
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(300);

pub fn resolve_consumer_key(cli_key: Option<String>, paths: &Paths) -> Result<String> {
    resolve_key(
        cli_key,
        CONSUMER_KEY_ENV,
        &paths.file(CONSUMER_KEY_FILE),
        "Pocket consumer key (--consumer-key)",
    )
}

pub fn resolve_notion_token(cli_token: Option<String>, paths: &Paths) -> Result<String> {
    resolve_key(
        cli_token,
        NOTION_TOKEN_ENV,
        &paths.file(NOTION_TOKEN_FILE),
        "Notion token (--notion-token)",
    )
}

fn resolve_key(cli: Option<String>, env_var: &str, path: &Path, what: &str) -> Result<String> {
    // 1. CLI flag
    if let Some(key) = cli.filter(|k| !k.is_empty()) {
        return Ok(key);
    }

    // 2. Environment variable
    if let Ok(key) = env::var(env_var) {
        if !key.is_empty() {
            return Ok(key);
        }
    }

    // 3. Key file in the config directory
    if let Some(key) = read_key_file(path)? {
        return Ok(key);
    }

    Err(Error::Config(format!(
        "No {} found. Pass the flag, set {}, or write it to {}",
        what,
        env_var,
        path.display()
    )))
}

/// Prints the consent page URL and optionally opens it in a browser.
pub fn present_authorization_url(url: &str, open_browser: bool) {
    println!("Open this URL in your browser to authorize pocket2notion:");
    println!("{}", url);

    if open_browser {
        if let Err(e) = open::that(url) {
            warn!("Could not open a browser: {}", e);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Idle,
    RequestTokenObtained,
    AwaitingUserAuthorization,
    AccessTokenObtained,
    Failed,
}

/// Runs the interactive request-token → consent → access-token exchange.
///
/// One attempt per instance; any failure is terminal and nothing is retried.
pub struct TokenAcquirer<'a> {
    client: &'a PocketClient,
    timeout: Duration,
    presenter: Box<dyn Fn(&str) + 'a>,
    state: Cell<AuthState>,
}

impl<'a> TokenAcquirer<'a> {
    pub fn new(client: &'a PocketClient) -> Self {
        TokenAcquirer {
            client,
            timeout: DEFAULT_AUTH_TIMEOUT,
            presenter: Box::new(|url: &str| present_authorization_url(url, false)),
            state: Cell::new(AuthState::Idle),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replaces how the authorization URL reaches the user.
    pub fn with_presenter(mut self, presenter: impl Fn(&str) + 'a) -> Self {
        self.presenter = Box::new(presenter);
        self
    }

    pub fn state(&self) -> AuthState {
        self.state.get()
    }

    fn transition(&self, next: AuthState) {
        debug!("Authorization state {:?} -> {:?}", self.state.get(), next);
        self.state.set(next);
    }

    pub fn acquire(&self) -> Result<Credential> {
        if self.state() != AuthState::Idle {
            return Err(Error::Auth("Authorization was already attempted".into()));
        }

        let result = self.exchange();
        if let Err(e) = &result {
            warn!("Pocket authorization failed: {}", e);
            self.transition(AuthState::Failed);
        }
        result
    }

    fn exchange(&self) -> Result<Credential> {
        // The redirect target must exist before the request-token call embeds it
        let mut listener = CallbackListener::start()?;
        let redirect_uri = listener.address_url();

        let request_token = self.client.request_token(&redirect_uri)?;
        self.transition(AuthState::RequestTokenObtained);

        let url = self.client.authorization_url(&request_token, &redirect_uri)?;
        (self.presenter)(&url);
        self.transition(AuthState::AwaitingUserAuthorization);

        let waited = listener.await_signal(self.timeout);
        listener.stop();
        waited?;

        let credential = self.client.access_token(&request_token)?;
        self.transition(AuthState::AccessTokenObtained);
        info!(
            "Pocket authorization complete{}",
            credential
                .username()
                .map(|u| format!(" for {}", u))
                .unwrap_or_default()
        );
        Ok(credential)
    }
}

/// Returns the stored credential, or runs `acquire` and persists the result
/// when the store has none, cannot parse it, or it belongs to another
/// consumer key.
///
/// Failing to persist is not fatal: the fresh token serves this run.
pub fn obtain_credential<F>(
    store: &CredentialStore,
    consumer_key: &str,
    acquire: F,
) -> Result<Credential>
where
    F: FnOnce() -> Result<Credential>,
{
    match store.load() {
        Ok(credential) if credential.consumer_key == consumer_key => return Ok(credential),
        Ok(_) => warn!("Stored Pocket token belongs to another consumer key, re-authorizing"),
        Err(Error::CredentialMissing(path)) => {
            info!("No Pocket token at {}, starting authorization", path.display())
        }
        Err(e @ Error::CredentialParse { .. }) => warn!("{}, re-authorizing", e),
        Err(e) => return Err(e),
    }

    let credential = acquire()?;
    if let Err(e) = store.save(&credential) {
        warn!(
            "Could not save Pocket token to {}: {}",
            store.path().display(),
            e
        );
    }
    Ok(credential)
}


#[cfg(test)]
mod obtain_tests {
    use super::*;
    use crate::storage::POCKET_AUTH_FILE;
    use std::cell::Cell;
    use std::fs;
    use tempfile::TempDir;

    fn credential(consumer_key: &str, token: &str) -> Credential {
        Credential {
            consumer_key: consumer_key.into(),
            access_token: token.into(),
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn test_stored_credential_skips_acquisition() {
        let temp = TempDir::new().unwrap();
        let store = CredentialStore::new(temp.path().join(POCKET_AUTH_FILE));
        store.save(&credential("key", "stored")).unwrap();

        let cred = obtain_credential(&store, "key", || panic!("must not acquire")).unwrap();
        assert_eq!(cred.access_token, "stored");
    }

    #[test]
    fn test_corrupt_file_triggers_acquisition_and_overwrite() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(POCKET_AUTH_FILE);
        fs::write(&path, "not json").unwrap();
        let store = CredentialStore::new(path);

        let calls = Cell::new(0);
        let cred = obtain_credential(&store, "key", || {
            calls.set(calls.get() + 1);
            Ok(credential("key", "fresh"))
        })
        .unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(cred.access_token, "fresh");
        assert_eq!(store.load().unwrap().access_token, "fresh");
    }

    #[test]
    fn test_missing_file_triggers_acquisition() {
        let temp = TempDir::new().unwrap();
        let store = CredentialStore::new(temp.path().join(POCKET_AUTH_FILE));

        let cred = obtain_credential(&store, "key", || Ok(credential("key", "fresh"))).unwrap();
        assert_eq!(cred.access_token, "fresh");
        assert!(store.path().exists());
    }

    #[test]
    fn test_foreign_consumer_key_triggers_acquisition() {
        let temp = TempDir::new().unwrap();
        let store = CredentialStore::new(temp.path().join(POCKET_AUTH_FILE));
        store.save(&credential("old-key", "stale")).unwrap();

        let cred =
            obtain_credential(&store, "new-key", || Ok(credential("new-key", "fresh"))).unwrap();
        assert_eq!(cred.access_token, "fresh");
    }

    #[test]
    fn test_acquisition_failure_propagates() {
        let temp = TempDir::new().unwrap();
        let store = CredentialStore::new(temp.path().join(POCKET_AUTH_FILE));

        let err =
            obtain_credential(&store, "key", || Err(Error::Auth("denied".into()))).unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
        assert!(!store.path().exists());
    }

    #[test]
    fn test_save_failure_keeps_fresh_token() {
        let temp = TempDir::new().unwrap();
        // A directory in place of the token file makes the final rename fail
        let path = temp.path().join(POCKET_AUTH_FILE);
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), "x").unwrap();

        let store = CredentialStore::new(path.clone());
        let cred = obtain_credential(&store, "key", || Ok(credential("key", "fresh"))).unwrap();
        assert_eq!(cred.access_token, "fresh");
        assert!(path.is_dir());
        assert!(store.save(&credential("key", "fresh")).is_err());
    }
}
