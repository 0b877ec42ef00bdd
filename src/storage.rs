// ABOUTME: Config directory layout and credential persistence
// ABOUTME: Handles paths, permissions, key files and atomic token writes

use crate::{util::first_line, Credential, Error, Result};
use directories::ProjectDirs;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CONSUMER_KEY_FILE: &str = "pocket_consumer_key";
pub const NOTION_TOKEN_FILE: &str = "notion_token";
pub const POCKET_AUTH_FILE: &str = "pocket_auth.json";

pub struct Paths {
    pub config_dir: PathBuf,
}

impl Paths {
    pub fn new(config_dir_override: Option<PathBuf>) -> Result<Self> {
        let config_dir = if let Some(dir) = config_dir_override {
            dir
        } else {
            ProjectDirs::from("", "", "pocket2notion")
                .ok_or_else(|| Error::Config("Could not determine config directory".into()))?
                .config_dir()
                .to_path_buf()
        };

        Ok(Paths { config_dir })
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.config_dir).map_err(|e| {
            Error::Config(format!(
                "Cannot create config directory {}: {}",
                self.config_dir.display(),
                e
            ))
        })?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o700);
            fs::set_permissions(&self.config_dir, perms)?;
        }
        Ok(())
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.config_dir.join(name)
    }

    pub fn token_path(&self) -> PathBuf {
        self.file(POCKET_AUTH_FILE)
    }
}

/// Reads a static key from the first line of a key file.
///
/// Returns `Ok(None)` when the file does not exist so callers can fall
/// through to other sources.
pub fn read_key_file(path: &Path) -> Result<Option<String>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(Error::Config(format!(
                "Cannot read key file {}: {}",
                path.display(),
                e
            )))
        }
    };

    let key = first_line(&content);
    if key.trim().is_empty() {
        return Err(Error::Config(format!("Key file {} is empty", path.display())));
    }

    Ok(Some(key.to_string()))
}

pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    use rand::Rng;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    // Create temp file next to the target so the rename stays on one filesystem
    let random: u32 = rand::thread_rng().gen();
    let tmp_path = dir.join(format!(".{:x}.part", random));

    fs::write(&tmp_path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(0o600);
        fs::set_permissions(&tmp_path, perms)?;
    }

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }

    Ok(())
}

/// The single persisted Pocket token. No locking: concurrent runs against
/// the same directory race and the last writer wins.
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: PathBuf) -> Self {
        CredentialStore { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Credential> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::CredentialMissing(self.path.clone()))
            }
            Err(e) => {
                return Err(Error::CredentialParse {
                    path: self.path.clone(),
                    reason: format!("cannot read: {}", e),
                })
            }
        };

        let credential: Credential =
            serde_json::from_str(&content).map_err(|e| Error::CredentialParse {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        if credential.access_token.is_empty() {
            return Err(Error::CredentialParse {
                path: self.path.clone(),
                reason: "access_token is empty".into(),
            });
        }

        debug!(path = %self.path.display(), "loaded stored credential");
        Ok(credential)
    }

    pub fn save(&self, credential: &Credential) -> Result<()> {
        let mut json = serde_json::to_string_pretty(credential)?;
        json.push('\n');
        write_atomic(&self.path, json.as_bytes())?;
        debug!(path = %self.path.display(), "saved credential");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths_new_with_override() {
        let temp = TempDir::new().unwrap();
        let paths = Paths::new(Some(temp.path().to_path_buf())).unwrap();
        assert_eq!(paths.config_dir, temp.path());
        assert_eq!(paths.token_path(), temp.path().join("pocket_auth.json"));
    }

    #[test]
    fn test_ensure_dirs_creates_nested_directory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("nested").join("pocket2notion");
        let paths = Paths::new(Some(dir.clone())).unwrap();
        paths.ensure_dirs().unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    #[cfg(unix)]
    fn test_ensure_dirs_sets_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let paths = Paths::new(Some(temp.path().join("cfg"))).unwrap();
        paths.ensure_dirs().unwrap();

        let perms = fs::metadata(&paths.config_dir).unwrap().permissions();
        assert_eq!(perms.mode() & 0o777, 0o700);
    }
}

#[cfg(test)]
mod key_tests {
    use super::*;
    use assert_fs::prelude::*;
    use assert_fs::TempDir;

    #[test]
    fn test_read_key_file_takes_first_line() {
        let temp = TempDir::new().unwrap();
        let file = temp.child(CONSUMER_KEY_FILE);
        file.write_str("1234-abcd1234abcd1234abcd\nignored\n").unwrap();

        let key = read_key_file(file.path()).unwrap();
        assert_eq!(key.as_deref(), Some("1234-abcd1234abcd1234abcd"));
    }

    #[test]
    fn test_read_key_file_strips_carriage_return() {
        let temp = TempDir::new().unwrap();
        let file = temp.child(NOTION_TOKEN_FILE);
        file.write_str("v02:token\r\n").unwrap();

        let key = read_key_file(file.path()).unwrap();
        assert_eq!(key.as_deref(), Some("v02:token"));
    }

    #[test]
    fn test_read_key_file_missing() {
        let temp = TempDir::new().unwrap();
        let key = read_key_file(temp.child("missing").path()).unwrap();
        assert!(key.is_none());
    }

    #[test]
    fn test_read_key_file_empty_is_config_error() {
        let temp = TempDir::new().unwrap();
        let file = temp.child(NOTION_TOKEN_FILE);
        file.write_str("\n").unwrap();

        assert!(matches!(read_key_file(file.path()), Err(Error::Config(_))));
    }
}
