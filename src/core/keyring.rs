use std::error::Error;
use std::fmt;

use keyring::Entry;

const KEYRING_SERVICE: &str = "multichat";

/// Describes failures when attempting to access the system keyring.
///
/// Recoverable errors indicate that the credential backend was temporarily
/// unavailable (locked keychain, no secret service running). Permanent errors
/// surface the underlying cause directly.
#[derive(Debug)]
pub enum KeyringAccessError {
    Recoverable(keyring::Error),
    Permanent(keyring::Error),
}

impl KeyringAccessError {
    fn inner(&self) -> &keyring::Error {
        match self {
            KeyringAccessError::Recoverable(err) | KeyringAccessError::Permanent(err) => err,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, KeyringAccessError::Recoverable(_))
    }
}

impl From<keyring::Error> for KeyringAccessError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::PlatformFailure(_) | keyring::Error::NoStorageAccess(_) => {
                KeyringAccessError::Recoverable(err)
            }
            other => KeyringAccessError::Permanent(other),
        }
    }
}

impl fmt::Display for KeyringAccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner())
    }
}

impl Error for KeyringAccessError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.inner())
    }
}

/// Storage for per-provider API key lists.
pub trait KeyStore: Send + Sync {
    fn load_keys(&self, provider_key: &str) -> Result<Vec<String>, KeyringAccessError>;
    fn save_keys(&self, provider_key: &str, keys: &[String]) -> Result<(), KeyringAccessError>;
    fn clear_keys(&self, provider_key: &str) -> Result<(), KeyringAccessError>;
}

/// The platform keyring. All keys for one provider live in a single entry,
/// one key per line, in rotation order.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemKeyStore;

impl KeyStore for SystemKeyStore {
    fn load_keys(&self, provider_key: &str) -> Result<Vec<String>, KeyringAccessError> {
        let entry = Entry::new(KEYRING_SERVICE, provider_key)?;
        match entry.get_password() {
            Ok(secret) => Ok(split_key_list(&secret)),
            Err(keyring::Error::NoEntry) => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    fn save_keys(&self, provider_key: &str, keys: &[String]) -> Result<(), KeyringAccessError> {
        let entry = Entry::new(KEYRING_SERVICE, provider_key)?;
        entry.set_password(&keys.join("\n"))?;
        Ok(())
    }

    fn clear_keys(&self, provider_key: &str) -> Result<(), KeyringAccessError> {
        let entry = Entry::new(KEYRING_SERVICE, provider_key)?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// A store that never holds anything; used when the keyring is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoKeyStore;

impl KeyStore for NoKeyStore {
    fn load_keys(&self, _provider_key: &str) -> Result<Vec<String>, KeyringAccessError> {
        Ok(Vec::new())
    }

    fn save_keys(&self, _provider_key: &str, _keys: &[String]) -> Result<(), KeyringAccessError> {
        Ok(())
    }

    fn clear_keys(&self, _provider_key: &str) -> Result<(), KeyringAccessError> {
        Ok(())
    }
}

pub fn split_key_list(secret: &str) -> Vec<String> {
    secret
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}
