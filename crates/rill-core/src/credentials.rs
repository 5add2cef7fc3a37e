//! Credential keys and input validation.

use crate::error::ValidationError;

/// The three opaque credential keys used once during the handshake.
///
/// Immutable once a connection opens; reconnection reuses the same keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    read: String,
    write: String,
    admin: String,
}

impl Credentials {
    /// Validate and construct credentials.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyCredentialKey`] if any key is empty.
    pub fn new(
        read: impl Into<String>,
        write: impl Into<String>,
        admin: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let read = read.into();
        let write = write.into();
        let admin = admin.into();

        for (index, key) in [&read, &write, &admin].into_iter().enumerate() {
            if key.is_empty() {
                return Err(ValidationError::EmptyCredentialKey { index });
            }
        }

        Ok(Self { read, write, admin })
    }

    /// Keys in wire order: read, write, admin.
    pub fn keys(&self) -> [&str; 3] {
        [&self.read, &self.write, &self.admin]
    }
}

/// Validate a channel name before it reaches the transport.
///
/// # Errors
///
/// Returns [`ValidationError::EmptyChannelName`] for an empty name.
pub fn validate_channel(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyChannelName);
    }
    Ok(())
}
