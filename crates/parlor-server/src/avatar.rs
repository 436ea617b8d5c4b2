//! Avatar resolution.
//!
//! An avatar is resolved once per connection from the user's identity and
//! stamped on every message that connection sends.

use crate::identity::Identity;
use thiserror::Error;

/// Avatar errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AvatarError {
    /// The resolver has no avatar for this user.
    #[error("Unable to get an avatar URL")]
    NoAvatarUrl,

    /// The configured resolver name is not known.
    #[error("Unknown avatar resolver: {0}")]
    UnknownResolver(String),
}

/// Resolves an avatar URL for a user.
pub trait Avatar: Send + Sync {
    /// Get the avatar URL for `identity`.
    fn avatar_url(&self, identity: &Identity) -> Result<String, AvatarError>;
}

/// Uses the avatar URL supplied by the login provider.
#[derive(Debug, Default, Clone, Copy)]
pub struct AuthAvatar;

impl Avatar for AuthAvatar {
    fn avatar_url(&self, identity: &Identity) -> Result<String, AvatarError> {
        match identity.avatar_url.as_deref() {
            Some(url) if !url.is_empty() => Ok(url.to_string()),
            _ => Err(AvatarError::NoAvatarUrl),
        }
    }
}

/// Builds a Gravatar URL from the user id hash.
#[derive(Debug, Default, Clone, Copy)]
pub struct GravatarAvatar;

impl Avatar for GravatarAvatar {
    fn avatar_url(&self, identity: &Identity) -> Result<String, AvatarError> {
        match identity.userid.as_deref() {
            Some(userid) if !userid.is_empty() => {
                Ok(format!("//www.gravatar.com/avatar/{}", userid))
            }
            _ => Err(AvatarError::NoAvatarUrl),
        }
    }
}

/// Tries each resolver in turn; the first success wins.
#[derive(Default)]
pub struct TryAvatars(Vec<Box<dyn Avatar>>);

impl TryAvatars {
    #[must_use]
    pub fn new(avatars: Vec<Box<dyn Avatar>>) -> Self {
        Self(avatars)
    }

    /// Build a chain from resolver names such as `["auth", "gravatar"]`.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first unknown resolver.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, AvatarError> {
        let avatars = names
            .iter()
            .map(|name| -> Result<Box<dyn Avatar>, AvatarError> {
                match name.as_ref() {
                    "auth" => Ok(Box::new(AuthAvatar)),
                    "gravatar" => Ok(Box::new(GravatarAvatar)),
                    other => Err(AvatarError::UnknownResolver(other.to_string())),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self(avatars))
    }
}

impl Avatar for TryAvatars {
    fn avatar_url(&self, identity: &Identity) -> Result<String, AvatarError> {
        self.0
            .iter()
            .find_map(|avatar| avatar.avatar_url(identity).ok())
            .ok_or(AvatarError::NoAvatarUrl)
    }
}
