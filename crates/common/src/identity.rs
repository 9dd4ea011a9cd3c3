// Stable per-(user, mode, resource) document identities.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::path::{normalize_resource_path, PathError};

/// User name under which a resource's shared document is edited by everyone.
pub const EVERYONE: &str = "pool.everyone";

const CONTENT_SEPARATOR: &str = "@";
const RUN_SEPARATOR: &str = "*run*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamMode {
    /// The editable text of the resource.
    Content,
    /// The companion document collecting run output for the resource.
    Run,
}

/// Key of one shared document: `user@/path` for content, `user*run*/path`
/// for run output.
///
/// Two identities are equal exactly when user, mode and normalized path are.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentIdentity {
    user: String,
    mode: StreamMode,
    path: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("user name is empty")]
    EmptyUser,

    #[error("user name `{0}` contains a reserved separator")]
    ReservedSeparator(String),

    #[error("`{0}` is not a document identity")]
    Unrecognized(String),

    #[error(transparent)]
    Path(#[from] PathError),
}

impl DocumentIdentity {
    pub fn new(user: &str, mode: StreamMode, path: &str) -> Result<Self, IdentityError> {
        if user.is_empty() {
            return Err(IdentityError::EmptyUser);
        }
        if user.contains(CONTENT_SEPARATOR) || user.contains(RUN_SEPARATOR) {
            return Err(IdentityError::ReservedSeparator(user.to_string()));
        }
        let path = normalize_resource_path(path)?;
        Ok(Self { user: user.to_string(), mode, path })
    }

    pub fn content(user: &str, path: &str) -> Result<Self, IdentityError> {
        Self::new(user, StreamMode::Content, path)
    }

    pub fn run(user: &str, path: &str) -> Result<Self, IdentityError> {
        Self::new(user, StreamMode::Run, path)
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn mode(&self) -> StreamMode {
        self.mode
    }

    /// Normalized resource path, always starting with `/`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// First path component, the project owning the resource.
    pub fn project(&self) -> &str {
        crate::path::components(&self.path).next().unwrap_or_default()
    }

    /// The same resource and user in another mode.
    pub fn with_mode(&self, mode: StreamMode) -> Self {
        Self { mode, ..self.clone() }
    }
}

impl fmt::Display for DocumentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let separator = match self.mode {
            StreamMode::Content => CONTENT_SEPARATOR,
            StreamMode::Run => RUN_SEPARATOR,
        };
        write!(f, "{}{}{}", self.user, separator, self.path)
    }
}

impl FromStr for DocumentIdentity {
    type Err = IdentityError;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        // Users may contain neither separator, so the first match splits.
        let run = key.find(RUN_SEPARATOR);
        let content = key.find(CONTENT_SEPARATOR);
        let (user, mode, path) = match (run, content) {
            (Some(run), Some(content)) if content < run => {
                (&key[..content], StreamMode::Content, &key[content + CONTENT_SEPARATOR.len()..])
            }
            (Some(run), _) => (&key[..run], StreamMode::Run, &key[run + RUN_SEPARATOR.len()..]),
            (None, Some(content)) => {
                (&key[..content], StreamMode::Content, &key[content + CONTENT_SEPARATOR.len()..])
            }
            (None, None) => return Err(IdentityError::Unrecognized(key.to_string())),
        };
        Self::new(user, mode, path)
    }
}

impl TryFrom<String> for DocumentIdentity {
    type Error = IdentityError;

    fn try_from(key: String) -> Result<Self, Self::Error> {
        key.parse()
    }
}

impl From<DocumentIdentity> for String {
    fn from(identity: DocumentIdentity) -> Self {
        identity.to_string()
    }
}
