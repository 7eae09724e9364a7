// ABOUTME: Credentials handed to the server transport without being interpreted by the session

use std::fmt;

/// Credentials for authenticating a server session.
///
/// Sessions forward these to the transport as-is. `Debug` output never
/// includes secrets.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    UsernamePassword {
        username: String,
        password: String,
    },
    /// Windows integrated identity, optionally with explicit domain account details.
    Integrated {
        domain: Option<String>,
        username: String,
        password: String,
    },
    /// The process's default identity; no explicit secret is sent.
    AnonymousDefault,
}

impl Credentials {
    pub fn username_password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::UsernamePassword {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn integrated(
        domain: Option<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::Integrated {
            domain,
            username: username.into(),
            password: password.into(),
        }
    }

    /// Short label for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UsernamePassword { .. } => "username-password",
            Self::Integrated { .. } => "integrated",
            Self::AnonymousDefault => "default",
        }
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::AnonymousDefault
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UsernamePassword { username, .. } => f
                .debug_struct("UsernamePassword")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::Integrated {
                domain, username, ..
            } => f
                .debug_struct("Integrated")
                .field("domain", domain)
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::AnonymousDefault => f.write_str("AnonymousDefault"),
        }
    }
}
