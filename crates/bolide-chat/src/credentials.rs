// ── Login credentials ──
//
// Credential material for the server's `login` method. Each variant maps
// onto one login payload shape the server accepts; `login_params`
// produces the exact wire object, so the protocol engine below never
// learns anything about authentication.

use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

/// How the account is identified: by username or by email address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Username(String),
    Email(String),
}

impl Identity {
    fn as_login_user(&self) -> Value {
        match self {
            Self::Username(name) => json!({ "username": name }),
            Self::Email(address) => json!({ "email": address }),
        }
    }
}

/// Credentials for authenticating a chat session.
///
/// Each variant carries the secret material for its login flow.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// Username-or-email plus password. The password crosses the wire as
    /// a sha-256 hex digest, never in the clear.
    Password {
        identity: Identity,
        password: SecretString,
    },

    /// LDAP-backed login. The server forwards the password to the
    /// directory verbatim, so no digest is applied.
    Ldap {
        username: String,
        password: SecretString,
    },

    /// A resume token from an earlier authenticated session.
    Resume { token: SecretString },
}

impl Credentials {
    /// Password login for a username.
    pub fn password(username: impl Into<String>, password: impl Into<SecretString>) -> Self {
        Self::Password {
            identity: Identity::Username(username.into()),
            password: password.into(),
        }
    }

    /// Password login for an email address.
    pub fn email(address: impl Into<String>, password: impl Into<SecretString>) -> Self {
        Self::Password {
            identity: Identity::Email(address.into()),
            password: password.into(),
        }
    }

    /// Resume an earlier session from its token.
    pub fn resume(token: impl Into<SecretString>) -> Self {
        Self::Resume {
            token: token.into(),
        }
    }

    /// The parameter object for the `login` method call.
    pub(crate) fn login_params(&self) -> Value {
        match self {
            Self::Password { identity, password } => {
                let digest = Sha256::digest(password.expose_secret().as_bytes());
                json!({
                    "user": identity.as_login_user(),
                    "password": {
                        "digest": format!("{digest:x}"),
                        "algorithm": "sha-256",
                    },
                })
            }
            Self::Ldap { username, password } => json!({
                "ldap": true,
                "username": username,
                "ldapPass": password.expose_secret(),
                "ldapOptions": {},
            }),
            Self::Resume { token } => json!({ "resume": token.expose_secret() }),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
