//! Credential schemes accepted by the API.
//!
//! A node selects one scheme (`apifyApi` or `apifyOAuth2Api`); the credential
//! stored for that scheme becomes the bearer token of every request.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Authentication scheme selected for an execution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Authentication {
    #[default]
    #[serde(rename = "apifyApi")]
    ApiKey,
    #[serde(rename = "apifyOAuth2Api")]
    OAuth2,
}

impl Authentication {
    pub fn as_str(&self) -> &'static str {
        match self {
            Authentication::ApiKey => "apifyApi",
            Authentication::OAuth2 => "apifyOAuth2Api",
        }
    }
}

impl fmt::Display for Authentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Secret token; `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Token(String);

impl Token {
    pub fn parse(raw: impl AsRef<str>) -> Result<Self> {
        let value = raw.as_ref().trim();
        let value = value
            .strip_prefix("Bearer ")
            .or_else(|| value.strip_prefix("bearer "))
            .unwrap_or(value)
            .trim();
        if value.is_empty() {
            return Err(Error::Config("token must not be empty".to_string()));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}

/// Credentials configured for the node; at most one per scheme.
#[derive(Clone, Debug, Default)]
pub struct Credentials {
    pub api_token: Option<Token>,
    pub oauth_access_token: Option<Token>,
}

impl Credentials {
    pub fn api_token(token: impl AsRef<str>) -> Result<Self> {
        Ok(Self {
            api_token: Some(Token::parse(token)?),
            oauth_access_token: None,
        })
    }

    pub fn oauth(access_token: impl AsRef<str>) -> Result<Self> {
        Ok(Self {
            api_token: None,
            oauth_access_token: Some(Token::parse(access_token)?),
        })
    }

    /// Token for the selected scheme, or a configuration error naming the scheme.
    pub fn resolve(&self, auth: Authentication) -> Result<&Token> {
        let token = match auth {
            Authentication::ApiKey => self.api_token.as_ref(),
            Authentication::OAuth2 => self.oauth_access_token.as_ref(),
        };
        token.ok_or_else(|| {
            Error::Config(format!(
                "No valid credentials found for {auth}. Please configure them first."
            ))
        })
    }
}
