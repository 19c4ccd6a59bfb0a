use serde_json::{json, Map, Value};

/// Complex type the API expects for token credentials.
pub const PORTAL_LOGIN_TOKEN: &str = "PortalLoginToken";

/// How a client authenticates its requests.
#[derive(Clone, PartialEq, Eq)]
pub enum Authentication {
    /// `userId` + `authToken`, obtained from a portal login.
    Token { user_id: u64, auth_token: String },
    /// `username` + `apiKey`, configured ahead of time.
    Key { username: String, api_key: String },
    Anonymous,
}

pub(crate) fn is_token_based(user_id: Option<u64>, auth_token: Option<&str>) -> bool {
    user_id.is_some() && auth_token.map_or(false, |t| !t.is_empty())
}

pub(crate) fn is_key_based(username: Option<&str>, api_key: Option<&str>) -> bool {
    username.map_or(false, |u| !u.is_empty()) && api_key.map_or(false, |k| !k.is_empty())
}

impl Authentication {
    /// Picks the strategy for a credential set. Token credentials are checked
    /// first and win when both pairs are usable.
    pub fn from_credentials(
        username: Option<&str>,
        api_key: Option<&str>,
        user_id: Option<u64>,
        auth_token: Option<&str>,
    ) -> Self {
        if let (Some(user_id), Some(auth_token)) = (user_id, auth_token) {
            if is_token_based(Some(user_id), Some(auth_token)) {
                return Authentication::Token {
                    user_id,
                    auth_token: auth_token.to_string(),
                };
            }
        }

        if let (Some(username), Some(api_key)) = (username, api_key) {
            if is_key_based(Some(username), Some(api_key)) {
                return Authentication::Key {
                    username: username.to_string(),
                    api_key: api_key.to_string(),
                };
            }
        }

        Authentication::Anonymous
    }

    pub fn is_token_based(&self) -> bool {
        matches!(self, Authentication::Token { .. })
    }

    pub fn is_key_based(&self) -> bool {
        matches!(self, Authentication::Key { .. })
    }

    /// Header payload sent with every request. Empty for anonymous clients.
    pub fn headers(&self) -> Map<String, Value> {
        let mut headers = Map::new();
        match self {
            Authentication::Token {
                user_id,
                auth_token,
            } => {
                headers.insert(
                    "authenticate".to_string(),
                    json!({
                        "complexType": PORTAL_LOGIN_TOKEN,
                        "userId": user_id,
                        "authToken": auth_token,
                    }),
                );
            }
            Authentication::Key { username, api_key } => {
                headers.insert(
                    "authenticate".to_string(),
                    json!({
                        "username": username,
                        "apiKey": api_key,
                    }),
                );
            }
            Authentication::Anonymous => {}
        }
        headers
    }
}

impl std::fmt::Debug for Authentication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Authentication::Token { user_id, .. } => {
                f.debug_struct("Token").field("user_id", user_id).finish_non_exhaustive()
            }
            Authentication::Key { username, .. } => {
                f.debug_struct("Key").field("username", username).finish_non_exhaustive()
            }
            Authentication::Anonymous => f.write_str("Anonymous"),
        }
    }
}
