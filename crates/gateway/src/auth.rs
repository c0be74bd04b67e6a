use secrecy::{ExposeSecret, SecretString};

use supportdesk_core::config::AppConfig;
use supportdesk_core::ActorRole;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// Identity attached to every gateway request.
///
/// Each client owns its context; switching users means building a new client.
#[derive(Clone, Debug)]
pub struct AuthContext {
    user_id: String,
    role: ActorRole,
    token: Option<SecretString>,
}

impl AuthContext {
    pub fn new(user_id: impl Into<String>, role: ActorRole) -> Self {
        Self { user_id: user_id.into(), role, token: None }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(SecretString::from(token.into()));
        self
    }

    /// Acts as the configured default user with the configured token.
    pub fn from_config(config: &AppConfig, role: ActorRole) -> Self {
        Self {
            user_id: config.app.default_user_id.clone(),
            role,
            token: config.auth.token.clone(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn role(&self) -> ActorRole {
        self.role
    }

    pub(crate) fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request
            .header(ACTOR_ID_HEADER, &self.user_id)
            .header(ACTOR_ROLE_HEADER, self.role.as_str());
        match &self.token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }
}
