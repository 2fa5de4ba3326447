use std::fmt::Display;

use crate::{errors::IrcClientError, profile::ProfileFetcher};

/// Extended data only available from the web API.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserProfile {
    pub user_id: u64,
    pub username: String,
    pub country: Option<String>,
    pub level: Option<f64>,
    pub pp_rank: Option<u64>,
    pub pp_raw: Option<f64>,
    pub pp_country_rank: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub username: String,
    pub user_id: Option<u64>,
    pub profile: Option<UserProfile>,
}

impl User {
    pub fn new(username: &str) -> Self {
        User {
            username: username.to_owned(),
            user_id: None,
            profile: None,
        }
    }

    /// Case-insensitive comparison, as nicknames are on the server.
    pub fn is(&self, nickname: &str) -> bool {
        same_nick(&self.username, nickname)
    }

    /// Fetches the extended profile. Nothing is read lazily: callers decide
    /// when the network round trip happens.
    pub async fn resolve<F: ProfileFetcher>(
        &mut self,
        fetcher: &F,
    ) -> Result<&UserProfile, IrcClientError> {
        let profile = fetcher.fetch_profile(&self.username).await?;
        if self.user_id.is_none() {
            self.user_id = Some(profile.user_id);
        }
        Ok(self.profile.insert(profile))
    }
}

impl Display for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.username)
    }
}

pub fn same_nick(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}
