use log::debug;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;

use crate::{config::ApiConfig, errors::IrcClientError, users::UserProfile};

const PROFILE_TIMEOUT: Duration = Duration::from_secs(10);

/// Out-of-band lookup of extended user data. A failure here never affects
/// line dispatch.
pub trait ProfileFetcher {
    fn fetch_profile(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<UserProfile, IrcClientError>> + Send;
}

/// `get_user` endpoint of the osu! v1 web API.
#[derive(Debug, Clone)]
pub struct OsuApiFetcher {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl OsuApiFetcher {
    pub fn new(config: &ApiConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(PROFILE_TIMEOUT)
            .user_agent(concat!("osu_irc/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
        }
    }
}

impl ProfileFetcher for OsuApiFetcher {
    async fn fetch_profile(&self, username: &str) -> Result<UserProfile, IrcClientError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(IrcClientError::ProfileUnavailable)?;
        let url = format!("{}/get_user", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .query(&[("k", api_key), ("u", username), ("type", "string")])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| IrcClientError::Profile(e.to_string()))?;
        let body = response
            .text()
            .await
            .map_err(|e| IrcClientError::Profile(e.to_string()))?;
        debug!("get_user {username}: {body}");
        parse_get_user(&body)
    }
}

// The v1 API encodes every number as a string and uses null for unranked
// players.
#[derive(Debug, Deserialize)]
struct ApiUser {
    user_id: String,
    username: String,
    country: Option<String>,
    level: Option<String>,
    pp_rank: Option<String>,
    pp_raw: Option<String>,
    pp_country_rank: Option<String>,
}

fn opt_num<T: std::str::FromStr>(value: Option<String>) -> Option<T> {
    value.filter(|v| !v.is_empty()).and_then(|v| v.parse().ok())
}

pub fn parse_get_user(body: &str) -> Result<UserProfile, IrcClientError> {
    let users: Vec<ApiUser> =
        serde_json::from_str(body).map_err(|e| IrcClientError::Profile(e.to_string()))?;
    let user = users
        .into_iter()
        .next()
        .ok_or_else(|| IrcClientError::Profile("user not found".to_owned()))?;
    let user_id = user
        .user_id
        .parse()
        .map_err(|_| IrcClientError::invalid_capture("user_id", &user.user_id))?;
    Ok(UserProfile {
        user_id,
        username: user.username,
        country: user.country,
        level: opt_num(user.level),
        pp_rank: opt_num(user.pp_rank),
        pp_raw: opt_num(user.pp_raw),
        pp_country_rank: opt_num(user.pp_country_rank),
    })
}
