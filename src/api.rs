// ABOUTME: Blocking HTTP client for the Pocket v3 API
// ABOUTME: OAuth token calls, filtered retrieval and per-item deletion

use crate::{
    filter::Filter, model::RetrieveResponse, sync::ItemSource, util::truncate_str, Credential,
    Error, Result, SavedItem,
};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://getpocket.com";

pub struct PocketClient {
    client: Client,
    base_url: String,
    consumer_key: String,
    access_token: Option<String>,
}

impl PocketClient {
    pub fn new(consumer_key: String, base_url: Option<String>) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(PocketClient {
            client,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.into())
                .trim_end_matches('/')
                .to_string(),
            consumer_key,
            access_token: None,
        })
    }

    pub fn with_access_token(mut self, access_token: String) -> Self {
        self.access_token = Some(access_token);
        self
    }

    pub fn consumer_key(&self) -> &str {
        &self.consumer_key
    }

    fn post<T: serde::de::DeserializeOwned>(&self, endpoint: &str, body: Value) -> Result<T> {
        let url = format!("{}{}", self.base_url, endpoint);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json; charset=UTF-8")
            .header("X-Accept", "application/json")
            .header("User-Agent", "pocket2notion/0.1 (Rust)")
            .json(&body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            // Pocket puts the reason in X-Error rather than the body
            let header = response
                .headers()
                .get("X-Error")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let message = match header {
                Some(message) => message,
                None => truncate_str(&response.text().unwrap_or_default(), 100),
            };
            return Err(Error::Api {
                endpoint: endpoint.into(),
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text()?;
        serde_json::from_str(&body).map_err(|e| {
            debug!(
                "Response body from {} (first 500 chars): {}",
                endpoint,
                truncate_str(&body, 500)
            );
            Error::Parse(e)
        })
    }

    fn authenticated_body(&self, mut fields: Map<String, Value>) -> Result<Value> {
        let token = self
            .access_token
            .as_deref()
            .ok_or_else(|| Error::Auth("No Pocket access token available".into()))?;
        fields.insert("consumer_key".into(), json!(self.consumer_key));
        fields.insert("access_token".into(), json!(token));
        Ok(Value::Object(fields))
    }

    /// First leg: trade the consumer key for a short-lived request token.
    pub fn request_token(&self, redirect_uri: &str) -> Result<String> {
        #[derive(Deserialize)]
        struct Response {
            code: String,
        }

        let resp: Response = self
            .post(
                "/v3/oauth/request",
                json!({ "consumer_key": self.consumer_key, "redirect_uri": redirect_uri }),
            )
            .map_err(|e| auth_error("obtain request token", e))?;

        if resp.code.is_empty() {
            return Err(Error::Auth("Pocket returned an empty request token".into()));
        }
        Ok(resp.code)
    }

    /// Page the user must open to approve access.
    pub fn authorization_url(&self, request_token: &str, redirect_uri: &str) -> Result<String> {
        let url = Url::parse_with_params(
            &format!("{}/auth/authorize", self.base_url),
            &[("request_token", request_token), ("redirect_uri", redirect_uri)],
        )
        .map_err(|e| Error::Config(format!("Invalid Pocket base URL {}: {}", self.base_url, e)))?;
        Ok(url.into())
    }

    /// Last leg: trade the approved request token for a durable access token.
    pub fn access_token(&self, request_token: &str) -> Result<Credential> {
        #[derive(Deserialize)]
        struct Response {
            access_token: String,
            #[serde(flatten)]
            extra: Map<String, Value>,
        }

        let resp: Response = self
            .post(
                "/v3/oauth/authorize",
                json!({ "consumer_key": self.consumer_key, "code": request_token }),
            )
            .map_err(|e| auth_error("obtain access token", e))?;

        if resp.access_token.is_empty() {
            return Err(Error::Auth("Pocket returned an empty access token".into()));
        }

        Ok(Credential {
            consumer_key: self.consumer_key.clone(),
            access_token: resp.access_token,
            extra: resp.extra,
        })
    }

    pub fn retrieve(&self, filter: &Filter) -> Result<Vec<SavedItem>> {
        let body = self.authenticated_body(filter.to_params())?;
        let resp: RetrieveResponse = self
            .post("/v3/get", body)
            .map_err(|e| fetch_error("retrieve items", e))?;

        let fetched = resp.list.len();
        let items = filter.apply(resp.list.into_values().map(SavedItem::from));
        info!("Retrieved {} Pocket items, {} after filtering", fetched, items.len());
        Ok(items)
    }

    pub fn delete(&self, item_id: &str) -> Result<()> {
        let mut fields = Map::new();
        fields.insert(
            "actions".into(),
            json!([{ "action": "delete", "item_id": item_id }]),
        );
        let body = self.authenticated_body(fields)?;

        #[derive(Deserialize)]
        struct Response {
            #[serde(default)]
            status: i64,
            #[serde(default)]
            action_results: Vec<Value>,
        }

        let action = format!("delete item {}", item_id);
        let resp: Response = self
            .post("/v3/send", body)
            .map_err(|e| fetch_error(&action, e))?;

        // A refused action still comes back as HTTP 200
        let refused = resp.action_results.iter().any(|r| r == &Value::Bool(false));
        if resp.status != 1 || refused {
            return Err(Error::Fetch(format!(
                "Cannot {}: Pocket refused the action (status {})",
                action, resp.status
            )));
        }

        debug!("Deleted Pocket item {}", item_id);
        Ok(())
    }
}

impl ItemSource for PocketClient {
    fn retrieve(&self, filter: &Filter) -> Result<Vec<SavedItem>> {
        PocketClient::retrieve(self, filter)
    }

    fn delete(&self, item_id: &str) -> Result<()> {
        PocketClient::delete(self, item_id)
    }
}

fn auth_error(action: &str, err: Error) -> Error {
    match err {
        Error::Api { status, message, .. } => {
            Error::Auth(format!("Cannot {} (HTTP {}): {}", action, status, message))
        }
        Error::Network(e) => Error::Auth(format!("Cannot {}: {}", action, e)),
        other => other,
    }
}

fn fetch_error(action: &str, err: Error) -> Error {
    match err {
        Error::Api { status, message, .. } => {
            Error::Fetch(format!("Cannot {} (HTTP {}): {}", action, status, message))
        }
        Error::Network(e) => Error::Fetch(format!("Cannot {}: {}", action, e)),
        Error::Parse(e) => Error::Fetch(format!("Cannot {}: malformed response: {}", action, e)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pocket_client_new() {
        let client = PocketClient::new("1234-abcd".into(), None).unwrap();
        assert_eq!(client.base_url, "https://getpocket.com");
        assert_eq!(client.consumer_key(), "1234-abcd");
        assert!(client.access_token.is_none());
    }

    #[test]
    fn test_pocket_client_custom_base_trims_slash() {
        let client =
            PocketClient::new("key".into(), Some("http://127.0.0.1:9999/".into())).unwrap();
        assert_eq!(client.base_url, "http://127.0.0.1:9999");
    }

    #[test]
    fn test_authorization_url_encodes_redirect() {
        let client = PocketClient::new("key".into(), None).unwrap();
        let url = client
            .authorization_url("req-code", "http://127.0.0.1:4000/?state=abc")
            .unwrap();
        assert_eq!(
            url,
            "https://getpocket.com/auth/authorize?request_token=req-code&redirect_uri=http%3A%2F%2F127.0.0.1%3A4000%2F%3Fstate%3Dabc"
        );
    }

    #[test]
    fn test_authenticated_body_requires_token() {
        let client = PocketClient::new("key".into(), None).unwrap();
        assert!(matches!(
            client.authenticated_body(Map::new()),
            Err(Error::Auth(_))
        ));

        let client = client.with_access_token("tok".into());
        let body = client.authenticated_body(Map::new()).unwrap();
        assert_eq!(body["consumer_key"], "key");
        assert_eq!(body["access_token"], "tok");
    }

    #[test]
    fn test_error_mapping() {
        let api = || Error::Api {
            endpoint: "/v3/get".into(),
            status: 401,
            message: "Invalid consumer key.".into(),
        };
        assert!(matches!(auth_error("obtain request token", api()), Error::Auth(_)));
        assert!(matches!(fetch_error("retrieve items", api()), Error::Fetch(_)));
    }
}
