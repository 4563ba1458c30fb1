use reqwest::{
    Client, Response,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::error::SupabaseError;

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_credentials(&config.supabase_url, &config.supabase_anon_key)
    }

    pub fn with_credentials(base_url: &str, anon_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        }
    }

    fn get_headers(
        &self,
        auth_token: Option<&str>,
        prefer: Option<&str>,
    ) -> Result<HeaderMap, SupabaseError> {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", header_value(&self.anon_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", token))?);
        }

        if let Some(prefer) = prefer {
            headers.insert("Prefer", header_value(prefer)?);
        }

        Ok(headers)
    }

    /// Sends a request and decodes the JSON body.
    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T, SupabaseError>
    where T: DeserializeOwned {
        self.request_with_prefer(method, path, auth_token, body, None).await
    }

    /// Like [`request`](Self::request) with a PostgREST `Prefer` header,
    /// e.g. `return=representation`.
    pub async fn request_with_prefer<T>(&self, method: Method, path: &str,
                                        auth_token: Option<&str>, body: Option<Value>,
                                        prefer: Option<&str>)
                                        -> Result<T, SupabaseError>
    where T: DeserializeOwned {
        let response = self.send(method, path, auth_token, body, prefer).await?;
        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// Sends a request whose response body is irrelevant (`return=minimal`).
    pub async fn execute(&self, method: Method, path: &str,
                         auth_token: Option<&str>, body: Option<Value>,
                         prefer: Option<&str>)
                         -> Result<(), SupabaseError> {
        self.send(method, path, auth_token, body, prefer).await?;
        Ok(())
    }

    async fn send(&self, method: Method, path: &str,
                  auth_token: Option<&str>, body: Option<Value>,
                  prefer: Option<&str>)
                  -> Result<Response, SupabaseError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let headers = self.get_headers(auth_token, prefer)?;

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);

            return Err(match status.as_u16() {
                401 | 403 => SupabaseError::Auth(error_text),
                404 => SupabaseError::NotFound(error_text),
                409 => SupabaseError::Conflict(error_text),
                code => SupabaseError::Api { status: code, body: error_text },
            });
        }

        Ok(response)
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

fn header_value(raw: &str) -> Result<HeaderValue, SupabaseError> {
    HeaderValue::from_str(raw).map_err(|e| SupabaseError::InvalidHeader(e.to_string()))
}
