//! Authenticated pass-through to the Belvo financial-data API.

mod http_client;

use std::time::Duration;

use axum::http::StatusCode;
use base64::{Engine, engine::general_purpose::STANDARD};
use isahc::{AsyncReadResponseExt, Request};
use serde::Deserialize;
use serde_json::Value;

use crate::{Error, config::Belvo as BelvoConfig};

use http_client::HttpClient;

#[derive(Deserialize)]
struct Page {
    #[serde(default)]
    results: Vec<Value>,
}

pub struct BelvoClient {
    http: HttpClient,
    api_url: String,
    link_id: String,
    authorization: Option<String>,
}

impl BelvoClient {
    pub fn new(config: &BelvoConfig) -> Result<Self, Error> {
        let http = HttpClient::new(config.max_attempts, Duration::from_millis(200))?;
        let authorization = if config.secret_id.is_empty() || config.secret_password.is_empty() {
            warn!("belvo credentials not configured, belvo routes will fail");
            None
        } else {
            let credentials = format!("{}:{}", config.secret_id, config.secret_password);
            Some(format!("Basic {}", STANDARD.encode(credentials)))
        };

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_owned(),
            link_id: config.link_id.clone(),
            authorization,
        })
    }

    pub async fn institutions(&self) -> Result<Vec<Value>, Error> {
        self.results("institutions/").await
    }

    pub async fn accounts(&self) -> Result<Vec<Value>, Error> {
        self.results(&format!("accounts/?link={}", self.link_id))
            .await
    }

    pub async fn balances(&self) -> Result<Vec<Value>, Error> {
        self.results(&format!("br/balances/?link={}", self.link_id))
            .await
    }

    pub async fn transactions(&self) -> Result<Vec<Value>, Error> {
        self.results(&format!("transactions/?link={}", self.link_id))
            .await
    }

    async fn results(&self, path: &str) -> Result<Vec<Value>, Error> {
        let Some(authorization) = self.authorization.as_deref() else {
            return Err(Error::internal(
                "Belvo credentials not configured",
                "belvo_not_configured",
            ));
        };
        let url = format!("{}/{}", self.api_url, path);
        // isahc speaks http 0.2, so header names stay plain strings here.
        let request = Request::get(url.as_str())
            .header("authorization", authorization)
            .header("content-type", "application/json")
            .header("accept", "application/json")
            .body(())
            .map_err(|err| Error::internal(format!("invalid belvo request: {err}"), "bad_request"))?;

        let mut response = self.http.send_async(request).await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            warn!(%url, %status, "belvo request failed");
            // Belvo rejecting our own credentials is a gateway fault, not the caller's.
            let status = match StatusCode::from_u16(status.as_u16()) {
                Ok(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) | Err(_) => {
                    StatusCode::BAD_GATEWAY
                }
                Ok(status) => status,
            };
            return Err(Error::upstream(status, body));
        }

        let page: Page = serde_json::from_str(&body).map_err(|err| {
            Error::upstream(
                StatusCode::BAD_GATEWAY,
                format!("unexpected belvo payload: {err}"),
            )
        })?;
        Ok(page.results)
    }
}
