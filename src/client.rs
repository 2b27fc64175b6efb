use crate::error::{Error, Result};
use crate::models::{SearchParams, SearchResult};
use crate::oauth::OAuthSigner;
use crate::pagination::{IssueSource, SearchPage, SearchRequest};
use async_trait::async_trait;
use reqwest::{Client, header};
use std::sync::Arc;
use url::Url;

pub const SEARCH_ENDPOINT: &str = "/rest/api/2/search";

#[derive(Debug, Clone)]
pub enum Auth {
    /// OAuth 1.0a（RSA-SHA1）。リクエストごとに署名する
    OAuth(OAuthSigner),
    /// Personal Access Token
    Bearer { token: String },
}

#[derive(Debug, Clone)]
pub struct JiraConfig {
    pub base_url: String,
    pub auth: Auth,
}

impl JiraConfig {
    pub fn new(base_url: impl Into<String>, auth: Auth) -> Result<Self> {
        let base_url = base_url.into();

        // Validate URL
        let _ = Url::parse(&base_url)
            .map_err(|_| Error::InvalidConfiguration(format!("Invalid base URL: {}", base_url)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }
}

#[derive(Debug, Clone)]
pub struct JiraClient {
    pub(crate) client: Client,
    pub(crate) config: Arc<JiraConfig>,
}

impl JiraClient {
    pub fn new(config: JiraConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        // OAuth はURLごとに署名が変わるため、固定ヘッダーにはBearerのみ入れる
        if let Auth::Bearer { token } = &config.auth {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|_| Error::Credential("Invalid auth header".to_string()))?,
            );
        }

        let client = Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &JiraConfig {
        &self.config
    }

    pub(crate) async fn post<T, B>(&self, endpoint: &str, body: &B) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize,
    {
        let url = format!("{}{}", self.config.base_url, endpoint);

        let mut request = self.client.post(&url).json(body);
        if let Auth::OAuth(signer) = &self.config.auth {
            request = request.header(header::AUTHORIZATION, signer.authorization("POST", &url)?);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(match status {
                401 | 403 => Error::AuthenticationFailed(format!("{} - {}", status, message)),
                _ => Error::ApiError { status, message },
            });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn search_issues(&self, jql: &str, params: SearchParams) -> Result<SearchResult> {
        let mut body = serde_json::to_value(&params)?;
        body["jql"] = jql.into();

        self.post(SEARCH_ENDPOINT, &body).await
    }
}

#[async_trait]
impl IssueSource for JiraClient {
    async fn search(&self, request: &SearchRequest) -> Result<SearchPage> {
        let params = SearchParams::new()
            .start_at(request.start_at)
            .max_results(request.max_results)
            .fields(request.fields.clone());

        let result = self.search_issues(&request.jql, params).await?;
        Ok(SearchPage {
            total: result.total,
            issues: result.issues,
        })
    }
}
