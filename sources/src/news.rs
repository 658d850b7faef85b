//! NewsAPI top headlines

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Result, SourceError};
use crate::http;

pub const DEFAULT_ENDPOINT: &str = "https://newsapi.org/v2/top-headlines";

#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Headline articles as returned by the provider, unfiltered
    async fn top_headlines(&self) -> Result<Vec<Value>>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeadlinesResponse {
    status: String,
    #[serde(default)]
    articles: Vec<Value>,
    #[serde(default)]
    message: Option<String>,
}

pub struct NewsApi {
    http: reqwest::Client,
    endpoint: String,
    key: String,
    query: Vec<(String, String)>,
}

impl NewsApi {
    /// `headlines` holds the query parameters (`country`, `category`,
    /// `sources`, `pageSize`, ...) forwarded verbatim.
    pub fn new(key: impl Into<String>, headlines: &Map<String, Value>) -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT, key, headlines)
    }

    pub fn with_endpoint(
        endpoint: impl Into<String>,
        key: impl Into<String>,
        headlines: &Map<String, Value>,
    ) -> Self {
        let query = headlines
            .iter()
            .filter_map(|(name, value)| {
                let value = match value {
                    Value::String(s) => s.clone(),
                    Value::Null => return None,
                    Value::Array(items) => items
                        .iter()
                        .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                        .collect::<Vec<_>>()
                        .join(","),
                    other => other.to_string(),
                };
                Some((name.clone(), value))
            })
            .collect();

        Self {
            http: http::client(),
            endpoint: endpoint.into(),
            key: key.into(),
            query,
        }
    }
}

#[async_trait]
impl NewsSource for NewsApi {
    async fn top_headlines(&self) -> Result<Vec<Value>> {
        let response = self
            .http
            .get(&self.endpoint)
            .header("X-Api-Key", &self.key)
            .query(&self.query)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body: HeadlinesResponse = response.json().await.map_err(|_| SourceError::Status {
            source_name: "news",
            status,
        })?;
        if body.status != "ok" {
            return Err(SourceError::Api {
                source_name: "news",
                message: body.message.unwrap_or(body.status),
            });
        }
        Ok(body.articles)
    }
}

/// Drop every article whose title contains one of `exclude`, ignoring case.
///
/// Articles without a title are kept.
pub fn filter_excluded(articles: Vec<Value>, exclude: &[String]) -> Vec<Value> {
    let exclude: Vec<String> = exclude
        .iter()
        .filter(|word| !word.is_empty())
        .map(|word| word.to_lowercase())
        .collect();

    articles
        .into_iter()
        .filter(|article| {
            let Some(title) = article.get("title").and_then(Value::as_str) else {
                return true;
            };
            let title = title.to_lowercase();
            !exclude.iter().any(|word| title.contains(word.as_str()))
        })
        .collect()
}
