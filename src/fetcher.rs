use std::collections::HashSet;
use std::time::Duration;

use reqwest::Url;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{Config, COLLECTION_API_TIMEOUT_SECS, USERS_PAGE_SIZE};
use crate::error::{AppError, FetchError, Result};
use crate::types::{CollectionData, CollectionRecord, LiveStats};

const ACTIVITY_PATH: &str = "api/user-community-activity";

/// Client for the community-activity API: entity list, per-entity stats,
/// paginated claimer lists, and the overall live counters.
pub struct CollectionClient {
    client: reqwest::Client,
    base_url: String,
    max_users: Option<usize>,
    rate_limit_delay: Duration,
}

impl CollectionClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(COLLECTION_API_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: cfg.collection_api_url.trim_end_matches('/').to_string(),
            max_users: cfg.max_users(),
            rate_limit_delay: Duration::from_millis(cfg.rate_limit_delay_ms),
        })
    }

    fn endpoint(&self, tail: &str) -> String {
        format!("{}/{ACTIVITY_PATH}/{tail}", self.base_url)
    }

    /// Entity names are arbitrary text, so they go in as an encoded path segment.
    fn entity_url(&self, entity: &str) -> std::result::Result<Url, FetchError> {
        let mut url = Url::parse(&self.endpoint("entity"))
            .map_err(|e| FetchError::Decode(format!("invalid collection API url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| FetchError::Decode("collection API url cannot take a path".to_string()))?
            .push(entity);
        Ok(url)
    }

    pub async fn fetch_entities(&self) -> Result<Vec<String>> {
        let body: Value = self
            .client
            .get(self.endpoint("entities"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let entities = entities_from_body(&body);
        if entities.is_empty() {
            warn!("[COLLECT] entity list empty or in an unexpected shape");
        }
        Ok(entities)
    }

    async fn try_fetch_entity_stats(&self, entity: &str) -> std::result::Result<Value, FetchError> {
        Ok(self
            .client
            .get(self.endpoint("stats"))
            .query(&[("entity", entity)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }

    /// Opaque per-entity stats. Any failure yields an empty object.
    pub async fn fetch_entity_stats(&self, entity: &str) -> Value {
        match self.try_fetch_entity_stats(entity).await {
            Ok(stats) if stats.is_object() => stats,
            Ok(_) => Value::Object(Default::default()),
            Err(e) => {
                warn!(entity, "[COLLECT] stats fetch failed: {e}");
                Value::Object(Default::default())
            }
        }
    }

    async fn fetch_users_page(
        &self,
        url: &Url,
        offset: usize,
    ) -> std::result::Result<Vec<Value>, FetchError> {
        let body: Value = self
            .client
            .get(url.clone())
            .query(&[("limit", USERS_PAGE_SIZE), ("offset", offset)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(users_from_page(&body))
    }

    /// Page through an entity's claimers until a short or empty page, the user
    /// cap, or an error. Whatever was gathered before an error is kept.
    pub async fn fetch_entity_users(&self, entity: &str) -> Vec<Value> {
        let url = match self.entity_url(entity) {
            Ok(u) => u,
            Err(e) => {
                warn!(entity, "[COLLECT] {e}");
                return Vec::new();
            }
        };

        let mut users: Vec<Value> = Vec::new();
        let mut offset = 0usize;

        loop {
            if self.max_users.is_some_and(|max| users.len() >= max) {
                break;
            }

            let page = match self.fetch_users_page(&url, offset).await {
                Ok(p) => p,
                Err(e) => {
                    warn!(entity, offset, "[COLLECT] user page fetch failed: {e}");
                    break;
                }
            };

            let page_len = page.len();
            users.extend(page);
            debug!(entity, offset, page_len, "[COLLECT] user page");

            if page_len < USERS_PAGE_SIZE {
                break;
            }
            offset += USERS_PAGE_SIZE;
            tokio::time::sleep(self.rate_limit_delay).await;
        }

        if let Some(max) = self.max_users {
            users.truncate(max);
        }
        users
    }

    pub async fn collect_all_data(&self) -> Result<CollectionData> {
        let entities = self.fetch_entities().await?;
        info!(entities = entities.len(), "[COLLECT] found {} entities", entities.len());

        let mut collections = Vec::with_capacity(entities.len());
        let mut all_wallets: HashSet<String> = HashSet::new();

        for entity in entities {
            let stats = self.fetch_entity_stats(&entity).await;
            let users = self.fetch_entity_users(&entity).await;

            let wallets: HashSet<String> = users.iter().filter_map(extract_wallet).collect();
            info!(
                entity = entity.as_str(),
                users = users.len(),
                unique_wallets = wallets.len(),
                "[COLLECT] {entity}: {} unique wallets",
                wallets.len(),
            );

            let mut record = CollectionRecord::new(entity, wallets.len() as u64, users.len() as u64);
            record.stats = stats;
            record.users = users;
            collections.push(record);
            all_wallets.extend(wallets);
        }

        Ok(CollectionData {
            collections,
            total_unique_wallets: all_wallets.len() as u64,
            timestamp: chrono::Utc::now().to_rfc3339(),
        })
    }

    pub async fn fetch_live_stats(&self) -> Result<LiveStats> {
        let stats: LiveStats = self
            .client
            .get(self.endpoint("stats"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if stats.by_entity.is_empty() {
            return Err(AppError::Bootstrap("live stats carried no entities".to_string()));
        }
        Ok(stats)
    }
}

/// `[...]` or `{"entities": [...]}`; non-string entries are skipped.
pub fn entities_from_body(body: &Value) -> Vec<String> {
    let list = match body {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("entities") {
            Some(Value::Array(items)) => items,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };
    list.iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}

/// `[...]`, `{"users": [...]}` or `{"data": [...]}`.
pub fn users_from_page(body: &Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items.clone(),
        Value::Object(map) => {
            let key = if map.contains_key("users") { "users" } else { "data" };
            match map.get(key) {
                Some(Value::Array(items)) => items.clone(),
                _ => {
                    let keys: Vec<&String> = map.keys().collect();
                    warn!("[COLLECT] unexpected user page keys: {keys:?}");
                    Vec::new()
                }
            }
        }
        _ => Vec::new(),
    }
}

/// Claimer wallet from a user entry: `wallet`, then `walletAddress`, or the
/// entry itself when it is a bare string.
pub fn extract_wallet(user: &Value) -> Option<String> {
    match user {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map
            .get("wallet")
            .or_else(|| map.get("walletAddress"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}
