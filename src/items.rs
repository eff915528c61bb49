use anyhow::{Result, bail};
use serde_json::Value;

use crate::client::ApiClient;

/// Accessor for the item-catalog endpoints.
#[derive(Debug, Clone)]
pub struct ItemsApi {
    client: ApiClient,
}

impl ItemsApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Every item in the project catalog, one record per item.
    pub fn item_list(&self) -> Result<Vec<Value>> {
        let url = self.client.endpoint("items.json");
        match self.client.send(&url, &[])? {
            Value::Array(items) => Ok(items),
            other => bail!("unexpected items response shape: {}", other),
        }
    }

    /// Attribute map of a single item.
    pub fn item_attributes(&self, uid: &str) -> Result<serde_json::Map<String, Value>> {
        let url = self.client.endpoint(&format!("items/{}.json", uid));
        match self.client.send(&url, &[])? {
            Value::Object(map) => Ok(map),
            other => bail!("unexpected item [{}] response shape: {}", uid, other),
        }
    }
}
