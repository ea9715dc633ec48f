//! Notion database as a [`BoardStore`].
//!
//! Property values are translated between Notion's JSON shape and
//! [`PropertyValue`]. Notion `status` properties read as selects; property
//! types the engine never looks at are dropped on read.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use boardsync_core::{
    BoardPage, BoardStore, PageId, PropertyMap, PropertyValue, StoreError, SyncConfig,
};

use crate::http::HttpClient;

const PAGE_SIZE: u32 = 100;

pub struct NotionBoard {
    http: HttpClient,
    database_id: String,
}

impl NotionBoard {
    pub fn new(http: HttpClient, database_id: impl Into<String>) -> Self {
        Self {
            http,
            database_id: database_id.into(),
        }
    }

    /// Expects a validated config; a missing token is sent as an empty
    /// bearer and rejected by the API.
    pub fn from_config(config: &SyncConfig) -> Self {
        let token = config.board.token.clone().unwrap_or_default();
        let headers = vec![
            ("Authorization".to_owned(), format!("Bearer {token}")),
            ("Notion-Version".to_owned(), config.board.api_version.clone()),
        ];
        let http = HttpClient::new(&config.board.api_base, headers, &config.http);
        Self::new(http, config.board.database_id.clone())
    }
}

#[async_trait]
impl BoardStore for NotionBoard {
    async fn list_pages(&self) -> Result<Vec<BoardPage>, StoreError> {
        let path = format!("/databases/{}/query", self.database_id);
        let mut pages = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut body = json!({ "page_size": PAGE_SIZE });
            if let Some(cursor) = &cursor {
                body["start_cursor"] = json!(cursor);
            }
            let response = self.http.post(&path, body).await?;
            let results = response["results"]
                .as_array()
                .ok_or_else(|| StoreError::Decode("query response without results".into()))?;
            for result in results {
                pages.push(decode_page(result)?);
            }

            cursor = match (response["has_more"].as_bool(), response["next_cursor"].as_str()) {
                (Some(true), Some(next)) => Some(next.to_owned()),
                _ => break,
            };
        }
        tracing::debug!(pages = pages.len(), "listed board pages");
        Ok(pages)
    }

    async fn get_page(&self, id: &PageId) -> Result<BoardPage, StoreError> {
        let response = self.http.get(&format!("/pages/{id}"), &[]).await?;
        decode_page(&response)
    }

    async fn create_page(&self, properties: PropertyMap) -> Result<BoardPage, StoreError> {
        let body = json!({
            "parent": { "database_id": self.database_id },
            "properties": encode_properties(&properties),
        });
        let response = self.http.post("/pages", body).await?;
        decode_page(&response)
    }

    async fn update_page(&self, id: &PageId, properties: PropertyMap) -> Result<(), StoreError> {
        let body = json!({ "properties": encode_properties(&properties) });
        self.http.patch(&format!("/pages/{id}"), body).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

fn decode_page(value: &Value) -> Result<BoardPage, StoreError> {
    let id = value["id"]
        .as_str()
        .ok_or_else(|| StoreError::Decode("page without id".into()))?;
    let mut properties = PropertyMap::new();
    if let Some(raw) = value["properties"].as_object() {
        for (name, property) in raw {
            if let Some(decoded) = decode_property(property) {
                properties.insert(name.clone(), decoded);
            }
        }
    }
    Ok(BoardPage::new(id, properties))
}

/// `None` for property types outside [`PropertyValue`].
fn decode_property(property: &Value) -> Option<PropertyValue> {
    let kind = property["type"].as_str()?;
    let body = &property[kind];
    let value = match kind {
        "title" => PropertyValue::Title(rich_text(body)),
        "rich_text" => PropertyValue::Text(rich_text(body)),
        "number" => PropertyValue::Number(
            body.as_i64()
                .or_else(|| body.as_f64().map(|n| n.round() as i64)),
        ),
        "select" => PropertyValue::Select(body["name"].as_str().map(str::to_owned)),
        "status" => PropertyValue::Status(body["name"].as_str().map(str::to_owned)),
        "relation" => PropertyValue::Relation(
            body.as_array()
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|item| item["id"].as_str())
                        .map(PageId::from)
                        .collect()
                })
                .unwrap_or_default(),
        ),
        "url" => PropertyValue::Url(body.as_str().map(str::to_owned)),
        _ => return None,
    };
    Some(value)
}

fn rich_text(body: &Value) -> Vec<String> {
    body.as_array()
        .map(|segments| {
            segments
                .iter()
                .filter_map(|segment| {
                    segment["plain_text"]
                        .as_str()
                        .or_else(|| segment["text"]["content"].as_str())
                })
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

fn encode_properties(properties: &PropertyMap) -> Value {
    let encoded: Map<String, Value> = properties
        .iter()
        .map(|(name, value)| (name.clone(), encode_property(value)))
        .collect();
    Value::Object(encoded)
}

fn encode_property(value: &PropertyValue) -> Value {
    fn segments(text: &[String]) -> Value {
        Value::Array(
            text.iter()
                .map(|segment| json!({ "text": { "content": segment } }))
                .collect(),
        )
    }

    match value {
        PropertyValue::Title(text) => json!({ "title": segments(text) }),
        PropertyValue::Text(text) => json!({ "rich_text": segments(text) }),
        PropertyValue::Number(number) => json!({ "number": number }),
        PropertyValue::Select(Some(name)) => json!({ "select": { "name": name } }),
        PropertyValue::Select(None) => json!({ "select": null }),
        PropertyValue::Status(Some(name)) => json!({ "status": { "name": name } }),
        PropertyValue::Status(None) => json!({ "status": null }),
        PropertyValue::Relation(ids) => json!({
            "relation": ids.iter().map(|id| json!({ "id": id.0 })).collect::<Vec<_>>()
        }),
        PropertyValue::Url(url) => json!({ "url": url }),
    }
}
