//! Wire and domain types shared by the backend client and the chat session.
//!
//! Products are opaque to this crate: known fields are typed for display,
//! anything else the backend sends is kept in `extra` so the product can be
//! echoed back verbatim as `previous_products`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Label used for the user turn when only an image is sent
pub const IMAGE_ONLY_PROMPT: &str = "Find products matching this image";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One completed turn in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub products: Option<Vec<Product>>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            products: None,
        }
    }

    pub fn assistant(content: impl Into<String>, products: Option<Vec<Product>>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            products: products.filter(|p| !p.is_empty()),
        }
    }

    pub fn has_products(&self) -> bool {
        self.products.as_ref().is_some_and(|p| !p.is_empty())
    }
}

/// History entry as sent to the backend: products stripped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

impl From<&Message> for HistoryEntry {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub price: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specs_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviews_json: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_raw: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of `POST /api/chat`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub image_base64: Option<String>,
    pub session_id: Option<String>,
    pub history: Vec<HistoryEntry>,
    pub previous_products: Vec<Product>,
}

impl ChatRequest {
    /// Build a request from the history that precedes the new user turn.
    ///
    /// `previous_products` is the product list of the most recent assistant
    /// turn that carried products, or empty if none did.
    pub fn from_history(
        message: &str,
        image_base64: Option<String>,
        session_id: Option<String>,
        history: &[Message],
    ) -> Self {
        let previous_products = history
            .iter()
            .rev()
            .filter(|m| m.role == Role::Assistant)
            .find_map(|m| m.products.as_ref().filter(|p| !p.is_empty()))
            .cloned()
            .unwrap_or_default();

        Self {
            message: message.trim().to_string(),
            image_base64,
            session_id,
            history: history.iter().map(HistoryEntry::from).collect(),
            previous_products,
        }
    }
}

/// Successful body of `POST /api/chat`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    #[serde(default)]
    pub products: Vec<Product>,
    /// `CHAT`, `SEARCH` or `IMAGE_SEARCH`
    #[serde(default)]
    pub intent: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Body of `GET /api/health`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub ready: bool,
    #[serde(default)]
    pub catalog_size: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProductList {
    pub products: Vec<Product>,
}

#[cfg(test)]
pub(crate) fn sample_product(id: &str) -> Product {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "name": format!("Product {}", id),
        "price": "$10.00",
        "image_url": "https://example.com/p.jpg"
    }))
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn product(id: &str) -> Product {
        sample_product(id)
    }

    #[test]
    fn test_empty_history_has_no_previous_products() {
        let request = ChatRequest::from_history("hi", None, None, &[]);
        assert!(request.previous_products.is_empty());
        assert!(request.history.is_empty());
        assert_eq!(request.session_id, None);
    }

    #[test]
    fn test_most_recent_product_turn_wins() {
        let history = vec![
            Message::user("running shoes"),
            Message::assistant("Here are shoes", Some(vec![product("a")])),
            Message::user("and t-shirts?"),
            Message::assistant("Here are shirts", Some(vec![product("b"), product("c")])),
            Message::user("thanks"),
            Message::assistant("You're welcome", None),
        ];

        let request = ChatRequest::from_history("compare them", None, None, &history);
        let ids: Vec<&str> = request.previous_products.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_history_strips_products() {
        let history = vec![Message::assistant("shoes", Some(vec![product("a")]))];
        let request = ChatRequest::from_history("  more  ", None, Some("s-1".into()), &history);

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["message"], "more");
        assert_eq!(body["session_id"], "s-1");
        assert_eq!(body["image_base64"], Value::Null);
        assert_eq!(body["history"], json!([{"role": "assistant", "content": "shoes"}]));
    }

    #[test]
    fn test_assistant_with_empty_products_is_treated_as_none() {
        let message = Message::assistant("nothing matched", Some(vec![]));
        assert!(message.products.is_none());
        assert!(!message.has_products());
    }

    #[test]
    fn test_unknown_product_fields_survive() {
        let raw = json!({
            "id": "B0001",
            "name": "Lego set",
            "price": "$49.99",
            "image_url": "https://example.com/lego.jpg",
            "rating": 4.7,
            "review_count": 1234,
            "warehouse": "east"
        });

        let product: Product = serde_json::from_value(raw).unwrap();
        assert_eq!(product.extra.get("warehouse"), Some(&json!("east")));

        let back = serde_json::to_value(&product).unwrap();
        assert_eq!(back["warehouse"], "east");
        assert_eq!(back["review_count"], 1234);
    }

    #[test]
    fn test_sparse_product_echoes_back_unchanged() {
        let raw = json!({"id": "B0002", "name": "Water bottle", "color": "teal"});

        let product: Product = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(product.price, "");
        assert_eq!(product.rating, None);

        assert_eq!(serde_json::to_value(&product).unwrap(), raw);
    }

    #[test]
    fn test_chat_response_defaults() {
        let response: ChatResponse =
            serde_json::from_value(json!({"response": "Hello!", "intent": "CHAT"})).unwrap();
        assert!(response.products.is_empty());
        assert_eq!(response.session_id, None);
    }
}
