//! Structured payload gate.
//!
//! For backends that expect a JSON object with known top-level fields
//! (model/prompt style APIs). Runs before dispatch; a rejected request never
//! reaches the network.

use serde_json::Value;

use crate::config::schema::PayloadValidationConfig;
use crate::http::request::OutboundRequest;
use crate::upstream::error::ProxyError;

#[derive(Debug, Clone)]
pub struct PayloadValidator {
    required: Vec<String>,
}

impl PayloadValidator {
    pub fn new(required: Vec<String>) -> Self {
        Self { required }
    }

    /// `None` when no fields are required.
    pub fn from_config(config: &PayloadValidationConfig) -> Option<Self> {
        if config.required_fields.is_empty() {
            None
        } else {
            Some(Self::new(config.required_fields.clone()))
        }
    }

    /// Check a request body. Requests without a body are not inspected.
    pub fn check(&self, request: &OutboundRequest) -> Result<(), ProxyError> {
        let Some(body) = &request.body else {
            return Ok(());
        };

        let value: Value = serde_json::from_slice(body)
            .map_err(|e| ProxyError::Validation(format!("request body is not valid JSON: {}", e)))?;
        let object = value
            .as_object()
            .ok_or_else(|| ProxyError::Validation("request body must be a JSON object".into()))?;

        for field in &self.required {
            match object.get(field) {
                None => {
                    return Err(ProxyError::Validation(format!("missing required field '{}'", field)));
                }
                Some(Value::Null) => {
                    return Err(ProxyError::Validation(format!("field '{}' must not be null", field)));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}
