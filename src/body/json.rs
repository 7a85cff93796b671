use crate::error::RequestError;
use crate::request::Headers;

use super::{BytesUpload, PreparesBody, ProducesUploadBody};

const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Clone, PartialEq)]
pub struct JsonBody {
    value: serde_json::Value,
}

impl JsonBody {
    #[must_use]
    pub const fn new(value: serde_json::Value) -> Self {
        Self { value }
    }

    #[must_use]
    pub const fn value(&self) -> &serde_json::Value {
        &self.value
    }
}

impl PreparesBody for JsonBody {
    fn prepare(
        &self,
        headers: &mut Headers,
    ) -> Result<Box<dyn ProducesUploadBody>, RequestError> {
        let encoded = serde_json::to_vec(&self.value)
            .map_err(|err| RequestError::SerializeJson { source: err })?;
        headers.insert("Content-Type".to_owned(), JSON_CONTENT_TYPE.to_owned());
        headers.insert("Content-Length".to_owned(), encoded.len().to_string());
        Ok(Box::new(BytesUpload::new(encoded)))
    }
}
