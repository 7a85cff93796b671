use std::collections::BTreeMap;

use crate::error::RequestError;
use crate::request::Headers;

use super::{BytesUpload, PreparesBody, ProducesUploadBody};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Key/value pairs sent like a plain HTML form (no file parts).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormBody {
    fields: BTreeMap<String, String>,
}

impl FormBody {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// `application/x-www-form-urlencoded` rendering, e.g. `age=35&name=bob`.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.fields {
            serializer.append_pair(key, value);
        }
        serializer.finish()
    }
}

impl PreparesBody for FormBody {
    fn prepare(
        &self,
        headers: &mut Headers,
    ) -> Result<Box<dyn ProducesUploadBody>, RequestError> {
        let encoded = self.encode().into_bytes();
        headers
            .entry("Content-Type".to_owned())
            .or_insert_with(|| FORM_CONTENT_TYPE.to_owned());
        headers.insert("Content-Length".to_owned(), encoded.len().to_string());
        Ok(Box::new(BytesUpload::new(encoded)))
    }
}
