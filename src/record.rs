use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;

use crate::errors::DecodeError;
use crate::ext::{AttributeMismatch, AttributeValuesExt};

pub const ID_ATTRIBUTE: &str = "ID";
pub const URL_ATTRIBUTE: &str = "URL";

pub type Item = HashMap<String, AttributeValue>;

/// One scanned table item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: String,
    pub urls: Vec<String>,
}

impl Record {
    /// Maps a single item onto a record. `index` is the item's position in the
    /// scan response and only feeds the error.
    pub fn from_item(index: usize, item: &Item) -> Result<Record, DecodeError> {
        let id = item
            .get_s(ID_ATTRIBUTE)
            .map_err(|e| mismatch(index, ID_ATTRIBUTE, "S", e))?;
        // an absent or NULL URL list decodes as empty
        let urls = match item.get_string_list(URL_ATTRIBUTE) {
            Err(AttributeMismatch::Missing) => Vec::new(),
            other => other.map_err(|e| mismatch(index, URL_ATTRIBUTE, "L or SS", e))?,
        };

        Ok(Record { id, urls })
    }
}

fn mismatch(
    index: usize,
    field: &'static str,
    expected: &'static str,
    err: AttributeMismatch,
) -> DecodeError {
    match err {
        AttributeMismatch::Missing => DecodeError::MissingField { index, field },
        AttributeMismatch::WrongType => DecodeError::WrongType {
            index,
            field,
            expected,
        },
        AttributeMismatch::NonString(position) => DecodeError::NonStringElement {
            index,
            field,
            position,
        },
    }
}

/// Decodes a whole scan page. Either every item decodes or none do.
pub fn decode_items(items: &[Item]) -> Result<Vec<Record>, DecodeError> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| Record::from_item(index, item))
        .collect()
}
