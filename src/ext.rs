//! # Extension traits for scanned DynamoDB items.

use aws_sdk_dynamodb::types::AttributeValue;
use std::collections::HashMap;

/// Why a typed lookup on an item failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeMismatch {
    /// Absent, or present as `NULL`.
    Missing,
    WrongType,
    /// Position of the first element in a list that is not a string.
    NonString(usize),
}

/// Trait to extract concrete values from a DynamoDB item
///
/// The DynamoDB client returns AttributeValues, which are enums that contain
/// the concrete values. This trait provides additional methods to the HashMap
/// to extract those values, reporting why a lookup failed instead of
/// collapsing every failure into `None`.
pub trait AttributeValuesExt {
    fn get_s(&self, key: &str) -> Result<String, AttributeMismatch>;
    fn get_string_list(&self, key: &str) -> Result<Vec<String>, AttributeMismatch>;
}

impl AttributeValuesExt for HashMap<String, AttributeValue> {
    /// Return a string from a key
    ///
    /// E.g. if you run `get_s("ID")` on a DynamoDB item structured like this,
    /// you will retrieve the value `"foo"`.
    ///
    /// ```json
    /// {
    ///   "ID": {
    ///     "S": "foo"
    ///   }
    /// }
    /// ```
    fn get_s(&self, key: &str) -> Result<String, AttributeMismatch> {
        let value = present(self, key)?;
        value
            .as_s()
            .map(|s| s.to_owned())
            .map_err(|_| AttributeMismatch::WrongType)
    }

    /// Return an ordered list of strings from a key
    ///
    /// Accepts either a list whose elements are all strings, or a string set.
    ///
    /// ```json
    /// {
    ///   "URL": {
    ///     "L": [{ "S": "http://a" }, { "S": "http://b" }]
    ///   }
    /// }
    /// ```
    fn get_string_list(&self, key: &str) -> Result<Vec<String>, AttributeMismatch> {
        match present(self, key)? {
            AttributeValue::L(values) => values
                .iter()
                .enumerate()
                .map(|(position, value)| {
                    value
                        .as_s()
                        .map(|s| s.to_owned())
                        .map_err(|_| AttributeMismatch::NonString(position))
                })
                .collect(),
            AttributeValue::Ss(values) => Ok(values.clone()),
            _ => Err(AttributeMismatch::WrongType),
        }
    }
}

fn present<'a>(
    item: &'a HashMap<String, AttributeValue>,
    key: &str,
) -> Result<&'a AttributeValue, AttributeMismatch> {
    match item.get(key) {
        None | Some(AttributeValue::Null(_)) => Err(AttributeMismatch::Missing),
        Some(value) => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attributevalue_get_s() {
        let mut item = HashMap::new();
        item.insert("ID".to_owned(), AttributeValue::S("foo".to_owned()));

        assert_eq!(item.get_s("ID"), Ok("foo".to_owned()));
    }

    #[test]
    fn attributevalue_get_s_missing() {
        let mut item = HashMap::new();
        item.insert("ID".to_owned(), AttributeValue::S("foo".to_owned()));

        assert_eq!(item.get_s("foo"), Err(AttributeMismatch::Missing));
    }

    #[test]
    fn attributevalue_null_counts_as_missing() {
        let mut item = HashMap::new();
        item.insert("ID".to_owned(), AttributeValue::Null(true));
        item.insert("URL".to_owned(), AttributeValue::Null(true));

        assert_eq!(item.get_s("ID"), Err(AttributeMismatch::Missing));
        assert_eq!(item.get_string_list("URL"), Err(AttributeMismatch::Missing));
    }

    #[test]
    fn attributevalue_get_s_wrong_type() {
        let mut item = HashMap::new();
        item.insert("ID".to_owned(), AttributeValue::N("10".to_owned()));

        assert_eq!(item.get_s("ID"), Err(AttributeMismatch::WrongType));
    }

    #[test]
    fn attributevalue_get_string_list() {
        let mut item = HashMap::new();
        item.insert(
            "URL".to_owned(),
            AttributeValue::L(vec![
                AttributeValue::S("http://b".to_owned()),
                AttributeValue::S("http://a".to_owned()),
            ]),
        );

        assert_eq!(
            item.get_string_list("URL"),
            Ok(vec!["http://b".to_owned(), "http://a".to_owned()])
        );
    }

    #[test]
    fn attributevalue_get_string_list_from_set() {
        let mut item = HashMap::new();
        item.insert(
            "URL".to_owned(),
            AttributeValue::Ss(vec!["http://a".to_owned()]),
        );

        assert_eq!(item.get_string_list("URL"), Ok(vec!["http://a".to_owned()]));
    }

    #[test]
    fn attributevalue_get_string_list_non_string() {
        let mut item = HashMap::new();
        item.insert(
            "URL".to_owned(),
            AttributeValue::L(vec![
                AttributeValue::S("http://a".to_owned()),
                AttributeValue::N("1".to_owned()),
            ]),
        );

        assert_eq!(
            item.get_string_list("URL"),
            Err(AttributeMismatch::NonString(1))
        );
    }
}
