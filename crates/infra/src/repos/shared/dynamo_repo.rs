use anyhow::{anyhow, Context};
use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, Utc};
use jubilee_domain::parse_instant;
use std::collections::{BTreeMap, HashMap};

/// Shared helpers for the DynamoDB repositories: attribute extraction and
/// the opaque page cursor form.

pub fn string_attr(item: &HashMap<String, AttributeValue>, name: &str) -> anyhow::Result<String> {
    item.get(name)
        .and_then(|value| value.as_s().ok())
        .map(|value| value.to_string())
        .ok_or_else(|| anyhow!("missing string attribute: {}", name))
}

pub fn opt_string_attr(item: &HashMap<String, AttributeValue>, name: &str) -> Option<String> {
    item.get(name)
        .and_then(|value| value.as_s().ok())
        .map(|value| value.to_string())
}

pub fn number_attr(item: &HashMap<String, AttributeValue>, name: &str) -> anyhow::Result<i64> {
    item.get(name)
        .and_then(|value| value.as_n().ok())
        .ok_or_else(|| anyhow!("missing number attribute: {}", name))?
        .parse()
        .with_context(|| format!("attribute {} is not a number", name))
}

pub fn opt_number_attr(item: &HashMap<String, AttributeValue>, name: &str) -> Option<i64> {
    item.get(name)
        .and_then(|value| value.as_n().ok())
        .and_then(|value| value.parse().ok())
}

pub fn instant_attr(
    item: &HashMap<String, AttributeValue>,
    name: &str,
) -> anyhow::Result<DateTime<Utc>> {
    let raw = string_attr(item, name)?;
    parse_instant(&raw).with_context(|| format!("attribute {} is not an instant", name))
}

pub fn opt_instant_attr(
    item: &HashMap<String, AttributeValue>,
    name: &str,
) -> Option<DateTime<Utc>> {
    opt_string_attr(item, name).and_then(|raw| parse_instant(&raw).ok())
}

/// Page cursors are the store's `LastEvaluatedKey` flattened to JSON. The
/// form is opaque to callers; it only round-trips back into
/// `ExclusiveStartKey`.
pub fn encode_cursor(key: &HashMap<String, AttributeValue>) -> anyhow::Result<String> {
    let mut plain = BTreeMap::new();
    for (name, value) in key {
        let value = value
            .as_s()
            .map_err(|_| anyhow!("unexpected cursor attribute: {}", name))?;
        plain.insert(name.clone(), value.clone());
    }
    Ok(serde_json::to_string(&plain)?)
}

pub fn decode_cursor(cursor: &str) -> anyhow::Result<HashMap<String, AttributeValue>> {
    let plain: BTreeMap<String, String> =
        serde_json::from_str(cursor).context("malformed page cursor")?;
    Ok(plain
        .into_iter()
        .map(|(name, value)| (name, AttributeValue::S(value)))
        .collect())
}
