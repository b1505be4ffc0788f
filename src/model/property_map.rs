//! PropertyMap: the key-value bag on entities and relationships.

use indexmap::IndexMap;

use super::Value;

/// An ordered map of property names to values.
pub type PropertyMap = IndexMap<String, Value>;

/// Build a PropertyMap from (key, value) pairs.
pub fn props<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> PropertyMap
where
    K: Into<String>,
    V: Into<Value>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

/// Merge `incoming` into `existing`: new keys are appended, overlapping keys
/// are overwritten in place. Nothing is ever removed.
pub fn merge_into(existing: &mut PropertyMap, incoming: PropertyMap) {
    for (key, value) in incoming {
        existing.insert(key, value);
    }
}

/// Convert a JSON object into a PropertyMap. Non-object JSON yields an
/// empty map.
pub fn from_json(json: serde_json::Value) -> PropertyMap {
    match json {
        serde_json::Value::Object(map) => map
            .into_iter()
            .map(|(k, v)| (k, Value::from_json(v)))
            .collect(),
        _ => PropertyMap::new(),
    }
}

/// Convert a PropertyMap into a JSON object.
pub fn to_json(map: &PropertyMap) -> serde_json::Value {
    serde_json::Value::Object(map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
}

/// `#[serde(with = "plain")]` helper: (de)serialises a PropertyMap as a plain
/// JSON object instead of the tagged storage encoding.
pub mod plain {
    use indexmap::IndexMap;
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::PropertyMap;
    use crate::model::Value;

    pub fn serialize<S: Serializer>(map: &PropertyMap, serializer: S) -> Result<S::Ok, S::Error> {
        let mut out = serializer.serialize_map(Some(map.len()))?;
        for (key, value) in map {
            out.serialize_entry(key, &value.to_json())?;
        }
        out.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PropertyMap, D::Error> {
        let json = IndexMap::<String, serde_json::Value>::deserialize(deserializer)?;
        Ok(json.into_iter().map(|(k, v)| (k, Value::from_json(v))).collect())
    }
}
