//! Bookkeeping fields carried in every property bag.
//!
//! Persisted flat alongside the caller's properties under reserved keys.
//! `createdAt` is written once; `lastModifiedAt` moves forward on every
//! touch and never backwards, even if the wall clock does.

use chrono::{DateTime, Utc};

use super::{PropertyMap, Value, merge_into};

pub const CREATED_AT: &str = "createdAt";
pub const LAST_MODIFIED_AT: &str = "lastModifiedAt";
pub const SOURCE: &str = "source";
pub const CONFIDENCE: &str = "confidence";
pub const STATUS: &str = "status";
pub const TAGS: &str = "tags";

/// Keys only the engine may write.
pub const TIMESTAMP_KEYS: [&str; 2] = [CREATED_AT, LAST_MODIFIED_AT];

/// Typed view over the bookkeeping keys of a property bag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bookkeeping {
    pub created_at: Option<DateTime<Utc>>,
    pub last_modified_at: Option<DateTime<Utc>>,
    pub source: Option<String>,
    pub confidence: Option<f64>,
    pub status: Option<String>,
    pub tags: Vec<String>,
}

impl Bookkeeping {
    pub fn read(props: &PropertyMap) -> Self {
        Self {
            created_at: props.get(CREATED_AT).and_then(Value::as_datetime),
            last_modified_at: props.get(LAST_MODIFIED_AT).and_then(Value::as_datetime),
            source: props.get(SOURCE).and_then(Value::as_str).map(str::to_owned),
            confidence: props.get(CONFIDENCE).and_then(Value::as_float),
            status: props.get(STATUS).and_then(Value::as_str).map(str::to_owned),
            tags: props
                .get(TAGS)
                .and_then(Value::as_list)
                .map(|l| l.iter().filter_map(Value::as_str).map(str::to_owned).collect())
                .unwrap_or_default(),
        }
    }
}

/// Remove caller-supplied timestamps. Returns the keys that were dropped.
pub fn strip_timestamps(props: &mut PropertyMap) -> Vec<&'static str> {
    TIMESTAMP_KEYS
        .into_iter()
        .filter(|key| props.shift_remove(*key).is_some())
        .collect()
}

/// Prepare the bag of a record that is being created now.
pub fn stamp_created(props: &mut PropertyMap, now: DateTime<Utc>) {
    strip_timestamps(props);
    props.insert(CREATED_AT.to_owned(), Value::DateTime(now));
    props.insert(LAST_MODIFIED_AT.to_owned(), Value::DateTime(now));
}

/// Merge `incoming` into an existing bag and refresh `lastModifiedAt`.
/// `createdAt` survives untouched; records that predate bookkeeping get it
/// set to `now`.
pub fn merge_touched(existing: &mut PropertyMap, mut incoming: PropertyMap, now: DateTime<Utc>) {
    strip_timestamps(&mut incoming);
    let previous = existing.get(LAST_MODIFIED_AT).and_then(Value::as_datetime);
    merge_into(existing, incoming);

    if !existing.contains_key(CREATED_AT) {
        existing.insert(CREATED_AT.to_owned(), Value::DateTime(now));
    }
    let stamp = previous.map_or(now, |p| p.max(now));
    existing.insert(LAST_MODIFIED_AT.to_owned(), Value::DateTime(stamp));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::props;
    use chrono::Duration;

    #[test]
    fn test_created_at_is_kept_on_merge() {
        let t0 = Utc::now();
        let mut bag = props([("name", "Foo")]);
        stamp_created(&mut bag, t0);

        let t1 = t0 + Duration::seconds(5);
        let mut incoming = props([("visibility", "public")]);
        incoming.insert(CREATED_AT.into(), Value::DateTime(t1));
        merge_touched(&mut bag, incoming, t1);

        let bk = Bookkeeping::read(&bag);
        assert_eq!(bk.created_at, Some(t0));
        assert_eq!(bk.last_modified_at, Some(t1));
        assert_eq!(bag.get("visibility"), Some(&Value::from("public")));
    }

    #[test]
    fn test_last_modified_never_regresses() {
        let t0 = Utc::now();
        let mut bag = PropertyMap::new();
        stamp_created(&mut bag, t0);

        merge_touched(&mut bag, PropertyMap::new(), t0 - Duration::minutes(1));
        assert_eq!(Bookkeeping::read(&bag).last_modified_at, Some(t0));
    }

    #[test]
    fn test_read_optional_fields() {
        let bag = props([
            (SOURCE, Value::from("go-analyzer")),
            (CONFIDENCE, Value::from(0.75)),
            (TAGS, Value::from(vec!["hot", "legacy"])),
        ]);
        let bk = Bookkeeping::read(&bag);
        assert_eq!(bk.source.as_deref(), Some("go-analyzer"));
        assert_eq!(bk.confidence, Some(0.75));
        assert_eq!(bk.tags, vec!["hot".to_string(), "legacy".to_string()]);
        assert!(bk.status.is_none());
    }
}
