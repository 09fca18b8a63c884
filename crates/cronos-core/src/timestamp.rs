//! Timestamps as they appear in `jobs.json` and `logs/index.json`.
//!
//! Documents carry whole-second ISO 8601 UTC values such as
//! `2024-01-01T10:00:00Z`. Readers of the format reject fractional seconds,
//! so everything written goes through [`format`].

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serializer};

/// Current time truncated to whole seconds.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// `2024-01-01T10:00:00Z`. Sub-second precision is dropped.
pub fn format(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn serialize<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format(at))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    DateTime::<Utc>::deserialize(deserializer)
}

/// `#[serde(with = "timestamp::option")]` for optional timestamps.
pub mod option {
    use super::*;

    pub fn serialize<S: Serializer>(
        at: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match at {
            Some(at) => serializer.serialize_some(&super::format(at)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        Option::<DateTime<Utc>>::deserialize(deserializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_has_no_fraction() {
        assert_eq!(now().timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn test_format_drops_fraction() {
        let at: DateTime<Utc> = "2024-01-01T10:00:00.720957234Z".parse().unwrap();
        assert_eq!(format(&at), "2024-01-01T10:00:00Z");
    }

    #[test]
    fn test_reads_fractional_documents() {
        #[derive(Deserialize)]
        struct Doc {
            #[serde(with = "super::option", default)]
            at: Option<DateTime<Utc>>,
        }

        let doc: Doc = serde_json::from_str(r#"{"at":"2024-01-01T10:00:00.5Z"}"#).unwrap();
        assert_eq!(doc.at.unwrap().timestamp(), 1_704_103_200);

        let doc: Doc = serde_json::from_str("{}").unwrap();
        assert!(doc.at.is_none());
    }
}
