//! Payload types of the `/buy` route

use std::fmt;

use serde::de::{self, Deserializer, IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use vending_core::Money;

use crate::error::Error;

/// Upper bound in bytes for a purchase payload
pub const MAX_PURCHASE_BODY: u64 = 64 << 10;

/// Name of the payload field holding the tendered money
const SUM_FIELD: &str = "sum";

/// Money tendered by the customer
///
/// Decoding is lenient: the `sum` key matches case-insensitively, the last
/// of duplicate keys wins, `null` (for the whole payload or for `sum`)
/// leaves the sum untouched and unknown keys are ignored. A payload without
/// a sum tenders nothing.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize)]
pub struct PurchaseRequest {
    pub sum: Money,
}

/// Change handed back after a successful purchase
#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct PurchaseResponse {
    pub change: Money,
}

impl PurchaseRequest {
    /// Decode a purchase payload
    pub fn decode(body: &[u8]) -> Result<Self, Error> {
        serde_json::from_slice(body).map_err(|e| Error::Malformed(e.to_string()))
    }
}

impl<'de> Deserialize<'de> for PurchaseRequest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_option(PurchaseVisitor)
    }
}

struct PurchaseVisitor;

impl<'de> Visitor<'de> for PurchaseVisitor {
    type Value = PurchaseRequest;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a JSON object with an integer \"sum\"")
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(PurchaseRequest::default())
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(PurchaseRequest::default())
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_map(self)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut request = PurchaseRequest::default();
        while let Some(key) = map.next_key::<String>()? {
            if key.eq_ignore_ascii_case(SUM_FIELD) {
                if let Some(sum) = map.next_value::<Option<Money>>()? {
                    request.sum = sum;
                }
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum_of(body: &str) -> Money {
        PurchaseRequest::decode(body.as_bytes()).unwrap().sum
    }

    #[test]
    fn decodes_sum() {
        assert_eq!(sum_of(r#"{"sum": 150}"#), 150);
        assert_eq!(sum_of(r#"{"sum": -20}"#), -20);
    }

    #[test]
    fn missing_sum_is_zero_and_extra_fields_are_ignored() {
        assert_eq!(sum_of(r#"{"coins": [1, 2], "note": {"a": null}}"#), 0);
        assert_eq!(sum_of("{}"), 0);
    }

    #[test]
    fn key_matches_case_insensitively() {
        assert_eq!(sum_of(r#"{"SUM": 150}"#), 150);
        assert_eq!(sum_of(r#"{"Sum": 150}"#), 150);
    }

    #[test]
    fn null_leaves_sum_untouched() {
        assert_eq!(sum_of("null"), 0);
        assert_eq!(sum_of(r#"{"sum": null}"#), 0);
        assert_eq!(sum_of(r#"{"sum": 120, "sum": null}"#), 120);
    }

    #[test]
    fn last_duplicate_wins() {
        assert_eq!(sum_of(r#"{"sum": 120, "sum": 150}"#), 150);
        assert_eq!(sum_of(r#"{"sum": 120, "SUM": 90}"#), 90);
    }

    #[test]
    fn rejects_non_integer_sums() {
        let bodies: [&[u8]; 8] = [
            br#"{"sum": "150"}"#,
            br#"{"sum": 1.5}"#,
            br#"{"sum": 18446744073709551615}"#,
            b"sum=150",
            b"150",
            b"[150]",
            b"{} {}",
            b"",
        ];
        for body in bodies {
            assert!(matches!(
                PurchaseRequest::decode(body),
                Err(Error::Malformed(_))
            ));
        }
    }

    #[test]
    fn encodes_change() {
        let json = serde_json::to_string(&PurchaseResponse { change: 50 }).unwrap();
        assert_eq!(json, r#"{"change":50}"#);
    }
}
