//! ObjectId promotion for client-supplied query documents.
//!
//! JSON has no way to spell a BSON `ObjectId`, so filters arriving over the
//! wire carry identifiers as 24-hex-character strings. This module walks a
//! decoded query/filter/pipeline value and promotes those strings into
//! [`Bson::ObjectId`] wherever they sit under an identifier-shaped key
//! (`_id`, or any key ending in `Id` or `_id`), leaving everything else
//! untouched. The same walk is applied to every filter the API accepts:
//! find, update, delete, replace, the atomic find-and-modify family,
//! aggregation `$match` stages, and bulk-write filters.
//!
//! Promotion never fails. A string that looks like an identifier but is
//! rejected by the parser is logged and kept verbatim, so the resulting
//! operation matches nothing instead of failing the request.

use mongodb::bson::oid::ObjectId;
use mongodb::bson::{Bson, Document};

/// Recursion cap for attacker-supplied nesting. Subtrees past this depth
/// are passed through unchanged rather than rejected.
const MAX_DEPTH: usize = 64;

/// A key that can carry a document identifier: `_id` itself, or any key
/// ending in `Id` or `_id`. Suffix matching is case-sensitive.
fn is_id_key(key: &str) -> bool {
    key == "_id" || key.ends_with("Id") || key.ends_with("_id")
}

/// Exactly 24 hex digits, either case.
fn is_hex_oid(value: &str) -> bool {
    value.len() == 24 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Promote identifier-shaped strings in `value` to native `ObjectId`s.
///
/// Scalars pass through untouched and arrays are normalized element-wise.
/// Documents are rebuilt key by key, in order:
///
/// 1. an identifier-shaped key whose value is a 24-hex-digit string becomes
///    an `ObjectId`;
/// 2. otherwise, operator values (`$in`, `$or`, ...) and any other nested
///    array or document are normalized recursively;
/// 3. remaining scalars are kept as-is.
///
/// Only keyed pairs convert: a bare hex string inside an array (for example
/// the elements of `{_id: {$in: [...]}}`) is not a candidate.
pub fn promote_object_ids(value: Bson) -> Bson {
    promote_value(value, 0)
}

/// Document-level entry point for request filters.
pub fn promote_object_ids_in(doc: Document) -> Document {
    promote_document(doc, 0)
}

fn promote_value(value: Bson, depth: usize) -> Bson {
    if depth > MAX_DEPTH {
        tracing::warn!(depth, "query nesting exceeds depth cap, subtree left unchanged");
        return value;
    }
    match value {
        Bson::Array(items) => Bson::Array(
            items
                .into_iter()
                .map(|item| promote_value(item, depth + 1))
                .collect(),
        ),
        Bson::Document(doc) => Bson::Document(promote_document(doc, depth + 1)),
        scalar => scalar,
    }
}

fn promote_document(doc: Document, depth: usize) -> Document {
    let mut out = Document::new();
    for (key, value) in doc {
        if is_id_key(&key) {
            if let Bson::String(s) = &value {
                if is_hex_oid(s) {
                    match ObjectId::parse_str(s) {
                        Ok(oid) => {
                            out.insert(key, Bson::ObjectId(oid));
                            continue;
                        }
                        Err(err) => {
                            // Keep the original string; the query degrades
                            // to matching nothing.
                            tracing::warn!(
                                key = %key,
                                error = %err,
                                "could not convert value to ObjectId"
                            );
                        }
                    }
                }
            }
        }
        let value = match value {
            composite @ (Bson::Array(_) | Bson::Document(_)) => promote_value(composite, depth),
            scalar => scalar,
        };
        out.insert(key, value);
    }
    out
}

/// Render a BSON value as response JSON, with `ObjectId`s as their
/// canonical 24-hex strings and everything else through relaxed Extended
/// JSON. This keeps responses round-trippable: an `_id` read from a find
/// response can be pasted straight into a delete filter.
pub fn bson_to_response_json(value: Bson) -> serde_json::Value {
    match value {
        Bson::ObjectId(oid) => serde_json::Value::String(oid.to_hex()),
        Bson::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(bson_to_response_json).collect())
        }
        Bson::Document(doc) => serde_json::Value::Object(
            doc.into_iter()
                .map(|(key, value)| (key, bson_to_response_json(value)))
                .collect(),
        ),
        other => other.into_relaxed_extjson(),
    }
}

/// Document-level convenience for response payloads.
pub fn document_to_response_json(doc: Document) -> serde_json::Value {
    bson_to_response_json(Bson::Document(doc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{bson, doc};

    const OID_A: &str = "507f1f77bcf86cd799439011";
    const OID_B: &str = "507f1f77bcf86cd799439012";

    #[test]
    fn scalars_and_null_pass_through() {
        assert_eq!(promote_object_ids(Bson::Null), Bson::Null);
        assert_eq!(promote_object_ids(bson!(42)), bson!(42));
        assert_eq!(promote_object_ids(bson!(true)), bson!(true));
        assert_eq!(promote_object_ids(bson!("plain")), bson!("plain"));
    }

    #[test]
    fn document_without_id_keys_is_unchanged() {
        let input = doc! { "name": "widget", "qty": 3, "tags": ["a", "b"] };
        assert_eq!(promote_object_ids_in(input.clone()), input);
    }

    #[test]
    fn id_key_with_hex_string_converts() {
        let out = promote_object_ids_in(doc! { "_id": OID_A });
        let oid = out.get_object_id("_id").expect("should be an ObjectId");
        assert_eq!(oid.to_hex(), OID_A);
    }

    #[test]
    fn conversion_round_trips_uppercase_hex() {
        let upper = OID_A.to_uppercase();
        let out = promote_object_ids_in(doc! { "_id": upper.as_str() });
        let oid = out.get_object_id("_id").expect("should be an ObjectId");
        assert_eq!(oid.to_hex(), OID_A);
    }

    #[test]
    fn id_suffixed_keys_convert() {
        let out = promote_object_ids_in(doc! { "ownerId": OID_A, "parent_id": OID_B });
        assert!(out.get_object_id("ownerId").is_ok());
        assert!(out.get_object_id("parent_id").is_ok());
    }

    #[test]
    fn hex_string_under_other_key_stays_a_string() {
        let out = promote_object_ids_in(doc! { "checksum": OID_A });
        assert_eq!(out.get_str("checksum").unwrap(), OID_A);
    }

    #[test]
    fn non_hex_string_under_id_key_stays_a_string() {
        let out = promote_object_ids_in(doc! { "_id": "abc" });
        assert_eq!(out.get_str("_id").unwrap(), "abc");

        // 24 chars but not hex
        let not_hex = "zzzzzzzzzzzzzzzzzzzzzzzz";
        let out = promote_object_ids_in(doc! { "_id": not_hex });
        assert_eq!(out.get_str("_id").unwrap(), not_hex);
    }

    #[test]
    fn id_key_with_non_string_value_falls_through() {
        let out = promote_object_ids_in(doc! { "orderId": 7 });
        assert_eq!(out.get_i32("orderId").unwrap(), 7);

        // An already-converted ObjectId is left alone.
        let oid = ObjectId::parse_str(OID_A).unwrap();
        let out = promote_object_ids_in(doc! { "_id": oid });
        assert_eq!(out.get_object_id("_id").unwrap(), oid);
    }

    #[test]
    fn operator_document_under_id_key_recurses() {
        // `_id` fails the string check, falls through to the operator rule,
        // and the `$in` array elements are bare strings, so they stay
        // strings: only keyed pairs convert.
        let out = promote_object_ids_in(doc! { "_id": { "$in": [OID_A, OID_B] } });
        let inner = out.get_document("_id").unwrap();
        let values = inner.get_array("$in").unwrap();
        assert_eq!(values, &[bson!(OID_A), bson!(OID_B)]);
    }

    #[test]
    fn logical_operator_recurses_into_array_elements() {
        let out = promote_object_ids_in(doc! {
            "$or": [ { "_id": OID_A }, { "category": "x" } ]
        });
        let branches = out.get_array("$or").unwrap();
        let first = branches[0].as_document().unwrap();
        assert_eq!(first.get_object_id("_id").unwrap().to_hex(), OID_A);
        let second = branches[1].as_document().unwrap();
        assert_eq!(second.get_str("category").unwrap(), "x");
    }

    #[test]
    fn nested_plain_documents_are_normalized() {
        let out = promote_object_ids_in(doc! {
            "details": { "supplierId": OID_A, "note": "keep" }
        });
        let details = out.get_document("details").unwrap();
        assert!(details.get_object_id("supplierId").is_ok());
        assert_eq!(details.get_str("note").unwrap(), "keep");
    }

    #[test]
    fn key_order_is_preserved() {
        let input = doc! { "b": 1, "_id": OID_A, "a": 2 };
        let out = promote_object_ids_in(input);
        let keys: Vec<&str> = out.keys().map(String::as_str).collect();
        assert_eq!(keys, ["b", "_id", "a"]);
    }

    #[test]
    fn depth_cap_leaves_deep_subtrees_unchanged() {
        let mut value = bson!({ "_id": OID_A });
        for _ in 0..(MAX_DEPTH + 8) {
            value = bson!({ "level": value });
        }
        // Must not overflow the stack; the innermost `_id` is beyond the
        // cap and stays a string.
        let out = promote_object_ids(value.clone());
        let mut probe = &out;
        while let Some(doc) = probe.as_document() {
            if let Some(inner) = doc.get("level") {
                probe = inner;
            } else {
                assert_eq!(doc.get_str("_id").unwrap(), OID_A);
                break;
            }
        }
    }

    #[test]
    fn concurrent_promotions_do_not_interfere() {
        use std::thread;

        let handles: Vec<_> = (0..8)
            .map(|i| {
                thread::spawn(move || {
                    let input = doc! {
                        "_id": OID_A,
                        "seq": i as i32,
                        "$or": [ { "refId": OID_B }, { "name": format!("t{i}") } ]
                    };
                    promote_object_ids_in(input)
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            let out = handle.join().unwrap();
            assert_eq!(out.get_object_id("_id").unwrap().to_hex(), OID_A);
            assert_eq!(out.get_i32("seq").unwrap(), i as i32);
        }
    }

    #[test]
    fn response_json_renders_object_ids_as_hex() {
        let oid = ObjectId::parse_str(OID_A).unwrap();
        let json = document_to_response_json(doc! {
            "_id": oid,
            "name": "widget",
            "refs": [oid, "plain"]
        });
        assert_eq!(json["_id"], serde_json::json!(OID_A));
        assert_eq!(json["name"], serde_json::json!("widget"));
        assert_eq!(json["refs"][0], serde_json::json!(OID_A));
        assert_eq!(json["refs"][1], serde_json::json!("plain"));
    }
}
