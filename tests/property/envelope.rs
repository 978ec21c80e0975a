//! Property tests for list body decoding.
//!
//! 1. A bare array and the same array under `$values` decode to the same
//!    records in the same order.
//! 2. Arbitrary JSON never panics the decoder.

#![allow(clippy::unwrap_used)]

use proptest::prelude::*;
use serde_json::{Value, json};
use workpulse_proto::codec::{decode_list, unwrap_list};

/// Strategy for small arbitrary JSON values.
fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[a-z$]{0,8}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z$]{1,7}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

proptest! {
    #[test]
    fn bare_and_enveloped_lists_agree(ids in prop::collection::vec(any::<i64>(), 0..32)) {
        let bare = json!(ids);
        let enveloped = json!({ "$id": "1", "$values": ids });

        let from_bare: Vec<i64> = decode_list(bare).unwrap();
        let from_envelope: Vec<i64> = decode_list(enveloped).unwrap();

        prop_assert_eq!(&from_bare, &ids);
        prop_assert_eq!(from_bare, from_envelope);
    }

    #[test]
    fn arbitrary_json_never_panics(body in arb_json()) {
        let _ = unwrap_list(body);
    }
}
