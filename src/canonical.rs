use serde::Serialize;
use serde_json::{Map, Value};

/// Serialize a value into its canonical JSON byte form.
///
/// Object keys are emitted in lexicographic order at every nesting level, arrays keep their
/// order, and no incidental whitespace is produced. Two logically equal documents therefore
/// canonicalize to the same bytes regardless of how their maps were populated.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let value = serde_json::to_value(value)?;
    serde_json::to_vec(&sort_keys(value))
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(object) => {
            let mut entries: Vec<_> = object.into_iter().collect();
            entries.sort_by(|(left, _), (right, _)| left.cmp(right));
            let mut output = Map::new();
            for (key, value) in entries {
                output.insert(key, sort_keys(value));
            }
            Value::Object(output)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case::scalar(json!(42), b"42".as_slice())]
    #[case::flat_object(json!({"b": 1, "a": 2}), br#"{"a":2,"b":1}"#)]
    #[case::nested(json!({"z": {"y": 1, "x": 2}, "a": [3, 1]}), br#"{"a":[3,1],"z":{"x":2,"y":1}}"#)]
    fn canonical_forms(#[case] input: Value, #[case] expected: &[u8]) {
        let output = canonical_json(&input).expect("canonicalization failed");
        assert_eq!(output, expected);
    }

    #[test]
    fn insertion_order_is_irrelevant() {
        let mut forward = Map::new();
        forward.insert("alpha".into(), json!(1));
        forward.insert("beta".into(), json!(2));
        let mut backward = Map::new();
        backward.insert("beta".into(), json!(2));
        backward.insert("alpha".into(), json!(1));

        let forward = canonical_json(&Value::Object(forward)).expect("canonicalization failed");
        let backward = canonical_json(&Value::Object(backward)).expect("canonicalization failed");
        assert_eq!(forward, backward);
    }

    #[test]
    fn arrays_keep_their_order() {
        let output = canonical_json(&json!(["b", "a"])).expect("canonicalization failed");
        assert_eq!(output, br#"["b","a"]"#);
    }
}
