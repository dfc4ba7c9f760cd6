//! Path-based value extraction from JSON
//!
//! HTTP-template directives may carry a `$.foo.bar` expression that selects
//! the value to hand back from a fetched response body. Paths support dotted
//! member access, `[n]` index access, and array flattening: applying a member
//! to an array extracts it from every item (single results are unwrapped).

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Member(String),
    Index(usize),
}

fn parse_segments(path: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let trimmed = path.strip_prefix('$').unwrap_or(path);

    for piece in trimmed.split('.').filter(|p| !p.is_empty()) {
        let mut rest = piece;
        // A piece may carry trailing index brackets: "items[0][1]"
        while let Some(open) = rest.find('[') {
            let (member, brackets) = rest.split_at(open);
            if !member.is_empty() {
                segments.push(Segment::Member(member.to_string()));
            }
            match brackets[1..].split_once(']') {
                Some((index, tail)) => {
                    if let Ok(n) = index.parse::<usize>() {
                        segments.push(Segment::Index(n));
                    }
                    rest = tail;
                }
                None => {
                    rest = "";
                }
            }
        }
        if !rest.is_empty() {
            segments.push(Segment::Member(rest.to_string()));
        }
    }

    segments
}

/// Extract a value using a path expression, e.g. `$.foo.bar` or
/// `$.items[0].name`. Returns `Value::Null` when the path selects nothing.
pub fn extract(json: &Value, path: &str) -> Value {
    let segments = parse_segments(path);
    if segments.is_empty() {
        return json.clone();
    }
    extract_segments(json, &segments)
}

fn extract_segments(json: &Value, segments: &[Segment]) -> Value {
    let Some(segment) = segments.first() else {
        return json.clone();
    };
    let remaining = &segments[1..];

    match (segment, json) {
        (Segment::Member(name), Value::Object(map)) => match map.get(name) {
            Some(value) => extract_segments(value, remaining),
            None => Value::Null,
        },
        (Segment::Index(n), Value::Array(arr)) => match arr.get(*n) {
            Some(value) => extract_segments(value, remaining),
            None => Value::Null,
        },
        // Member applied to an array extracts from each item.
        (Segment::Member(_), Value::Array(arr)) => {
            let results: Vec<Value> = arr
                .iter()
                .map(|item| extract_segments(item, segments))
                .filter(|v| !v.is_null())
                .collect();
            if results.is_empty() {
                Value::Null
            } else if results.len() == 1 {
                results.into_iter().next().unwrap_or(Value::Null)
            } else {
                Value::Array(results)
            }
        }
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_nested_member() {
        let body = json!({"foo": {"bar": 50}});
        assert_eq!(extract(&body, "$.foo.bar"), json!(50));
    }

    #[test]
    fn missing_member_is_null() {
        let body = json!({"foo": {"bar": 50}});
        assert_eq!(extract(&body, "$.foo.baz"), Value::Null);
        assert_eq!(extract(&body, "$.nope"), Value::Null);
    }

    #[test]
    fn empty_path_returns_whole_document() {
        let body = json!({"foo": 1});
        assert_eq!(extract(&body, "$"), body);
        assert_eq!(extract(&body, ""), body);
    }

    #[test]
    fn index_access() {
        let body = json!({"items": [{"id": "a"}, {"id": "b"}]});
        assert_eq!(extract(&body, "$.items[1].id"), json!("b"));
        assert_eq!(extract(&body, "$.items[5]"), Value::Null);
    }

    #[test]
    fn member_over_array_flattens() {
        let body = json!({"items": [{"id": "a"}, {"id": "b"}]});
        assert_eq!(extract(&body, "$.items.id"), json!(["a", "b"]));
    }

    #[test]
    fn single_array_result_is_unwrapped() {
        let body = json!({"items": [{"id": "a"}, {"other": 1}]});
        assert_eq!(extract(&body, "$.items.id"), json!("a"));
    }

    #[test]
    fn path_without_dollar_prefix() {
        let body = json!({"foo": {"bar": true}});
        assert_eq!(extract(&body, "foo.bar"), json!(true));
    }
}
