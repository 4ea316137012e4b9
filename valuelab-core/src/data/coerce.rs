//! Numeric coercion for loosely-typed upstream JSON.

use serde_json::Value;

/// Outcome of reading one numeric field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coerced {
    Number(f64),
    /// Absent or `null`.
    Missing,
    /// Present but not usable as a finite number.
    Invalid,
}

/// Read a JSON value as a finite number. Numeric strings are accepted.
pub fn coerce(value: Option<&Value>) -> Coerced {
    match value {
        None | Some(Value::Null) => Coerced::Missing,
        Some(Value::Number(n)) => match n.as_f64() {
            Some(x) if x.is_finite() => Coerced::Number(x),
            _ => Coerced::Invalid,
        },
        Some(Value::String(s)) => match s.trim().parse::<f64>() {
            Ok(x) if x.is_finite() => Coerced::Number(x),
            _ => Coerced::Invalid,
        },
        Some(_) => Coerced::Invalid,
    }
}

/// Walk nested object keys, returning `None` at the first missing hop.
pub fn lookup<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(root, |node, key| node.get(key))
}

/// Non-negative number, or 0 with `field` recorded as defaulted.
pub fn number_or_zero(
    value: Option<&Value>,
    field: &'static str,
    defaulted: &mut Vec<&'static str>,
) -> f64 {
    match coerce(value) {
        Coerced::Number(x) if x >= 0.0 => x,
        _ => {
            defaulted.push(field);
            0.0
        }
    }
}

/// Non-negative number, or `None` (unknown) with `field` recorded as defaulted.
pub fn optional_number(
    value: Option<&Value>,
    field: &'static str,
    defaulted: &mut Vec<&'static str>,
) -> Option<f64> {
    match coerce(value) {
        Coerced::Number(x) if x >= 0.0 => Some(x),
        _ => {
            defaulted.push(field);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coerces_numbers_and_numeric_strings() {
        assert_eq!(coerce(Some(&json!(12.5))), Coerced::Number(12.5));
        assert_eq!(coerce(Some(&json!(7))), Coerced::Number(7.0));
        assert_eq!(coerce(Some(&json!(" 3.25 "))), Coerced::Number(3.25));
    }

    #[test]
    fn missing_and_null_are_distinct_from_invalid() {
        assert_eq!(coerce(None), Coerced::Missing);
        assert_eq!(coerce(Some(&Value::Null)), Coerced::Missing);
        assert_eq!(coerce(Some(&json!("n/a"))), Coerced::Invalid);
        assert_eq!(coerce(Some(&json!({"usd": 1}))), Coerced::Invalid);
        assert_eq!(coerce(Some(&json!(true))), Coerced::Invalid);
        assert_eq!(coerce(Some(&json!("NaN"))), Coerced::Invalid);
    }

    #[test]
    fn lookup_walks_nested_keys() {
        let v = json!({"a": {"b": {"c": 4}}});
        assert_eq!(lookup(&v, &["a", "b", "c"]), Some(&json!(4)));
        assert_eq!(lookup(&v, &["a", "x", "c"]), None);
        assert_eq!(lookup(&json!([1, 2]), &["a"]), None);
    }

    #[test]
    fn defaults_are_recorded() {
        let mut defaulted = Vec::new();
        assert_eq!(number_or_zero(None, "price", &mut defaulted), 0.0);
        assert_eq!(number_or_zero(Some(&json!(-1.0)), "fdv", &mut defaulted), 0.0);
        assert_eq!(number_or_zero(Some(&json!(2.0)), "ok", &mut defaulted), 2.0);
        assert_eq!(optional_number(Some(&json!("x")), "max_supply", &mut defaulted), None);
        assert_eq!(defaulted, vec!["price", "fdv", "max_supply"]);
    }
}
