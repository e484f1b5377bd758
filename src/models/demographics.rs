//! Age and gender lookup in loosely shaped classifier responses.
//!
//! Backends disagree on where they put demographic guesses (root level,
//! nested under a face record, camel or snake case). Lookup runs in two
//! passes: a fixed list of known field paths, then one breadth-first scan
//! limited to `MAX_SCAN_DEPTH` levels. The first match wins, so a shallow
//! field always beats a deeper one.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use serde_json::Value;

const MAX_SCAN_DEPTH: usize = 4;

const AGE_PATHS: &[&[&str]] = &[
    &["age"],
    &["Age"],
    &["age_guess"],
    &["ageGuess"],
    &["demographics", "age"],
];

const GENDER_PATHS: &[&[&str]] = &[
    &["gender"],
    &["dominant_gender"],
    &["Gender"],
    &["gender_guess"],
    &["genderGuess"],
    &["demographics", "gender"],
];

const AGE_KEYS: &[&str] = &["age", "Age", "age_guess", "ageGuess"];
const GENDER_KEYS: &[&str] = &[
    "gender",
    "dominant_gender",
    "Gender",
    "gender_guess",
    "genderGuess",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Demographics {
    pub age: Option<u32>,
    pub gender: Option<String>,
}

impl Demographics {
    pub fn is_empty(&self) -> bool {
        self.age.is_none() && self.gender.is_none()
    }
}

pub fn extract_demographics(response: &Value) -> Demographics {
    let mut age = AGE_PATHS
        .iter()
        .find_map(|path| lookup(response, path).and_then(parse_age));
    let mut gender = GENDER_PATHS
        .iter()
        .find_map(|path| lookup(response, path).and_then(parse_gender));

    if age.is_none() || gender.is_none() {
        let (scanned_age, scanned_gender) = scan(response);
        age = age.or(scanned_age);
        gender = gender.or(scanned_gender);
    }

    Demographics { age, gender }
}

fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(value, |current, key| current.as_object()?.get(*key))
}

fn scan(root: &Value) -> (Option<u32>, Option<String>) {
    let mut age = None;
    let mut gender = None;
    let mut queue = VecDeque::from([(root, 0usize)]);

    while let Some((value, depth)) = queue.pop_front() {
        if age.is_some() && gender.is_some() {
            break;
        }
        let children: Box<dyn Iterator<Item = &Value>> = match value {
            Value::Object(map) => {
                if age.is_none() {
                    age = AGE_KEYS
                        .iter()
                        .find_map(|key| map.get(*key).and_then(parse_age));
                }
                if gender.is_none() {
                    gender = GENDER_KEYS
                        .iter()
                        .find_map(|key| map.get(*key).and_then(parse_gender));
                }
                Box::new(map.values())
            }
            Value::Array(items) => Box::new(items.iter()),
            _ => continue,
        };

        if depth < MAX_SCAN_DEPTH {
            queue.extend(
                children
                    .filter(|child| child.is_object() || child.is_array())
                    .map(|child| (child, depth + 1)),
            );
        }
    }

    (age, gender)
}

fn parse_age(value: &Value) -> Option<u32> {
    let age = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !age.is_finite() || age < 0.0 {
        return None;
    }
    Some(age.round() as u32)
}

fn parse_gender(value: &Value) -> Option<String> {
    let text = value.as_str()?.trim();
    if text.is_empty() || text == "null" || text == "None" {
        return None;
    }
    let mut chars = text.chars();
    let first = chars.next()?;
    Some(first.to_uppercase().chain(chars).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn root_fields_win() {
        let response = json!({
            "emotion": "happy",
            "age": 31.6,
            "gender": "woman",
            "faces": [{ "age": 50, "gender": "man" }]
        });
        let demo = extract_demographics(&response);
        assert_eq!(demo.age, Some(32));
        assert_eq!(demo.gender.as_deref(), Some("Woman"));
    }

    #[test]
    fn numeric_string_age_is_accepted() {
        let demo = extract_demographics(&json!({ "age": "27" }));
        assert_eq!(demo.age, Some(27));
        assert_eq!(demo.gender, None);
    }

    #[test]
    fn placeholder_gender_is_ignored() {
        let demo = extract_demographics(&json!({ "gender": "None", "ageGuess": 40 }));
        assert_eq!(demo.gender, None);
        assert_eq!(demo.age, Some(40));
    }

    #[test]
    fn shallow_nested_match_beats_deeper_one() {
        let response = json!({
            "result": { "details": { "inner": { "Age": 70 } } },
            "face": { "age_guess": 25, "genderGuess": "male" }
        });
        let demo = extract_demographics(&response);
        assert_eq!(demo.age, Some(25));
        assert_eq!(demo.gender.as_deref(), Some("Male"));
    }

    #[test]
    fn scan_stops_at_depth_limit() {
        let response = json!({ "a": { "b": { "c": { "d": { "e": { "age": 33 } } } } } });
        assert!(extract_demographics(&response).is_empty());
    }

    #[test]
    fn arrays_are_scanned() {
        let response = json!({ "results": [{ "dominant_gender": "man", "age": 29 }] });
        let demo = extract_demographics(&response);
        assert_eq!(demo.age, Some(29));
        assert_eq!(demo.gender.as_deref(), Some("Man"));
    }
}
