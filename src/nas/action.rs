//! Parsed controller action values

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{KolosalError, Result};

/// One parsed action value handed to a model function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl ActionValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ActionValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            ActionValue::Int(v) => Some(*v as f64),
            ActionValue::Float(v) => Some(*v),
            ActionValue::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ActionValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl FromStr for ActionValue {
    type Err = KolosalError;

    /// Integer first, then float, otherwise the trimmed text
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(v) = s.parse::<i64>() {
            return Ok(ActionValue::Int(v));
        }
        if let Ok(v) = s.parse::<f64>() {
            return Ok(ActionValue::Float(v));
        }
        Ok(ActionValue::Text(s.to_string()))
    }
}

impl fmt::Display for ActionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionValue::Int(v) => write!(f, "{}", v),
            ActionValue::Float(v) => write!(f, "{}", v),
            ActionValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ActionValue {
    fn from(v: i64) -> Self {
        ActionValue::Int(v)
    }
}

impl From<f64> for ActionValue {
    fn from(v: f64) -> Self {
        ActionValue::Float(v)
    }
}

impl From<&str> for ActionValue {
    fn from(v: &str) -> Self {
        ActionValue::Text(v.to_string())
    }
}

/// Parse a comma-separated action list such as `"32,relu,16,tanh"`.
///
/// A blank string is the empty action list; an empty token anywhere else
/// is rejected so a missing value cannot shift the pairs that follow it.
pub fn parse_actions(s: &str) -> Result<Vec<ActionValue>> {
    if s.trim().is_empty() {
        return Ok(Vec::new());
    }

    s.split(',')
        .enumerate()
        .map(|(i, token)| {
            let token = token.trim();
            if token.is_empty() {
                return Err(KolosalError::invalid_param(
                    "actions",
                    s,
                    format!("token {} is empty", i + 1),
                ));
            }
            token.parse::<ActionValue>()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_precedence() {
        assert_eq!("32".parse::<ActionValue>().unwrap(), ActionValue::Int(32));
        assert_eq!("0.5".parse::<ActionValue>().unwrap(), ActionValue::Float(0.5));
        assert_eq!(" relu ".parse::<ActionValue>().unwrap(), ActionValue::Text("relu".into()));
    }

    #[test]
    fn test_parse_actions_list() {
        let actions = parse_actions("32, relu,16,tanh").unwrap();
        assert_eq!(actions.len(), 4);
        assert_eq!(actions[0].as_int(), Some(32));
        assert_eq!(actions[3].as_str(), Some("tanh"));
    }

    #[test]
    fn test_display() {
        let actions = parse_actions("3,0.25,sigmoid").unwrap();
        let rendered: Vec<String> = actions.iter().map(|a| a.to_string()).collect();
        assert_eq!(rendered, vec!["3", "0.25", "sigmoid"]);
    }

    #[test]
    fn test_blank_list_is_empty() {
        assert!(parse_actions("").unwrap().is_empty());
        assert!(parse_actions("  ").unwrap().is_empty());
    }

    #[test]
    fn test_empty_token_rejected() {
        for input in ["32,,relu", "32,relu,", ",32,relu"] {
            let result = parse_actions(input);
            assert!(
                matches!(result, Err(KolosalError::InvalidParameter { .. })),
                "{} should be rejected",
                input
            );
        }
    }
}
