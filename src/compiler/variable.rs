// Mon Feb 16 2026 - Alex

use serde::{Deserialize, Serialize};

/// Value of an external variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Variable {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl From<bool> for Variable {
    fn from(value: bool) -> Self {
        Variable::Boolean(value)
    }
}

impl From<i64> for Variable {
    fn from(value: i64) -> Self {
        Variable::Integer(value)
    }
}

impl From<i32> for Variable {
    fn from(value: i32) -> Self {
        Variable::Integer(value as i64)
    }
}

impl From<u32> for Variable {
    fn from(value: u32) -> Self {
        Variable::Integer(value as i64)
    }
}

impl From<f64> for Variable {
    fn from(value: f64) -> Self {
        Variable::Float(value)
    }
}

impl From<&str> for Variable {
    fn from(value: &str) -> Self {
        Variable::String(value.to_string())
    }
}

impl From<String> for Variable {
    fn from(value: String) -> Self {
        Variable::String(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        assert_eq!(Variable::from(true), Variable::Boolean(true));
        assert_eq!(Variable::from(7i32), Variable::Integer(7));
        assert_eq!(Variable::from(1.5), Variable::Float(1.5));
        assert_eq!(Variable::from("x"), Variable::String("x".to_string()));
    }

    #[test]
    fn test_untagged_json() {
        let vars: Vec<Variable> = serde_json::from_str(r#"[true, 3, 2.5, "s"]"#).unwrap();
        assert_eq!(
            vars,
            vec![Variable::Boolean(true), Variable::Integer(3), Variable::Float(2.5), Variable::String("s".to_string())]
        );
    }
}
