//! Session environment.

use indexmap::IndexMap;

use banter_artifact::{EnvironmentSpec, Value, ValueType};

use crate::error::{Error, Result};

/// Typed variable store for one session.
///
/// Declarations come from the artifact; values start from the declared
/// defaults. Reading a declared-but-unset variable and writing an
/// undeclared name are both faults, so a session never accumulates
/// variables the scripts were not checked against.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    declared: IndexMap<String, ValueType>,
    values: IndexMap<String, Value>,
}

impl Environment {
    pub fn from_spec(spec: &EnvironmentSpec) -> Self {
        let mut env = Self::default();
        for var in &spec.variables {
            env.declared.insert(var.name.clone(), var.ty);
            if let Some(default) = &var.default {
                env.values.insert(var.name.clone(), default.clone());
            }
        }
        env
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.declared.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Result<&Value> {
        self.values
            .get(name)
            .ok_or_else(|| Error::UndefinedVariable(name.to_string()))
    }

    /// Type-checked write. Integers promote to float when the variable
    /// is declared float.
    pub fn set(&mut self, name: &str, value: Value) -> Result<()> {
        let declared = self
            .declared
            .get(name)
            .copied()
            .ok_or_else(|| Error::UndefinedVariable(name.to_string()))?;
        let value = match (declared, value) {
            (ValueType::Float, Value::Int(n)) => Value::Float(n as f64),
            (_, value) => value,
        };
        if value.value_type() != declared {
            return Err(Error::TypeMismatch {
                name: name.to_string(),
                expected: declared,
                got: value.value_type(),
            });
        }
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Parse `raw` according to the declared type, then set. For hosts
    /// taking values from strings (flags, environment files).
    pub fn set_from_str(&mut self, name: &str, raw: &str) -> Result<()> {
        let declared = self
            .declared
            .get(name)
            .copied()
            .ok_or_else(|| Error::UndefinedVariable(name.to_string()))?;
        let bad = || Error::BadValue {
            name: name.to_string(),
            expected: declared,
            raw: raw.to_string(),
        };
        let value = match declared {
            ValueType::Bool => match raw {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => return Err(bad()),
            },
            ValueType::Int => raw.parse().map(Value::Int).map_err(|_| bad())?,
            ValueType::Float => raw.parse().map(Value::Float).map_err(|_| bad())?,
            ValueType::String => Value::String(raw.to_string()),
        };
        self.set(name, value)
    }

    /// Currently set variables, declaration order first.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Serialize the set values as a JSON object.
    pub fn to_json(&self) -> Result<String> {
        let mut raw = serde_json::to_string_pretty(&self.values)?;
        raw.push('\n');
        Ok(raw)
    }

    /// Apply values from a JSON object produced by [`to_json`] (or a
    /// host). Every entry is type-checked like a [`set`].
    ///
    /// [`to_json`]: Environment::to_json
    /// [`set`]: Environment::set
    pub fn load_json(&mut self, raw: &str) -> Result<()> {
        let values: IndexMap<String, Value> = serde_json::from_str(raw)?;
        for (name, value) in values {
            self.set(&name, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use banter_artifact::VariableSpec;

    fn spec() -> EnvironmentSpec {
        EnvironmentSpec {
            variables: vec![
                VariableSpec {
                    name: "coins".into(),
                    ty: ValueType::Int,
                    default: Some(Value::Int(5)),
                },
                VariableSpec {
                    name: "health".into(),
                    ty: ValueType::Float,
                    default: Some(Value::Float(10.0)),
                },
                VariableSpec {
                    name: "player".into(),
                    ty: ValueType::String,
                    default: None,
                },
                VariableSpec {
                    name: "happy".into(),
                    ty: ValueType::Bool,
                    default: Some(Value::Bool(false)),
                },
            ],
            markup: vec![],
        }
    }

    #[test]
    fn defaults_seed_the_store() {
        let env = Environment::from_spec(&spec());
        assert_eq!(env.get("coins").unwrap(), &Value::Int(5));
        assert_eq!(env.get("happy").unwrap(), &Value::Bool(false));
        assert!(env.is_declared("player"));
        assert!(matches!(
            env.get("player"),
            Err(Error::UndefinedVariable(name)) if name == "player"
        ));
    }

    #[test]
    fn set_checks_the_declared_type() {
        let mut env = Environment::from_spec(&spec());
        env.set("coins", Value::Int(9)).unwrap();
        assert_eq!(env.get("coins").unwrap(), &Value::Int(9));

        let err = env.set("coins", Value::Bool(true)).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));

        let err = env.set("nope", Value::Int(1)).unwrap_err();
        assert!(matches!(err, Error::UndefinedVariable(_)));
    }

    #[test]
    fn int_promotes_to_declared_float() {
        let mut env = Environment::from_spec(&spec());
        env.set("health", Value::Int(3)).unwrap();
        assert_eq!(env.get("health").unwrap(), &Value::Float(3.0));
    }

    #[test]
    fn set_from_str_parses_by_declared_type() {
        let mut env = Environment::from_spec(&spec());
        env.set_from_str("coins", "12").unwrap();
        env.set_from_str("health", "2.5").unwrap();
        env.set_from_str("happy", "true").unwrap();
        env.set_from_str("player", "Sam").unwrap();

        assert_eq!(env.get("coins").unwrap(), &Value::Int(12));
        assert_eq!(env.get("health").unwrap(), &Value::Float(2.5));
        assert_eq!(env.get("happy").unwrap(), &Value::Bool(true));
        assert_eq!(env.get("player").unwrap(), &Value::String("Sam".into()));

        let err = env.set_from_str("coins", "lots").unwrap_err();
        assert!(matches!(err, Error::BadValue { .. }));
        let err = env.set_from_str("happy", "yes").unwrap_err();
        assert!(matches!(err, Error::BadValue { .. }));
    }

    #[test]
    fn json_round_trip_is_type_checked() {
        let mut env = Environment::from_spec(&spec());
        env.set("player", Value::String("Sam".into())).unwrap();
        let raw = env.to_json().unwrap();

        let mut fresh = Environment::from_spec(&spec());
        fresh.load_json(&raw).unwrap();
        assert_eq!(fresh.get("player").unwrap(), &Value::String("Sam".into()));
        assert_eq!(fresh.get("coins").unwrap(), &Value::Int(5));

        let err = fresh.load_json(r#"{"coins": "many"}"#).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
        let err = fresh.load_json(r#"{"stranger": 1}"#).unwrap_err();
        assert!(matches!(err, Error::UndefinedVariable(_)));
    }
}
