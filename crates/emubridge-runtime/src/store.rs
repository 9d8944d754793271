//! Variable store behind `GET`/`SET`.

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::error::RuntimeError;
use crate::value::{Family, Value, VarType};

#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    vars: IndexMap<SmolStr, Value>,
}

impl VariableStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Stores `value`, refusing to switch an existing name between scalar and list.
    pub fn insert(&mut self, name: &str, value: Value) -> Result<Option<Value>, RuntimeError> {
        if let Some(existing) = self.vars.get(name) {
            check_family(name, existing, value.family())?;
        }
        Ok(self.vars.insert(SmolStr::new(name), value))
    }

    /// `SET name <tag> <value>`
    pub fn declare(&mut self, name: &str, tag: &str, text: &str) -> Result<(), RuntimeError> {
        let ty = VarType::parse(tag)
            .ok_or_else(|| RuntimeError::TypeMismatch(format!("unknown type tag '{tag}'").into()))?;
        if let Some(existing) = self.vars.get(name) {
            check_family(name, existing, ty.family())?;
        }
        let value = Value::parse(ty, text)?;
        self.vars.insert(SmolStr::new(name), value);
        Ok(())
    }

    /// `SET name <idx> <value>`
    pub fn set_element(
        &mut self,
        name: &str,
        index: usize,
        text: &str,
    ) -> Result<(), RuntimeError> {
        let value = self.vars.get_mut(name).ok_or_else(|| {
            RuntimeError::TypeMismatch(
                format!("'{name}' must be declared as a list before element {index} is set")
                    .into(),
            )
        })?;
        value.set_element(name, index, text)
    }

    /// Wire rendering for `GET name[ idx]`. Misses surface as `UnknownVariable`.
    pub fn render(&self, name: &str, index: Option<usize>) -> Result<String, RuntimeError> {
        let value = self
            .vars
            .get(name)
            .ok_or_else(|| RuntimeError::UnknownVariable(SmolStr::new(name)))?;
        match index {
            None => Ok(value.render()),
            Some(index) => value
                .render_element(index)
                .ok_or_else(|| RuntimeError::UnknownVariable(format!("{name}[{index}]").into())),
        }
    }

    pub fn clear(&mut self) {
        self.vars.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.vars.iter().map(|(name, value)| (name.as_str(), value))
    }

    #[must_use]
    pub fn int(&self, name: &str) -> Option<i64> {
        match self.vars.get(name)? {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn bool(&self, name: &str) -> Option<bool> {
        match self.vars.get(name)? {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn string(&self, name: &str) -> Option<&str> {
        match self.vars.get(name)? {
            Value::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn int_list(&self, name: &str) -> Option<&[i64]> {
        match self.vars.get(name)? {
            Value::IntList(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    #[must_use]
    pub fn bool_list(&self, name: &str) -> Option<&[bool]> {
        match self.vars.get(name)? {
            Value::BoolList(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    #[must_use]
    pub fn string_list(&self, name: &str) -> Option<&[String]> {
        match self.vars.get(name)? {
            Value::StringList(items) => Some(items.as_slice()),
            _ => None,
        }
    }
}

fn check_family(name: &str, existing: &Value, requested: Family) -> Result<(), RuntimeError> {
    if existing.family() == requested {
        return Ok(());
    }
    Err(RuntimeError::TypeMismatch(
        format!(
            "'{name}' is declared as a {} ({}), cannot redeclare as a {requested}",
            existing.family(),
            existing.var_type()
        )
        .into(),
    ))
}
