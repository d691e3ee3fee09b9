//! Named scalar parameters of a component.

use crate::error::{ComponentError, ComponentResult};

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub description: String,
    pub unit: String,
    pub value: f64,
}

/// Ordered set of parameters, looked up by name.
///
/// Components declare their parameters with defaults when constructed and
/// read the current values in `initialize`.
#[derive(Debug, Clone, Default)]
pub struct ParameterSet {
    params: Vec<Parameter>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a parameter with its default value.
    pub fn add(
        &mut self,
        name: &str,
        description: &str,
        unit: &str,
        default: f64,
    ) -> ComponentResult<()> {
        if self.get(name).is_some() {
            return Err(ComponentError::DuplicateParameter {
                name: name.to_string(),
            });
        }
        check_finite(name, default)?;
        self.params.push(Parameter {
            name: name.to_string(),
            description: description.to_string(),
            unit: unit.to_string(),
            value: default,
        });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn value(&self, name: &str) -> ComponentResult<f64> {
        self.get(name)
            .map(|p| p.value)
            .ok_or_else(|| ComponentError::UnknownParameter {
                name: name.to_string(),
            })
    }

    /// Value of a parameter that must be strictly positive.
    pub fn positive(&self, name: &str) -> ComponentResult<f64> {
        let v = self.value(name)?;
        if v > 0.0 {
            Ok(v)
        } else {
            Err(ComponentError::InvalidParameter {
                name: name.to_string(),
                what: "must be positive",
            })
        }
    }

    pub fn set(&mut self, name: &str, value: f64) -> ComponentResult<()> {
        check_finite(name, value)?;
        let param = self
            .params
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| ComponentError::UnknownParameter {
                name: name.to_string(),
            })?;
        param.value = value;
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

fn check_finite(name: &str, value: f64) -> ComponentResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ComponentError::NonFinite {
            name: name.to_string(),
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_read_back() {
        let mut ps = ParameterSet::new();
        ps.add("V", "Volume", "m^3", 1e-3).unwrap();
        ps.set("V", 2e-3).unwrap();
        assert_eq!(ps.value("V").unwrap(), 2e-3);
        assert_eq!(ps.len(), 1);
    }

    #[test]
    fn unknown_and_non_finite_are_rejected() {
        let mut ps = ParameterSet::new();
        ps.add("Kc", "Flow coefficient", "m^5/Ns", 1e-11).unwrap();
        assert!(matches!(
            ps.set("Kx", 1.0),
            Err(ComponentError::UnknownParameter { .. })
        ));
        assert!(matches!(
            ps.set("Kc", f64::NAN),
            Err(ComponentError::NonFinite { .. })
        ));
        assert_eq!(ps.value("Kc").unwrap(), 1e-11, "failed set must not mutate");
        assert!(matches!(
            ps.add("Kc", "", "", 0.0),
            Err(ComponentError::DuplicateParameter { .. })
        ));
    }

    #[test]
    fn positive_guard() {
        let mut ps = ParameterSet::new();
        ps.add("V", "Volume", "m^3", 0.0).unwrap();
        assert!(matches!(
            ps.positive("V"),
            Err(ComponentError::InvalidParameter { .. })
        ));
    }
}
