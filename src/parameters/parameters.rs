//! Parameters collection implementation
//!
//! This module provides the Parameters struct, a name-keyed collection of
//! Parameter objects. Iteration is always in name order so that the parameter
//! vector handed to the optimizer is the same from one run to the next.

use crate::parameters::parameter::{Parameter, ParameterError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A collection of fitted parameters
///
/// A name appears at most once; the same symbol in two places of a model
/// refers to one entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    /// Map of parameter names to Parameter objects
    params: BTreeMap<String, Parameter>,
}

impl Parameters {
    /// Create a new empty parameters collection
    ///
    /// # Examples
    ///
    /// ```
    /// use eqfit_rs::parameters::parameters::Parameters;
    ///
    /// let params = Parameters::new();
    /// assert_eq!(params.len(), 0);
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter to the collection
    ///
    /// Fails with [`ParameterError::DuplicateParameter`] if the name is taken.
    ///
    /// # Examples
    ///
    /// ```
    /// use eqfit_rs::parameters::parameters::Parameters;
    /// use eqfit_rs::parameters::parameter::Parameter;
    ///
    /// let mut params = Parameters::new();
    /// params.add(Parameter::new("a")).unwrap();
    /// assert!(params.add(Parameter::new("a")).is_err());
    /// assert_eq!(params.len(), 1);
    /// ```
    pub fn add(&mut self, param: Parameter) -> Result<(), ParameterError> {
        if self.params.contains_key(param.name()) {
            return Err(ParameterError::DuplicateParameter {
                name: param.name().to_string(),
            });
        }
        self.params.insert(param.name().to_string(), param);
        Ok(())
    }

    /// Add a new unbounded parameter
    pub fn add_param(&mut self, name: &str) -> Result<(), ParameterError> {
        self.add(Parameter::new(name))
    }

    /// Add a new parameter with bounds
    pub fn add_param_with_bounds(
        &mut self,
        name: &str,
        min: f64,
        max: f64,
    ) -> Result<(), ParameterError> {
        self.add(Parameter::with_bounds(name, min, max)?)
    }

    /// Return the entry for `name`, creating a default parameter on first use.
    pub fn get_or_insert(&mut self, name: &str) -> &mut Parameter {
        self.params
            .entry(name.to_string())
            .or_insert_with(|| Parameter::new(name))
    }

    /// Get a parameter by name
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.params.get(name)
    }

    /// Get a mutable reference to a parameter by name
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.params.get_mut(name)
    }

    /// Check if a parameter exists
    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    /// Number of parameters in the collection
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Check if the collection is empty
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Parameter names in sorted order
    pub fn names(&self) -> Vec<String> {
        self.params.keys().cloned().collect()
    }

    /// Iterate over (name, parameter) pairs in sorted order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Parameter)> {
        self.params.iter()
    }

    /// Current values keyed by name
    pub fn values(&self) -> BTreeMap<String, f64> {
        self.params
            .iter()
            .map(|(name, param)| (name.clone(), param.value()))
            .collect()
    }

    /// Parameters that are varied during optimization
    pub fn varying(&self) -> Vec<&Parameter> {
        self.params.values().filter(|p| p.vary()).collect()
    }

    /// Merge another collection into this one. Names already present are kept
    /// as they are, which is how a symbol shared by two branches stays one
    /// parameter.
    pub fn merge(&mut self, other: &Parameters) {
        for (name, param) in other.iter() {
            self.params
                .entry(name.clone())
                .or_insert_with(|| param.clone());
        }
    }

    /// Serialize the collection to a JSON string
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize a collection from a JSON string
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
