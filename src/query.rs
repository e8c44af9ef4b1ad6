//! Incoming query shapes and their validation.
//!
//! Both queries live for a single request. Fields default when absent or
//! null so that a missing value and a blank one are reported the same way.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Oldest patient age accepted.
pub const MAX_AGE: u32 = 130;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("missing drug name(s): {0}")]
    MissingDrugNames(String),

    #[error("medications must contain at least one drug")]
    NoMedications,

    #[error("medication at index {0} is blank")]
    BlankMedication(usize),

    #[error("age {0} is out of range (0-130)")]
    AgeOutOfRange(u32),
}

/// Two-drug interaction query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimpleInteractionQuery {
    #[serde(default, deserialize_with = "null_as_default")]
    pub drug1: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub drug2: String,
}

impl SimpleInteractionQuery {
    pub fn new(drug1: impl Into<String>, drug2: impl Into<String>) -> Self {
        Self {
            drug1: drug1.into(),
            drug2: drug2.into(),
        }
    }

    /// Trim both names, rejecting blanks.
    pub fn validate(self) -> Result<Self, QueryError> {
        let drug1 = self.drug1.trim().to_string();
        let drug2 = self.drug2.trim().to_string();

        let missing: Vec<&str> = [("drug1", &drug1), ("drug2", &drug2)]
            .into_iter()
            .filter(|(_, v)| v.is_empty())
            .map(|(name, _)| name)
            .collect();
        if !missing.is_empty() {
            return Err(QueryError::MissingDrugNames(missing.join(", ")));
        }

        Ok(Self { drug1, drug2 })
    }
}

/// Multi-drug patient case.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplexCaseQuery {
    #[serde(default)]
    pub medications: Vec<String>,
    pub age: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub conditions: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub lab_values: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub additional_context: String,
}

/// Treat an explicit `null` like an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl ComplexCaseQuery {
    /// Trim every field, drop blank conditions and lab entries, and check the
    /// medication list and age.
    pub fn validate(self) -> Result<Self, QueryError> {
        if self.medications.is_empty() {
            return Err(QueryError::NoMedications);
        }

        let mut medications = Vec::with_capacity(self.medications.len());
        for (i, med) in self.medications.iter().enumerate() {
            let med = med.trim();
            if med.is_empty() {
                return Err(QueryError::BlankMedication(i));
            }
            medications.push(med.to_string());
        }

        if self.age > MAX_AGE {
            return Err(QueryError::AgeOutOfRange(self.age));
        }

        let conditions = self
            .conditions
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();

        let lab_values = self
            .lab_values
            .into_iter()
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .filter(|(k, v)| !k.is_empty() && !v.is_empty())
            .collect();

        Ok(Self {
            medications,
            age: self.age,
            conditions,
            lab_values,
            additional_context: self.additional_context.trim().to_string(),
        })
    }
}
