//! ---
//! tb_section: "02-data-model-gateway"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Domain types shared across the dashboard runtime."
//! tb_version: "v0.1.0"
//! tb_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};

use crate::run::McbType;

/// Editable test parameters supplied by the operator before a run may start.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    pub mcb_type: McbType,
    pub voltage: f64,
    pub fault_current_ka: f64,
    pub power_factor: f64,
    pub rating_amps: u32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            mcb_type: McbType::B,
            voltage: 230.0,
            fault_current_ka: 6.0,
            power_factor: 0.95,
            rating_amps: 63,
        }
    }
}

/// Configuration field names used in validation reports.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConfigField {
    McbType,
    Voltage,
    FaultCurrent,
    PowerFactor,
    Rating,
}

impl ConfigField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigField::McbType => "mcb_type",
            ConfigField::Voltage => "voltage",
            ConfigField::FaultCurrent => "fault_current_ka",
            ConfigField::PowerFactor => "power_factor",
            ConfigField::Rating => "rating_amps",
        }
    }
}

/// One violated field together with an operator-facing message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: ConfigField,
    pub message: String,
}

/// All violated fields of a [`RunConfig`], reported together rather than
/// first-failure-wins.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize, PartialEq, Eq)]
#[error("invalid run configuration: {}", summary(.errors))]
pub struct ConfigValidationError {
    pub errors: Vec<FieldError>,
}

impl ConfigValidationError {
    pub fn field(&self, field: ConfigField) -> Option<&FieldError> {
        self.errors.iter().find(|err| err.field == field)
    }
}

fn summary(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|err| format!("{}: {}", err.field.as_str(), err.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl RunConfig {
    /// Validate every field and collect all violations. The MCB type is a
    /// closed enum and cannot be empty by construction.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let mut errors = Vec::new();
        if !self.voltage.is_finite() || self.voltage <= 0.0 {
            errors.push(FieldError {
                field: ConfigField::Voltage,
                message: "voltage must be a positive number".to_owned(),
            });
        }
        if !self.fault_current_ka.is_finite() || self.fault_current_ka <= 0.0 {
            errors.push(FieldError {
                field: ConfigField::FaultCurrent,
                message: "fault current must be a positive number".to_owned(),
            });
        }
        if !self.power_factor.is_finite() || !(0.0..=1.0).contains(&self.power_factor) {
            errors.push(FieldError {
                field: ConfigField::PowerFactor,
                message: "power factor must be within [0, 1]".to_owned(),
            });
        }
        if self.rating_amps == 0 {
            errors.push(FieldError {
                field: ConfigField::Rating,
                message: "rating must be a positive integer".to_owned(),
            });
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigValidationError { errors })
        }
    }
}
