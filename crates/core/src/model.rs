//! Classifier model names.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The classifiers the backend serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ModelName {
    #[default]
    #[serde(rename = "XGBoost")]
    XGBoost,
    #[serde(rename = "Random Forest")]
    RandomForest,
    #[serde(rename = "LightGBM")]
    LightGBM,
}

impl ModelName {
    pub const ALL: [ModelName; 3] = [ModelName::XGBoost, ModelName::RandomForest, ModelName::LightGBM];

    /// Name sent in the `model_name` form field.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelName::XGBoost => "XGBoost",
            ModelName::RandomForest => "Random Forest",
            ModelName::LightGBM => "LightGBM",
        }
    }

    /// Snake-case identifier, handy on command lines.
    pub fn ident(&self) -> &'static str {
        match self {
            ModelName::XGBoost => "xgboost",
            ModelName::RandomForest => "random_forest",
            ModelName::LightGBM => "lightgbm",
        }
    }
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ModelName::ALL
            .into_iter()
            .find(|m| m.as_str() == s || m.ident() == s)
            .ok_or_else(|| Error::InvalidModel(s.to_string()))
    }
}

/// Holds the currently selected model.
#[derive(Debug, Clone, Default)]
pub struct ModelSelection {
    current: ModelName,
}

impl ModelSelection {
    pub fn new(initial: ModelName) -> Self {
        Self { current: initial }
    }

    /// Select a model by name. Unknown names leave the selection unchanged.
    pub fn set(&mut self, name: &str) -> Result<ModelName> {
        self.current = name.parse()?;
        Ok(self.current)
    }

    pub fn get(&self) -> ModelName {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_xgboost() {
        assert_eq!(ModelSelection::default().get(), ModelName::XGBoost);
    }

    #[test]
    fn set_known_names() {
        let mut sel = ModelSelection::default();
        assert_eq!(sel.set("Random Forest").unwrap(), ModelName::RandomForest);
        assert_eq!(sel.set("lightgbm").unwrap(), ModelName::LightGBM);
        assert_eq!(sel.get().to_string(), "LightGBM");
    }

    #[test]
    fn unknown_name_is_rejected() {
        let mut sel = ModelSelection::new(ModelName::RandomForest);
        let err = sel.set("SVM").unwrap_err();
        assert_eq!(err, Error::InvalidModel("SVM".into()));
        assert_eq!(sel.get(), ModelName::RandomForest);
        assert!("random forest".parse::<ModelName>().is_err());
    }

    #[test]
    fn serde_uses_display_names() {
        let json = serde_json::to_string(&ModelName::RandomForest).unwrap();
        assert_eq!(json, "\"Random Forest\"");
    }
}
