use openerp_core::ServiceError;
use openerp_store::require_field;
use serde::{Deserialize, Serialize};

use super::{default_true, trim_opt};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MaterialStatus {
    #[default]
    Active,
    Inactive,
    Obsolete,
}

/// A part or raw material. Codes come from the `PART_PS` series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    #[serde(default)]
    pub code: String,

    #[serde(default)]
    pub name: String,

    /// Free-text specification, e.g. "M6 x 20, stainless".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<String>,

    /// MaterialCategory.code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_code: Option<String>,

    /// Unit.code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_code: Option<String>,

    /// Brand.code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_code: Option<String>,

    /// Supplier.code of the preferred supplier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier_code: Option<String>,

    #[serde(default)]
    pub status: MaterialStatus,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl Material {
    pub(crate) fn normalize(&mut self) {
        self.code = self.code.trim().to_string();
        self.name = self.name.trim().to_string();
        for field in [
            &mut self.spec,
            &mut self.category_code,
            &mut self.unit_code,
            &mut self.brand_code,
            &mut self.supplier_code,
            &mut self.description,
        ] {
            trim_opt(field);
        }
        self.tags = self
            .tags
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        self.tags.dedup();
    }

    pub(crate) fn check(&self) -> Result<(), ServiceError> {
        require_field("name", &self.name)
    }
}

/// Material category. Categories form a tree through `parentCode`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialCategory {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl MaterialCategory {
    pub(crate) fn normalize(&mut self) {
        self.code = self.code.trim().to_string();
        self.name = self.name.trim().to_string();
        trim_opt(&mut self.parent_code);
        trim_opt(&mut self.description);
    }

    pub(crate) fn check(&self) -> Result<(), ServiceError> {
        require_field("name", &self.name)?;
        if self.parent_code.as_deref() == Some(self.code.as_str()) {
            return Err(ServiceError::Validation(format!(
                "category '{}' cannot be its own parent",
                self.code
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_camel_case() {
        let m = Material {
            name: "Bolt".into(),
            status: MaterialStatus::Obsolete,
            ..Default::default()
        };
        let v = serde_json::to_value(&m).unwrap();
        assert_eq!(v["status"], "obsolete");
        assert!(v.get("spec").is_none());
    }

    #[test]
    fn normalize_trims_and_drops_blank_tags() {
        let mut m = Material {
            name: " Bolt ".into(),
            unit_code: Some(" ".into()),
            tags: vec!["a".into(), " ".into(), " a ".into()],
            ..Default::default()
        };
        m.normalize();
        assert_eq!(m.name, "Bolt");
        assert_eq!(m.unit_code, None);
        assert_eq!(m.tags, vec!["a".to_string()]);
    }

    #[test]
    fn category_cannot_parent_itself() {
        let c = MaterialCategory {
            code: "FAST".into(),
            name: "Fasteners".into(),
            parent_code: Some("FAST".into()),
            ..Default::default()
        };
        assert!(c.check().is_err());
    }
}
