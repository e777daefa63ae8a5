//! Serializable configuration: guard options and class declarations.
//!
//! Class declarations let shielded classes be registered from JSON, with
//! attribute rules written as type expressions:
//!
//! ```json
//! { "options": { "check_return": true },
//!   "classes": [ { "name": "Cat", "fields": { "name": "str", "age": "int" } } ] }
//! ```
use crate::rules::{ExprError, TypeExpr};
use crate::shield::AccessPolicy;
use crate::type_system::{ClassSpec, RegistryError, TypeRef, TypeRegistry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Cannot read configuration file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Class '{class}', field '{field}': {source}")]
    Field {
        class: String,
        field: String,
        #[source]
        source: ExprError,
    },
    #[error("Class '{0}' declares field rules but is not shielded")]
    UnshieldedFields(String),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Per-guard behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardOptions {
    /// Validate return values against the return annotation, if there is one.
    pub check_return: bool,
}

impl Default for GuardOptions {
    fn default() -> Self {
        Self { check_return: true }
    }
}

fn default_shielded() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassDecl {
    pub name: String,
    #[serde(default)]
    pub bases: Vec<String>,
    /// Attribute write rules; only meaningful for shielded classes.
    #[serde(default)]
    pub fields: BTreeMap<String, TypeExpr>,
    #[serde(default = "default_shielded")]
    pub shielded: bool,
}

impl ClassDecl {
    /// Resolves field expressions against `registry` and builds the class spec.
    /// Field rules keep the expression's meaning as written: a bare `int`
    /// accepts subtypes, unlike a parameter annotation.
    pub fn to_spec(&self, registry: &TypeRegistry) -> Result<ClassSpec, ConfigError> {
        let mut spec = ClassSpec::new(self.name.clone());
        for base in &self.bases {
            spec = spec.base(base.clone());
        }
        if !self.shielded {
            if !self.fields.is_empty() {
                return Err(ConfigError::UnshieldedFields(self.name.clone()));
            }
            return Ok(spec);
        }
        let mut policy = AccessPolicy::new();
        for (field, expr) in &self.fields {
            let rule = expr.resolve(registry).map_err(|source| ConfigError::Field {
                class: self.name.clone(),
                field: field.clone(),
                source,
            })?;
            policy = policy.field_described(field.clone(), expr.to_string(), rule);
        }
        Ok(spec.shielded(policy))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    pub options: GuardOptions,
    pub classes: Vec<ClassDecl>,
}

impl GuardConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_json(&text)
    }

    /// Registers every declared class, in order. Later classes may derive from
    /// earlier ones.
    pub fn apply(&self, registry: &mut TypeRegistry) -> Result<Vec<TypeRef>, ConfigError> {
        register_all(registry, &self.classes)
    }
}

pub fn parse_classes(json: &str) -> Result<Vec<ClassDecl>, ConfigError> {
    Ok(serde_json::from_str(json)?)
}

pub fn load_classes(path: impl AsRef<Path>) -> Result<Vec<ClassDecl>, ConfigError> {
    let path = path.as_ref();
    let text =
        std::fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
    parse_classes(&text)
}

pub fn register_all(registry: &mut TypeRegistry, decls: &[ClassDecl]) -> Result<Vec<TypeRef>, ConfigError> {
    let mut registered = Vec::with_capacity(decls.len());
    for decl in decls {
        let spec = decl.to_spec(registry)?;
        registered.push(registry.register(spec)?);
    }
    debug!(count = registered.len(), "registered classes from configuration");
    Ok(registered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::CallArgs;
    use crate::value::Value;
    use std::io::Write;

    const PETS: &str = r#"[
        { "name": "Cat", "fields": { "name": "str", "age": "int", "tags": "list[str]" } },
        { "name": "PremiumCat", "bases": ["Cat"], "fields": { "tier": "Literal['gold', 'silver']" } },
        { "name": "Note", "shielded": false }
    ]"#;

    #[test]
    fn test_register_from_json() {
        let mut reg = TypeRegistry::new();
        let classes = register_all(&mut reg, &parse_classes(PETS).unwrap()).unwrap();
        assert_eq!(classes.len(), 3);

        let premium = &classes[1];
        let policy = premium.policy().unwrap();
        assert_eq!(policy.len(), 4);
        assert_eq!(policy.rule_for("tags").unwrap().expected, "list[str]");
        assert!(!classes[2].is_shielded());

        let cat = premium.instantiate(CallArgs::new()).unwrap();
        cat.set_attr("tier", "gold").unwrap();
        cat.set_attr("age", true).unwrap();
        let err = cat.set_attr("tier", "bronze").unwrap_err();
        assert_eq!(err.to_string(), "Variable 'tier' expected Literal['gold', 'silver'], got str ('bronze')");
        assert!(cat.set_attr("tags", Value::list([Value::Int(1)])).is_err());
    }

    #[test]
    fn test_field_errors_name_class_and_field() {
        let mut reg = TypeRegistry::new();
        let err = parse_classes(r#"[{ "name": "Bad", "fields": { "x": "list[" } }]"#).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));

        // Well-formed but unresolvable names fail at registration.
        let decls = vec![ClassDecl {
            name: "Bad".into(),
            bases: vec![],
            fields: BTreeMap::from([("x".to_string(), TypeExpr::parse("Missing").unwrap())]),
            shielded: true,
        }];
        let err = register_all(&mut reg, &decls).unwrap_err();
        assert!(matches!(err, ConfigError::Field { ref class, ref field, .. } if class == "Bad" && field == "x"));
        assert!(reg.get("Bad").is_none());
    }

    #[test]
    fn test_unshielded_fields_are_rejected() {
        let json = r#"[{ "name": "Loose", "shielded": false, "fields": { "a": "int" } }]"#;
        let mut reg = TypeRegistry::new();
        let err = register_all(&mut reg, &parse_classes(json).unwrap()).unwrap_err();
        assert!(matches!(err, ConfigError::UnshieldedFields(ref c) if c == "Loose"));
    }

    #[test]
    fn test_load_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "options": {{ "check_return": false }}, "classes": {} }}"#, PETS).unwrap();

        let config = GuardConfig::load(file.path()).unwrap();
        assert!(!config.options.check_return);
        let mut reg = TypeRegistry::new();
        assert_eq!(config.apply(&mut reg).unwrap().len(), 3);
        assert!(reg.is_subclass("PremiumCat", "Cat"));
    }

    #[test]
    fn test_missing_file_and_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_classes(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));

        let config = GuardConfig::from_json("{}").unwrap();
        assert_eq!(config, GuardConfig::default());
        assert!(config.options.check_return);
    }
}
