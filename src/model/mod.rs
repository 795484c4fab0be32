//! Declarative Domain Model
//!
//! The already-parsed model as it arrives from the authoring tool: modules of
//! entities and enumerations, plus import declarations for entities that live
//! in external libraries. References are plain names here; they are only
//! turned into handles when the [`ModelGraph`](crate::graph::ModelGraph) is built.
//!
//! ## Example document
//! ```json
//! {
//!   "name": "shop",
//!   "modules": [{
//!     "name": "sales",
//!     "entities": [
//!       { "name": "Order", "attributes": [{ "name": "code", "type": "string" }],
//!         "relations": [{ "name": "items", "kind": "OneToMany", "target": "LineItem" }] },
//!       { "name": "LineItem", "attributes": [{ "name": "quantity", "type": "integer" }] }
//!     ]
//!   }],
//!   "imports": [{ "name": "auth", "library": "Auth", "package_path": "com.acme.auth",
//!                 "entities": ["User"] }]
//! }
//! ```

pub mod loader;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use loader::{load, load_from_directory, load_from_file, load_from_str, LoadConfig};

/// The whole declarative model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// Application name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Modules, in declaration order
    #[serde(default)]
    pub modules: Vec<Module>,

    /// Enumerations declared at model level (visible from every module)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enums: Vec<Enumeration>,

    /// External library imports
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<ModuleImport>,
}

impl Model {
    /// Append another fragment of the same model.
    ///
    /// The first non-empty name wins. A module already present is extended
    /// with the fragment's entities and enumerations, so one module may be
    /// spread over several files.
    pub fn merge(&mut self, other: Model) {
        if self.name.is_none() {
            self.name = other.name;
        }
        for module in other.modules {
            match self.modules.iter_mut().find(|m| m.name == module.name) {
                Some(existing) => {
                    if existing.comment.is_none() {
                        existing.comment = module.comment;
                    }
                    existing.entities.extend(module.entities);
                    existing.enums.extend(module.enums);
                }
                None => self.modules.push(module),
            }
        }
        self.enums.extend(other.enums);
        self.imports.extend(other.imports);
    }

    /// Total number of local entities across all modules
    pub fn entity_count(&self) -> usize {
        self.modules.iter().map(|m| m.entities.len()).sum()
    }
}

/// A named, ordered collection of entities and enumerations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(default)]
    pub entities: Vec<Entity>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enums: Vec<Enumeration>,
}

/// A model-level record type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    /// Abstract entities are never emitted standalone
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,

    /// Superclass name (simple or qualified)
    #[serde(default, rename = "extends", skip_serializing_if = "Option::is_none")]
    pub superclass: Option<String>,

    #[serde(default)]
    pub attributes: Vec<Attribute>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enum_attributes: Vec<EnumAttribute>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<RelationDecl>,
}

/// A primitive-typed attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,

    #[serde(rename = "type")]
    pub ty: DataType,

    #[serde(default)]
    pub unique: bool,

    /// Whether the attribute may be left blank
    #[serde(default)]
    pub blank: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, ty: DataType) -> Self {
        Self {
            name: name.into(),
            ty,
            unique: false,
            blank: false,
            comment: None,
        }
    }
}

/// Primitive attribute types understood by the emitters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DataType {
    Boolean,
    Cnpj,
    Cpf,
    Currency,
    Date,
    Datetime,
    Decimal,
    Email,
    File,
    Integer,
    MobilePhoneNumber,
    PhoneNumber,
    String,
    Uuid,
    Void,
    Zipcode,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Cnpj => "cnpj",
            Self::Cpf => "cpf",
            Self::Currency => "currency",
            Self::Date => "date",
            Self::Datetime => "datetime",
            Self::Decimal => "decimal",
            Self::Email => "email",
            Self::File => "file",
            Self::Integer => "integer",
            Self::MobilePhoneNumber => "mobilePhoneNumber",
            Self::PhoneNumber => "phoneNumber",
            Self::String => "string",
            Self::Uuid => "uuid",
            Self::Void => "void",
            Self::Zipcode => "zipcode",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An attribute whose type is an enumeration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumAttribute {
    pub name: String,

    /// Enumeration name (simple or qualified)
    #[serde(rename = "enum")]
    pub enumeration: String,
}

/// An enumeration with its variant names
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Enumeration {
    pub name: String,

    #[serde(default)]
    pub variants: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Shape of a relation between two entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl Cardinality {
    /// The same relation seen from the other side
    pub fn inverse(self) -> Self {
        match self {
            Self::OneToOne => Self::OneToOne,
            Self::OneToMany => Self::ManyToOne,
            Self::ManyToOne => Self::OneToMany,
            Self::ManyToMany => Self::ManyToMany,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneToOne => "OneToOne",
            Self::OneToMany => "OneToMany",
            Self::ManyToOne => "ManyToOne",
            Self::ManyToMany => "ManyToMany",
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A relation as declared on one entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDecl {
    /// Field name on the declaring entity
    pub name: String,

    #[serde(rename = "kind")]
    pub cardinality: Cardinality,

    /// Target entity name (simple or qualified)
    pub target: String,

    /// Optional explicit ownership annotation. Never overrides the derived value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Import of entities physically defined in an external library
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleImport {
    /// Name the imported entities are qualified with
    pub name: String,

    /// Library the entities come from
    pub library: String,

    /// Package path used by emitters when importing from the library
    #[serde(default)]
    pub package_path: String,

    /// Names of the imported entities
    #[serde(default)]
    pub entities: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cardinality_inverse_is_involution() {
        for card in [
            Cardinality::OneToOne,
            Cardinality::OneToMany,
            Cardinality::ManyToOne,
            Cardinality::ManyToMany,
        ] {
            assert_eq!(card.inverse().inverse(), card);
        }
        assert_eq!(Cardinality::OneToMany.inverse(), Cardinality::ManyToOne);
    }

    #[test]
    fn test_entity_json_field_names() {
        let entity: Entity = serde_json::from_str(
            r#"{
                "name": "Employee",
                "abstract": false,
                "extends": "Person",
                "attributes": [{ "name": "phone", "type": "mobilePhoneNumber" }],
                "enum_attributes": [{ "name": "level", "enum": "Level" }],
                "relations": [{ "name": "boss", "kind": "ManyToOne", "target": "Employee" }]
            }"#,
        )
        .unwrap();

        assert_eq!(entity.superclass.as_deref(), Some("Person"));
        assert_eq!(entity.attributes[0].ty, DataType::MobilePhoneNumber);
        assert_eq!(entity.enum_attributes[0].enumeration, "Level");
        assert_eq!(entity.relations[0].cardinality, Cardinality::ManyToOne);
        assert_eq!(entity.relations[0].owner, None);
    }

    #[test]
    fn test_merge_keeps_first_name() {
        let mut a = Model { name: Some("shop".into()), ..Default::default() };
        let b = Model {
            name: Some("other".into()),
            modules: vec![Module { name: "sales".into(), ..Default::default() }],
            ..Default::default()
        };
        a.merge(b);
        assert_eq!(a.name.as_deref(), Some("shop"));
        assert_eq!(a.modules.len(), 1);
    }

    #[test]
    fn test_merge_extends_existing_module() {
        let entity = |name: &str| Entity { name: name.into(), ..Default::default() };
        let mut a = Model {
            modules: vec![Module { name: "sales".into(), entities: vec![entity("Base")], ..Default::default() }],
            ..Default::default()
        };
        a.merge(Model {
            modules: vec![
                Module { name: "sales".into(), entities: vec![entity("Order")], ..Default::default() },
                Module { name: "hr".into(), ..Default::default() },
            ],
            ..Default::default()
        });

        assert_eq!(a.modules.len(), 2);
        let names: Vec<&str> = a.modules[0].entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Base", "Order"]);
    }
}
