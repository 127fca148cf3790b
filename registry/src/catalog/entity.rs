//! Declarative entity descriptions consumed by the generic shapes.
//!
//! An [`EntitySpec`] says where an entity lives, how its ids look, which
//! fields a caller may write and how each field is validated. Specs are
//! `static` data; shapes borrow them for the lifetime of the catalog.

use serde_json::{Value, json};

use crate::contract::ParamType;
use crate::core::clock::Clock;
use crate::core::error::{ToolError, ToolResult};
use crate::core::ids::IdScheme;
use crate::core::store::{Record, Store, scalar_text};
use crate::core::validate::{
    require_date, require_enum, require_exists, require_non_negative, require_positive,
};

/// Value-level rule applied to a field on every write.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rule {
    Any,
    Enum(&'static [&'static str]),
    Ref {
        collection: &'static str,
        label: &'static str,
    },
    Positive,
    NonNegative,
    Date,
}

/// Constant default values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Num(f64),
    Str(&'static str),
    EmptyList,
    /// The environment timestamp.
    Now,
    /// The environment date (`YYYY-MM-DD`).
    Today,
}

impl Literal {
    pub fn resolve(self, clock: &Clock) -> Value {
        match self {
            Literal::Null => Value::Null,
            Literal::Bool(flag) => json!(flag),
            Literal::Int(number) => json!(number),
            Literal::Num(number) => json!(number),
            Literal::Str(text) => json!(text),
            Literal::EmptyList => json!([]),
            Literal::Now => json!(clock.now()),
            Literal::Today => json!(clock.today()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Presence {
    Required,
    Optional,
    Default(Literal),
}

/// Who may write a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Create and update.
    Write,
    /// Create only.
    Create,
    /// Never a parameter; set from its default on create.
    System,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Field {
    pub name: &'static str,
    pub ty: ParamType,
    pub description: &'static str,
    pub rule: Rule,
    pub presence: Presence,
    pub access: Access,
}

impl Field {
    const fn of(name: &'static str, ty: ParamType, description: &'static str) -> Self {
        Self {
            name,
            ty,
            description,
            rule: Rule::Any,
            presence: Presence::Optional,
            access: Access::Write,
        }
    }

    pub const fn text(name: &'static str, description: &'static str) -> Self {
        Self::of(name, ParamType::String, description)
    }

    pub const fn number(name: &'static str, description: &'static str) -> Self {
        Self::of(name, ParamType::Number, description)
    }

    pub const fn integer(name: &'static str, description: &'static str) -> Self {
        Self::of(name, ParamType::Integer, description)
    }

    pub const fn boolean(name: &'static str, description: &'static str) -> Self {
        Self::of(name, ParamType::Boolean, description)
    }

    pub const fn list(name: &'static str, description: &'static str) -> Self {
        Self::of(name, ParamType::Array, description)
    }

    pub const fn object(name: &'static str, description: &'static str) -> Self {
        Self::of(name, ParamType::Object, description)
    }

    pub const fn date(name: &'static str, description: &'static str) -> Self {
        Self::of(name, ParamType::String, description).rule(Rule::Date)
    }

    pub const fn one_of(
        name: &'static str,
        description: &'static str,
        allowed: &'static [&'static str],
    ) -> Self {
        Self::of(name, ParamType::String, description).rule(Rule::Enum(allowed))
    }

    pub const fn reference(
        name: &'static str,
        description: &'static str,
        collection: &'static str,
        label: &'static str,
    ) -> Self {
        Self::of(name, ParamType::String, description).rule(Rule::Ref { collection, label })
    }

    pub const fn rule(self, rule: Rule) -> Self {
        Self { rule, ..self }
    }

    pub const fn required(self) -> Self {
        Self {
            presence: Presence::Required,
            ..self
        }
    }

    pub const fn default(self, literal: Literal) -> Self {
        Self {
            presence: Presence::Default(literal),
            ..self
        }
    }

    pub const fn create_only(self) -> Self {
        Self {
            access: Access::Create,
            ..self
        }
    }

    pub const fn system(self, literal: Literal) -> Self {
        Self {
            access: Access::System,
            presence: Presence::Default(literal),
            ..self
        }
    }

    pub fn is_param_on_create(&self) -> bool {
        self.access != Access::System
    }

    pub fn is_param_on_update(&self) -> bool {
        self.access == Access::Write
    }

    pub fn allowed(&self) -> Option<&'static [&'static str]> {
        match self.rule {
            Rule::Enum(allowed) => Some(allowed),
            _ => None,
        }
    }

    /// Validate `value` for this field against the current store.
    pub fn check(&self, store: &Store, value: &Value) -> ToolResult<()> {
        if value.is_null() {
            return Ok(());
        }
        check_type(self.name, self.ty, value)?;
        match self.rule {
            Rule::Any => Ok(()),
            Rule::Enum(allowed) => {
                let text = value.as_str().unwrap_or_default();
                require_enum(text, allowed, self.name)
            }
            Rule::Ref { collection, label } => {
                require_exists(store, collection, label, &scalar_text(value)).map(|_| ())
            }
            Rule::Positive => require_positive(self.name, value.as_f64().unwrap_or_default()),
            Rule::NonNegative => {
                require_non_negative(self.name, value.as_f64().unwrap_or_default())
            }
            Rule::Date => require_date(self.name, value.as_str().unwrap_or_default()).map(|_| ()),
        }
    }
}

/// JSON type check for values that bypass the argument schema
/// (`field_value` style parameters).
pub fn check_type(name: &str, ty: ParamType, value: &Value) -> ToolResult<()> {
    let ok = match ty {
        ParamType::String => value.is_string(),
        ParamType::Integer => value.is_i64() || value.is_u64(),
        ParamType::Number => value.is_number(),
        ParamType::Boolean => value.is_boolean(),
        ParamType::Object => value.is_object(),
        ParamType::Array => value.is_array(),
        ParamType::Any => true,
    };
    if ok {
        return Ok(());
    }
    Err(ToolError::invalid_argument(format!(
        "{name} must be of type {}",
        ty.as_str()
    )))
}

/// Which referencing records block a delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Active {
    Any,
    StatusIn(&'static [&'static str]),
    StatusNotIn(&'static [&'static str]),
}

impl Active {
    pub fn matches(self, record: &Record) -> bool {
        let status = record.get("status").and_then(Value::as_str).unwrap_or("");
        match self {
            Active::Any => true,
            Active::StatusIn(states) => states.contains(&status),
            Active::StatusNotIn(states) => !states.contains(&status),
        }
    }
}

/// Records in `collection` whose `field` points at the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependent {
    pub collection: &'static str,
    pub field: &'static str,
    /// Plural noun used in the error message.
    pub label: &'static str,
    pub active: Active,
}

/// Junction rows removed together with the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owned {
    pub collection: &'static str,
    pub field: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct EntitySpec {
    pub collection: &'static str,
    /// Capitalized singular used in messages (`Sales order`).
    pub label: &'static str,
    pub ids: IdScheme,
    /// Record field holding the identity.
    pub id_field: &'static str,
    /// Parameter name used to address one record.
    pub id_param: &'static str,
    pub fields: &'static [Field],
    /// Fields that must be unique across the collection.
    pub unique: &'static [&'static str],
    /// Stamp `created_at` / `updated_at`.
    pub timestamps: bool,
    pub dependents: &'static [Dependent],
    pub owned: &'static [Owned],
}

impl EntitySpec {
    pub fn field(&self, name: &str) -> Option<&'static Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn not_found(&self, id: &str) -> ToolError {
        ToolError::not_found(self.label, id)
    }
}
