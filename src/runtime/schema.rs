//! Tool input schemas and the `DomainType` → JSON-Schema generator.
//!
//! Rust has no runtime reflection over annotated methods, so tool schemas here
//! are always produced either by hand (via the [`Parameter`] builder) or from
//! a declarative [`DomainType`] description (the language-neutral alternative
//! named as the chosen resolution of the "annotation-driven tool extraction"
//! open question).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The primitive JSON-Schema types a tool parameter may declare.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

/// A single declared parameter of a tool's input schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    pub description: Option<String>,
    pub required: bool,
    /// For `Array` parameters, the type of the contained items.
    pub item_type: Option<Box<ParameterType>>,
    /// For `Array` parameters whose items are themselves objects, the nested
    /// property definitions of one item.
    pub item_properties: Option<HashMap<String, Parameter>>,
    /// For `Object` parameters, the nested property definitions.
    pub nested_properties: Option<HashMap<String, Parameter>>,
    pub enum_values: Option<Vec<String>>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, param_type: ParameterType) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: None,
            required: false,
            item_type: None,
            item_properties: None,
            nested_properties: None,
            enum_values: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_items(mut self, item_type: ParameterType) -> Self {
        self.item_type = Some(Box::new(item_type));
        self
    }

    /// Attach nested property definitions to the array's item shape; only
    /// meaningful alongside `with_items(ParameterType::Object)`.
    pub fn with_item_properties(mut self, properties: HashMap<String, Parameter>) -> Self {
        self.item_properties = Some(properties);
        self
    }

    pub fn with_nested_properties(mut self, properties: HashMap<String, Parameter>) -> Self {
        self.nested_properties = Some(properties);
        self
    }

    pub fn with_enum_values(mut self, values: Vec<String>) -> Self {
        self.enum_values = Some(values);
        self
    }

    fn to_schema_fragment(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        obj.insert(
            "type".to_string(),
            serde_json::Value::String(json_type_name(&self.param_type).to_string()),
        );
        if let Some(desc) = &self.description {
            obj.insert("description".to_string(), serde_json::Value::String(desc.clone()));
        }
        if let Some(values) = &self.enum_values {
            obj.insert(
                "enum".to_string(),
                serde_json::Value::Array(values.iter().cloned().map(serde_json::Value::String).collect()),
            );
        }
        if let Some(item_type) = &self.item_type {
            let mut items = serde_json::Map::new();
            items.insert(
                "type".to_string(),
                serde_json::Value::String(json_type_name(item_type).to_string()),
            );
            if let Some(item_properties) = &self.item_properties {
                let (properties, required) = properties_schema(item_properties);
                items.insert("properties".to_string(), properties);
                if !required.is_empty() {
                    items.insert("required".to_string(), serde_json::Value::Array(required));
                }
            }
            obj.insert("items".to_string(), serde_json::Value::Object(items));
        }
        if let Some(nested) = &self.nested_properties {
            let (properties, required) = properties_schema(nested);
            obj.insert("properties".to_string(), properties);
            if !required.is_empty() {
                obj.insert("required".to_string(), serde_json::Value::Array(required));
            }
        }
        serde_json::Value::Object(obj)
    }
}

fn json_type_name(t: &ParameterType) -> &'static str {
    match t {
        ParameterType::String => "string",
        ParameterType::Integer => "integer",
        ParameterType::Number => "number",
        ParameterType::Boolean => "boolean",
        ParameterType::Array => "array",
        ParameterType::Object => "object",
    }
}

fn properties_schema(params: &HashMap<String, Parameter>) -> (serde_json::Value, Vec<serde_json::Value>) {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();
    for (name, param) in params {
        properties.insert(name.clone(), param.to_schema_fragment());
        if param.required {
            required.push(serde_json::Value::String(name.clone()));
        }
    }
    (serde_json::Value::Object(properties), required)
}

/// An ordered list of [`Parameter`]s, with a method to render the full
/// draft-07-compatible JSON Schema object advertised to the LLM.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputSchema {
    pub parameters: Vec<Parameter>,
}

impl InputSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parameter(mut self, param: Parameter) -> Self {
        self.parameters.push(param);
        self
    }

    /// Render as a JSON-Schema object: `{"type": "object", "properties": {...}, "required": [...]}`.
    pub fn to_json_schema(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for param in &self.parameters {
            properties.insert(param.name.clone(), param.to_schema_fragment());
            if param.required {
                required.push(serde_json::Value::String(param.name.clone()));
            }
        }
        serde_json::json!({
            "type": "object",
            "properties": serde_json::Value::Object(properties),
            "required": required,
        })
    }
}

/// How many values of a domain type property may appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Optional,
    List,
    Set,
}

/// A declared property of a [`DomainType`]: a name, a primitive type name or
/// nested domain type, and a cardinality.
#[derive(Debug, Clone)]
pub struct DomainProperty {
    pub name: String,
    pub description: Option<String>,
    pub cardinality: Cardinality,
    pub kind: DomainPropertyKind,
}

#[derive(Debug, Clone)]
pub enum DomainPropertyKind {
    Primitive(String),
    Nested(DomainType),
}

/// A declarative description of a structured type, used to generate both a
/// tool's [`InputSchema`] and the schema handed to the typed object creator.
/// This is the reflection-free stand-in for annotation-driven extraction:
/// callers build a `DomainType` once, by hand, instead of relying on
/// runtime introspection the language doesn't offer.
#[derive(Debug, Clone)]
pub struct DomainType {
    pub name: String,
    pub properties: Vec<DomainProperty>,
}

impl DomainType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
        }
    }

    pub fn with_property(mut self, property: DomainProperty) -> Self {
        self.properties.push(property);
        self
    }

    /// Map a primitive type name the way the reference schema generator does:
    /// `int|integer|long|short|byte → integer`, `double|float|number|decimal → number`,
    /// `boolean|bool → boolean`, everything else (including `string`) → `string`.
    fn map_primitive(name: &str) -> ParameterType {
        match name.to_ascii_lowercase().as_str() {
            "int" | "integer" | "long" | "short" | "byte" => ParameterType::Integer,
            "double" | "float" | "number" | "decimal" => ParameterType::Number,
            "boolean" | "bool" => ParameterType::Boolean,
            _ => ParameterType::String,
        }
    }

    /// Generate a JSON-Schema object for this domain type, recursing into
    /// nested domain types. `List`/`Set` cardinality always produces a
    /// required `array` property (matching the design's explicit rule that
    /// collection-valued properties are never optional).
    pub fn to_json_schema(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for prop in &self.properties {
            let mut fragment = match &prop.kind {
                DomainPropertyKind::Primitive(name) => {
                    serde_json::json!({ "type": json_type_name(&Self::map_primitive(name)) })
                }
                DomainPropertyKind::Nested(nested) => nested.to_json_schema(),
            };
            let is_required = match prop.cardinality {
                Cardinality::One => true,
                Cardinality::Optional => false,
                Cardinality::List | Cardinality::Set => true,
            };
            if matches!(prop.cardinality, Cardinality::List | Cardinality::Set) {
                fragment = serde_json::json!({ "type": "array", "items": fragment });
            }
            if let (Some(obj), Some(desc)) = (fragment.as_object_mut(), &prop.description) {
                obj.insert("description".to_string(), serde_json::Value::String(desc.clone()));
            }
            properties.insert(prop.name.clone(), fragment);
            if is_required {
                required.push(serde_json::Value::String(prop.name.clone()));
            }
        }
        serde_json::json!({
            "type": "object",
            "properties": serde_json::Value::Object(properties),
            "required": required,
        })
    }

    /// Convert to an [`InputSchema`] so a `DomainType` can be used directly to
    /// describe a tool's parameters.
    pub fn to_input_schema(&self) -> InputSchema {
        let mut schema = InputSchema::new();
        for prop in &self.properties {
            let mut param = if matches!(prop.cardinality, Cardinality::List | Cardinality::Set) {
                let mut param = Parameter::new(&prop.name, ParameterType::Array).required();
                match &prop.kind {
                    DomainPropertyKind::Primitive(name) => {
                        param = param.with_items(Self::map_primitive(name));
                    }
                    DomainPropertyKind::Nested(nested) => {
                        param = param.with_items(ParameterType::Object).with_item_properties(nested_properties_map(nested));
                    }
                }
                param
            } else {
                let mut param = match &prop.kind {
                    DomainPropertyKind::Primitive(name) => Parameter::new(&prop.name, Self::map_primitive(name)),
                    DomainPropertyKind::Nested(nested) => {
                        Parameter::new(&prop.name, ParameterType::Object).with_nested_properties(nested_properties_map(nested))
                    }
                };
                if prop.cardinality == Cardinality::One {
                    param = param.required();
                }
                param
            };
            if let Some(desc) = &prop.description {
                param = param.with_description(desc.clone());
            }
            schema = schema.with_parameter(param);
        }
        schema
    }
}

fn nested_properties_map(nested: &DomainType) -> HashMap<String, Parameter> {
    nested
        .to_input_schema()
        .parameters
        .into_iter()
        .map(|param| (param.name.clone(), param))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address_type() -> DomainType {
        DomainType::new("Address")
            .with_property(DomainProperty {
                name: "street".to_string(),
                description: None,
                cardinality: Cardinality::One,
                kind: DomainPropertyKind::Primitive("string".to_string()),
            })
            .with_property(DomainProperty {
                name: "zip".to_string(),
                description: None,
                cardinality: Cardinality::One,
                kind: DomainPropertyKind::Primitive("int".to_string()),
            })
    }

    #[test]
    fn primitive_list_carries_item_type_in_both_schemas() {
        let domain = DomainType::new("Order").with_property(DomainProperty {
            name: "tags".to_string(),
            description: None,
            cardinality: Cardinality::List,
            kind: DomainPropertyKind::Primitive("string".to_string()),
        });

        let input_schema = domain.to_input_schema();
        let tags = &input_schema.parameters[0];
        assert_eq!(tags.param_type, ParameterType::Array);
        assert_eq!(tags.item_type.as_deref(), Some(&ParameterType::String));
        assert!(tags.required);

        let json_schema = domain.to_json_schema();
        assert_eq!(json_schema["properties"]["tags"]["type"], "array");
        assert_eq!(json_schema["properties"]["tags"]["items"]["type"], "string");
    }

    #[test]
    fn nested_object_property_carries_its_fields() {
        let domain = DomainType::new("Customer").with_property(DomainProperty {
            name: "address".to_string(),
            description: None,
            cardinality: Cardinality::One,
            kind: DomainPropertyKind::Nested(address_type()),
        });

        let input_schema = domain.to_input_schema();
        let address = &input_schema.parameters[0];
        assert_eq!(address.param_type, ParameterType::Object);
        let nested = address.nested_properties.as_ref().unwrap();
        assert!(nested.contains_key("street"));
        assert!(nested.contains_key("zip"));
    }

    #[test]
    fn list_of_nested_objects_keeps_item_schema_in_input_schema() {
        let domain = DomainType::new("Customer").with_property(DomainProperty {
            name: "addresses".to_string(),
            description: None,
            cardinality: Cardinality::List,
            kind: DomainPropertyKind::Nested(address_type()),
        });

        let input_schema = domain.to_input_schema();
        let addresses = &input_schema.parameters[0];
        assert_eq!(addresses.param_type, ParameterType::Array);
        assert_eq!(addresses.item_type.as_deref(), Some(&ParameterType::Object));
        let item_properties = addresses
            .item_properties
            .as_ref()
            .expect("list of nested objects must carry item_properties");
        assert!(item_properties.contains_key("street"));
        assert!(item_properties.contains_key("zip"));

        let fragment = addresses.to_schema_fragment();
        assert_eq!(fragment["items"]["type"], "object");
        assert!(fragment["items"]["properties"].get("street").is_some());
    }

    #[test]
    fn list_of_nested_objects_matches_json_schema_item_shape() {
        let domain = DomainType::new("Customer").with_property(DomainProperty {
            name: "addresses".to_string(),
            description: None,
            cardinality: Cardinality::Set,
            kind: DomainPropertyKind::Nested(address_type()),
        });

        let json_schema = domain.to_json_schema();
        let items = &json_schema["properties"]["addresses"]["items"];
        assert!(items["properties"].get("street").is_some());
        assert!(items["properties"].get("zip").is_some());
    }
}
