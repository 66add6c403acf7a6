//! Accepted configuration shapes for each execution mode
//!
//! Each mode accepts its `type` tag, the shared `provision-options`
//! object and its own trigger keys. Anything else is rejected before a
//! policy ever reaches provisioning.

use serde_json::{Map, Value};

use crate::ConfigurationError;

pub const PERIODIC_MODE: &str = "azure-periodic";
pub const STREAM_MODE: &str = "azure-stream";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    String,
    Number,
    Object,
}

impl Kind {
    fn matches(self, value: &Value) -> bool {
        match self {
            Kind::String => value.is_string(),
            Kind::Number => value.is_number(),
            Kind::Object => value.is_object(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Kind::String => "string",
            Kind::Number => "number",
            Kind::Object => "object",
        }
    }
}

/// Shape of one execution mode's configuration
#[derive(Debug)]
pub struct ModeSchema {
    pub mode: &'static str,
    pub properties: &'static [(&'static str, Kind)],
}

const SHARED_PROPERTIES: &[(&str, Kind)] = &[("type", Kind::String), ("provision-options", Kind::Object)];

/// Known `provision-options` keys. Unlisted keys pass through untyped.
pub const PROVISION_OPTIONS: &[(&str, Kind)] = &[
    ("location", Kind::String),
    ("appInsightsLocation", Kind::String),
    ("servicePlanName", Kind::String),
    ("sku", Kind::String),
    ("skuCode", Kind::String),
    ("workerSize", Kind::Number),
];

pub static PERIODIC_SCHEMA: ModeSchema = ModeSchema {
    mode: PERIODIC_MODE,
    properties: &[("schedule", Kind::String)],
};

pub static STREAM_SCHEMA: ModeSchema = ModeSchema {
    mode: STREAM_MODE,
    properties: &[("source", Kind::String)],
};

/// Look up the schema registered for a mode tag
pub fn schema_for(mode: &str) -> Option<&'static ModeSchema> {
    match mode {
        PERIODIC_MODE => Some(&PERIODIC_SCHEMA),
        STREAM_MODE => Some(&STREAM_SCHEMA),
        _ => None,
    }
}

/// Validate a raw `mode` section and return the schema it conforms to
pub fn validate_mode(mode: &Value) -> Result<&'static ModeSchema, ConfigurationError> {
    let object = mode
        .as_object()
        .ok_or_else(|| ConfigurationError::invalid("mode", "expected an object"))?;

    let tag = match object.get("type") {
        Some(Value::String(tag)) => tag.as_str(),
        Some(_) => return Err(ConfigurationError::invalid("mode.type", "expected a string")),
        None => return Err(ConfigurationError::MissingField("mode.type".to_string())),
    };

    let schema = schema_for(tag).ok_or_else(|| ConfigurationError::UnknownMode(tag.to_string()))?;
    schema.validate(object)?;
    Ok(schema)
}

impl ModeSchema {
    pub fn validate(&self, mode: &Map<String, Value>) -> Result<(), ConfigurationError> {
        for (key, value) in mode {
            let kind = self
                .property_kind(key)
                .ok_or_else(|| ConfigurationError::UnknownProperty {
                    mode: self.mode.to_string(),
                    property: key.clone(),
                })?;

            check_kind(&format!("mode.{}", key), kind, value)?;
        }

        if let Some(Value::Object(options)) = mode.get("provision-options") {
            for (key, kind) in PROVISION_OPTIONS {
                if let Some(value) = options.get(*key) {
                    check_kind(&format!("mode.provision-options.{}", key), *kind, value)?;
                }
            }
        }

        Ok(())
    }

    fn property_kind(&self, property: &str) -> Option<Kind> {
        SHARED_PROPERTIES
            .iter()
            .chain(self.properties.iter())
            .find(|(name, _)| *name == property)
            .map(|(_, kind)| *kind)
    }
}

fn check_kind(field: &str, kind: Kind, value: &Value) -> Result<(), ConfigurationError> {
    if kind.matches(value) {
        Ok(())
    } else {
        Err(ConfigurationError::invalid(
            field,
            format!("expected a {}", kind.name()),
        ))
    }
}
