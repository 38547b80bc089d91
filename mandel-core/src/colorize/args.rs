//! Binding of `key=value;key=value` argument strings to colorizer parameters.
//!
//! A colorizer declares a schema of named, typed parameters.
//! The argument string is split into a string map; each declared parameter
//! that appears in the map is coerced to its kind and handed to the colorizer.
//! Keys with no matching parameter are ignored; values that fail coercion are errors.

use std::collections::BTreeMap;

use super::Colorizer;
use crate::Error;

/// The kind of value a parameter accepts.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParamKind {
    Integer,
    Boolean,
    Float,
}

/// A declared colorizer parameter.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
}

impl ParamSpec {
    pub const fn new(name: &'static str, kind: ParamKind) -> Self {
        ParamSpec { name, kind }
    }
}

/// A coerced parameter value.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ArgValue {
    Integer(i64),
    Boolean(bool),
    Float(f64),
}

impl ParamKind {
    /// Converts a raw string to a value of this kind.
    pub fn coerce(self, name: &str, raw: &str) -> Result<ArgValue, Error> {
        let bad = |why: &str| {
            Error::Argument(format!(
                "value {:?} for {} is not {}: {}",
                raw,
                name,
                self.describe(),
                why
            ))
        };
        match self {
            ParamKind::Integer => raw
                .parse::<i64>()
                .map(ArgValue::Integer)
                .map_err(|err| bad(&err.to_string())),
            ParamKind::Boolean => match raw {
                "true" => Ok(ArgValue::Boolean(true)),
                "false" => Ok(ArgValue::Boolean(false)),
                _ => Err(bad("expected true or false")),
            },
            ParamKind::Float => {
                let v = raw.parse::<f64>().map_err(|err| bad(&err.to_string()))?;
                if !v.is_finite() {
                    return Err(bad("not finite"));
                }
                Ok(ArgValue::Float(v))
            }
        }
    }

    fn describe(self) -> &'static str {
        match self {
            ParamKind::Integer => "an integer",
            ParamKind::Boolean => "a boolean",
            ParamKind::Float => "a floating-point number",
        }
    }
}

/// Splits an argument string into a key/value map.
///
/// Pairs are separated by `;` and split at the first `=`.
/// Empty segments are skipped; a segment without `=`, or with an empty key,
/// is an error. Later duplicates replace earlier ones.
pub fn parse_args(args: &str) -> Result<BTreeMap<String, String>, Error> {
    let mut map = BTreeMap::new();
    for segment in args.split(';') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let (key, value) = segment.split_once('=').ok_or_else(|| {
            Error::Argument(format!("expected key=value, got {:?}", segment))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::Argument(format!("missing key in {:?}", segment)));
        }
        map.insert(key.to_owned(), value.trim().to_owned());
    }
    Ok(map)
}

/// Binds an argument string to the colorizer's declared parameters.
///
/// A colorizer with no declared parameters accepts any argument string.
pub fn bind(colorizer: &mut dyn Colorizer, args: &str) -> Result<(), Error> {
    let schema = colorizer.parameters();
    if schema.is_empty() {
        if !args.trim().is_empty() {
            tracing::debug!(
                "colorizer {} takes no parameters; ignoring {:?}",
                colorizer.name(),
                args
            );
        }
        return Ok(());
    }

    let map = parse_args(args)?;
    for key in map.keys() {
        if !schema.iter().any(|spec| spec.name == key.as_str()) {
            tracing::debug!("ignoring unknown argument {}", key);
        }
    }

    let bindings = schema
        .iter()
        .filter_map(|spec| map.get(spec.name).map(|raw| (spec, raw)))
        .map(|(spec, raw)| Ok((spec.name, spec.kind.coerce(spec.name, raw)?)))
        .collect::<Result<Vec<_>, Error>>()?;

    for (name, value) in bindings {
        tracing::debug!("setting {} = {:?}", name, value);
        colorizer
            .set_parameter(name, value)
            .map_err(|message| Error::Argument(format!("{}: {}", name, message)))?;
    }
    Ok(())
}
