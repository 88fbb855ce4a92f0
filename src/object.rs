//! PDF value model.
//!
//! A tagged union over every PDF primitive: booleans, numerics (with the
//! integer-vs-real distinction preserved for serialization), names, strings
//! (literal and hexadecimal forms kept apart for round-trip stability),
//! arrays, dictionaries, streams and indirect object references.

use crate::error::{Error, Result};
use crate::filters::FilterParams;
use indexmap::IndexMap;

/// Dictionary type: keys are PDF names (unescaped), insertion order is
/// preserved so a parsed document serializes back in its original key order.
pub type Dict = IndexMap<String, Value>;

/// How a string value was written in the source (and will be written out).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringFormat {
    /// Literal `(...)` syntax with backslash escapes
    Literal,
    /// Hexadecimal `<...>` syntax
    Hexadecimal,
}

/// PDF value representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null object
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Real (floating-point) value
    Real(f64),
    /// String (byte array) plus its source syntax
    String(Vec<u8>, StringFormat),
    /// Name (written with a leading `/`, stored unescaped)
    Name(String),
    /// Array of values, insertion order significant
    Array(Vec<Value>),
    /// Dictionary (name-keyed, insertion order preserved)
    Dictionary(Dict),
    /// Stream: dictionary plus raw (still-encoded) payload
    Stream {
        /// Stream dictionary
        dict: Dict,
        /// Raw stream payload as stored in the file
        data: bytes::Bytes,
    },
    /// Indirect object reference (`N G R`)
    Reference(ObjectRef),
}

/// Identity of an indirect object: object number and generation number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    /// Object number
    pub num: u32,
    /// Generation number
    pub gen: u16,
}

impl ObjectRef {
    /// Create a new object reference.
    pub fn new(num: u32, gen: u16) -> Self {
        Self { num, gen }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} R", self.num, self.gen)
    }
}

impl Value {
    /// Get the type name of this value (without data).
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Boolean(_) => "Boolean",
            Value::Integer(_) => "Integer",
            Value::Real(_) => "Real",
            Value::String(..) => "String",
            Value::Name(_) => "Name",
            Value::Array(_) => "Array",
            Value::Dictionary(_) => "Dictionary",
            Value::Stream { .. } => "Stream",
            Value::Reference(_) => "Reference",
        }
    }

    /// Try to cast to integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to cast to real number. Integers coerce (PDF treats numerics
    /// interchangeably where a real is expected).
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Value::Real(r) => Some(*r),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to cast to name.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Value::Name(s) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to string bytes.
    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Value::String(s, _) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to cast to array.
    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Try to cast to dictionary. Works for both Dictionary and Stream values.
    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Value::Dictionary(d) => Some(d),
            Value::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    /// Mutable dictionary access (Dictionary and Stream values).
    pub fn as_dict_mut(&mut self) -> Option<&mut Dict> {
        match self {
            Value::Dictionary(d) => Some(d),
            Value::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    /// Try to cast to reference.
    pub fn as_reference(&self) -> Option<ObjectRef> {
        match self {
            Value::Reference(r) => Some(*r),
            _ => None,
        }
    }

    /// Check if the value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Decode a stream payload through its `/Filter` pipeline.
    ///
    /// Filters are applied in declaration order; `/DecodeParms` entries are
    /// matched to filters positionally. Streams referencing an external file
    /// (`/F`) are unsupported.
    ///
    /// # Errors
    ///
    /// Fails if this is not a stream value, if a filter name is unknown, or
    /// if any filter rejects its input.
    pub fn decode_stream_data(&self) -> Result<Vec<u8>> {
        let (dict, data) = match self {
            Value::Stream { dict, data } => (dict, data),
            _ => {
                return Err(Error::Malformed(format!(
                    "expected Stream, found {}",
                    self.type_name()
                )))
            },
        };

        if dict.contains_key("F") {
            return Err(Error::NotImplemented(
                "external file stream (/F filter source)".to_string(),
            ));
        }

        let filters = extract_filter_names(dict.get("Filter"));
        let params = extract_decode_params(dict.get("DecodeParms"), filters.len());

        crate::filters::decode(data, &filters, &params)
    }
}

/// Extract filter names from a `/Filter` entry (single name or array).
fn extract_filter_names(filter: Option<&Value>) -> Vec<String> {
    match filter {
        Some(Value::Name(name)) => vec![name.clone()],
        Some(Value::Array(arr)) => arr
            .iter()
            .filter_map(|v| v.as_name().map(|s| s.to_string()))
            .collect(),
        _ => Vec::new(),
    }
}

/// Extract per-filter decode parameters from a `/DecodeParms` entry.
///
/// `/DecodeParms` may be a single dictionary, an array of dictionaries
/// aligned with the filter array (null for filters without parameters), or
/// absent entirely.
fn extract_decode_params(parms: Option<&Value>, filter_count: usize) -> Vec<Option<FilterParams>> {
    let mut out = vec![None; filter_count.max(1)];

    match parms {
        Some(Value::Dictionary(d)) => {
            out[0] = Some(filter_params_from_dict(d));
        },
        Some(Value::Array(arr)) => {
            for (i, entry) in arr.iter().enumerate().take(out.len()) {
                if let Value::Dictionary(d) = entry {
                    out[i] = Some(filter_params_from_dict(d));
                }
            }
        },
        _ => {},
    }

    out
}

/// Build predictor parameters from a decode-parameters dictionary,
/// applying the defaults from the PDF specification (Table 3.7).
fn filter_params_from_dict(dict: &Dict) -> FilterParams {
    FilterParams {
        predictor: dict
            .get("Predictor")
            .and_then(|v| v.as_integer())
            .unwrap_or(1),
        colors: dict.get("Colors").and_then(|v| v.as_integer()).unwrap_or(1) as usize,
        bits_per_component: dict
            .get("BitsPerComponent")
            .and_then(|v| v.as_integer())
            .unwrap_or(8) as usize,
        columns: dict
            .get("Columns")
            .and_then(|v| v.as_integer())
            .unwrap_or(1) as usize,
    }
}
