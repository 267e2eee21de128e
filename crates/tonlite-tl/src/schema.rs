//! Runtime TL schema registry.
//!
//! Parses declarations straight from `.tl` text and drives generic
//! encoding/decoding from them, for callers that cannot commit to
//! hand-written codecs (tooling, debug dumps, forward compatibility).
//! Constructor ids are computed from the declaration text unless the
//! declaration pins one with a `name#hexid` suffix.
//!
//! Values are dynamic: an [`Object`] is an ordered field list. A boxed
//! value whose constructor is missing from the registry decodes to
//! [`Value::Raw`] at the top level (the payload length is unknowable for
//! nested values, so there it is an error).

use std::collections::HashMap;

use tonlite_crypto::tl_id;

use crate::{TlError, TlReader, TlResult, TlWriter};

/// A dynamic TL value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `int`, `long` and `#` (nat) fields.
    Int(i64),
    Int128([u8; 16]),
    Int256([u8; 32]),
    Bytes(Vec<u8>),
    String(String),
    Bool(bool),
    Vector(Vec<Value>),
    Object(Object),
    /// An unrecognized boxed constructor: its id and undecoded payload.
    Raw(u32, Vec<u8>),
}

/// A constructor instance: its full name and ordered fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Object {
    pub name: String,
    fields: Vec<(String, Value)>,
}

impl Object {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn with(mut self, field: impl Into<String>, value: Value) -> Self {
        self.fields.push((field.into(), value));
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }
}

#[derive(Debug, Clone, PartialEq)]
enum FieldType {
    /// `#` — a bare unsigned 32-bit nat, also the carrier for flag sets.
    Nat,
    Int,
    Long,
    Int128,
    Int256,
    Bytes,
    String,
    Bool,
    /// `true` — a flag-only marker occupying no bytes.
    True,
    Vector(Box<FieldType>),
    /// A named type; boxed when the final segment is capitalized.
    Named(String),
    /// `flags.N?T`
    Conditional {
        flags_field: String,
        bit: u8,
        inner: Box<FieldType>,
    },
}

impl FieldType {
    fn parse(s: &str) -> TlResult<Self> {
        if let Some((cond, inner)) = s.split_once('?') {
            let (flags_field, bit) = cond
                .split_once('.')
                .ok_or_else(|| TlError::Schema(format!("bad conditional {s:?}")))?;
            let bit: u8 = bit
                .parse()
                .map_err(|_| TlError::Schema(format!("bad flag bit in {s:?}")))?;
            return Ok(FieldType::Conditional {
                flags_field: flags_field.to_string(),
                bit,
                inner: Box::new(FieldType::parse(inner)?),
            });
        }

        let s = s.trim();
        if let Some(inner) = s.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
            let inner = inner.trim();
            if let Some(item) = inner.strip_prefix("vector ") {
                return Ok(FieldType::Vector(Box::new(FieldType::parse(item)?)));
            }
            return FieldType::parse(inner);
        }

        Ok(match s {
            "#" | "nat" => FieldType::Nat,
            "int" => FieldType::Int,
            "long" => FieldType::Long,
            "int128" => FieldType::Int128,
            "int256" => FieldType::Int256,
            "bytes" => FieldType::Bytes,
            "string" => FieldType::String,
            "Bool" => FieldType::Bool,
            "true" => FieldType::True,
            other => FieldType::Named(other.to_string()),
        })
    }
}

/// Boxed when the last name segment starts uppercase (`PublicKey`,
/// `dht.Node`); bare otherwise (`tonNode.blockIdExt`).
fn is_boxed(name: &str) -> bool {
    name.rsplit('.')
        .next()
        .and_then(|segment| segment.chars().next())
        .is_some_and(|c| c.is_ascii_uppercase())
}

#[derive(Debug, Clone)]
struct Field {
    name: String,
    ty: FieldType,
}

/// One parsed declaration.
#[derive(Debug, Clone)]
pub struct Constructor {
    pub id: u32,
    pub name: String,
    pub result: String,
    fields: Vec<Field>,
}

impl Constructor {
    fn parse(line: &str) -> TlResult<Self> {
        let line = line.trim().trim_end_matches(';');
        let (lhs, result) = line
            .split_once('=')
            .ok_or_else(|| TlError::Schema(format!("no result type in {line:?}")))?;
        let result = result.trim().to_string();

        let mut tokens = tokenize(lhs);
        if tokens.is_empty() {
            return Err(TlError::Schema(format!("empty declaration {line:?}")));
        }
        let head = tokens.remove(0);
        let (name, pinned_id) = match head.split_once('#') {
            Some((name, id)) => {
                let id = u32::from_str_radix(id, 16)
                    .map_err(|_| TlError::Schema(format!("bad pinned id in {head:?}")))?;
                (name.to_string(), Some(id))
            }
            None => (head, None),
        };

        let mut fields = Vec::new();
        for token in &tokens {
            if token.starts_with('{') {
                // Type parameters don't reach the wire.
                continue;
            }
            let (field_name, ty) = token
                .split_once(':')
                .ok_or_else(|| TlError::Schema(format!("bad field {token:?}")))?;
            fields.push(Field {
                name: field_name.to_string(),
                ty: FieldType::parse(ty)?,
            });
        }

        let id = match pinned_id {
            Some(id) => id,
            None => {
                let mut canonical = name.clone();
                for token in &tokens {
                    canonical.push(' ');
                    canonical.push_str(token);
                }
                canonical.push_str(" = ");
                canonical.push_str(&result);
                tl_id(&canonical)
            }
        };

        Ok(Constructor {
            id,
            name,
            result,
            fields,
        })
    }
}

/// Splits a declaration head on whitespace, keeping parenthesized and
/// braced groups intact.
fn tokenize(s: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    for c in s.chars() {
        match c {
            '(' | '{' => {
                depth += 1;
                current.push(c);
            }
            ')' | '}' => {
                depth -= 1;
                current.push(c);
            }
            c if c.is_whitespace() && depth == 0 => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// The registry: constructors indexed by id, by full name and by result
/// class.
#[derive(Debug, Default)]
pub struct Schema {
    constructors: Vec<Constructor>,
    by_id: HashMap<u32, usize>,
    by_name: HashMap<String, usize>,
    by_result: HashMap<String, Vec<usize>>,
}

impl Schema {
    /// Parses `.tl` text. Comments, blank lines and section separators
    /// (`---types---`, `---functions---`) are skipped; functions register
    /// the same way as types.
    pub fn parse(text: &str) -> TlResult<Self> {
        let mut schema = Schema::default();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with("//") || line.starts_with("---") {
                continue;
            }
            schema.register(Constructor::parse(line)?)?;
        }
        Ok(schema)
    }

    pub fn register(&mut self, constructor: Constructor) -> TlResult<()> {
        if self.by_id.contains_key(&constructor.id) {
            return Err(TlError::Schema(format!(
                "duplicate constructor id {:08x} ({})",
                constructor.id, constructor.name
            )));
        }
        let index = self.constructors.len();
        self.by_id.insert(constructor.id, index);
        self.by_name.insert(constructor.name.clone(), index);
        self.by_result
            .entry(constructor.result.clone())
            .or_default()
            .push(index);
        self.constructors.push(constructor);
        Ok(())
    }

    pub fn by_name(&self, name: &str) -> Option<&Constructor> {
        self.by_name.get(name).map(|&i| &self.constructors[i])
    }

    pub fn by_id(&self, id: u32) -> Option<&Constructor> {
        self.by_id.get(&id).map(|&i| &self.constructors[i])
    }

    /// Every constructor producing the given result class.
    pub fn by_result(&self, result: &str) -> Vec<&Constructor> {
        self.by_result
            .get(result)
            .map(|indexes| indexes.iter().map(|&i| &self.constructors[i]).collect())
            .unwrap_or_default()
    }

    /// Encodes an object; `boxed` controls the leading constructor id.
    pub fn encode(&self, object: &Object, boxed: bool) -> TlResult<Vec<u8>> {
        let mut writer = TlWriter::new();
        self.encode_into(object, boxed, &mut writer)?;
        Ok(writer.into_bytes())
    }

    fn encode_into(&self, object: &Object, boxed: bool, writer: &mut TlWriter) -> TlResult<()> {
        let constructor = self
            .by_name(&object.name)
            .ok_or_else(|| TlError::Schema(format!("unknown constructor {:?}", object.name)))?;
        if boxed {
            writer.write_id(constructor.id);
        }

        let mut nats: HashMap<&str, u32> = HashMap::new();
        for field in &constructor.fields {
            let (ty, present) = match &field.ty {
                FieldType::Conditional {
                    flags_field,
                    bit,
                    inner,
                } => {
                    let flags = nats.get(flags_field.as_str()).ok_or_else(|| {
                        TlError::Schema(format!(
                            "conditional {} references unknown flags {}",
                            field.name, flags_field
                        ))
                    })?;
                    (inner.as_ref(), flags >> bit & 1 == 1)
                }
                ty => (ty, true),
            };
            if !present {
                continue;
            }
            let value = object.get(&field.name).ok_or_else(|| {
                TlError::Schema(format!("{}: missing field {}", object.name, field.name))
            })?;
            if let (FieldType::Nat, Value::Int(v)) = (ty, value) {
                nats.insert(field.name.as_str(), *v as u32);
            }
            self.encode_value(value, ty, writer)?;
        }
        Ok(())
    }

    fn encode_value(&self, value: &Value, ty: &FieldType, writer: &mut TlWriter) -> TlResult<()> {
        match (ty, value) {
            (FieldType::Nat, Value::Int(v)) => writer.write_u32(*v as u32),
            (FieldType::Int, Value::Int(v)) => writer.write_i32(*v as i32),
            (FieldType::Long, Value::Int(v)) => writer.write_i64(*v),
            (FieldType::Int128, Value::Int128(v)) => writer.write_int128(v),
            (FieldType::Int256, Value::Int256(v)) => writer.write_int256(v),
            (FieldType::Bytes, Value::Bytes(v)) => writer.write_bytes(v),
            (FieldType::String, Value::String(v)) => writer.write_string(v),
            (FieldType::Bool, Value::Bool(v)) => writer.write_bool(*v),
            (FieldType::True, Value::Bool(true)) => {}
            (FieldType::Vector(item_ty), Value::Vector(items)) => {
                writer.write_u32(items.len() as u32);
                for item in items {
                    self.encode_value(item, item_ty, writer)?;
                }
            }
            (FieldType::Named(name), Value::Object(object)) => {
                self.encode_into(object, is_boxed(name), writer)?;
            }
            (FieldType::Named(name), Value::Raw(id, payload)) if is_boxed(name) => {
                writer.write_id(*id);
                writer.write_raw(payload);
            }
            (ty, value) => {
                return Err(TlError::Schema(format!(
                    "value {value:?} does not fit field type {ty:?}"
                )))
            }
        }
        Ok(())
    }

    /// Decodes a boxed value. An id missing from the registry consumes
    /// the remaining payload as [`Value::Raw`].
    pub fn decode_boxed(&self, reader: &mut TlReader<'_>) -> TlResult<Value> {
        let id = reader.read_id()?;
        match self.by_id(id) {
            Some(constructor) => Ok(Value::Object(self.decode_fields(constructor, reader)?)),
            None => Ok(Value::Raw(id, reader.read_raw(reader.remaining())?.to_vec())),
        }
    }

    /// Decodes a bare value of a specific constructor.
    pub fn decode_bare(&self, name: &str, reader: &mut TlReader<'_>) -> TlResult<Object> {
        let constructor = self
            .by_name(name)
            .ok_or_else(|| TlError::Schema(format!("unknown constructor {name:?}")))?;
        self.decode_fields(constructor, reader)
    }

    fn decode_fields(
        &self,
        constructor: &Constructor,
        reader: &mut TlReader<'_>,
    ) -> TlResult<Object> {
        let mut object = Object::new(constructor.name.clone());
        let mut nats: HashMap<&str, u32> = HashMap::new();
        for field in &constructor.fields {
            let ty = match &field.ty {
                FieldType::Conditional {
                    flags_field,
                    bit,
                    inner,
                } => {
                    let flags = nats.get(flags_field.as_str()).ok_or_else(|| {
                        TlError::Schema(format!(
                            "conditional {} references unknown flags {}",
                            field.name, flags_field
                        ))
                    })?;
                    if flags >> bit & 1 == 0 {
                        continue;
                    }
                    inner.as_ref()
                }
                ty => ty,
            };
            let value = self.decode_value(ty, reader)?;
            if let (FieldType::Nat, Value::Int(v)) = (ty, &value) {
                nats.insert(field.name.as_str(), *v as u32);
            }
            object.fields.push((field.name.clone(), value));
        }
        Ok(object)
    }

    fn decode_value(&self, ty: &FieldType, reader: &mut TlReader<'_>) -> TlResult<Value> {
        Ok(match ty {
            FieldType::Nat => Value::Int(reader.read_u32()? as i64),
            FieldType::Int => Value::Int(reader.read_i32()? as i64),
            FieldType::Long => Value::Int(reader.read_i64()?),
            FieldType::Int128 => Value::Int128(reader.read_int128()?),
            FieldType::Int256 => Value::Int256(reader.read_int256()?),
            FieldType::Bytes => Value::Bytes(reader.read_bytes()?),
            FieldType::String => Value::String(reader.read_string()?),
            FieldType::Bool => Value::Bool(reader.read_bool()?),
            FieldType::True => Value::Bool(true),
            FieldType::Vector(item_ty) => {
                let count = reader.read_u32()? as usize;
                let mut items = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    items.push(self.decode_value(item_ty, reader)?);
                }
                Value::Vector(items)
            }
            FieldType::Named(name) => {
                if is_boxed(name) {
                    let id = reader.read_id()?;
                    let constructor = self
                        .by_id(id)
                        .ok_or(TlError::UnexpectedConstructor(id))?;
                    if &constructor.result != name {
                        return Err(TlError::Schema(format!(
                            "constructor {} produces {}, expected {}",
                            constructor.name, constructor.result, name
                        )));
                    }
                    Value::Object(self.decode_fields(constructor, reader)?)
                } else {
                    Value::Object(self.decode_bare(name, reader)?)
                }
            }
            FieldType::Conditional { .. } => {
                return Err(TlError::Schema("nested conditional".into()))
            }
        })
    }
}
