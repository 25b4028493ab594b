//! Conversion between Ion binary and `serde_json::Value`.
//!
//! Ion is a superset of JSON, so the Ion-to-JSON direction is lossy:
//!
//! - typed nulls become `null`, sexps become arrays
//! - ints outside the 64-bit range and decimals that do not parse as JSON
//!   numbers become strings
//! - non-finite floats become `null`
//! - timestamps become their Ion text form
//! - blobs and clobs become standard base64 strings
//! - symbols and field names without text become `$<sid>`
//! - annotations are dropped

use base64::Engine;
use num_bigint::BigInt;
use serde_json::{Map, Number, Value};

use crate::error::IonResult;
use crate::reader::BinaryReader;
use crate::types::{IntegerSize, IonType, SymbolToken};
use crate::writer::BinaryWriter;

fn symbol_text(token: SymbolToken) -> String {
    match (token.text, token.sid) {
        (Some(text), _) => text,
        (None, Some(sid)) => format!("${}", sid),
        (None, None) => String::new(),
    }
}

/// Converts the value the reader is positioned on, stepping through containers.
pub fn reader_to_json(reader: &mut BinaryReader<'_>) -> IonResult<Value> {
    let Some(ion_type) = reader.current_type() else {
        return Ok(Value::Null);
    };
    if reader.current_is_null() {
        return Ok(Value::Null);
    }
    Ok(match ion_type {
        IonType::Null => Value::Null,
        IonType::Bool => Value::Bool(reader.bool_value()?),
        IonType::Int => match reader.integer_size()? {
            IntegerSize::BigInteger => big_int_to_json(reader.big_integer_value()?),
            _ => Value::Number(Number::from(reader.long_value()?)),
        },
        IonType::Float => Number::from_f64(reader.double_value()?).map_or(Value::Null, Value::Number),
        IonType::Decimal => {
            let text = reader.decimal_value()?.to_string();
            match text.parse::<Number>() {
                Ok(n) => Value::Number(n),
                Err(_) => Value::String(text),
            }
        }
        IonType::Timestamp => Value::String(reader.timestamp_value()?.to_string()),
        IonType::Symbol => Value::String(symbol_text(reader.symbol_value()?)),
        IonType::String => Value::String(reader.string_value()?.to_owned()),
        IonType::Clob | IonType::Blob => {
            Value::String(base64::engine::general_purpose::STANDARD.encode(reader.lob_bytes()?))
        }
        IonType::List | IonType::Sexp => {
            let mut out = Vec::new();
            reader.step_in()?;
            while reader.move_next()?.is_some() {
                out.push(reader_to_json(reader)?);
            }
            reader.step_out()?;
            Value::Array(out)
        }
        IonType::Struct => {
            let mut out = Map::new();
            reader.step_in()?;
            while reader.move_next()?.is_some() {
                let key = reader
                    .current_field_name_symbol()
                    .map(symbol_text)
                    .unwrap_or_default();
                let value = reader_to_json(reader)?;
                out.insert(key, value);
            }
            reader.step_out()?;
            Value::Object(out)
        }
    })
}

fn big_int_to_json(value: BigInt) -> Value {
    match u64::try_from(&value) {
        Ok(u) => Value::Number(Number::from(u)),
        Err(_) => Value::String(value.to_string()),
    }
}

/// Converts every top-level user value of a datagram.
pub fn decode_json_from_ion_bytes(data: &[u8]) -> IonResult<Vec<Value>> {
    let mut reader = BinaryReader::new(data)?;
    let mut out = Vec::new();
    while reader.move_next()?.is_some() {
        out.push(reader_to_json(&mut reader)?);
    }
    Ok(out)
}

/// Writes `value` at the writer's current position.
pub fn write_json(writer: &mut BinaryWriter, value: &Value) -> IonResult<()> {
    match value {
        Value::Null => writer.write_null(),
        Value::Bool(b) => writer.write_bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                writer.write_int(i)
            } else if let Some(u) = n.as_u64() {
                writer.write_big_int(&BigInt::from(u))
            } else {
                writer.write_float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => writer.write_string(s),
        Value::Array(items) => {
            writer.step_in(IonType::List)?;
            for item in items {
                write_json(writer, item)?;
            }
            writer.step_out()
        }
        Value::Object(map) => {
            writer.step_in(IonType::Struct)?;
            for (key, item) in map {
                writer.set_field_name(key)?;
                write_json(writer, item)?;
            }
            writer.step_out()
        }
    }
}

/// Encodes one JSON value as a complete Ion binary datagram.
pub fn encode_json_to_ion_bytes(value: &Value) -> IonResult<Vec<u8>> {
    let mut writer = BinaryWriter::new();
    write_json(&mut writer, value)?;
    let mut out = Vec::new();
    writer.finish(&mut out)?;
    Ok(out)
}
