//! Contract ABI model and ABI-driven action decoding.
//!
//! An [`Abi`] deserializes from the `abi` field of `get_abi`. Decoding walks
//! the action's struct definition (bases first, then fields) and produces a
//! `serde_json::Value` shaped like nodeos' own `data` output.

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::codec::{BinaryReader, CodecError};

/// Alias chains and struct nesting beyond this are rejected.
const MAX_DEPTH: usize = 32;

/// Milliseconds between the unix epoch and the EOSIO block timestamp epoch (2000-01-01).
const BLOCK_TIMESTAMP_EPOCH_MS: i64 = 946_684_800_000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Abi {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub types: Vec<AbiTypeDef>,
    #[serde(default)]
    pub structs: Vec<AbiStruct>,
    #[serde(default)]
    pub actions: Vec<AbiAction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiTypeDef {
    pub new_type_name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiStruct {
    pub name: String,
    #[serde(default)]
    pub base: String,
    #[serde(default)]
    pub fields: Vec<AbiField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiField {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiAction {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub ricardian_contract: String,
}

impl Abi {
    /// Struct type carried by `action`.
    pub fn action_type(&self, action: &str) -> Option<&str> {
        self.actions
            .iter()
            .find(|a| a.name == action)
            .map(|a| a.type_name.as_str())
    }

    pub fn struct_def(&self, name: &str) -> Option<&AbiStruct> {
        self.structs.iter().find(|s| s.name == name)
    }

    /// Follow type aliases to the underlying type name.
    fn resolve_alias<'a>(&'a self, mut name: &'a str) -> Result<&'a str, CodecError> {
        for _ in 0..MAX_DEPTH {
            match self.types.iter().find(|t| t.new_type_name == name) {
                Some(def) => name = &def.type_name,
                None => return Ok(name),
            }
        }
        Err(CodecError::TooDeep(name.to_string()))
    }

    /// Decode serialized action arguments.
    pub fn decode_action(&self, action: &str, data: &[u8]) -> Result<Value, CodecError> {
        let type_name = self
            .action_type(action)
            .ok_or_else(|| CodecError::UnknownAction(action.to_string()))?;
        let mut reader = BinaryReader::new(data);
        self.decode_type(type_name, &mut reader, 0)
    }

    /// Decode one value of `type_name`.
    pub fn decode_type(
        &self,
        type_name: &str,
        r: &mut BinaryReader<'_>,
        depth: usize,
    ) -> Result<Value, CodecError> {
        if depth > MAX_DEPTH {
            return Err(CodecError::TooDeep(type_name.to_string()));
        }

        if let Some(inner) = type_name.strip_suffix("[]") {
            let len = r.read_varuint32()?;
            let items = (0..len)
                .map(|_| self.decode_type(inner, r, depth + 1))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Value::Array(items));
        }
        if let Some(inner) = type_name.strip_suffix('?') {
            return match r.read_u8()? {
                0 => Ok(Value::Null),
                _ => self.decode_type(inner, r, depth + 1),
            };
        }
        // binary extension: may be absent at the end of the payload
        if let Some(inner) = type_name.strip_suffix('$') {
            if r.is_empty() {
                return Ok(Value::Null);
            }
            return self.decode_type(inner, r, depth + 1);
        }

        let resolved = self.resolve_alias(type_name)?;
        if let Some(value) = decode_builtin(resolved, r)? {
            return Ok(value);
        }

        let def = self
            .struct_def(resolved)
            .ok_or_else(|| CodecError::UnknownType(resolved.to_string()))?;
        let mut map = Map::new();
        self.decode_struct(def, r, &mut map, depth + 1)?;
        Ok(Value::Object(map))
    }

    fn decode_struct(
        &self,
        def: &AbiStruct,
        r: &mut BinaryReader<'_>,
        out: &mut Map<String, Value>,
        depth: usize,
    ) -> Result<(), CodecError> {
        if depth > MAX_DEPTH {
            return Err(CodecError::TooDeep(def.name.clone()));
        }
        if !def.base.is_empty() {
            let base_name = self.resolve_alias(&def.base)?;
            let base = self
                .struct_def(base_name)
                .ok_or_else(|| CodecError::UnknownType(base_name.to_string()))?;
            self.decode_struct(base, r, out, depth + 1)?;
        }
        for field in &def.fields {
            let value = self.decode_type(&field.type_name, r, depth + 1)?;
            out.insert(field.name.clone(), value);
        }
        Ok(())
    }
}

/// Decode a built-in type, or `None` if `type_name` is not one.
fn decode_builtin(type_name: &str, r: &mut BinaryReader<'_>) -> Result<Option<Value>, CodecError> {
    let value = match type_name {
        "bool" => Value::Bool(r.read_u8()? != 0),
        "int8" => Value::from(r.read_u8()? as i8),
        "uint8" => Value::from(r.read_u8()?),
        "int16" => Value::from(r.read_u16()? as i16),
        "uint16" => Value::from(r.read_u16()?),
        "int32" => Value::from(r.read_u32()? as i32),
        "uint32" => Value::from(r.read_u32()?),
        "int64" => Value::from(r.read_i64()?),
        "uint64" => Value::from(r.read_u64()?),
        // 128-bit integers do not fit a JSON number
        "int128" => Value::String((r.read_u128()? as i128).to_string()),
        "uint128" => Value::String(r.read_u128()?.to_string()),
        "varuint32" => Value::from(r.read_varuint32()?),
        "varint32" => Value::from(r.read_varint32()?),
        "float32" => Value::from(r.read_f32()? as f64),
        "float64" => Value::from(r.read_f64()?),
        "name" => Value::String(r.read_name()?),
        "string" => Value::String(r.read_string()?),
        "bytes" => Value::String(hex::encode(r.read_blob()?)),
        "symbol" => Value::String(r.read_symbol()?.to_string()),
        "symbol_code" => {
            let raw = r.read_u64()?;
            let code: String = raw
                .to_le_bytes()
                .iter()
                .take_while(|&&b| b != 0)
                .map(|&b| b as char)
                .collect();
            Value::String(code)
        }
        "asset" => Value::String(r.read_asset()?.to_string()),
        "extended_asset" => {
            let quantity = r.read_asset()?.to_string();
            let contract = r.read_name()?;
            serde_json::json!({ "quantity": quantity, "contract": contract })
        }
        "checksum160" => Value::String(hex::encode(r.read_bytes(20)?)),
        "checksum256" => Value::String(hex::encode(r.read_bytes(32)?)),
        "checksum512" => Value::String(hex::encode(r.read_bytes(64)?)),
        // key/signature type byte followed by the raw key material
        "public_key" => Value::String(hex::encode(r.read_bytes(34)?)),
        "signature" => Value::String(hex::encode(r.read_bytes(66)?)),
        "time_point" => {
            let micros = r.read_i64()?;
            Value::String(format_millis(micros.div_euclid(1000)))
        }
        "time_point_sec" => {
            let secs = r.read_u32()? as i64;
            Value::String(
                Utc.timestamp_opt(secs, 0)
                    .single()
                    .map(|t| t.format("%Y-%m-%dT%H:%M:%S").to_string())
                    .unwrap_or_default(),
            )
        }
        "block_timestamp_type" => {
            let slot = r.read_u32()? as i64;
            Value::String(format_millis(slot * 500 + BLOCK_TIMESTAMP_EPOCH_MS))
        }
        _ => return Ok(None),
    };
    Ok(Some(value))
}

fn format_millis(ms: i64) -> String {
    Utc.timestamp_millis_opt(ms)
        .single()
        .map(|t| t.format("%Y-%m-%dT%H:%M:%S%.3f").to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Asset, BinaryWriter};

    fn token_abi() -> Abi {
        serde_json::from_str(
            r#"{
                "version": "eosio::abi/1.1",
                "types": [{ "new_type_name": "account_name", "type": "name" }],
                "structs": [
                    { "name": "transfer", "base": "", "fields": [
                        { "name": "from", "type": "account_name" },
                        { "name": "to", "type": "account_name" },
                        { "name": "quantity", "type": "asset" },
                        { "name": "memo", "type": "string" }
                    ]},
                    { "name": "header", "base": "", "fields": [
                        { "name": "owner", "type": "name" }
                    ]},
                    { "name": "batch", "base": "header", "fields": [
                        { "name": "amounts", "type": "uint64[]" },
                        { "name": "note", "type": "string?" },
                        { "name": "when", "type": "time_point_sec" },
                        { "name": "extra", "type": "uint32$" }
                    ]}
                ],
                "actions": [
                    { "name": "transfer", "type": "transfer", "ricardian_contract": "" },
                    { "name": "batch", "type": "batch", "ricardian_contract": "" }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn decodes_token_transfer() {
        let mut w = BinaryWriter::new();
        w.write_name("alice").unwrap();
        w.write_name("hrt3arlcl354").unwrap();
        w.write_asset(&"10.0000 EOS".parse::<Asset>().unwrap());
        w.write_string("hello");
        let data = w.into_bytes();

        let value = token_abi().decode_action("transfer", &data).unwrap();
        assert_eq!(value["from"], "alice");
        assert_eq!(value["to"], "hrt3arlcl354");
        assert_eq!(value["quantity"], "10.0000 EOS");
        assert_eq!(value["memo"], "hello");
    }

    #[test]
    fn decodes_base_arrays_optionals_and_extensions() {
        let mut w = BinaryWriter::new();
        w.write_name("bob").unwrap();
        w.write_varuint32(2).write_u64(7).write_u64(9);
        w.write_u8(0); // note absent
        w.write_u32(1_548_358_325);
        // no extension bytes
        let value = token_abi().decode_action("batch", &w.into_bytes()).unwrap();

        assert_eq!(value["owner"], "bob");
        assert_eq!(value["amounts"], serde_json::json!([7, 9]));
        assert!(value["note"].is_null());
        assert_eq!(value["when"], "2019-01-24T19:32:05");
        assert!(value["extra"].is_null());
    }

    #[test]
    fn unknown_action_is_rejected() {
        assert_eq!(
            token_abi().decode_action("issue", &[]),
            Err(CodecError::UnknownAction("issue".into()))
        );
    }

    #[test]
    fn unknown_field_type_is_rejected() {
        let mut abi = token_abi();
        abi.structs[1].fields[0].type_name = "mystery".into();
        let err = abi.decode_action("batch", &[0; 8]).unwrap_err();
        assert_eq!(err, CodecError::UnknownType("mystery".into()));
    }

    #[test]
    fn short_payload_is_rejected() {
        let err = token_abi().decode_action("transfer", &[0; 4]).unwrap_err();
        assert!(matches!(err, CodecError::UnexpectedEof { .. }));
    }

    #[test]
    fn alias_cycle_is_rejected() {
        let abi = Abi {
            types: vec![
                AbiTypeDef { new_type_name: "a".into(), type_name: "b".into() },
                AbiTypeDef { new_type_name: "b".into(), type_name: "a".into() },
            ],
            ..Default::default()
        };
        let err = abi.decode_type("a", &mut BinaryReader::new(&[]), 0).unwrap_err();
        assert!(matches!(err, CodecError::TooDeep(_)));
    }

    #[test]
    fn block_timestamp_epoch() {
        let mut w = BinaryWriter::new();
        w.write_u32(1);
        let bytes = w.into_bytes();
        let v = decode_builtin("block_timestamp_type", &mut BinaryReader::new(&bytes))
            .unwrap()
            .unwrap();
        assert_eq!(v, "2000-01-01T00:00:00.500");
    }
}
