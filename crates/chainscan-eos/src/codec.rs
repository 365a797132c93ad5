//! EOSIO binary serialization primitives.
//!
//! Little-endian integers, LEB128 varints, base-32 account names, symbols and
//! assets. The reader decodes action payloads and packed transactions; the
//! writer packs the same shapes (used to build fixtures and raw actions).

use std::fmt;
use std::str::FromStr;

use chainscan_core::error::ScanError;
use thiserror::Error;

/// Errors raised while reading or writing EOSIO binary data.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Unexpected end of data: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },

    #[error("varint does not fit in 32 bits")]
    VarintOverflow,

    #[error("Invalid UTF-8 string")]
    InvalidUtf8,

    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    #[error("Invalid name '{0}'")]
    InvalidName(String),

    #[error("Invalid symbol '{0}'")]
    InvalidSymbol(String),

    #[error("Invalid asset '{0}'")]
    InvalidAsset(String),

    #[error("Unknown ABI type '{0}'")]
    UnknownType(String),

    #[error("Action '{0}' not declared in ABI")]
    UnknownAction(String),

    #[error("Type nesting too deep at '{0}'")]
    TooDeep(String),

    #[error("Unsupported compression '{0}'")]
    UnsupportedCompression(String),

    #[error("Action '{0}' has no serialized data")]
    MissingPayload(String),
}

impl From<CodecError> for ScanError {
    fn from(e: CodecError) -> Self {
        ScanError::Decode(e.to_string())
    }
}

/// Decode a hex string (with or without `0x`).
pub fn decode_hex(s: &str) -> Result<Vec<u8>, CodecError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(s).map_err(|e| CodecError::InvalidHex(e.to_string()))
}

// ─── Names ────────────────────────────────────────────────────────────────────

const NAME_CHARMAP: &[u8; 32] = b".12345abcdefghijklmnopqrstuvwxyz";

fn char_to_symbol(c: u8) -> Option<u64> {
    match c {
        b'a'..=b'z' => Some((c - b'a') as u64 + 6),
        b'1'..=b'5' => Some((c - b'1') as u64 + 1),
        b'.' => Some(0),
        _ => None,
    }
}

/// Encode an account name (`[.1-5a-z]{0,12}[.1-5a-j]?`) into its 64-bit form.
pub fn name_to_u64(name: &str) -> Result<u64, CodecError> {
    let bytes = name.as_bytes();
    if bytes.len() > 13 {
        return Err(CodecError::InvalidName(name.to_string()));
    }
    let mut value = 0u64;
    for (i, &c) in bytes.iter().enumerate() {
        let sym = char_to_symbol(c).ok_or_else(|| CodecError::InvalidName(name.to_string()))?;
        if i < 12 {
            value |= (sym & 0x1f) << (64 - 5 * (i + 1));
        } else {
            // 13th character only has 4 bits
            if sym > 0x0f {
                return Err(CodecError::InvalidName(name.to_string()));
            }
            value |= sym;
        }
    }
    Ok(value)
}

/// Decode a 64-bit account name.
pub fn u64_to_name(value: u64) -> String {
    let mut chars = [b'.'; 13];
    let mut tmp = value;
    for i in 0..13 {
        let (mask, shift) = if i == 0 { (0x0f, 4) } else { (0x1f, 5) };
        chars[12 - i] = NAME_CHARMAP[(tmp & mask) as usize];
        tmp >>= shift;
    }
    let end = chars.iter().rposition(|&c| c != b'.').map_or(0, |p| p + 1);
    String::from_utf8_lossy(&chars[..end]).into_owned()
}

// ─── Symbols & assets ─────────────────────────────────────────────────────────

/// Token symbol: precision plus an upper-case code of 1–7 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol {
    pub precision: u8,
    pub code: String,
}

impl Symbol {
    pub fn new(precision: u8, code: impl Into<String>) -> Result<Self, CodecError> {
        let code = code.into();
        if !valid_symbol_code(&code) || precision > 18 {
            return Err(CodecError::InvalidSymbol(code));
        }
        Ok(Self { precision, code })
    }

    fn from_u64(raw: u64) -> Result<Self, CodecError> {
        let precision = (raw & 0xff) as u8;
        let code = symbol_code_from_u64(raw >> 8);
        Self::new(precision, code)
    }

    fn to_u64(&self) -> u64 {
        symbol_code_to_u64(&self.code) << 8 | self.precision as u64
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.precision, self.code)
    }
}

fn valid_symbol_code(code: &str) -> bool {
    !code.is_empty() && code.len() <= 7 && code.bytes().all(|c| c.is_ascii_uppercase())
}

fn symbol_code_from_u64(mut raw: u64) -> String {
    let mut code = String::new();
    while raw & 0xff != 0 {
        code.push((raw & 0xff) as u8 as char);
        raw >>= 8;
    }
    code
}

fn symbol_code_to_u64(code: &str) -> u64 {
    code.bytes()
        .enumerate()
        .fold(0u64, |acc, (i, c)| acc | (c as u64) << (8 * i))
}

/// A token quantity such as `"10.0000 EOS"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Asset {
    /// Amount in the smallest unit (`10.0000` → `100000`).
    pub amount: i64,
    pub symbol: Symbol,
}

impl Asset {
    /// Decimal amount without the symbol, e.g. `"10.0000"`.
    pub fn amount_string(&self) -> String {
        let precision = self.symbol.precision as u32;
        let sign = if self.amount < 0 { "-" } else { "" };
        let abs = self.amount.unsigned_abs() as u128;
        if precision == 0 {
            return format!("{sign}{abs}");
        }
        let scale = 10u128.pow(precision);
        format!(
            "{sign}{}.{:0width$}",
            abs / scale,
            abs % scale,
            width = precision as usize
        )
    }

    pub fn decimals(&self) -> u8 {
        self.symbol.precision
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount_string(), self.symbol.code)
    }
}

impl FromStr for Asset {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CodecError::InvalidAsset(s.to_string());
        let (amount_str, code) = s.trim().split_once(' ').ok_or_else(invalid)?;
        let (negative, digits) = match amount_str.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, amount_str),
        };
        let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
        if int_part.is_empty() || !int_part.bytes().chain(frac_part.bytes()).all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let precision = u8::try_from(frac_part.len()).map_err(|_| invalid())?;
        let symbol = Symbol::new(precision, code.trim()).map_err(|_| invalid())?;
        let magnitude: i64 = format!("{int_part}{frac_part}").parse().map_err(|_| invalid())?;
        Ok(Asset {
            amount: if negative { -magnitude } else { magnitude },
            symbol,
        })
    }
}

// ─── Reader ───────────────────────────────────────────────────────────────────

/// Cursor over an EOSIO binary buffer.
pub struct BinaryReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BinaryReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::UnexpectedEof {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.read_bytes(N)?);
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64, CodecError> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    pub fn read_u128(&mut self) -> Result<u128, CodecError> {
        Ok(u128::from_le_bytes(self.read_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, CodecError> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }

    pub fn read_f64(&mut self) -> Result<f64, CodecError> {
        Ok(f64::from_le_bytes(self.read_array()?))
    }

    pub fn read_varuint32(&mut self) -> Result<u32, CodecError> {
        let mut value = 0u64;
        let mut shift = 0;
        loop {
            let b = self.read_u8()?;
            value |= ((b & 0x7f) as u64) << shift;
            if b & 0x80 == 0 {
                break;
            }
            shift += 7;
            if shift >= 35 {
                return Err(CodecError::VarintOverflow);
            }
        }
        u32::try_from(value).map_err(|_| CodecError::VarintOverflow)
    }

    pub fn read_varint32(&mut self) -> Result<i32, CodecError> {
        let raw = self.read_varuint32()?;
        // zig-zag
        Ok(((raw >> 1) as i32) ^ -((raw & 1) as i32))
    }

    /// Length-prefixed byte string.
    pub fn read_blob(&mut self) -> Result<&'a [u8], CodecError> {
        let len = self.read_varuint32()? as usize;
        self.read_bytes(len)
    }

    pub fn read_string(&mut self) -> Result<String, CodecError> {
        let bytes = self.read_blob()?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8)
    }

    pub fn read_name(&mut self) -> Result<String, CodecError> {
        Ok(u64_to_name(self.read_u64()?))
    }

    pub fn read_symbol(&mut self) -> Result<Symbol, CodecError> {
        Symbol::from_u64(self.read_u64()?)
    }

    pub fn read_asset(&mut self) -> Result<Asset, CodecError> {
        let amount = self.read_i64()?;
        let symbol = self.read_symbol()?;
        Ok(Asset { amount, symbol })
    }
}

// ─── Writer ───────────────────────────────────────────────────────────────────

/// Growable EOSIO binary buffer.
#[derive(Debug, Default)]
pub struct BinaryWriter {
    buf: Vec<u8>,
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn into_hex(self) -> String {
        hex::encode(self.buf)
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn write_u8(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }

    pub fn write_u16(&mut self, v: u16) -> &mut Self {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn write_u32(&mut self, v: u32) -> &mut Self {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn write_u64(&mut self, v: u64) -> &mut Self {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn write_i64(&mut self, v: i64) -> &mut Self {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn write_varuint32(&mut self, mut v: u32) -> &mut Self {
        loop {
            let mut b = (v & 0x7f) as u8;
            v >>= 7;
            if v != 0 {
                b |= 0x80;
            }
            self.buf.push(b);
            if v == 0 {
                break;
            }
        }
        self
    }

    pub fn write_blob(&mut self, bytes: &[u8]) -> &mut Self {
        self.write_varuint32(bytes.len() as u32);
        self.write_bytes(bytes)
    }

    pub fn write_string(&mut self, s: &str) -> &mut Self {
        self.write_blob(s.as_bytes())
    }

    pub fn write_name(&mut self, name: &str) -> Result<&mut Self, CodecError> {
        let v = name_to_u64(name)?;
        Ok(self.write_u64(v))
    }

    pub fn write_asset(&mut self, asset: &Asset) -> &mut Self {
        self.write_i64(asset.amount);
        self.write_u64(asset.symbol.to_u64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_roundtrip() {
        for name in ["eosio", "eosio.token", "alice", "hrt3arlcl354", "a", "", "zzzzzzzzzzzzj"] {
            let v = name_to_u64(name).unwrap();
            assert_eq!(u64_to_name(v), name, "name {name}");
        }
    }

    #[test]
    fn known_name_value() {
        // eosio = 0x5530ea0000000000
        assert_eq!(name_to_u64("eosio").unwrap(), 0x5530_ea00_0000_0000);
    }

    #[test]
    fn invalid_names_rejected() {
        assert!(name_to_u64("Alice").is_err());
        assert!(name_to_u64("alice6").is_err());
        assert!(name_to_u64("aaaaaaaaaaaaaz").is_err()); // 14 chars
        assert!(name_to_u64("aaaaaaaaaaaaz").is_err()); // 13th char > j
    }

    #[test]
    fn asset_parse_and_format() {
        let a: Asset = "10.0000 EOS".parse().unwrap();
        assert_eq!(a.amount, 100_000);
        assert_eq!(a.decimals(), 4);
        assert_eq!(a.symbol.code, "EOS");
        assert_eq!(a.amount_string(), "10.0000");
        assert_eq!(a.to_string(), "10.0000 EOS");

        let neg: Asset = "-0.5 ABC".parse().unwrap();
        assert_eq!(neg.amount, -5);
        assert_eq!(neg.to_string(), "-0.5 ABC");

        let whole: Asset = "42 TOK".parse().unwrap();
        assert_eq!(whole.decimals(), 0);
        assert_eq!(whole.amount_string(), "42");
    }

    #[test]
    fn asset_parse_rejects_garbage() {
        assert!("10.0000".parse::<Asset>().is_err());
        assert!("ten EOS".parse::<Asset>().is_err());
        assert!("1.0 eos".parse::<Asset>().is_err());
        assert!("1.0 TOOLONGSYM".parse::<Asset>().is_err());
    }

    #[test]
    fn asset_binary_roundtrip() {
        let a: Asset = "1.2345 EOS".parse().unwrap();
        let mut w = BinaryWriter::new();
        w.write_asset(&a);
        let bytes = w.into_bytes();
        assert_eq!(bytes.len(), 16);
        // symbol: precision byte then code
        assert_eq!(&bytes[8..12], &[4, b'E', b'O', b'S']);
        assert_eq!(BinaryReader::new(&bytes).read_asset().unwrap(), a);
    }

    #[test]
    fn varuint32_boundaries() {
        for v in [0u32, 1, 127, 128, 300, 16_384, u32::MAX] {
            let mut w = BinaryWriter::new();
            w.write_varuint32(v);
            let bytes = w.into_bytes();
            assert_eq!(BinaryReader::new(&bytes).read_varuint32().unwrap(), v);
        }
        assert_eq!(BinaryReader::new(&[0xff; 6]).read_varuint32(), Err(CodecError::VarintOverflow));
    }

    #[test]
    fn varint32_zigzag() {
        assert_eq!(BinaryReader::new(&[0x03]).read_varint32().unwrap(), -2);
        assert_eq!(BinaryReader::new(&[0x04]).read_varint32().unwrap(), 2);
    }

    #[test]
    fn eof_reports_sizes() {
        let mut r = BinaryReader::new(&[1, 2]);
        assert_eq!(
            r.read_u32(),
            Err(CodecError::UnexpectedEof {
                needed: 4,
                remaining: 2
            })
        );
    }

    #[test]
    fn hex_with_prefix() {
        assert_eq!(decode_hex("0x0a0b").unwrap(), vec![10, 11]);
        assert!(decode_hex("zz").is_err());
    }
}
