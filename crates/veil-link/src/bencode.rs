//! Minimal bencode reader and writer for the link wire messages.
//!
//! Only what the link intro and discard messages need: integers, byte
//! strings, lists, and dictionaries. Values decode as borrowed views into
//! the input buffer; dictionary keys are kept in received order.

use crate::error::DecodeError;

/// A decoded bencode value borrowing from the input buffer.
#[derive(Debug, PartialEq, Eq)]
pub enum Value<'a> {
    /// `i<digits>e`
    Int(i64),
    /// `<len>:<bytes>`
    Bytes(&'a [u8]),
    /// `l ... e`
    List(Vec<Value<'a>>),
    /// `d ... e`, keys in wire order
    Dict(Vec<(&'a [u8], Value<'a>)>),
}

impl<'a> Value<'a> {
    /// Decode one value occupying the whole buffer.
    pub fn decode(buf: &'a [u8]) -> Result<Value<'a>, DecodeError> {
        let (value, used) = Self::decode_prefix(buf)?;
        if used != buf.len() {
            return Err(DecodeError::UnexpectedByte(buf[used]));
        }
        Ok(value)
    }

    /// Decode one value from the front of the buffer, returning the value
    /// and the number of bytes consumed.
    pub fn decode_prefix(buf: &'a [u8]) -> Result<(Value<'a>, usize), DecodeError> {
        let mut pos = 0usize;
        let value = parse(buf, &mut pos)?;
        Ok((value, pos))
    }

    /// The integer value, if this is an `Int`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The byte string, if this is `Bytes`.
    pub fn as_bytes(&self) -> Option<&'a [u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// The entries, if this is a `List`.
    pub fn as_list(&self) -> Option<&[Value<'a>]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a dictionary key.
    pub fn dict_get(&self, key: &[u8]) -> Option<&Value<'a>> {
        match self {
            Value::Dict(entries) => entries.iter().find(|(k, _)| *k == key).map(|(_, v)| v),
            _ => None,
        }
    }
}

fn parse<'a>(buf: &'a [u8], pos: &mut usize) -> Result<Value<'a>, DecodeError> {
    match buf.get(*pos) {
        None => Err(DecodeError::Truncated),
        Some(b'i') => {
            *pos += 1;
            let v = parse_int(buf, pos, b'e')?;
            Ok(Value::Int(v))
        }
        Some(b'0'..=b'9') => {
            let len = parse_int(buf, pos, b':')?;
            let len = usize::try_from(len).map_err(|_| DecodeError::BadLength)?;
            let end = pos.checked_add(len).ok_or(DecodeError::BadLength)?;
            if end > buf.len() {
                return Err(DecodeError::Truncated);
            }
            let bytes = &buf[*pos..end];
            *pos = end;
            Ok(Value::Bytes(bytes))
        }
        Some(b'l') => {
            *pos += 1;
            let mut items = Vec::new();
            loop {
                match buf.get(*pos) {
                    None => return Err(DecodeError::Truncated),
                    Some(b'e') => {
                        *pos += 1;
                        return Ok(Value::List(items));
                    }
                    Some(_) => items.push(parse(buf, pos)?),
                }
            }
        }
        Some(b'd') => {
            *pos += 1;
            let mut entries = Vec::new();
            loop {
                match buf.get(*pos) {
                    None => return Err(DecodeError::Truncated),
                    Some(b'e') => {
                        *pos += 1;
                        return Ok(Value::Dict(entries));
                    }
                    Some(b'0'..=b'9') => {
                        let key = match parse(buf, pos)? {
                            Value::Bytes(k) => k,
                            _ => unreachable!("digit prefix always parses to bytes"),
                        };
                        let value = parse(buf, pos)?;
                        entries.push((key, value));
                    }
                    Some(&other) => return Err(DecodeError::UnexpectedByte(other)),
                }
            }
        }
        Some(&other) => Err(DecodeError::UnexpectedByte(other)),
    }
}

fn parse_int(buf: &[u8], pos: &mut usize, terminator: u8) -> Result<i64, DecodeError> {
    let mut value: i64 = 0;
    let mut negative = false;
    let mut digits = 0usize;
    if buf.get(*pos) == Some(&b'-') {
        negative = true;
        *pos += 1;
    }
    loop {
        match buf.get(*pos) {
            None => return Err(DecodeError::Truncated),
            Some(&b) if b == terminator => {
                *pos += 1;
                if digits == 0 {
                    return Err(DecodeError::BadLength);
                }
                return Ok(if negative { -value } else { value });
            }
            Some(&b @ b'0'..=b'9') => {
                value = value
                    .checked_mul(10)
                    .and_then(|v| v.checked_add(i64::from(b - b'0')))
                    .ok_or(DecodeError::BadLength)?;
                digits += 1;
                *pos += 1;
            }
            Some(&other) => return Err(DecodeError::UnexpectedByte(other)),
        }
    }
}

/// Append an integer.
pub fn put_int(out: &mut Vec<u8>, v: i64) {
    out.push(b'i');
    out.extend_from_slice(v.to_string().as_bytes());
    out.push(b'e');
}

/// Append a byte string.
pub fn put_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(bytes.len().to_string().as_bytes());
    out.push(b':');
    out.extend_from_slice(bytes);
}

/// Open a dictionary. Callers must write keys in sorted order and finish
/// with [`end`].
pub fn begin_dict(out: &mut Vec<u8>) {
    out.push(b'd');
}

/// Open a list. Finish with [`end`].
pub fn begin_list(out: &mut Vec<u8>) {
    out.push(b'l');
}

/// Close the innermost open dictionary or list.
pub fn end(out: &mut Vec<u8>) {
    out.push(b'e');
}
