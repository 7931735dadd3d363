//! Just enough DER for key containers
//!
//! Reading is TLV-at-a-time over a borrowed slice: constructed values are
//! opened as nested readers instead of being parsed eagerly. Writing builds
//! definite-length encodings bottom-up.

use nom::{IResult, Parser};

use crate::algs::mp_normalize;
use crate::error::{KeyforgeError, Result};

pub(crate) mod tag {
    pub const INTEGER: u8 = 0x02;
    pub const BIT_STRING: u8 = 0x03;
    pub const OCTET_STRING: u8 = 0x04;
    pub const NULL: u8 = 0x05;
    pub const OID: u8 = 0x06;
    pub const SEQUENCE: u8 = 0x30;
    pub const CONTEXT_0: u8 = 0xa0;
    pub const CONTEXT_1: u8 = 0xa1;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Tlv<'a> {
    pub tag: u8,
    pub value: &'a [u8],
}

fn parse_tag(input: &[u8]) -> IResult<&[u8], u8> {
    nom::number::be_u8().parse(input)
}

fn parse_length(input: &[u8]) -> IResult<&[u8], usize> {
    let (input, n) = nom::number::be_u8().parse(input)?;
    if n & 0x80 == 0 {
        // short form: 0-127
        return Ok((input, n as usize));
    }
    // long form: low bits give the byte count of the length itself
    let count = (n & 0x7f) as usize;
    if count == 0 || count > 4 {
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            nom::error::ErrorKind::LengthValue,
        )));
    }
    let (input, bs) = nom::bytes::complete::take(count).parse(input)?;
    let length = bs.iter().fold(0usize, |n, &b| (n << 8) | b as usize);
    Ok((input, length))
}

fn parse_tlv(input: &[u8]) -> IResult<&[u8], Tlv<'_>> {
    let (input, tag) = parse_tag(input)?;
    let (input, length) = parse_length(input)?;
    let (input, value) = nom::bytes::complete::take(length).parse(input)?;
    Ok((input, Tlv { tag, value }))
}

/// Cursor over a run of sibling TLVs
#[derive(Debug, Clone)]
pub(crate) struct DerReader<'a> {
    rest: &'a [u8],
}

impl<'a> DerReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { rest: data }
    }

    pub fn is_empty(&self) -> bool {
        self.rest.is_empty()
    }

    pub fn peek_tag(&self) -> Option<u8> {
        self.rest.first().copied()
    }

    pub fn read_tlv(&mut self) -> Result<Tlv<'a>> {
        match parse_tlv(self.rest) {
            Ok((rest, tlv)) => {
                self.rest = rest;
                Ok(tlv)
            }
            Err(_) => Err(KeyforgeError::malformed(
                "der",
                format!("truncated or invalid element ({} bytes left)", self.rest.len()),
            )),
        }
    }

    /// Reads one element and checks its tag
    pub fn expect(&mut self, expected: u8) -> Result<&'a [u8]> {
        let tlv = self.read_tlv()?;
        if tlv.tag != expected {
            return Err(KeyforgeError::malformed(
                "der",
                format!("expected tag 0x{:02x}, found 0x{:02x}", expected, tlv.tag),
            ));
        }
        Ok(tlv.value)
    }

    pub fn read_sequence(&mut self) -> Result<DerReader<'a>> {
        Ok(DerReader::new(self.expect(tag::SEQUENCE)?))
    }

    /// Opens an explicit context tag such as `[0]`
    pub fn read_context(&mut self, context: u8) -> Result<DerReader<'a>> {
        Ok(DerReader::new(self.expect(context)?))
    }

    /// Unsigned integer in mpint-normalized form
    pub fn read_integer(&mut self) -> Result<Vec<u8>> {
        let value = self.expect(tag::INTEGER)?;
        if value.is_empty() {
            return Err(KeyforgeError::malformed("der", "empty INTEGER"));
        }
        Ok(mp_normalize(value))
    }

    /// Small non-negative integer such as a version field
    pub fn read_small_int(&mut self) -> Result<u32> {
        let value = self.expect(tag::INTEGER)?;
        if value.is_empty() || value.len() > 4 || value[0] & 0x80 != 0 {
            return Err(KeyforgeError::malformed("der", "version is not a small integer"));
        }
        Ok(value.iter().fold(0u32, |n, &b| (n << 8) | b as u32))
    }

    pub fn read_oid(&mut self) -> Result<&'a [u8]> {
        self.expect(tag::OID)
    }

    pub fn read_octet_string(&mut self) -> Result<&'a [u8]> {
        self.expect(tag::OCTET_STRING)
    }

    /// BIT STRING payload with the unused-bits octet removed
    pub fn read_bit_string(&mut self) -> Result<&'a [u8]> {
        let value = self.expect(tag::BIT_STRING)?;
        match value.split_first() {
            Some((0, bits)) => Ok(bits),
            _ => Err(KeyforgeError::malformed("der", "BIT STRING is not octet aligned")),
        }
    }
}

fn encode_length(len: usize, out: &mut Vec<u8>) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let bytes = (len as u32).to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count();
    out.push(0x80 | (4 - skip) as u8);
    out.extend_from_slice(&bytes[skip..]);
}

/// Append-only DER builder
#[derive(Debug, Default)]
pub(crate) struct DerWriter {
    buf: Vec<u8>,
}

impl DerWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_tlv(&mut self, tag: u8, value: &[u8]) {
        self.buf.push(tag);
        encode_length(value.len(), &mut self.buf);
        self.buf.extend_from_slice(value);
    }

    /// Unsigned big-endian magnitude as an INTEGER
    pub fn write_integer(&mut self, value: &[u8]) {
        let mut content = mp_normalize(value);
        if content.is_empty() {
            content.push(0);
        }
        self.write_tlv(tag::INTEGER, &content);
    }

    pub fn write_small_int(&mut self, value: u32) {
        self.write_integer(&value.to_be_bytes());
    }

    pub fn write_oid(&mut self, oid: &[u8]) {
        self.write_tlv(tag::OID, oid);
    }

    pub fn write_null(&mut self) {
        self.write_tlv(tag::NULL, &[]);
    }

    pub fn write_octet_string(&mut self, value: &[u8]) {
        self.write_tlv(tag::OCTET_STRING, value);
    }

    pub fn write_bit_string(&mut self, value: &[u8]) {
        let mut content = Vec::with_capacity(value.len() + 1);
        content.push(0);
        content.extend_from_slice(value);
        self.write_tlv(tag::BIT_STRING, &content);
    }

    /// Constructed value whose children are written by `build`
    pub fn write_constructed(&mut self, tag: u8, build: impl FnOnce(&mut DerWriter)) {
        let mut inner = DerWriter::new();
        build(&mut inner);
        self.write_tlv(tag, &inner.buf);
    }

    pub fn write_sequence(&mut self, build: impl FnOnce(&mut DerWriter)) {
        self.write_constructed(tag::SEQUENCE, build);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest(input, expected,
        case(vec![0x02], 0x02),
        case(vec![0x30, 0x01], 0x30),
        case(vec![0x82, 0x02, 0x10], 256 * 0x02 + 0x10),
        case(vec![0x83, 0x01, 0x00, 0x00], 256 * 256),
        case(vec![0x82, 0xff, 0xff], 256 * 0xff + 0xff),
    )]
    fn test_parse_length(input: Vec<u8>, expected: usize) {
        let (_, actual) = parse_length(&input).unwrap();
        assert_eq!(expected, actual);
    }

    #[rstest(len, case(0), case(0x7f), case(0x80), case(0x1234), case(0x012345))]
    fn test_length_encoding_is_read_back(len: usize) {
        let mut out = Vec::new();
        encode_length(len, &mut out);
        assert_eq!(parse_length(&out).unwrap().1, len);
    }

    #[test]
    fn test_sequence_of_integers() {
        let input = [0x30, 0x09, 0x02, 0x01, 0x07, 0x02, 0x01, 0x08, 0x02, 0x01, 0x09];
        let mut outer = DerReader::new(&input);
        let mut seq = outer.read_sequence().unwrap();
        assert!(outer.is_empty());
        assert_eq!(seq.read_integer().unwrap(), vec![0x07]);
        assert_eq!(seq.read_small_int().unwrap(), 8);
        assert_eq!(seq.read_integer().unwrap(), vec![0x09]);
        assert!(seq.is_empty());
    }

    #[test]
    fn test_integer_keeps_sign_padding() {
        let mut w = DerWriter::new();
        w.write_integer(&[0, 0, 0x80, 0x01]);
        w.write_integer(&[]);
        let bytes = w.into_bytes();
        assert_eq!(bytes, vec![0x02, 0x03, 0x00, 0x80, 0x01, 0x02, 0x01, 0x00]);

        let mut r = DerReader::new(&bytes);
        assert_eq!(r.read_integer().unwrap(), vec![0x00, 0x80, 0x01]);
    }

    #[test]
    fn test_wrong_tag_is_malformed() {
        let mut r = DerReader::new(&[0x04, 0x01, 0x00]);
        assert!(matches!(
            r.read_integer(),
            Err(KeyforgeError::Malformed { .. })
        ));
    }

    #[test]
    fn test_truncated_element() {
        let mut r = DerReader::new(&[0x30, 0x05, 0x02, 0x01]);
        assert!(r.read_sequence().is_err());
    }

    #[test]
    fn test_bit_string() {
        let mut w = DerWriter::new();
        w.write_sequence(|w| w.write_bit_string(&[0xde, 0xad]));
        let bytes = w.into_bytes();

        let mut r = DerReader::new(&bytes);
        let mut seq = r.read_sequence().unwrap();
        assert_eq!(seq.read_bit_string().unwrap(), &[0xde, 0xad]);
    }
}
