//! Binary stream codec for result records.
//!
//! Primitives follow the results wire format shared with the job engine:
//!
//! - vint: unsigned, 7 bits per byte, low group first, high bit marks continuation
//! - string: vint count of UTF-16 code units, each unit as 1, 2 or 3 bytes
//! - double: IEEE-754 bit pattern, 8 bytes big-endian
//! - bool: a single `0` or `1` byte
//!
//! There is no framing or version tag; a reader must know what it expects next.

use std::io::{Read, Write};

use crate::error::ResultsError;

/// Largest number of bytes a 32-bit vint may occupy.
const MAX_VINT_BYTES: usize = 5;

/// Cap on up-front allocation driven by a length read off the wire.
const MAX_PREALLOC: usize = 1024;

/// A type that can write itself to a [`StreamOutput`].
pub trait Writeable {
    fn write_to<W: Write>(&self, out: &mut StreamOutput<W>) -> Result<(), ResultsError>;
}

/// A type that can be reconstructed from a [`StreamInput`].
pub trait Readable: Sized {
    fn read_from<R: Read>(input: &mut StreamInput<R>) -> Result<Self, ResultsError>;
}

pub struct StreamOutput<W> {
    inner: W,
}

impl<W: Write> StreamOutput<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn write_byte(&mut self, b: u8) -> Result<(), ResultsError> {
        self.inner.write_all(&[b])?;
        Ok(())
    }

    pub fn write_vint(&mut self, mut v: u32) -> Result<(), ResultsError> {
        let mut buf = [0u8; MAX_VINT_BYTES];
        let mut len = 0;
        while v & !0x7F != 0 {
            buf[len] = (v & 0x7F) as u8 | 0x80;
            v >>= 7;
            len += 1;
        }
        buf[len] = v as u8;
        self.inner.write_all(&buf[..=len])?;
        Ok(())
    }

    pub fn write_string(&mut self, s: &str) -> Result<(), ResultsError> {
        let units: Vec<u16> = s.encode_utf16().collect();
        let count = u32::try_from(units.len())
            .map_err(|_| ResultsError::InvalidString(format!("{} code units", units.len())))?;
        self.write_vint(count)?;

        let mut buf = Vec::with_capacity(units.len().min(MAX_PREALLOC) * 3);
        for c in units {
            if c <= 0x007F {
                buf.push(c as u8);
            } else if c > 0x07FF {
                buf.push(0xE0 | ((c >> 12) & 0x0F) as u8);
                buf.push(0x80 | ((c >> 6) & 0x3F) as u8);
                buf.push(0x80 | (c & 0x3F) as u8);
            } else {
                buf.push(0xC0 | ((c >> 6) & 0x1F) as u8);
                buf.push(0x80 | (c & 0x3F) as u8);
            }
        }
        self.inner.write_all(&buf)?;
        Ok(())
    }

    pub fn write_double(&mut self, v: f64) -> Result<(), ResultsError> {
        self.inner.write_all(&v.to_bits().to_be_bytes())?;
        Ok(())
    }

    pub fn write_bool(&mut self, v: bool) -> Result<(), ResultsError> {
        self.write_byte(u8::from(v))
    }

    /// Write a vint element count followed by each element.
    pub fn write_list<T: Writeable>(&mut self, items: &[T]) -> Result<(), ResultsError> {
        self.write_vint(list_len(items.len())?)?;
        for item in items {
            item.write_to(self)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), ResultsError> {
        self.inner.flush()?;
        Ok(())
    }
}

fn list_len(len: usize) -> Result<u32, ResultsError> {
    u32::try_from(len).map_err(|_| ResultsError::ListTooLong(len))
}

pub struct StreamInput<R> {
    inner: R,
}

impl<R: Read> StreamInput<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    pub fn read_byte(&mut self) -> Result<u8, ResultsError> {
        let mut b = [0u8; 1];
        self.inner.read_exact(&mut b).map_err(ResultsError::from_read)?;
        Ok(b[0])
    }

    pub fn read_vint(&mut self) -> Result<u32, ResultsError> {
        let mut value: u32 = 0;
        for i in 0..MAX_VINT_BYTES {
            let b = self.read_byte()?;
            let shift = 7 * i as u32;
            if i == MAX_VINT_BYTES - 1 && b > 0x0F {
                return Err(ResultsError::MalformedVInt);
            }
            value |= u32::from(b & 0x7F) << shift;
            if b & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(ResultsError::MalformedVInt)
    }

    pub fn read_string(&mut self) -> Result<String, ResultsError> {
        let count = self.read_vint()? as usize;
        let mut units = Vec::with_capacity(count.min(MAX_PREALLOC));
        for _ in 0..count {
            let b = self.read_byte()?;
            let unit = match b >> 4 {
                0..=7 => u16::from(b),
                12 | 13 => {
                    let b2 = self.read_byte()?;
                    (u16::from(b & 0x1F) << 6) | u16::from(b2 & 0x3F)
                }
                14 => {
                    let b2 = self.read_byte()?;
                    let b3 = self.read_byte()?;
                    (u16::from(b & 0x0F) << 12) | (u16::from(b2 & 0x3F) << 6) | u16::from(b3 & 0x3F)
                }
                _ => {
                    return Err(ResultsError::InvalidString(format!(
                        "unexpected lead byte 0x{b:02x}"
                    )));
                }
            };
            units.push(unit);
        }
        String::from_utf16(&units).map_err(|e| ResultsError::InvalidString(e.to_string()))
    }

    pub fn read_double(&mut self) -> Result<f64, ResultsError> {
        let mut b = [0u8; 8];
        self.inner.read_exact(&mut b).map_err(ResultsError::from_read)?;
        Ok(f64::from_bits(u64::from_be_bytes(b)))
    }

    pub fn read_bool(&mut self) -> Result<bool, ResultsError> {
        match self.read_byte()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(ResultsError::InvalidBool(other)),
        }
    }

    /// Read a vint element count followed by that many elements.
    pub fn read_list<T: Readable>(&mut self) -> Result<Vec<T>, ResultsError> {
        let count = self.read_vint()? as usize;
        let mut items = Vec::with_capacity(count.min(MAX_PREALLOC));
        for _ in 0..count {
            items.push(T::read_from(self)?);
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn written(f: impl FnOnce(&mut StreamOutput<Vec<u8>>) -> Result<(), ResultsError>) -> Vec<u8> {
        let mut out = StreamOutput::new(Vec::new());
        f(&mut out).unwrap();
        out.into_inner()
    }

    #[test]
    fn vint_byte_layout() {
        assert_eq!(written(|o| o.write_vint(0)), vec![0x00]);
        assert_eq!(written(|o| o.write_vint(127)), vec![0x7F]);
        assert_eq!(written(|o| o.write_vint(128)), vec![0x80, 0x01]);
        assert_eq!(written(|o| o.write_vint(300)), vec![0xAC, 0x02]);
        assert_eq!(
            written(|o| o.write_vint(u32::MAX)),
            vec![0xFF, 0xFF, 0xFF, 0xFF, 0x0F]
        );
    }

    #[test]
    fn vint_reads_back_boundaries() {
        for v in [0, 1, 127, 128, 16_383, 16_384, 1 << 28, u32::MAX] {
            let bytes = written(|o| o.write_vint(v));
            let mut input = StreamInput::new(bytes.as_slice());
            assert_eq!(input.read_vint().unwrap(), v);
        }
    }

    #[test]
    fn vint_too_long_is_rejected() {
        let bytes = [0xFF, 0xFF, 0xFF, 0xFF, 0x1F];
        let mut input = StreamInput::new(&bytes[..]);
        assert!(matches!(input.read_vint(), Err(ResultsError::MalformedVInt)));
    }

    #[test]
    fn double_is_big_endian() {
        assert_eq!(
            written(|o| o.write_double(1.0)),
            vec![0x3F, 0xF0, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn ascii_string_layout() {
        assert_eq!(
            written(|o| o.write_string("host")),
            vec![4, b'h', b'o', b's', b't']
        );
    }

    #[test]
    fn multibyte_string_layout() {
        // "é" is one code unit, two bytes; "€" is one code unit, three bytes.
        assert_eq!(
            written(|o| o.write_string("é€")),
            vec![2, 0xC3, 0xA9, 0xE2, 0x82, 0xAC]
        );
    }

    #[test]
    fn supplementary_chars_are_written_as_surrogate_pairs() {
        let bytes = written(|o| o.write_string("😀"));
        // Count is in UTF-16 units, each surrogate takes three bytes.
        assert_eq!(bytes[0], 2);
        assert_eq!(bytes.len(), 1 + 6);

        let mut input = StreamInput::new(bytes.as_slice());
        assert_eq!(input.read_string().unwrap(), "😀");
    }

    #[test]
    fn unpaired_surrogate_is_rejected() {
        // Lone high surrogate U+D83D.
        let bytes = [1, 0xED, 0xA0, 0xBD];
        let mut input = StreamInput::new(&bytes[..]);
        assert!(matches!(
            input.read_string(),
            Err(ResultsError::InvalidString(_))
        ));
    }

    #[test]
    fn invalid_lead_byte_is_rejected() {
        let bytes = [1, 0xF0];
        let mut input = StreamInput::new(&bytes[..]);
        assert!(matches!(
            input.read_string(),
            Err(ResultsError::InvalidString(_))
        ));
    }

    #[test]
    fn short_string_is_eof() {
        let bytes = [5, b'a', b'b'];
        let mut input = StreamInput::new(&bytes[..]);
        assert!(matches!(input.read_string(), Err(ResultsError::UnexpectedEof)));
    }

    #[test]
    fn bool_accepts_only_zero_and_one() {
        let bytes = [0, 1, 2];
        let mut input = StreamInput::new(&bytes[..]);
        assert!(!input.read_bool().unwrap());
        assert!(input.read_bool().unwrap());
        assert!(matches!(input.read_bool(), Err(ResultsError::InvalidBool(2))));
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn oversized_list_is_an_encode_error() {
        assert_eq!(list_len(u32::MAX as usize).unwrap(), u32::MAX);
        let too_long = u32::MAX as usize + 1;
        assert!(matches!(
            list_len(too_long),
            Err(ResultsError::ListTooLong(n)) if n == too_long
        ));
    }

    #[test]
    fn flush_reaches_the_inner_writer() {
        let mut out = StreamOutput::new(std::io::BufWriter::new(Vec::new()));
        out.write_string("host").unwrap();
        out.flush().unwrap();
        let inner = out.into_inner();
        assert!(inner.buffer().is_empty());
        assert_eq!(inner.get_ref(), &vec![4, b'h', b'o', b's', b't']);
    }

    #[test]
    fn short_double_is_eof() {
        let bytes = [0x3F, 0xF0, 0];
        let mut input = StreamInput::new(&bytes[..]);
        assert!(matches!(input.read_double(), Err(ResultsError::UnexpectedEof)));
    }
}
