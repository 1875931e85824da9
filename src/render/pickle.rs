//! Streaming writer for the pickle (protocol 2) replies graphite-web expects.
//!
//! Values are pushed onto the unpickler's stack and combined by opcodes, so
//! nothing needs to be length-prefixed up front and a reply can be written
//! while it is still being computed.

use std::io::{self, Write};

/// Complete pickle of `[]`, sent instead of an opened and closed list.
pub const EMPTY_LIST: &[u8] = b"\x80\x02].";

const PROTO: u8 = 0x80;
const EMPTY_LIST_OP: u8 = b']';
const EMPTY_DICT: u8 = b'}';
const BINUNICODE: u8 = b'X';
const BININT: u8 = b'J';
const LONG1: u8 = 0x8a;
const BINFLOAT: u8 = b'G';
const NONE: u8 = b'N';
const MARK: u8 = b'(';
const APPEND: u8 = b'a';
const APPENDS: u8 = b'e';
const SETITEM: u8 = b's';
const STOP: u8 = b'.';

/// Opcode-level sink driven by the reply encoder.
///
/// Every call maps to a fixed opcode sequence; see [`PickleWriter`].
pub trait WireWriter {
    /// Pushes an empty list
    fn list(&mut self) -> io::Result<()>;
    /// Pushes an empty dict
    fn dict(&mut self) -> io::Result<()>;
    /// Pushes a string
    fn string(&mut self, value: &str) -> io::Result<()>;
    /// Pushes an unsigned integer
    fn uint32(&mut self, value: u32) -> io::Result<()>;
    /// Appends a float to the list on top of the stack
    fn append_float64(&mut self, value: f64) -> io::Result<()>;
    /// Appends `count` nulls to the list on top of the stack
    fn append_nulls(&mut self, count: usize) -> io::Result<()>;
    /// Pops a key and a value into the dict below them
    fn set_item(&mut self) -> io::Result<()>;
    /// Pops a value into the list below it
    fn append(&mut self) -> io::Result<()>;
    /// Ends the stream
    fn stop(&mut self) -> io::Result<()>;
}

/// [`WireWriter`] producing pickle protocol 2
pub struct PickleWriter<W: Write> {
    w: W,
}

impl<W: Write> PickleWriter<W> {
    /// Writes the protocol header and returns the writer
    pub fn new(mut w: W) -> io::Result<Self> {
        w.write_all(&[PROTO, 2])?;
        Ok(Self { w })
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.w
    }

    pub fn into_inner(self) -> W {
        self.w
    }
}

impl<W: Write> WireWriter for PickleWriter<W> {
    fn list(&mut self) -> io::Result<()> {
        self.w.write_all(&[EMPTY_LIST_OP])
    }

    fn dict(&mut self) -> io::Result<()> {
        self.w.write_all(&[EMPTY_DICT])
    }

    fn string(&mut self, value: &str) -> io::Result<()> {
        let len = u32::try_from(value.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "string too long for pickle"))?;
        self.w.write_all(&[BINUNICODE])?;
        self.w.write_all(&len.to_le_bytes())?;
        self.w.write_all(value.as_bytes())
    }

    fn uint32(&mut self, value: u32) -> io::Result<()> {
        match i32::try_from(value) {
            Ok(v) => {
                self.w.write_all(&[BININT])?;
                self.w.write_all(&v.to_le_bytes())
            }
            Err(_) => {
                // Two's complement little endian; the extra zero byte keeps it positive.
                let b = value.to_le_bytes();
                self.w.write_all(&[LONG1, 5, b[0], b[1], b[2], b[3], 0])
            }
        }
    }

    fn append_float64(&mut self, value: f64) -> io::Result<()> {
        self.w.write_all(&[BINFLOAT])?;
        self.w.write_all(&value.to_be_bytes())?;
        self.w.write_all(&[APPEND])
    }

    fn append_nulls(&mut self, count: usize) -> io::Result<()> {
        match count {
            0 => Ok(()),
            1 => self.w.write_all(&[NONE, APPEND]),
            n => {
                self.w.write_all(&[MARK])?;
                for _ in 0..n {
                    self.w.write_all(&[NONE])?;
                }
                self.w.write_all(&[APPENDS])
            }
        }
    }

    fn set_item(&mut self) -> io::Result<()> {
        self.w.write_all(&[SETITEM])
    }

    fn append(&mut self) -> io::Result<()> {
        self.w.write_all(&[APPEND])
    }

    fn stop(&mut self) -> io::Result<()> {
        self.w.write_all(&[STOP])
    }
}
