//! Common test utilities and fixtures.

#![allow(dead_code)]

use std::io::{self, Write};
use tickwise_lib::rollup::{AggregationRegistry, RuleSet};

/// Two-tier pattern for `metric.*`, two overlapping `servers.*` patterns and
/// a three-tier default
pub const ROLLUP_XML: &str = r"
<graphite_rollup>
    <pattern>
        <regexp>^metric\.</regexp>
        <function>any</function>
        <retention><age>0</age><precision>1</precision></retention>
        <retention><age>3600</age><precision>10</precision></retention>
    </pattern>
    <pattern>
        <regexp>^servers\.</regexp>
        <function>sum</function>
        <retention><age>0</age><precision>60</precision></retention>
    </pattern>
    <pattern>
        <regexp>^servers\.db</regexp>
        <function>max</function>
        <retention><age>0</age><precision>5</precision></retention>
    </pattern>
    <default>
        <function>max</function>
        <retention><age>0</age><precision>60</precision></retention>
        <retention><age>3600</age><precision>300</precision></retention>
        <retention><age>86400</age><precision>3600</precision></retention>
    </default>
</graphite_rollup>
";

/// The same rules inside a ClickHouse server configuration
pub fn wrapped_rollup_xml() -> String {
    format!("<yandex>{}</yandex>", ROLLUP_XML)
}

pub fn rules() -> RuleSet {
    RuleSet::from_xml(ROLLUP_XML.as_bytes(), &AggregationRegistry::standard()).unwrap()
}

/// Decoded pickle value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Dict(Vec<(Value, Value)>),
}

impl Value {
    pub fn as_list(&self) -> &[Value] {
        match self {
            Value::List(items) => items,
            other => panic!("expected list, got {:?}", other),
        }
    }

    /// Looks up a string key of a dict
    pub fn get(&self, key: &str) -> &Value {
        match self {
            Value::Dict(items) => items
                .iter()
                .find(|(k, _)| *k == Value::Str(key.to_string()))
                .map(|(_, v)| v)
                .unwrap_or_else(|| panic!("missing key {}", key)),
            other => panic!("expected dict, got {:?}", other),
        }
    }

    /// Keys of a dict in insertion order
    pub fn keys(&self) -> Vec<String> {
        match self {
            Value::Dict(items) => items
                .iter()
                .map(|(k, _)| match k {
                    Value::Str(s) => s.clone(),
                    other => panic!("non-string key {:?}", other),
                })
                .collect(),
            other => panic!("expected dict, got {:?}", other),
        }
    }

    pub fn as_values(&self) -> Vec<Option<f64>> {
        self.as_list()
            .iter()
            .map(|v| match v {
                Value::None => None,
                Value::Float(f) => Some(*f),
                other => panic!("unexpected series value {:?}", other),
            })
            .collect()
    }
}

enum Item {
    Mark,
    Value(Value),
}

fn take<'a>(bytes: &'a [u8], pos: &mut usize, n: usize) -> Result<&'a [u8], String> {
    let chunk = bytes
        .get(*pos..*pos + n)
        .ok_or_else(|| format!("truncated at byte {}", *pos))?;
    *pos += n;
    Ok(chunk)
}

fn pop_value(stack: &mut Vec<Item>) -> Result<Value, String> {
    match stack.pop() {
        Some(Item::Value(v)) => Ok(v),
        Some(Item::Mark) => Err("unexpected mark".into()),
        None => Err("stack underflow".into()),
    }
}

/// Minimal protocol 2 unpickler covering the opcodes replies use
pub fn decode(bytes: &[u8]) -> Result<Value, String> {
    if bytes.get(..2) != Some(&[0x80, 0x02][..]) {
        return Err("missing protocol header".into());
    }

    let mut pos = 2;
    let mut stack: Vec<Item> = Vec::new();

    loop {
        let op = take(bytes, &mut pos, 1)?[0];
        match op {
            b']' => stack.push(Item::Value(Value::List(Vec::new()))),
            b'}' => stack.push(Item::Value(Value::Dict(Vec::new()))),
            b'N' => stack.push(Item::Value(Value::None)),
            b'(' => stack.push(Item::Mark),
            b'X' => {
                let raw = take(bytes, &mut pos, 4)?;
                let len = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize;
                let s = std::str::from_utf8(take(bytes, &mut pos, len)?)
                    .map_err(|e| e.to_string())?;
                stack.push(Item::Value(Value::Str(s.to_string())));
            }
            b'J' => {
                let raw = take(bytes, &mut pos, 4)?;
                let v = i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
                stack.push(Item::Value(Value::Int(i64::from(v))));
            }
            0x8a => {
                let n = take(bytes, &mut pos, 1)?[0] as usize;
                let raw = take(bytes, &mut pos, n)?;
                let mut buf = [0u8; 8];
                let n = n.min(8);
                buf[..n].copy_from_slice(&raw[..n]);
                stack.push(Item::Value(Value::Int(i64::from_le_bytes(buf))));
            }
            b'G' => {
                let raw = take(bytes, &mut pos, 8)?;
                let mut buf = [0u8; 8];
                buf.copy_from_slice(raw);
                stack.push(Item::Value(Value::Float(f64::from_be_bytes(buf))));
            }
            b'a' => {
                let value = pop_value(&mut stack)?;
                match stack.last_mut() {
                    Some(Item::Value(Value::List(items))) => items.push(value),
                    _ => return Err("append without list".into()),
                }
            }
            b'e' => {
                let mut values = Vec::new();
                loop {
                    match stack.pop() {
                        Some(Item::Mark) => break,
                        Some(Item::Value(v)) => values.push(v),
                        None => return Err("appends without mark".into()),
                    }
                }
                values.reverse();
                match stack.last_mut() {
                    Some(Item::Value(Value::List(items))) => items.extend(values),
                    _ => return Err("appends without list".into()),
                }
            }
            b's' => {
                let value = pop_value(&mut stack)?;
                let key = pop_value(&mut stack)?;
                match stack.last_mut() {
                    Some(Item::Value(Value::Dict(items))) => items.push((key, value)),
                    _ => return Err("setitem without dict".into()),
                }
            }
            b'.' => {
                let value = pop_value(&mut stack)?;
                if pos != bytes.len() {
                    return Err("trailing bytes after stop".into());
                }
                return Ok(value);
            }
            other => return Err(format!("unknown opcode {:#x}", other)),
        }
    }
}

/// Sink accepting `limit` bytes before every write fails
pub struct FailingSink {
    pub written: Vec<u8>,
    limit: usize,
}

impl FailingSink {
    pub fn new(limit: usize) -> Self {
        Self {
            written: Vec::new(),
            limit,
        }
    }
}

impl Write for FailingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let room = self.limit - self.written.len();
        if room == 0 {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "client went away"));
        }
        let n = buf.len().min(room);
        self.written.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
