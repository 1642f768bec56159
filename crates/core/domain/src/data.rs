use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// 解码后的工程值。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EngineeringValue {
    /// 缩放系数为整数时的精确整数值
    Integer(i64),
    Float(f64),
    Text(String),
}

impl EngineeringValue {
    /// 数值视图；字符串返回 None。
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for EngineeringValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{}", value),
            Self::Float(value) => write!(f, "{}", value),
            Self::Text(value) => f.write_str(value),
        }
    }
}

/// 快照中的单个寄存器值。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotEntry {
    pub value: EngineeringValue,
    pub read_at_ms: i64,
}

/// 最近一次成功解码的寄存器值集合（名称 → 值 + 读取时间）。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Snapshot {
    entries: BTreeMap<String, SnapshotEntry>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入或覆盖某个寄存器的最新值
    pub fn upsert(&mut self, name: impl Into<String>, value: EngineeringValue, read_at_ms: i64) {
        self.entries
            .insert(name.into(), SnapshotEntry { value, read_at_ms });
    }

    pub fn get(&self, name: &str) -> Option<&SnapshotEntry> {
        self.entries.get(name)
    }

    pub fn numeric(&self, name: &str) -> Option<f64> {
        self.entries.get(name).and_then(|entry| entry.value.as_f64())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SnapshotEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
