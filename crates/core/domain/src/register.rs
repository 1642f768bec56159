//! 寄存器静态定义。

use serde::Serialize;
use std::collections::BTreeSet;

/// Modbus 功能码（寄存器目录中声明的访问方式）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionCode {
    /// 读保持寄存器 (0x03)
    ReadHolding = 3,
    /// 读输入寄存器 (0x04)
    ReadInput = 4,
    /// 写单个保持寄存器 (0x06)
    WriteSingle = 6,
}

impl FunctionCode {
    /// 从配置文档中的数字功能码解析
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            3 => Some(Self::ReadHolding),
            4 => Some(Self::ReadInput),
            6 => Some(Self::WriteSingle),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// 读取该寄存器时使用的读功能。
    ///
    /// 单写寄存器位于保持寄存器区，回读走 0x03。
    pub fn read_function(self) -> ReadFunction {
        match self {
            Self::ReadInput => ReadFunction::Input,
            Self::ReadHolding | Self::WriteSingle => ReadFunction::Holding,
        }
    }
}

/// 实际发往设备的读功能
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadFunction {
    /// 读输入寄存器 (0x04)
    Input,
    /// 读保持寄存器 (0x03)
    Holding,
}

/// 寄存器数据类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// 16位无符号整数
    Uint16,
    /// 16位有符号整数
    Int16,
    /// 32位无符号整数（2个寄存器）
    Uint32,
    /// 32位有符号整数（2个寄存器）
    Int32,
    /// 定长字符串（N 个寄存器，每个寄存器 2 字节）
    FixedString,
}

impl DataType {
    /// 数值类型的固定字数；字符串返回 None（由 count 决定）。
    pub fn fixed_word_count(self) -> Option<u16> {
        match self {
            Self::Uint16 | Self::Int16 => Some(1),
            Self::Uint32 | Self::Int32 => Some(2),
            Self::FixedString => None,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(self, Self::Int16 | Self::Int32)
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, Self::FixedString)
    }

    /// 可单寄存器写入的类型
    pub fn is_single_word(self) -> bool {
        matches!(self, Self::Uint16 | Self::Int16)
    }

    /// 原始整数可表示的闭区间
    pub fn raw_bounds(self) -> Option<(i64, i64)> {
        match self {
            Self::Uint16 => Some((0, u16::MAX as i64)),
            Self::Int16 => Some((i16::MIN as i64, i16::MAX as i64)),
            Self::Uint32 => Some((0, u32::MAX as i64)),
            Self::Int32 => Some((i32::MIN as i64, i32::MAX as i64)),
            Self::FixedString => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::Uint16 => "uint16",
            Self::Int16 => "int16",
            Self::Uint32 => "uint32",
            Self::Int32 => "int32",
            Self::FixedString => "fixed_string",
        }
    }
}

/// 字内字节序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Endianness {
    #[default]
    Big,
    Little,
}

/// 32 位值的字序
///
/// - `None`：设备原生顺序，先传低字再传高字 `[low, high]`
/// - `Swapped`：交换为 `[high, low]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WordSwap {
    #[default]
    None,
    Swapped,
}

/// 安全写入范围（工程单位，闭区间）
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SafeRange {
    pub min: f64,
    pub max: f64,
}

impl SafeRange {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// 跨字段约束：与另一个寄存器的值比较（工程单位）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossFieldRule {
    /// 本寄存器的值不得大于伙伴寄存器（如 min_soc ≤ max_soc）
    NotAbove(String),
    /// 本寄存器的值不得小于伙伴寄存器（如 max_soc ≥ min_soc）
    NotBelow(String),
}

impl CrossFieldRule {
    pub fn partner(&self) -> &str {
        match self {
            Self::NotAbove(name) | Self::NotBelow(name) => name,
        }
    }

    /// 给定本值与伙伴值，约束是否成立
    pub fn holds(&self, value: f64, partner_value: f64) -> bool {
        match self {
            Self::NotAbove(_) => value <= partner_value,
            Self::NotBelow(_) => value >= partner_value,
        }
    }
}

/// 单个寄存器的声明式写入规则
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WriteRules {
    pub safe_range: Option<SafeRange>,
    /// 允许写入的编码后整数集合（枚举型控制寄存器）
    pub legal_values: Option<BTreeSet<i64>>,
    pub cross_field: Option<CrossFieldRule>,
}

impl WriteRules {
    pub fn is_empty(&self) -> bool {
        self.safe_range.is_none() && self.legal_values.is_none() && self.cross_field.is_none()
    }
}

/// 寄存器定义（目录加载后不可变）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegisterDefinition {
    pub name: String,
    pub address: u16,
    pub function_code: FunctionCode,
    pub data_type: DataType,
    pub word_count: u16,
    /// 原始整数 → 工程值的乘数，非零
    pub scale: f64,
    pub endianness: Endianness,
    pub word_swap: WordSwap,
    pub unit: String,
    pub description: String,
    pub writable: bool,
    pub rules: WriteRules,
}

impl RegisterDefinition {
    /// 以默认字段构造一个数值寄存器定义，字数由类型推导。
    pub fn new(
        name: impl Into<String>,
        address: u16,
        function_code: FunctionCode,
        data_type: DataType,
    ) -> Self {
        Self {
            name: name.into(),
            address,
            function_code,
            data_type,
            word_count: data_type.fixed_word_count().unwrap_or(1),
            scale: 1.0,
            endianness: Endianness::Big,
            word_swap: WordSwap::None,
            unit: String::new(),
            description: String::new(),
            writable: function_code == FunctionCode::WriteSingle,
            rules: WriteRules::default(),
        }
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_word_count(mut self, word_count: u16) -> Self {
        self.word_count = word_count;
        self
    }

    pub fn with_layout(mut self, endianness: Endianness, word_swap: WordSwap) -> Self {
        self.endianness = endianness;
        self.word_swap = word_swap;
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn writable(mut self, writable: bool) -> Self {
        self.writable = writable;
        self
    }

    pub fn with_rules(mut self, rules: WriteRules) -> Self {
        self.rules = rules;
        self
    }

    /// 半个编码单位对应的工程值，用于回读比对容差
    pub fn tolerance(&self) -> f64 {
        self.scale.abs() / 2.0
    }

    pub fn read_function(&self) -> ReadFunction {
        self.function_code.read_function()
    }
}
