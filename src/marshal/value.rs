//! 值转换
//!
//! 原生字符串、数字、布尔值与脚本值之间的双向转换。原生侧有三种字符串形式：
//! UTF-16 字符串 ([`NativeString`])、带数字后缀的驻留名称
//! ([`NativeName`](super::name::NativeName)) 以及可能带字节序标记的原始字节缓冲。

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::error::{BridgeError, BridgeResult};
use crate::marshal::name::NativeName;
use crate::marshal::tagger::NativePtr;

/// 非法编码的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DecodePolicy {
    /// 用替换字符 U+FFFD 代替非法序列
    #[default]
    Lossy,
    /// 返回 [`BridgeError::Conversion`]
    Strict,
}

/// UTF-16 原生字符串
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct NativeString {
    units: Vec<u16>,
}

impl NativeString {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_utf16(units: Vec<u16>) -> Self {
        Self { units }
    }

    pub fn as_utf16(&self) -> &[u16] {
        &self.units
    }

    pub fn into_utf16(self) -> Vec<u16> {
        self.units
    }

    /// 长度（UTF-16 码元个数）
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// 按策略转为 UTF-8；孤立代理项在 `Strict` 下是错误
    pub fn to_utf8(&self, policy: DecodePolicy) -> BridgeResult<String> {
        decode_utf16_units(self.units.iter().copied(), policy)
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(&self.units)
    }
}

impl From<&str> for NativeString {
    fn from(text: &str) -> Self {
        Self {
            units: text.encode_utf16().collect(),
        }
    }
}

impl From<String> for NativeString {
    fn from(text: String) -> Self {
        Self::from(text.as_str())
    }
}

impl fmt::Display for NativeString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

/// 原始字节缓冲的编码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    /// 带 EF BB BF 标记的 UTF-8
    Utf8Bom,
    Utf16Le,
    Utf16Be,
}

impl TextEncoding {
    /// 标记占用的字节数
    pub fn marker_len(self) -> usize {
        match self {
            TextEncoding::Utf8 => 0,
            TextEncoding::Utf8Bom => 3,
            TextEncoding::Utf16Le | TextEncoding::Utf16Be => 2,
        }
    }
}

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];
const UTF16_LE_BOM: [u8; 2] = [0xFF, 0xFE];
const UTF16_BE_BOM: [u8; 2] = [0xFE, 0xFF];

/// 检测字节缓冲的编码
///
/// 只有偶数长度的缓冲才会按 UTF-16 处理。
pub fn detect_encoding(bytes: &[u8]) -> TextEncoding {
    if bytes.len() >= 2 && bytes.len() % 2 == 0 {
        if bytes[..2] == UTF16_LE_BOM {
            return TextEncoding::Utf16Le;
        }
        if bytes[..2] == UTF16_BE_BOM {
            return TextEncoding::Utf16Be;
        }
    }
    if bytes.starts_with(&UTF8_BOM) {
        return TextEncoding::Utf8Bom;
    }
    TextEncoding::Utf8
}

/// 解码文件内容为字符串，去掉编码标记
pub fn decode_file_content(bytes: &[u8], policy: DecodePolicy) -> BridgeResult<String> {
    let encoding = detect_encoding(bytes);
    let body = &bytes[encoding.marker_len()..];
    match encoding {
        TextEncoding::Utf16Le => decode_utf16_units(
            body.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]])),
            policy,
        ),
        TextEncoding::Utf16Be => decode_utf16_units(
            body.chunks_exact(2).map(|c| u16::from_be_bytes([c[0], c[1]])),
            policy,
        ),
        TextEncoding::Utf8 | TextEncoding::Utf8Bom => match policy {
            DecodePolicy::Lossy => Ok(String::from_utf8_lossy(body).into_owned()),
            DecodePolicy::Strict => std::str::from_utf8(body)
                .map(str::to_owned)
                .map_err(|e| BridgeError::Conversion(format!("invalid UTF-8: {}", e))),
        },
    }
}

fn decode_utf16_units<I>(units: I, policy: DecodePolicy) -> BridgeResult<String>
where
    I: Iterator<Item = u16>,
{
    let mut out = String::new();
    for decoded in char::decode_utf16(units) {
        match decoded {
            Ok(c) => out.push(c),
            Err(e) => match policy {
                DecodePolicy::Lossy => out.push(char::REPLACEMENT_CHARACTER),
                DecodePolicy::Strict => {
                    return Err(BridgeError::Conversion(format!(
                        "unpaired surrogate {:#06x}",
                        e.unpaired_surrogate()
                    )))
                }
            },
        }
    }
    Ok(out)
}

/// 原生侧的值
#[derive(Debug, Clone, PartialEq, Default)]
pub enum NativeValue {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Int32(i32),
    Number(f64),
    String(NativeString),
    Name(NativeName),
    /// 已是 UTF-8 的显示文本
    Text(String),
    /// 包装为脚本句柄的原生对象
    Object(NativePtr),
    /// 不透明的外部值
    External(NativePtr),
}

impl NativeValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            NativeValue::Undefined => "undefined",
            NativeValue::Null => "null",
            NativeValue::Bool(_) => "boolean",
            NativeValue::Int32(_) => "int32",
            NativeValue::Number(_) => "number",
            NativeValue::String(_) => "string",
            NativeValue::Name(_) => "name",
            NativeValue::Text(_) => "text",
            NativeValue::Object(_) => "object",
            NativeValue::External(_) => "external",
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            NativeValue::Int32(i) => Some(f64::from(*i)),
            NativeValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<bool> for NativeValue {
    fn from(value: bool) -> Self {
        NativeValue::Bool(value)
    }
}

impl From<i32> for NativeValue {
    fn from(value: i32) -> Self {
        NativeValue::Int32(value)
    }
}

impl From<f64> for NativeValue {
    fn from(value: f64) -> Self {
        NativeValue::Number(value)
    }
}

impl From<NativeString> for NativeValue {
    fn from(value: NativeString) -> Self {
        NativeValue::String(value)
    }
}

impl From<NativeName> for NativeValue {
    fn from(value: NativeName) -> Self {
        NativeValue::Name(value)
    }
}

impl From<&str> for NativeValue {
    fn from(value: &str) -> Self {
        NativeValue::Text(value.to_string())
    }
}

impl From<String> for NativeValue {
    fn from(value: String) -> Self {
        NativeValue::Text(value)
    }
}

impl From<()> for NativeValue {
    fn from(_: ()) -> Self {
        NativeValue::Undefined
    }
}
