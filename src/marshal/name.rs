//! 带数字后缀的驻留名称
//!
//! 名称按“基础名 + 内部编号”存储。内部编号 0 表示没有后缀，
//! 内部编号 `n > 0` 显示为 `_{n - 1}`。

use std::collections::HashMap;
use std::fmt;

use crate::core::error::{BridgeError, BridgeResult};

/// 内部编号：没有数字后缀
pub const NAME_NO_NUMBER_INTERNAL: u32 = 0;

/// 内部编号转显示编号
pub const fn name_internal_to_external(number: u32) -> u32 {
    number.wrapping_sub(1)
}

/// 显示编号转内部编号
pub const fn name_external_to_internal(number: u32) -> u32 {
    number.wrapping_add(1)
}

/// 名称表中的基础名下标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NameIndex(u32);

/// 驻留名称
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeName {
    index: NameIndex,
    number: u32,
}

impl NativeName {
    pub fn index(self) -> NameIndex {
        self.index
    }

    /// 内部编号
    pub fn number(self) -> u32 {
        self.number
    }

    pub fn has_number(self) -> bool {
        self.number != NAME_NO_NUMBER_INTERNAL
    }

    /// 同一基础名，换一个内部编号
    pub fn with_number(self, number: u32) -> Self {
        Self {
            index: self.index,
            number,
        }
    }
}

/// 名称表
///
/// 比较不区分大小写，显示时保留第一次出现的写法。
#[derive(Debug, Default)]
pub struct NameTable {
    entries: Vec<String>,
    lookup: HashMap<String, NameIndex>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 驻留一个显示形式的名称，解析末尾的 `_N` 后缀
    pub fn intern(&mut self, display: &str) -> BridgeResult<NativeName> {
        let (base, number) = split_number(display);
        let index = self.intern_base(base)?;
        Ok(NativeName { index, number })
    }

    /// 只驻留基础名，不解析后缀
    pub fn intern_exact(&mut self, base: &str, number: u32) -> BridgeResult<NativeName> {
        let index = self.intern_base(base)?;
        Ok(NativeName { index, number })
    }

    /// 查找已存在的名称，不插入
    pub fn find(&self, display: &str) -> Option<NativeName> {
        let (base, number) = split_number(display);
        self.lookup
            .get(&base.to_lowercase())
            .map(|&index| NativeName { index, number })
    }

    pub fn base(&self, name: NativeName) -> Option<&str> {
        self.entries.get(name.index.0 as usize).map(String::as_str)
    }

    /// 渲染显示形式
    pub fn display(&self, name: NativeName) -> Option<String> {
        let base = self.base(name)?;
        if name.number == NAME_NO_NUMBER_INTERNAL {
            return Some(base.to_string());
        }
        let mut out = String::with_capacity(base.len() + 6);
        out.push_str(base);
        out.push('_');
        out.push_str(&name_internal_to_external(name.number).to_string());
        Some(out)
    }

    fn intern_base(&mut self, base: &str) -> BridgeResult<NameIndex> {
        let key = base.to_lowercase();
        if let Some(&index) = self.lookup.get(&key) {
            return Ok(index);
        }
        let index = next_index(self.entries.len())?;
        self.entries.push(base.to_string());
        self.lookup.insert(key, index);
        Ok(index)
    }
}

/// 显示名称的包装，用于 `format!`
pub struct NameDisplay<'a> {
    table: &'a NameTable,
    name: NativeName,
}

impl NameTable {
    pub fn displayed(&self, name: NativeName) -> NameDisplay<'_> {
        NameDisplay { table: self, name }
    }
}

impl fmt::Display for NameDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.table.display(self.name) {
            Some(text) => f.write_str(&text),
            None => f.write_str("None"),
        }
    }
}

// 下标必须能放进 u32
fn next_index(len: usize) -> BridgeResult<NameIndex> {
    u32::try_from(len)
        .map(NameIndex)
        .map_err(|_| BridgeError::Conversion("name table is full".to_string()))
}

// 后缀必须全是数字，且多位时不能以 0 开头
fn split_number(display: &str) -> (&str, u32) {
    let Some(pos) = display.rfind('_') else {
        return (display, NAME_NO_NUMBER_INTERNAL);
    };
    let (base, digits) = (&display[..pos], &display[pos + 1..]);
    if base.is_empty()
        || digits.is_empty()
        || !digits.bytes().all(|b| b.is_ascii_digit())
        || (digits.len() > 1 && digits.starts_with('0'))
    {
        return (display, NAME_NO_NUMBER_INTERNAL);
    }
    match digits.parse::<u32>() {
        Ok(external) if external < u32::MAX => (base, name_external_to_internal(external)),
        _ => (display, NAME_NO_NUMBER_INTERNAL),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_name() {
        let mut names = NameTable::new();
        let n = names.intern("Player").unwrap();
        assert!(!n.has_number());
        assert_eq!(names.display(n).as_deref(), Some("Player"));
    }

    #[test]
    fn test_suffix_uses_internal_numbering() {
        let mut names = NameTable::new();
        let n = names.intern("Enemy_3").unwrap();
        assert_eq!(n.number(), 4);
        assert_eq!(names.base(n), Some("Enemy"));
        assert_eq!(names.display(n).as_deref(), Some("Enemy_3"));
    }

    #[test]
    fn test_zero_suffix() {
        let mut names = NameTable::new();
        let n = names.intern("Door_0").unwrap();
        assert_eq!(n.number(), 1);
        assert_eq!(names.display(n).as_deref(), Some("Door_0"));
    }

    #[test]
    fn test_collision_disambiguation() {
        let mut names = NameTable::new();
        let first = names.intern("Light").unwrap();
        let second = first.with_number(name_external_to_internal(1));
        assert_eq!(first.index(), second.index());
        assert_ne!(first, second);
        assert_eq!(names.display(second).as_deref(), Some("Light_1"));
        assert_eq!(names.intern("Light_1").unwrap(), second);
    }

    #[test]
    fn test_leading_zero_suffix_is_not_split() {
        let mut names = NameTable::new();
        let n = names.intern("Mesh_01").unwrap();
        assert!(!n.has_number());
        assert_eq!(names.display(n).as_deref(), Some("Mesh_01"));
    }

    #[test]
    fn test_non_numeric_suffix() {
        let mut names = NameTable::new();
        for text in ["my_actor", "_5", "trailing_", "a_b_c"] {
            let n = names.intern(text).unwrap();
            assert_eq!(names.display(n).as_deref(), Some(text));
        }
    }

    #[test]
    fn test_case_insensitive_keeps_first_spelling() {
        let mut names = NameTable::new();
        let a = names.intern("Camera").unwrap();
        let b = names.intern("CAMERA").unwrap();
        assert_eq!(a, b);
        assert_eq!(names.display(b).as_deref(), Some("Camera"));
        assert_eq!(names.len(), 1);
        assert_eq!(names.find("camera_2"), Some(a.with_number(3)));
        assert_eq!(names.find("Missing"), None);
    }

    #[test]
    fn test_display_wrapper() {
        let mut names = NameTable::new();
        let n = names.intern("Socket_12").unwrap();
        assert_eq!(format!("{}", names.displayed(n)), "Socket_12");
    }

    #[test]
    fn test_index_past_u32_is_rejected() {
        assert_eq!(next_index(7).unwrap(), NameIndex(7));
        assert_eq!(next_index(u32::MAX as usize).unwrap(), NameIndex(u32::MAX));
        #[cfg(target_pointer_width = "64")]
        assert!(matches!(
            next_index(u32::MAX as usize + 1),
            Err(BridgeError::Conversion(_))
        ));
    }
}
