//! 字序与字节序处理。

use crate::error::CodecError;
use domain::{Endianness, RegisterDefinition, WordSwap};

/// 线上寄存器字 → 字内字节已规整的 16 位值
fn word_from_wire(word: u16, endianness: Endianness) -> u16 {
    match endianness {
        Endianness::Big => word,
        Endianness::Little => word.swap_bytes(),
    }
}

fn word_to_wire(word: u16, endianness: Endianness) -> u16 {
    // 字节交换是自逆的
    word_from_wire(word, endianness)
}

pub(crate) fn ensure_word_count(words: &[u16], def: &RegisterDefinition) -> Result<(), CodecError> {
    let expected = def
        .data_type
        .fixed_word_count()
        .unwrap_or(def.word_count);
    if words.len() != expected as usize || def.word_count != expected {
        return Err(CodecError::WordCount {
            expected,
            actual: words.len(),
        });
    }
    Ok(())
}

pub(crate) fn read_u16(words: &[u16], def: &RegisterDefinition) -> u16 {
    word_from_wire(words[0], def.endianness)
}

pub(crate) fn write_u16(value: u16, def: &RegisterDefinition) -> Vec<u16> {
    vec![word_to_wire(value, def.endianness)]
}

/// 两个寄存器拼成 32 位值。
///
/// `WordSwap::None` 按 `[low, high]` 解释，`WordSwap::Swapped` 按 `[high, low]` 解释。
pub(crate) fn read_u32(words: &[u16], def: &RegisterDefinition) -> u32 {
    let first = word_from_wire(words[0], def.endianness) as u32;
    let second = word_from_wire(words[1], def.endianness) as u32;
    let (low, high) = match def.word_swap {
        WordSwap::None => (first, second),
        WordSwap::Swapped => (second, first),
    };
    (high << 16) | low
}

pub(crate) fn write_u32(bits: u32, def: &RegisterDefinition) -> Vec<u16> {
    let high = word_to_wire((bits >> 16) as u16, def.endianness);
    let low = word_to_wire(bits as u16, def.endianness);
    match def.word_swap {
        WordSwap::None => vec![low, high],
        WordSwap::Swapped => vec![high, low],
    }
}

/// 寄存器序列展开为字节流（每字 2 字节，顺序由字节序决定），去掉尾部 NUL 填充
pub(crate) fn read_text(words: &[u16], def: &RegisterDefinition) -> String {
    let mut bytes = Vec::with_capacity(words.len() * 2);
    for word in words {
        let pair = match def.endianness {
            Endianness::Big => word.to_be_bytes(),
            Endianness::Little => word.to_le_bytes(),
        };
        bytes.extend_from_slice(&pair);
    }
    while bytes.last() == Some(&0) {
        bytes.pop();
    }
    String::from_utf8_lossy(&bytes).into_owned()
}
