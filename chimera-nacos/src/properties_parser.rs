use crate::config_type::ConfigType;
use crate::error::{NacosConfigError, Result};
use crate::key_space::FlattenedKeySpace;
use crate::parser::ConfigParser;
use anyhow::anyhow;

/// Properties 格式解析器
///
/// 遵循 `.properties` 文件的行语法：
/// - 以奇数个反斜杠结尾的行与下一行拼接，续行的前导空白被忽略
/// - `#` 或 `!` 开头的行为注释
/// - 键在第一个未转义的 `=`、`:` 或空白处结束
/// - 支持 `\t \n \r \f \uXXXX` 转义，其他 `\x` 解释为 `x`
///
/// 空内容得到空键空间而不是错误
#[derive(Debug, Default, Clone, Copy)]
pub struct PropertiesConfigParser;

impl PropertiesConfigParser {
    pub fn new() -> Self {
        Self
    }
}

impl ConfigParser for PropertiesConfigParser {
    fn parse(&self, content: &str) -> Result<FlattenedKeySpace> {
        if content.trim().is_empty() {
            return Ok(FlattenedKeySpace::new());
        }
        parse_properties(content)
            .map_err(|e| NacosConfigError::parse(ConfigType::Properties.as_str(), content, e))
    }

    fn process_type(&self) -> &str {
        ConfigType::Properties.as_str()
    }
}

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t' || c == '\x0c'
}

fn parse_properties(content: &str) -> anyhow::Result<FlattenedKeySpace> {
    let lines = split_natural_lines(content);
    let mut result = FlattenedKeySpace::new();
    let mut index = 0;

    while index < lines.len() {
        let line = lines[index].trim_start_matches(is_blank);
        index += 1;

        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }

        let mut logical = line.to_string();
        while ends_with_continuation(&logical) {
            logical.pop();
            match lines.get(index) {
                Some(next) => {
                    logical.push_str(next.trim_start_matches(is_blank));
                    index += 1;
                }
                None => break,
            }
        }

        let (key, value) = split_key_value(&logical)?;
        result.insert(key, value);
    }

    Ok(result)
}

/// 按 `\r\n`、`\r`、`\n` 切分自然行
fn split_natural_lines(content: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let bytes = content.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push(&content[start..i]);
                start = i + 1;
            }
            b'\r' => {
                lines.push(&content[start..i]);
                if bytes.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    if start < content.len() {
        lines.push(&content[start..]);
    }
    lines
}

fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

fn split_key_value(line: &str) -> anyhow::Result<(String, String)> {
    let chars: Vec<char> = line.chars().collect();
    let mut key_len = 0;
    let mut value_start = chars.len();
    let mut has_separator = false;
    let mut preceding_backslash = false;

    while key_len < chars.len() {
        let c = chars[key_len];
        if (c == '=' || c == ':') && !preceding_backslash {
            value_start = key_len + 1;
            has_separator = true;
            break;
        } else if is_blank(c) && !preceding_backslash {
            value_start = key_len + 1;
            break;
        }
        preceding_backslash = c == '\\' && !preceding_backslash;
        key_len += 1;
    }

    while value_start < chars.len() {
        let c = chars[value_start];
        if is_blank(c) {
            value_start += 1;
        } else if !has_separator && (c == '=' || c == ':') {
            has_separator = true;
            value_start += 1;
        } else {
            break;
        }
    }

    let key = unescape(&chars[..key_len])?;
    let value = unescape(&chars[value_start.min(chars.len())..])?;
    Ok((key, value))
}

fn unescape(chars: &[char]) -> anyhow::Result<String> {
    let mut out = String::with_capacity(chars.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        i += 1;
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(&escaped) = chars.get(i) else {
            break;
        };
        i += 1;
        match escaped {
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'n' => out.push('\n'),
            'f' => out.push('\x0c'),
            'u' => {
                let code = read_hex4(chars, i)?;
                i += 4;
                out.push(decode_code_unit(code, chars, &mut i)?);
            }
            other => out.push(other),
        }
    }

    Ok(out)
}

fn read_hex4(chars: &[char], start: usize) -> anyhow::Result<u32> {
    let digits = chars
        .get(start..start + 4)
        .ok_or_else(|| anyhow!("Malformed \\uxxxx encoding"))?;
    digits.iter().try_fold(0u32, |acc, c| {
        c.to_digit(16)
            .map(|d| (acc << 4) | d)
            .ok_or_else(|| anyhow!("Malformed \\uxxxx encoding"))
    })
}

/// UTF-16 代码单元转换为字符，高代理项与紧随的 `\uXXXX` 低代理项合并
fn decode_code_unit(code: u32, chars: &[char], i: &mut usize) -> anyhow::Result<char> {
    if (0xD800..0xDC00).contains(&code)
        && chars.get(*i) == Some(&'\\')
        && chars.get(*i + 1) == Some(&'u')
    {
        let low = read_hex4(chars, *i + 2)?;
        if (0xDC00..0xE000).contains(&low) {
            *i += 6;
            let combined = 0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00);
            return char::from_u32(combined).ok_or_else(|| anyhow!("Invalid surrogate pair"));
        }
    }
    Ok(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER))
}
