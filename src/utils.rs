/// 压缩多余空白字符，用于选择器规范化和压缩输出。
pub fn collapse_whitespace(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut last_was_space = false;
    for ch in input.chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                result.push(' ');
                last_was_space = true;
            }
        } else {
            result.push(ch);
            last_was_space = false;
        }
    }
    result.trim().to_string()
}

/// 保持相对缩进的辅助函数。
pub fn indent(level: usize) -> String {
    const INDENT: &str = "  ";
    (0..level).map(|_| INDENT).collect()
}

/// 拆出引号字符串的引号与内容，非字符串返回 `None`。
pub fn unquote(input: &str) -> Option<(char, &str)> {
    let quote = input.chars().next()?;
    if (quote == '"' || quote == '\'') && input.len() >= 2 && input.ends_with(quote) {
        Some((quote, &input[1..input.len() - 1]))
    } else {
        None
    }
}

/// 百分号编码，保留 RFC 3986 的非保留字符。
pub fn url_encode(input: &str) -> String {
    let mut encoded = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapse_and_indent() {
        assert_eq!(collapse_whitespace("  .a \n\t .b  "), ".a .b");
        assert_eq!(indent(2), "    ");
    }

    #[test]
    fn unquote_strings() {
        assert_eq!(unquote("\"abc\""), Some(('"', "abc")));
        assert_eq!(unquote("'x y'"), Some(('\'', "x y")));
        assert_eq!(unquote("\""), None);
        assert_eq!(unquote("abc"), None);
    }

    #[test]
    fn url_encode_reserved() {
        assert_eq!(url_encode("a b/c"), "a%20b%2Fc");
    }
}
