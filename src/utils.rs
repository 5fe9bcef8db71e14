pub fn parse_num<T: std::str::FromStr>(bstr: &[u8]) -> Option<T> {
    std::str::from_utf8(bstr).ok()?
        .parse::<T>().ok()
}

/// Like [`parse_num`], but accepts only the exact form object and generation numbers take in
/// object headers and references: unsigned decimal digits without a leading zero (a lone `0`
/// is fine).
pub fn parse_int_strict<T: std::str::FromStr>(bstr: &[u8]) -> Option<T> {
    match bstr {
        b"0" => parse_num(bstr),
        [b'1'..=b'9', rest @ ..] if rest.iter().all(u8::is_ascii_digit) => parse_num(bstr),
        _ => None
    }
}

pub fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int_strict() {
        assert_eq!(parse_int_strict::<u64>(b"0"), Some(0));
        assert_eq!(parse_int_strict::<u64>(b"10"), Some(10));
        assert_eq!(parse_int_strict::<u64>(b"01"), None);
        assert_eq!(parse_int_strict::<u64>(b"+1"), None);
        assert_eq!(parse_int_strict::<u64>(b"-1"), None);
        assert_eq!(parse_int_strict::<u64>(b"1a"), None);
        assert_eq!(parse_int_strict::<u64>(b""), None);
    }
}
