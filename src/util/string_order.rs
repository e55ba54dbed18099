use std::cmp::Ordering;

/// Compare two UTF-8 byte strings in the order their UTF-16 encodings would
/// sort in.
///
/// Plain byte order equals code point order, which differs from UTF-16 order
/// only for supplementary characters against characters in U+E000..U+FFFF.
/// Lead bytes 0xEE/0xEF (U+E000..U+FFFF) are shifted above 0xF0..0xF4
/// (surrogate pairs) when both sides are at least 0xEE.
pub fn compare_utf8_as_utf16(a: &[u8], b: &[u8]) -> Ordering {
    for (&x, &y) in a.iter().zip(b.iter()) {
        if x == y {
            continue;
        }
        if x >= 0xee && y >= 0xee {
            return fix_up(x).cmp(&fix_up(y));
        }
        return x.cmp(&y);
    }
    a.len().cmp(&b.len())
}

#[inline]
fn fix_up(b: u8) -> u16 {
    if (b & 0xfe) == 0xee { b as u16 + 0x0e } else { b as u16 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16_cmp(a: &str, b: &str) -> Ordering {
        a.encode_utf16().cmp(b.encode_utf16())
    }

    #[test]
    fn agrees_with_utf16_order() {
        let words = ["", "a", "ab", "b", "\u{e000}", "\u{ffff}", "\u{10000}", "\u{10ffff}", "é", "z\u{fffd}", "z\u{1f600}"];
        for x in &words {
            for y in &words {
                assert_eq!(
                    compare_utf8_as_utf16(x.as_bytes(), y.as_bytes()),
                    utf16_cmp(x, y),
                    "{:?} vs {:?}",
                    x,
                    y
                );
            }
        }
    }

    #[test]
    fn supplementary_sorts_before_private_use() {
        assert_eq!(
            compare_utf8_as_utf16("\u{1f600}".as_bytes(), "\u{e000}".as_bytes()),
            Ordering::Less
        );
        assert_eq!("\u{1f600}".cmp("\u{e000}"), Ordering::Greater);
    }
}
