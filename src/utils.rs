/// Trim whitespace from end of bytes.
pub(crate) fn trim_end(mut bytes: &[u8]) -> &[u8] {
    while let [prefix @ .., c] = bytes {
        if !c.is_ascii_whitespace() {
            break;
        }

        bytes = prefix;
    }

    bytes
}

/// Split once at the given byte.
pub(crate) fn split_once(bytes: &[u8], byte: u8) -> Option<(&[u8], &[u8])> {
    let n = bytes.iter().position(|&c| c == byte)?;
    let (head, tail) = bytes.split_at(n);
    Some((head, &tail[1..]))
}

/// Number of padding bytes needed to bring `len` up to `alignment`.
#[inline]
pub(crate) const fn padding_to(len: usize, alignment: usize) -> usize {
    let mask = alignment - 1;
    (alignment - (len & mask)) & mask
}

/// Round `len` up to the nearest multiple of `alignment`.
#[inline]
pub(crate) const fn align_up(len: usize, alignment: usize) -> usize {
    len + padding_to(len, alignment)
}

#[cfg(test)]
mod tests {
    use super::{align_up, padding_to, split_once, trim_end};

    #[test]
    fn padding() {
        assert_eq!(padding_to(0, 8), 0);
        assert_eq!(padding_to(5, 8), 3);
        assert_eq!(padding_to(8, 8), 0);
        assert_eq!(padding_to(13, 4), 3);
        assert_eq!(align_up(5, 8), 8);
        assert_eq!(align_up(15, 8), 16);
        assert_eq!(align_up(24, 8), 24);
    }

    #[test]
    fn lines() {
        assert_eq!(trim_end(b"OK 1234\r\n"), b"OK 1234");
        assert_eq!(split_once(b"OK 1234", b' '), Some((&b"OK"[..], &b"1234"[..])));
        assert_eq!(split_once(b"BEGIN", b' '), None);
    }
}
