use crate::Signature;

/// An iterator over the single complete types of a [`Signature`].
///
/// See [`Signature::iter`].
#[derive(Clone)]
pub struct Iter<'a> {
    data: &'a [u8],
}

impl<'a> Iter<'a> {
    #[inline]
    pub(super) fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Signature;

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.is_empty() {
            return None;
        }

        let mut depth = 0usize;
        let mut n = 0;

        while let Some(&b) = self.data.get(n) {
            n += 1;

            match b {
                b'a' => continue,
                b'(' | b'{' => depth += 1,
                b')' | b'}' => depth = depth.saturating_sub(1),
                _ => {}
            }

            if depth == 0 {
                break;
            }
        }

        let (head, tail) = self.data.split_at(n);
        self.data = tail;
        // SAFETY: A single complete type split off from a valid signature is
        // itself valid.
        Some(unsafe { Signature::new_unchecked(head) })
    }
}
