/// A growable byte buffer for capturing subprocess stdout without knowing
/// the final size up front. Capacity at least doubles on overflow, clamped
/// up further when a single write would outgrow a plain doubling.
#[derive(Debug, Default)]
pub struct GrowBuf {
    data: Vec<u8>,
}

impl GrowBuf {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        let used = self.data.len();
        let have = self.data.capacity() - used;
        if have < bytes.len() {
            let grown = (self.data.capacity() * 2).max(used + bytes.len());
            self.data.reserve(grown - used);
        }
        self.data.extend_from_slice(bytes);
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_past_initial_capacity() {
        let mut buf = GrowBuf::with_capacity(4);
        for _ in 0..100 {
            buf.extend_from_slice(b"0123456789");
        }
        assert_eq!(buf.len(), 1000);
    }

    #[test]
    fn single_oversized_write_is_not_starved_by_doubling() {
        let mut buf = GrowBuf::with_capacity(4);
        let big = vec![7u8; 10_000];
        buf.extend_from_slice(&big);
        assert_eq!(buf.into_vec(), big);
    }
}
