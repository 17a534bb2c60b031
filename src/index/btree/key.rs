use std::cmp::Ordering;
use std::marker::PhantomData;
use byteorder::{ByteOrder, LittleEndian};

/// A key type that can live inside a fixed-width B+Tree page entry
pub trait StorageKey: Clone + Default + Send + Sync + 'static {
    /// Encoded width of the key in a node entry
    const ENCODED_SIZE: usize;

    fn write_to(&self, buf: &mut [u8]);
    fn read_from(buf: &[u8]) -> Self;
}

impl StorageKey for i32 {
    const ENCODED_SIZE: usize = 4;

    fn write_to(&self, buf: &mut [u8]) {
        LittleEndian::write_i32(buf, *self);
    }

    fn read_from(buf: &[u8]) -> Self {
        LittleEndian::read_i32(buf)
    }
}

impl StorageKey for i64 {
    const ENCODED_SIZE: usize = 8;

    fn write_to(&self, buf: &mut [u8]) {
        LittleEndian::write_i64(buf, *self);
    }

    fn read_from(buf: &[u8]) -> Self {
        LittleEndian::read_i64(buf)
    }
}

/// Fixed-width opaque key, compared bytewise
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct GenericKey<const N: usize>(pub [u8; N]);

impl<const N: usize> Default for GenericKey<N> {
    fn default() -> Self {
        Self([0; N])
    }
}

impl<const N: usize> StorageKey for GenericKey<N> {
    const ENCODED_SIZE: usize = N;

    fn write_to(&self, buf: &mut [u8]) {
        buf[..N].copy_from_slice(&self.0);
    }

    fn read_from(buf: &[u8]) -> Self {
        let mut bytes = [0; N];
        bytes.copy_from_slice(&buf[..N]);
        Self(bytes)
    }
}

/// Caller-supplied key ordering
pub trait KeyComparator<K>: Clone + Send + Sync + 'static {
    fn compare(&self, a: &K, b: &K) -> Ordering;
}

/// Comparator delegating to the key's own `Ord`
pub struct OrdComparator<K>(PhantomData<K>);

impl<K> OrdComparator<K> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<K> Default for OrdComparator<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Clone for OrdComparator<K> {
    fn clone(&self) -> Self {
        Self(PhantomData)
    }
}

impl<K: Ord + Send + Sync + 'static> KeyComparator<K> for OrdComparator<K> {
    fn compare(&self, a: &K, b: &K) -> Ordering {
        a.cmp(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_i64_round_trip() {
        let mut buf = [0u8; 8];
        (-42i64).write_to(&mut buf);
        assert_eq!(i64::read_from(&buf), -42);
    }

    #[test]
    fn test_generic_key_round_trip() {
        let key = GenericKey::<16>(*b"0123456789abcdef");
        let mut buf = [0u8; 16];
        key.write_to(&mut buf);
        assert_eq!(GenericKey::<16>::read_from(&buf), key);
    }

    #[test]
    fn test_ord_comparator() {
        let cmp = OrdComparator::<i64>::new();
        assert_eq!(cmp.compare(&1, &2), Ordering::Less);
        assert_eq!(cmp.compare(&2, &2), Ordering::Equal);
    }
}
