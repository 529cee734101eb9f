use crate::error::EncodeError;

// Packets are composed back to front: the innermost field is written first at
//  the end of a fixed-capacity scratch buffer and every enclosing header is then
//  prepended in front of it once its length is known. This way no field length
//  has to be computed top-down before writing.
pub struct PrependBuffer {
    storage: Box<[u8]>,
    offset: usize,
}

impl PrependBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: vec![0u8; capacity].into_boxed_slice(),
            offset: capacity,
        }
    }

    // The position of the first written byte. Decreases as fields are prepended.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    // How many bytes have been written so far.
    pub fn len(&self) -> usize {
        self.storage.len() - self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn prepend(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        if self.offset < bytes.len() {
            return Err(EncodeError::BufferTooShort {
                needed: bytes.len(),
                available: self.offset,
            });
        }
        self.offset -= bytes.len();
        self.storage[self.offset..self.offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    pub fn prepend_byte(&mut self, byte: u8) -> Result<(), EncodeError> {
        self.prepend(&[byte])
    }

    pub fn written(&self) -> &[u8] {
        &self.storage[self.offset..]
    }

    pub fn into_bytes(self) -> Box<[u8]> {
        Box::from(&self.storage[self.offset..])
    }
}
