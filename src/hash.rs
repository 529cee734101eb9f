pub trait Hasher {
    type Digest;
    fn reset(&mut self);
    fn update(&mut self, input: &[u8]);
    fn finalize_reset(&mut self) -> Self::Digest;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Sha256Digest(pub [u8; 32]);

impl AsRef<[u8]> for Sha256Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(feature = "sha2")]
#[derive(Default)]
pub struct Sha256Hasher {
    inner: sha2::Sha256,
}

#[cfg(feature = "sha2")]
impl Sha256Hasher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(feature = "sha2")]
impl Hasher for Sha256Hasher {
    type Digest = Sha256Digest;

    fn reset(&mut self) {
        use sha2::Digest;
        Digest::reset(&mut self.inner)
    }

    fn update(&mut self, input: &[u8]) {
        use sha2::Digest;
        Digest::update(&mut self.inner, input)
    }

    fn finalize_reset(&mut self) -> Self::Digest {
        use sha2::Digest;
        Sha256Digest(self.inner.finalize_reset().into())
    }
}

// The implicit digest of a content packet is the SHA-256 over its full encoding.
// Without the sha2 feature there is no digest and digest components never match.
pub fn packet_digest(packet: &[u8]) -> Option<Sha256Digest> {
    #[cfg(feature = "sha2")]
    {
        let mut hasher = Sha256Hasher::new();
        hasher.update(packet);
        Some(hasher.finalize_reset())
    }
    #[cfg(not(feature = "sha2"))]
    {
        let _ = packet;
        None
    }
}
