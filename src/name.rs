use core::{fmt, ops::Range};

use crate::{
    encode::PrependBuffer,
    error::{DecodeError, EncodeError},
    suite::{self, Suite},
};

// A Name is a copy of the name element as it appeared on the wire (or as we
//  encoded it) plus the positions of its components inside that copy.
// Components are never stored as references into some other buffer, so a
//  Name can be kept in the PIT or the content store for as long as needed.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Name {
    suite: Suite,
    encoded: Box<[u8]>,
    components: Vec<(u16, Range<usize>)>,
    chunk: Option<u32>,
    flags: NameFlags,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct NameComponent<'a> {
    pub typ: u16,
    pub bytes: &'a [u8],
}

// Two trailing pseudo-components are not part of the path proper: a name that
//  ends in "NFN" names a computation, and "THUNK" right before it asks for a
//  deferred result. They are lifted out of the component list into these flags.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct NameFlags {
    pub nfn: bool,
    pub thunk: bool,
}

pub(crate) const NFN_COMPONENT: &[u8] = b"NFN";
pub(crate) const THUNK_COMPONENT: &[u8] = b"THUNK";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CompareMode {
    // Same components, same chunk, same flags.
    Exact,
    // Every component of the prefix matches.
    Prefix,
    // Count how many leading components match.
    Longest,
}

impl Name {
    // Used by the suite decoders once a name element has been fully walked.
    // `components` are ranges into `encoded`.
    pub(crate) fn from_wire(
        suite: Suite,
        encoded: Box<[u8]>,
        mut components: Vec<(u16, Range<usize>)>,
        chunk: Option<u32>,
    ) -> Self {
        let mut flags = NameFlags::default();
        let default_typ = suite.default_component_type();
        let is_pseudo = |c: Option<&(u16, Range<usize>)>, marker: &[u8]| match c {
            Some((typ, range)) => *typ == default_typ && &encoded[range.clone()] == marker,
            None => false,
        };

        if is_pseudo(components.last(), NFN_COMPONENT) {
            flags.nfn = true;
            components.pop();
            if is_pseudo(components.last(), THUNK_COMPONENT) {
                flags.thunk = true;
                components.pop();
            }
        }

        Self {
            suite,
            encoded,
            components,
            chunk,
            flags,
        }
    }

    // Builds a name from plain byte components, typed as ordinary name segments
    //  of the suite.
    pub fn from_components(suite: Suite, components: &[&[u8]]) -> Result<Self, EncodeError> {
        let typ = suite.default_component_type();
        let typed: Vec<NameComponent<'_>> = components
            .iter()
            .map(|bytes| NameComponent { typ, bytes })
            .collect();
        Self::build(suite, &typed, NameFlags::default())
    }

    // Builds a name by encoding it in `suite` and walking the result, so a
    //  constructed name is indistinguishable from a received one.
    pub fn build(
        suite: Suite,
        components: &[NameComponent<'_>],
        flags: NameFlags,
    ) -> Result<Self, EncodeError> {
        let typ = suite.default_component_type();
        let mut all: Vec<NameComponent<'_>> = components.to_vec();
        if flags.nfn {
            if flags.thunk {
                all.push(NameComponent {
                    typ,
                    bytes: THUNK_COMPONENT,
                });
            }
            all.push(NameComponent {
                typ,
                bytes: NFN_COMPONENT,
            });
        }

        let capacity = all
            .iter()
            .map(|c| c.bytes.len() + 2 * MAX_COMPONENT_OVERHEAD)
            .sum::<usize>()
            + 2 * MAX_COMPONENT_OVERHEAD;
        let mut buf = PrependBuffer::with_capacity(capacity);
        suite::prepend_name(suite, &all, &mut buf)?;

        suite::parse_name(suite, buf.written())
            .map(|(name, _)| name)
            .map_err(decode_failure)
    }

    pub fn suite(&self) -> Suite {
        self.suite
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub(crate) fn set_chunk(&mut self, chunk: Option<u32>) {
        self.chunk = chunk;
    }

    pub fn chunk(&self) -> Option<u32> {
        self.chunk
    }

    pub fn flags(&self) -> NameFlags {
        self.flags
    }

    // The encoded name element, which is also the identity of the name for the
    //  purposes of caching: two names are the same entry iff these bytes agree.
    pub fn key(&self) -> &[u8] {
        &self.encoded
    }

    pub fn component(&self, index: usize) -> Option<NameComponent<'_>> {
        self.components
            .get(index)
            .map(|(typ, range)| NameComponent {
                typ: *typ,
                bytes: &self.encoded[range.clone()],
            })
    }

    pub fn components(&self) -> impl DoubleEndedIterator<Item = NameComponent<'_>> + '_ {
        self.components.iter().map(|(typ, range)| NameComponent {
            typ: *typ,
            bytes: &self.encoded[range.clone()],
        })
    }

    // A new name made of the first `count` components, without flags.
    pub fn prefix(&self, count: usize) -> Result<Self, EncodeError> {
        let components: Vec<_> = self.components().take(count).collect();
        Self::build(self.suite, &components, NameFlags::default())
    }

    pub fn adding_component(&self, bytes: &[u8]) -> Result<Self, EncodeError> {
        let mut components: Vec<_> = self.components().collect();
        components.push(NameComponent {
            typ: self.suite.default_component_type(),
            bytes,
        });
        Self::build(self.suite, &components, self.flags)
    }

    pub fn with_flags(&self, flags: NameFlags) -> Result<Self, EncodeError> {
        let components: Vec<_> = self.components().collect();
        Self::build(self.suite, &components, flags)
    }

    // Chunk numbers are carried as a name component in the TLV suites, so
    //  setting one replaces a trailing chunk component or appends a new one.
    pub fn with_chunk(&self, chunk: u32) -> Result<Self, EncodeError> {
        let (typ, bytes) = suite::chunk_component(self.suite, chunk)?;
        let mut components: Vec<_> = self.components().collect();
        if self.chunk.is_some() {
            if let Some(last) = components.last() {
                if suite::is_chunk_component(self.suite, *last) {
                    components.pop();
                }
            }
        }
        components.push(NameComponent { typ, bytes: &bytes });
        Self::build(self.suite, &components, self.flags)
    }

    // Compares `self` against `prefix`, where `digest` (if given) acts as one
    //  extra component after the last one of `self`.
    // Returns the number of matching components when the mode is satisfied:
    //  Exact and Prefix give None on a mismatch, Longest always gives a count.
    pub fn compare(
        &self,
        digest: Option<&[u8]>,
        prefix: &Name,
        mode: CompareMode,
    ) -> Option<usize> {
        let own_len = self.len() + digest.map_or(0, |_| 1);

        if self.suite != prefix.suite {
            return match mode {
                CompareMode::Longest => Some(0),
                _ => None,
            };
        }

        if mode == CompareMode::Exact
            && (prefix.len() != own_len
                || self.chunk != prefix.chunk
                || self.flags != prefix.flags)
        {
            return None;
        }

        let mut matched = 0;
        for (i, theirs) in prefix.components().enumerate().take(own_len) {
            let same = match self.component(i) {
                Some(ours) => ours == theirs,
                // Only reached for the extra digest component
                None => digest == Some(theirs.bytes),
            };
            if !same {
                break;
            }
            matched += 1;
        }

        match mode {
            CompareMode::Exact => (matched == own_len).then_some(matched),
            CompareMode::Prefix => (matched == prefix.len()).then_some(matched),
            CompareMode::Longest => Some(matched),
        }
    }

    // Whether an interest for `self`, with the given suffix-component bounds,
    //  is satisfied by content named `content_name`. When the interest name is
    //  exactly one component longer than the content name, the last interest
    //  component must be the implicit digest of the content packet.
    pub fn is_prefix_of_content<D>(
        &self,
        min_suffix: u32,
        max_suffix: u32,
        content_name: &Name,
        digest: D,
    ) -> bool
    where
        D: FnOnce() -> Option<[u8; 32]>,
    {
        let prefix_len = self.len() as u64;
        let content_len = content_name.len() as u64 + 1;
        if prefix_len + min_suffix as u64 > content_len
            || prefix_len + (max_suffix as u64) < content_len
        {
            return false;
        }

        if prefix_len == content_len {
            match digest() {
                Some(digest) => content_name
                    .compare(Some(&digest), self, CompareMode::Prefix)
                    .is_some(),
                None => false,
            }
        } else {
            content_name
                .compare(None, self, CompareMode::Prefix)
                .is_some()
        }
    }
}

// Upper bound of header bytes any suite spends on one name element.
const MAX_COMPONENT_OVERHEAD: usize = 10;

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            f.write_str("/")?;
        }
        for component in self.components() {
            f.write_str("/")?;
            for b in component.bytes {
                if b.is_ascii_alphanumeric() || b"-._~".contains(b) {
                    write!(f, "{}", *b as char)?;
                } else {
                    write!(f, "%{:02X}", b)?;
                }
            }
        }
        if self.flags.thunk {
            f.write_str("[thunk]")?;
        }
        if self.flags.nfn {
            f.write_str("[nfn]")?;
        }
        Ok(())
    }
}

pub(crate) fn decode_failure(err: DecodeError) -> EncodeError {
    match err {
        DecodeError::InvalidInteger { .. } => EncodeError::UnsupportedField("chunk number"),
        _ => EncodeError::UnsupportedField("name component"),
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        name::{CompareMode, Name, NameFlags},
        suite::Suite,
    };

    fn name(suite: Suite, path: &[&str]) -> Name {
        let components: Vec<&[u8]> = path.iter().map(|c| c.as_bytes()).collect();
        Name::from_components(suite, &components).unwrap()
    }

    #[test]
    fn test_components_and_display() {
        for suite in Suite::ALL {
            let n = name(suite, &["a", "b c"]);
            assert_eq!(n.len(), 2);
            assert_eq!(n.component(0).unwrap().bytes, b"a");
            assert_eq!(n.component(1).unwrap().bytes, b"b c");
            assert_eq!(n.to_string(), "/a/b%20c");
            assert_eq!(n.suite(), suite);
        }
        assert_eq!(name(Suite::NdnTlv, &[]).to_string(), "/");
    }

    #[test]
    fn test_nfn_flags_are_lifted() {
        for suite in Suite::ALL {
            let n = name(suite, &["add", "THUNK", "NFN"]);
            assert_eq!(n.len(), 1);
            assert_eq!(
                n.flags(),
                NameFlags {
                    nfn: true,
                    thunk: true
                }
            );
            assert_eq!(n.to_string(), "/add[thunk][nfn]");

            // THUNK alone is an ordinary component
            let n = name(suite, &["add", "THUNK"]);
            assert_eq!(n.len(), 2);
            assert_eq!(n.flags(), NameFlags::default());

            let rebuilt = name(suite, &["add"])
                .with_flags(NameFlags {
                    nfn: true,
                    thunk: false,
                })
                .unwrap();
            assert_eq!(rebuilt, name(suite, &["add", "NFN"]));
        }
    }

    #[test]
    fn test_compare_modes() {
        let ab = name(Suite::NdnTlv, &["a", "b"]);
        let abc = name(Suite::NdnTlv, &["a", "b", "c"]);
        let ax = name(Suite::NdnTlv, &["a", "x"]);

        assert_eq!(ab.compare(None, &ab, CompareMode::Exact), Some(2));
        assert_eq!(abc.compare(None, &ab, CompareMode::Exact), None);
        assert_eq!(abc.compare(None, &ab, CompareMode::Prefix), Some(2));
        assert_eq!(ab.compare(None, &abc, CompareMode::Prefix), None);
        assert_eq!(ax.compare(None, &abc, CompareMode::Longest), Some(1));
        assert_eq!(ab.compare(None, &abc, CompareMode::Longest), Some(2));

        // The same path in another suite never matches
        let other = name(Suite::CcnTlv, &["a", "b"]);
        assert_eq!(ab.compare(None, &other, CompareMode::Exact), None);
        assert_eq!(ab.compare(None, &other, CompareMode::Longest), Some(0));
    }

    #[test]
    fn test_digest_component() {
        let digest = [7u8; 32];
        let content = name(Suite::Ccnb, &["a"]);
        let with_digest = Name::from_components(Suite::Ccnb, &[b"a", &digest]).unwrap();
        assert_eq!(
            content.compare(Some(&digest), &with_digest, CompareMode::Exact),
            Some(2)
        );
        assert!(with_digest.is_prefix_of_content(0, 64, &content, || Some(digest)));
        assert!(!with_digest.is_prefix_of_content(0, 64, &content, || Some([8u8; 32])));
        assert!(!with_digest.is_prefix_of_content(0, 64, &content, || None));
    }

    #[test]
    fn test_suffix_bounds() {
        let prefix = name(Suite::Ccnb, &["a"]);
        let content = name(Suite::Ccnb, &["a", "b", "c"]);
        // content has 2 more components plus the implicit digest = 3 suffix components
        assert!(prefix.is_prefix_of_content(0, 64, &content, || None));
        assert!(prefix.is_prefix_of_content(3, 3, &content, || None));
        assert!(!prefix.is_prefix_of_content(4, 64, &content, || None));
        assert!(!prefix.is_prefix_of_content(0, 2, &content, || None));
    }

    #[test]
    fn test_chunks() {
        let n = name(Suite::CcnTlv, &["video"]).with_chunk(7).unwrap();
        assert_eq!(n.chunk(), Some(7));
        assert_eq!(n.len(), 2);
        let n2 = n.with_chunk(8).unwrap();
        assert_eq!(n2.chunk(), Some(8));
        assert_eq!(n2.len(), 2);
        assert_ne!(n, n2);
        assert_eq!(n.compare(None, &n2, CompareMode::Exact), None);

        let n = name(Suite::NdnTlv, &["video"]).with_chunk(300).unwrap();
        assert_eq!(n.chunk(), Some(300));
        assert_eq!(n.component(1).unwrap().bytes, &[0x00, 0x01, 0x2c]);

        assert!(name(Suite::Ccnb, &["video"]).with_chunk(1).is_err());
    }

    #[test]
    fn test_prefix_and_adding() {
        let n = name(Suite::NdnTlv, &["a", "b", "c"]);
        assert_eq!(n.prefix(2).unwrap(), name(Suite::NdnTlv, &["a", "b"]));
        assert_eq!(
            name(Suite::NdnTlv, &["a", "b"]).adding_component(b"c").unwrap(),
            n
        );
    }
}
