//! Alternate-format programs.
//!
//! Contract code beginning with [`PROGRAM_PREFIX`] is not EVM bytecode but a
//! program for another execution engine. The pipeline only needs to tell the
//! two apart and to remember which programs a block invoked. Compiling and
//! caching programs is the concern of the host chain.

use alloy::primitives::{keccak256, Address, Bytes, B256};
use std::collections::BTreeMap;

/// Discriminator prefix of an alternate-format program.
pub const PROGRAM_PREFIX: [u8; 4] = [0xEF, 0x00, 0x00, 0x00];

/// Classifies contract code.
pub trait CodeClassifier: core::fmt::Debug {
    /// The program payload if `code` is an alternate-format program, with
    /// any discriminator removed.
    fn program_payload<'a>(&self, code: &'a [u8]) -> Option<&'a [u8]>;

    /// True if `code` is an alternate-format program.
    fn is_alternate_program(&self, code: &[u8]) -> bool {
        self.program_payload(code).is_some()
    }
}

/// Classifies by the [`PROGRAM_PREFIX`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrefixClassifier;

impl CodeClassifier for PrefixClassifier {
    fn program_payload<'a>(&self, code: &'a [u8]) -> Option<&'a [u8]> {
        strip_program_prefix(code)
    }
}

/// Remove the [`PROGRAM_PREFIX`], returning `None` if it is absent.
pub fn strip_program_prefix(code: &[u8]) -> Option<&[u8]> {
    code.strip_prefix(PROGRAM_PREFIX.as_slice())
}

/// A key identifying a program independently of consensus commitments.
///
/// `keccak256(version_be32 || code_hash)`. Used only to key recorded
/// programs.
pub fn noncanonical_program_hash(version: u32, code_hash: B256) -> B256 {
    let mut buf = [0u8; 36];
    buf[..4].copy_from_slice(&version.to_be_bytes());
    buf[4..].copy_from_slice(code_hash.as_slice());
    keccak256(buf)
}

/// A program invoked during execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedProgram {
    /// Key of the program, see [`noncanonical_program_hash`].
    pub noncanonical_hash: B256,
    /// The program payload, without prefix.
    pub payload: Bytes,
}

/// Records each distinct alternate program invoked, keyed by
/// `(version, address)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramRecorder {
    version: u32,
    programs: BTreeMap<(u32, Address), RecordedProgram>,
}

impl ProgramRecorder {
    /// Instantiate a recorder for the given program version.
    pub const fn new(version: u32) -> Self {
        Self { version, programs: BTreeMap::new() }
    }

    /// The program version recorded under.
    pub const fn version(&self) -> u32 {
        self.version
    }

    /// Record the payload of the program at `address`, as extracted by a
    /// [`CodeClassifier`]. Returns `false` if the address was already
    /// recorded, in which case nothing changes.
    pub fn record(&mut self, address: Address, code_hash: B256, payload: &[u8]) -> bool {
        let key = (self.version, address);
        if self.programs.contains_key(&key) {
            return false;
        }
        self.programs.insert(
            key,
            RecordedProgram {
                noncanonical_hash: noncanonical_program_hash(self.version, code_hash),
                payload: Bytes::copy_from_slice(payload),
            },
        );
        true
    }

    /// Get a recorded program.
    pub fn get(&self, address: Address) -> Option<&RecordedProgram> {
        self.programs.get(&(self.version, address))
    }

    /// Number of recorded programs.
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    /// True if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Iterate over the recorded programs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&(u32, Address), &RecordedProgram)> {
        self.programs.iter()
    }

    /// Take the recorded programs, leaving the recorder empty.
    pub fn take(&mut self) -> BTreeMap<(u32, Address), RecordedProgram> {
        core::mem::take(&mut self.programs)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn classify() {
        let c = PrefixClassifier;
        assert!(c.is_alternate_program(&[0xEF, 0, 0, 0, 1, 2]));
        assert!(c.is_alternate_program(&PROGRAM_PREFIX));
        assert!(!c.is_alternate_program(&[0xEF, 0, 0]));
        assert!(!c.is_alternate_program(&[0xEF, 0, 1, 0, 1]));
        assert!(!c.is_alternate_program(&[0x60, 0x00]));

        assert_eq!(c.program_payload(&[0xEF, 0, 0, 0, 9]), Some([9u8].as_slice()));
        assert_eq!(c.program_payload(&[0x60]), None);
    }

    /// Treats code starting with `0xFE 0xED` as a program.
    #[derive(Debug)]
    struct FeedClassifier;

    impl CodeClassifier for FeedClassifier {
        fn program_payload<'a>(&self, code: &'a [u8]) -> Option<&'a [u8]> {
            code.strip_prefix([0xFE, 0xED].as_slice())
        }
    }

    #[test]
    fn custom_discriminator() {
        let c = FeedClassifier;
        assert!(c.is_alternate_program(&[0xFE, 0xED, 1]));
        assert!(!c.is_alternate_program(&PROGRAM_PREFIX));
        assert_eq!(c.program_payload(&[0xFE, 0xED, 1, 2]), Some([1u8, 2].as_slice()));
    }

    #[test]
    fn record_once() {
        let mut recorder = ProgramRecorder::new(1);
        let addr = Address::repeat_byte(7);
        let hash = B256::repeat_byte(3);

        assert!(recorder.is_empty());
        assert!(recorder.record(addr, hash, &[0xAA]));
        assert!(!recorder.record(addr, hash, &[0xBB]));
        assert_eq!(recorder.len(), 1);

        let program = recorder.get(addr).unwrap();
        assert_eq!(program.payload, Bytes::from_static(&[0xAA]));
        assert_eq!(program.noncanonical_hash, noncanonical_program_hash(1, hash));
        assert_ne!(program.noncanonical_hash, noncanonical_program_hash(2, hash));
    }
}
