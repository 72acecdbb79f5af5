//! Object Identifier (OID) type.
//!
//! OIDs are stored as `SmallVec<[u32; 16]>` to avoid heap allocation for common OIDs.
//! Ordering is arc-wise: the first differing arc decides, and a strict prefix
//! sorts before any of its extensions (`1.2 < 1.2.1 < 1.3`). This is the order
//! the registry relies on for GETNEXT.

use crate::error::{DecodeErrorKind, Error, OidErrorKind, Result};
use smallvec::SmallVec;
use std::fmt;

/// Maximum number of arcs (subidentifiers) allowed in an OID.
///
/// Per RFC 2578 Section 3.5: "there are at most 128 sub-identifiers in a value".
pub const MAX_OID_LEN: usize = 128;

/// Object Identifier.
///
/// Immutable once constructed. Parsing never yields a partially-valid value:
/// malformed input is an error.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Oid {
    arcs: SmallVec<[u32; 16]>,
}

impl Oid {
    /// Create an empty OID.
    pub fn empty() -> Self {
        Self {
            arcs: SmallVec::new(),
        }
    }

    /// Create an OID from arc values.
    pub fn new(arcs: impl IntoIterator<Item = u32>) -> Self {
        Self {
            arcs: arcs.into_iter().collect(),
        }
    }

    /// Create an OID from a slice of arcs.
    ///
    /// ```
    /// use snmp_engine::Oid;
    ///
    /// let oid = Oid::from_slice(&[1, 3, 6, 1, 2, 1, 1, 1, 0]);
    /// assert_eq!(oid.to_string(), "1.3.6.1.2.1.1.1.0");
    /// ```
    pub fn from_slice(arcs: &[u32]) -> Self {
        Self {
            arcs: SmallVec::from_slice(arcs),
        }
    }

    /// Parse an OID from dotted-decimal notation (e.g. `"1.3.6.1.2.1.1.1.0"`).
    ///
    /// A single leading dot is accepted (`".1.3.6"`). Empty input, empty
    /// components (`"1..3"`, `"1.3."`), non-numeric or out-of-range arcs and
    /// more than [`MAX_OID_LEN`] arcs are rejected.
    ///
    /// ```
    /// use snmp_engine::Oid;
    ///
    /// assert_eq!(Oid::parse(".1.3.6.1").unwrap().arcs(), &[1, 3, 6, 1]);
    /// assert!(Oid::parse("1.3.x").is_err());
    /// assert!(Oid::parse("").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let body = s.strip_prefix('.').unwrap_or(s);
        if body.is_empty() {
            return Err(Error::invalid_oid_with_input(OidErrorKind::Empty, s));
        }

        let mut arcs = SmallVec::new();

        for part in body.split('.') {
            if part.is_empty() {
                return Err(Error::invalid_oid_with_input(OidErrorKind::EmptyArc, s));
            }
            // u32::from_str accepts a leading '+', arcs may not carry a sign
            if !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(Error::invalid_oid_with_input(OidErrorKind::InvalidArc, s));
            }
            let arc: u32 = part
                .parse()
                .map_err(|_| Error::invalid_oid_with_input(OidErrorKind::InvalidArc, s))?;
            arcs.push(arc);
        }

        if arcs.len() > MAX_OID_LEN {
            return Err(Error::invalid_oid_with_input(
                OidErrorKind::TooManyArcs {
                    count: arcs.len(),
                    max: MAX_OID_LEN,
                },
                s,
            ));
        }

        Ok(Self { arcs })
    }

    /// Parse `prefix` and `suffix` as one OID.
    ///
    /// The two halves are joined with a single dot, so `"1.3.6.1.4.1.5."` +
    /// `"1.0"` and `"1.3.6.1.4.1.5"` + `".1.0"` both give `1.3.6.1.4.1.5.1.0`.
    /// An empty prefix parses the suffix alone.
    pub fn with_prefix(prefix: &str, suffix: &str) -> Result<Self> {
        let head = prefix.strip_suffix('.').unwrap_or(prefix);
        let tail = suffix.strip_prefix('.').unwrap_or(suffix);
        match (head.is_empty(), tail.is_empty()) {
            (true, _) => Self::parse(tail),
            (false, true) => Err(Error::invalid_oid_with_input(OidErrorKind::Empty, suffix)),
            (false, false) => Self::parse(&format!("{head}.{tail}")),
        }
    }

    /// Get the arc values.
    pub fn arcs(&self) -> &[u32] {
        &self.arcs
    }

    /// Get the number of arcs.
    pub fn len(&self) -> usize {
        self.arcs.len()
    }

    /// Check if the OID is empty.
    pub fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }

    /// Check if this OID starts with another OID.
    ///
    /// Every OID starts with itself and with the empty OID.
    pub fn starts_with(&self, other: &Oid) -> bool {
        self.arcs.len() >= other.arcs.len() && self.arcs[..other.arcs.len()] == other.arcs[..]
    }

    /// Get the parent OID (all arcs except the last), or `None` when empty.
    pub fn parent(&self) -> Option<Oid> {
        let (_, head) = self.arcs.split_last()?;
        Some(Oid::from_slice(head))
    }

    /// Create a child OID by appending an arc.
    pub fn child(&self, arc: u32) -> Oid {
        let mut arcs = self.arcs.clone();
        arcs.push(arc);
        Oid { arcs }
    }

    /// Create a new OID with `other`'s arcs appended.
    pub fn join(&self, other: &Oid) -> Oid {
        let mut arcs = self.arcs.clone();
        arcs.extend_from_slice(&other.arcs);
        Oid { arcs }
    }

    /// Encode to BER content octets (X.690 Section 8.19).
    ///
    /// The first two arcs are folded into one subidentifier as `arc1 * 40 + arc2`.
    /// An OID with a single arc is encoded as if its second arc were zero.
    pub fn to_ber_smallvec(&self) -> SmallVec<[u8; 64]> {
        let mut bytes = SmallVec::new();

        match self.arcs.as_slice() {
            [] => {}
            [first] => encode_subidentifier(&mut bytes, u64::from(*first) * 40),
            [first, second, rest @ ..] => {
                encode_subidentifier(&mut bytes, u64::from(*first) * 40 + u64::from(*second));
                for &arc in rest {
                    encode_subidentifier(&mut bytes, u64::from(arc));
                }
            }
        }

        bytes
    }

    /// Decode from BER content octets.
    ///
    /// Enforces [`MAX_OID_LEN`].
    pub fn from_ber(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Ok(Self::empty());
        }

        let mut arcs = SmallVec::new();

        let (first_subid, consumed) = decode_subidentifier(data, 0)?;
        match first_subid {
            0..40 => {
                arcs.push(0);
                arcs.push(first_subid);
            }
            40..80 => {
                arcs.push(1);
                arcs.push(first_subid - 40);
            }
            _ => {
                arcs.push(2);
                arcs.push(first_subid - 80);
            }
        }

        let mut i = consumed;
        while i < data.len() {
            let (arc, used) = decode_subidentifier(&data[i..], i)?;
            arcs.push(arc);
            i += used;

            if arcs.len() > MAX_OID_LEN {
                return Err(Error::decode(
                    i,
                    DecodeErrorKind::OidTooLong {
                        count: arcs.len(),
                        max: MAX_OID_LEN,
                    },
                ));
            }
        }

        Ok(Self { arcs })
    }
}

/// Base-128 subidentifier, most significant group first.
fn encode_subidentifier(bytes: &mut SmallVec<[u8; 64]>, value: u64) {
    let groups = (64 - value.leading_zeros()).div_ceil(7).max(1);
    for i in (0..groups).rev() {
        let mut byte = ((value >> (i * 7)) & 0x7F) as u8;
        if i > 0 {
            byte |= 0x80;
        }
        bytes.push(byte);
    }
}

/// Decode a subidentifier, returning (value, bytes_consumed).
fn decode_subidentifier(data: &[u8], base_offset: usize) -> Result<(u32, usize)> {
    let mut value: u32 = 0;

    for (i, &byte) in data.iter().enumerate() {
        if value > (u32::MAX >> 7) {
            return Err(Error::decode(
                base_offset + i,
                DecodeErrorKind::IntegerOverflow,
            ));
        }
        value = (value << 7) | u32::from(byte & 0x7F);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }

    Err(Error::decode(
        base_offset + data.len(),
        DecodeErrorKind::TruncatedData,
    ))
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for arc in &self.arcs {
            if !first {
                write!(f, ".")?;
            }
            write!(f, "{}", arc)?;
            first = false;
        }
        Ok(())
    }
}

impl std::str::FromStr for Oid {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<&[u32]> for Oid {
    fn from(arcs: &[u32]) -> Self {
        Self::from_slice(arcs)
    }
}

impl<const N: usize> From<[u32; N]> for Oid {
    fn from(arcs: [u32; N]) -> Self {
        Self::new(arcs)
    }
}

impl PartialOrd for Oid {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Oid {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Slice ordering is lexicographic with shorter-prefix-first
        self.arcs.as_slice().cmp(other.arcs.as_slice())
    }
}

/// Build an [`Oid`] from literal arcs.
///
/// ```
/// use snmp_engine::oid;
///
/// let sys_descr = oid!(1, 3, 6, 1, 2, 1, 1, 1, 0);
/// assert_eq!(sys_descr.to_string(), "1.3.6.1.2.1.1.1.0");
/// ```
#[macro_export]
macro_rules! oid {
    ($($arc:expr),* $(,)?) => {
        $crate::oid::Oid::from_slice(&[$($arc),*])
    };
}
