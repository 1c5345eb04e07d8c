use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Smallest identifier ever issued. Everything below is reserved.
pub const MIN_ID: u16 = 1024;

/// Largest identifier ever issued. `0xFFFF` is reserved.
pub const MAX_ID: u16 = 65534;

/// Mask applied to the candidate counter to fold it into the id space.
pub const ID_MASK: u32 = 0xFFFF;

/// Number of identifiers in `[MIN_ID, MAX_ID]`.
pub const CAPACITY: usize = (MAX_ID - MIN_ID) as usize + 1;

/// Compact integer handle for a string key.
///
/// An `Identifier` always lies in `[MIN_ID, MAX_ID]`; the constructors reject
/// anything else, so holding one is proof that the value is issuable. The
/// numeric value is what travels over the wire and into the durable store.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Identifier(u16);

impl Identifier {
    /// Validate and wrap a raw value.
    pub fn new(raw: u16) -> Result<Self, TypeError> {
        if Self::is_legal(raw as i64) {
            Ok(Self(raw))
        } else {
            Err(TypeError::IdOutOfRange(raw as i64))
        }
    }

    /// Whether `raw` is inside the issuable range.
    pub fn is_legal(raw: i64) -> bool {
        (MIN_ID as i64..=MAX_ID as i64).contains(&raw)
    }

    /// The raw numeric value.
    pub fn get(self) -> u16 {
        self.0
    }
}

impl TryFrom<i64> for Identifier {
    type Error = TypeError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        if Self::is_legal(raw) {
            Ok(Self(raw as u16))
        } else {
            Err(TypeError::IdOutOfRange(raw))
        }
    }
}

impl TryFrom<u32> for Identifier {
    type Error = TypeError;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        Self::try_from(raw as i64)
    }
}

impl From<Identifier> for i64 {
    fn from(id: Identifier) -> Self {
        id.0 as i64
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({})", self.0)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn bounds_are_legal() {
        assert!(Identifier::new(MIN_ID).is_ok());
        assert!(Identifier::new(MAX_ID).is_ok());
    }

    #[test]
    fn reserved_values_are_rejected() {
        assert_eq!(Identifier::new(0), Err(TypeError::IdOutOfRange(0)));
        assert_eq!(Identifier::new(1023), Err(TypeError::IdOutOfRange(1023)));
        assert_eq!(Identifier::new(0xFFFF), Err(TypeError::IdOutOfRange(65535)));
        assert!(Identifier::try_from(-1i64).is_err());
    }

    #[test]
    fn capacity_matches_range() {
        assert_eq!(CAPACITY, 64511);
        assert_eq!(usize::from(MAX_ID - MIN_ID) + 1, CAPACITY);
    }

    #[test]
    fn serde_is_a_bare_integer() {
        let id = Identifier::new(4242).unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "4242");
        let parsed: Identifier = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn serde_rejects_reserved_values() {
        assert!(serde_json::from_str::<Identifier>("12").is_err());
        assert!(serde_json::from_str::<Identifier>("65535").is_err());
    }

    #[test]
    fn display_is_the_number() {
        assert_eq!(Identifier::new(2048).unwrap().to_string(), "2048");
    }

    proptest! {
        #[test]
        fn try_from_accepts_exactly_the_legal_range(raw in -70_000i64..140_000) {
            let legal = (1024..=65534).contains(&raw);
            prop_assert_eq!(Identifier::try_from(raw).is_ok(), legal);
            if let Ok(id) = Identifier::try_from(raw) {
                prop_assert_eq!(i64::from(id), raw);
            }
        }
    }
}
