use crate::{Result, constants::MAX_TAG_VALUE, error::Error};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier decoded from the card number field of an FDX-B tag.
///
/// Values never exceed [`MAX_TAG_VALUE`] (ten hexadecimal digits), so a
/// decoded tag is always representable as an [`AnimalId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TagId(u64);

impl TagId {
    /// Create a tag identifier with range validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidAnimalId` if the value needs more than ten
    /// hexadecimal digits.
    pub fn new(value: u64) -> Result<Self> {
        if value > MAX_TAG_VALUE {
            return Err(Error::InvalidAnimalId(format!(
                "Tag value {value:#x} exceeds {MAX_TAG_VALUE:#x}"
            )));
        }
        Ok(TagId(value))
    }

    /// Build a tag from the low 40 bits of `value`.
    ///
    /// Ten accumulated nibbles never exceed the mask, so this is lossless for
    /// values produced by the frame decoder.
    #[must_use]
    pub const fn truncating(value: u64) -> Self {
        TagId(value & MAX_TAG_VALUE)
    }

    /// Get the raw tag value.
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// The store key for the animal carrying this tag.
    #[must_use]
    pub fn animal_id(&self) -> AnimalId {
        // MAX_TAG_VALUE < i64::MAX
        AnimalId(self.0 as i64)
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable animal identifier used as the primary key of the animal store.
///
/// SQLite keys are signed 64-bit integers, so negative values are rejected
/// at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AnimalId(i64);

impl AnimalId {
    /// Create an animal ID.
    ///
    /// # Errors
    /// Returns `Error::InvalidAnimalId` for negative values.
    pub fn new(id: i64) -> Result<Self> {
        if id < 0 {
            return Err(Error::InvalidAnimalId(format!(
                "Animal ID must be non-negative, got {id}"
            )));
        }
        Ok(AnimalId(id))
    }

    /// Get the raw key.
    #[must_use]
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl From<TagId> for AnimalId {
    fn from(tag: TagId) -> Self {
        tag.animal_id()
    }
}

impl TryFrom<u64> for AnimalId {
    type Error = Error;

    fn try_from(value: u64) -> Result<Self> {
        let id = i64::try_from(value)
            .map_err(|_| Error::InvalidAnimalId(format!("{value} does not fit in i64")))?;
        AnimalId::new(id)
    }
}

impl fmt::Display for AnimalId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for AnimalId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let id: i64 = s
            .trim()
            .parse()
            .map_err(|_| Error::InvalidAnimalId(format!("Invalid animal ID: {s}")))?;
        AnimalId::new(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_tag_id_bounds() {
        assert!(TagId::new(0).is_ok());
        assert!(TagId::new(MAX_TAG_VALUE).is_ok());
        assert!(TagId::new(MAX_TAG_VALUE + 1).is_err());
        assert_eq!(TagId::truncating(MAX_TAG_VALUE + 1).as_u64(), 0);
    }

    #[test]
    fn test_tag_to_animal_id() {
        let tag = TagId::new(0x00_2A).unwrap();
        assert_eq!(AnimalId::from(tag).as_i64(), 42);

        let max = TagId::new(MAX_TAG_VALUE).unwrap();
        assert_eq!(max.animal_id().as_i64(), MAX_TAG_VALUE as i64);
    }

    #[rstest]
    #[case("42", 42)]
    #[case(" 7 ", 7)]
    #[case("0", 0)]
    fn test_animal_id_valid(#[case] input: &str, #[case] expected: i64) {
        let id: AnimalId = input.parse().unwrap();
        assert_eq!(id.as_i64(), expected);
    }

    #[rstest]
    #[case("-1")]
    #[case("cow")]
    #[case("")]
    fn test_animal_id_invalid(#[case] input: &str) {
        let result: Result<AnimalId> = input.parse();
        assert!(result.is_err());
    }

    #[test]
    fn test_animal_id_from_u64() {
        assert_eq!(AnimalId::try_from(42u64).unwrap().as_i64(), 42);
        assert!(AnimalId::try_from(u64::MAX).is_err());
    }
}
