use crate::{
    Result,
    constants::{
        DEFAULT_ADMIN_PASSWORD, DEFAULT_SYSTEM_PASSCODE, MAX_CARD_UID_LENGTH, MAX_PASSCODE_LENGTH, MIN_CARD_UID_LENGTH,
        MIN_PASSCODE_LENGTH,
    },
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;

/// Proximity card identifier (4-10 raw UID bytes).
///
/// Serialized as a plain byte array so the persisted credential file keeps
/// the `[[byte, ...], ...]` layout.
///
/// # Security
/// This type implements constant-time comparison to prevent timing attacks
/// when comparing card identifiers during authentication.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct CardUid(Vec<u8>);

impl CardUid {
    /// Create a card UID with length validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidCardUid` if the UID is not 4-10 bytes long.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        let len = bytes.len();
        if !(MIN_CARD_UID_LENGTH..=MAX_CARD_UID_LENGTH).contains(&len) {
            return Err(Error::InvalidCardUid(format!(
                "UID must be {MIN_CARD_UID_LENGTH}-{MAX_CARD_UID_LENGTH} bytes, got {len}"
            )));
        }
        Ok(CardUid(bytes))
    }

    /// Raw UID bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// UID as contiguous uppercase hex, e.g. `E5A8BD02`.
    #[must_use]
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02X}", b)).collect()
    }
}

impl PartialEq for CardUid {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl TryFrom<Vec<u8>> for CardUid {
    type Error = Error;

    fn try_from(bytes: Vec<u8>) -> Result<Self> {
        CardUid::new(bytes)
    }
}

/// A single-size (4 byte) UID is always valid.
impl From<[u8; 4]> for CardUid {
    fn from(bytes: [u8; 4]) -> Self {
        CardUid(bytes.to_vec())
    }
}

impl From<CardUid> for Vec<u8> {
    fn from(uid: CardUid) -> Self {
        uid.0
    }
}

impl fmt::Display for CardUid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|b| format!("{:02X}", b)).collect();
        write!(f, "{}", parts.join(":"))
    }
}

impl std::str::FromStr for CardUid {
    type Err = Error;

    /// Parse `E5A8BD02`, `e5:a8:bd:02` or `E5 A8 BD 02`.
    fn from_str(s: &str) -> Result<Self> {
        let hex: String = s
            .chars()
            .filter(|c| !matches!(c, ':' | ' ' | '-'))
            .collect();

        if hex.len() % 2 != 0 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidCardUid(format!("not a hex UID: {s}")));
        }

        let bytes = (0..hex.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&hex[i..i + 2], 16))
            .collect::<std::result::Result<Vec<u8>, _>>()
            .map_err(|_| Error::InvalidCardUid(format!("not a hex UID: {s}")))?;

        CardUid::new(bytes)
    }
}

/// Numeric unlock passcode (4-8 digits).
///
/// # Security
/// Comparison is constant-time and the `Debug` output never reveals digits.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Passcode(String);

impl Passcode {
    /// Create a passcode with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidPasscode` if the code is not 4-8 ASCII digits.
    pub fn new(code: &str) -> Result<Self> {
        let len = code.len();
        if !(MIN_PASSCODE_LENGTH..=MAX_PASSCODE_LENGTH).contains(&len) {
            return Err(Error::InvalidPasscode(format!(
                "Passcode must be {MIN_PASSCODE_LENGTH}-{MAX_PASSCODE_LENGTH} digits, got {len}"
            )));
        }

        if !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::InvalidPasscode(
                "Passcode must contain digits only".to_string(),
            ));
        }

        Ok(Passcode(code.to_string()))
    }

    /// The factory admin password.
    #[must_use]
    pub fn default_admin() -> Self {
        Passcode(DEFAULT_ADMIN_PASSWORD.to_string())
    }

    /// Compare an entered code against this passcode in constant time.
    #[must_use]
    pub fn matches(&self, entered: &str) -> bool {
        self.0.as_bytes().ct_eq(entered.as_bytes()).into()
    }

    /// Number of digits, safe to display.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; a valid passcode has at least four digits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The factory passcode.
impl Default for Passcode {
    fn default() -> Self {
        Passcode(DEFAULT_SYSTEM_PASSCODE.to_string())
    }
}

impl PartialEq for Passcode {
    fn eq(&self, other: &Self) -> bool {
        self.matches(&other.0)
    }
}

impl Eq for Passcode {}

impl fmt::Debug for Passcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Passcode({} digits)", self.0.len())
    }
}

impl TryFrom<String> for Passcode {
    type Error = Error;

    fn try_from(code: String) -> Result<Self> {
        Passcode::new(&code)
    }
}

impl From<Passcode> for String {
    fn from(code: Passcode) -> Self {
        code.0
    }
}

/// Template slot number on the fingerprint sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FingerprintSlot(u16);

impl FingerprintSlot {
    #[must_use]
    pub const fn new(slot: u16) -> Self {
        FingerprintSlot(slot)
    }

    #[must_use]
    pub fn as_u16(&self) -> u16 {
        self.0
    }
}

impl From<u16> for FingerprintSlot {
    fn from(slot: u16) -> Self {
        FingerprintSlot(slot)
    }
}

impl fmt::Display for FingerprintSlot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_card_uid_valid() {
        let uid = CardUid::new(vec![0xe5, 0xa8, 0xbd, 0x02]).unwrap();
        assert_eq!(uid.as_bytes(), &[0xe5, 0xa8, 0xbd, 0x02]);
        assert_eq!(uid.to_hex(), "E5A8BD02");
        assert_eq!(uid.to_string(), "E5:A8:BD:02");
    }

    #[rstest]
    #[case(vec![])]
    #[case(vec![1, 2, 3])]
    #[case(vec![0; 11])]
    fn test_card_uid_invalid_length(#[case] bytes: Vec<u8>) {
        assert!(matches!(CardUid::new(bytes), Err(Error::InvalidCardUid(_))));
    }

    #[rstest]
    #[case("E5A8BD02")]
    #[case("e5:a8:bd:02")]
    #[case("E5 A8 BD 02")]
    fn test_card_uid_parse(#[case] input: &str) {
        let uid: CardUid = input.parse().unwrap();
        assert_eq!(uid, CardUid::new(vec![0xe5, 0xa8, 0xbd, 0x02]).unwrap());
    }

    #[test]
    fn test_card_uid_parse_rejects_garbage() {
        assert!("E5A8BD0".parse::<CardUid>().is_err());
        assert!("ZZZZZZZZ".parse::<CardUid>().is_err());
    }

    #[test]
    fn test_card_uid_serializes_as_byte_array() {
        let uid = CardUid::new(vec![0x1b, 0x93, 0xf2, 0x3c]).unwrap();
        let json = serde_json::to_string(&uid).unwrap();
        assert_eq!(json, "[27,147,242,60]");

        let short: std::result::Result<CardUid, _> = serde_json::from_str("[1,2]");
        assert!(short.is_err());
    }

    #[test]
    fn test_card_uid_different_lengths_not_equal() {
        let a = CardUid::new(vec![1, 2, 3, 4]).unwrap();
        let b = CardUid::new(vec![1, 2, 3, 4, 5, 6, 7]).unwrap();
        assert_ne!(a, b);
    }

    #[rstest]
    #[case("1234")]
    #[case("00000000")]
    #[case("080910")]
    fn test_passcode_valid(#[case] code: &str) {
        let passcode = Passcode::new(code).unwrap();
        assert!(passcode.matches(code));
        assert_eq!(passcode.len(), code.len());
    }

    #[rstest]
    #[case("123")]
    #[case("123456789")]
    #[case("12a4")]
    #[case("")]
    fn test_passcode_invalid(#[case] code: &str) {
        assert!(matches!(Passcode::new(code), Err(Error::InvalidPasscode(_))));
    }

    #[test]
    fn test_passcode_mismatch() {
        let passcode = Passcode::new("1234").unwrap();
        assert!(!passcode.matches("0000"));
        assert!(!passcode.matches("12345"));
        assert!(!passcode.matches(""));
    }

    #[test]
    fn test_passcode_debug_is_redacted() {
        let passcode = Passcode::new("9876").unwrap();
        let debug = format!("{:?}", passcode);
        assert!(!debug.contains("9876"));
        assert_eq!(debug, "Passcode(4 digits)");
    }

    #[test]
    fn test_default_passcode_is_valid() {
        let passcode = Passcode::default();
        assert!(Passcode::new(DEFAULT_SYSTEM_PASSCODE).is_ok());
        assert!(passcode.matches(DEFAULT_SYSTEM_PASSCODE));
    }

    #[test]
    fn test_card_uid_from_single_size_array() {
        let uid = CardUid::from([0xe5, 0xa8, 0xbd, 0x02]);
        assert_eq!(uid, CardUid::new(vec![0xe5, 0xa8, 0xbd, 0x02]).unwrap());
        assert!(Passcode::new(DEFAULT_ADMIN_PASSWORD).is_ok());
        assert!(Passcode::default_admin().matches(DEFAULT_ADMIN_PASSWORD));
    }

    #[test]
    fn test_fingerprint_slot_serde_transparent() {
        let slot = FingerprintSlot::new(3);
        assert_eq!(serde_json::to_string(&slot).unwrap(), "3");
        assert_eq!(slot.to_string(), "#3");
    }
}
