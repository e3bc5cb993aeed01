//! The persisted credential record and its schema defaulting.

use quadlock_core::constants::{DEFAULT_CARD_UID, DEFAULT_FINGERPRINT_SLOTS};
use quadlock_core::{CardUid, Error, FingerprintSlot, Passcode, Result};
use serde::{Deserialize, Serialize};

/// Everything the door accepts as a credential.
///
/// Serialized as
/// `{ "system_passcode": "1234", "valid_card_uids": [[27,147,242,60]], "fingerprint_ids": [1,2,3] }`.
/// Card UIDs and fingerprint ids keep insertion order and are unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub system_passcode: Passcode,
    pub valid_card_uids: Vec<CardUid>,
    pub fingerprint_ids: Vec<FingerprintSlot>,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            system_passcode: Passcode::default(),
            valid_card_uids: default_cards(),
            fingerprint_ids: DEFAULT_FINGERPRINT_SLOTS
                .iter()
                .copied()
                .map(FingerprintSlot::new)
                .collect(),
        }
    }
}

fn default_cards() -> Vec<CardUid> {
    vec![CardUid::from(DEFAULT_CARD_UID)]
}

impl Credentials {
    pub fn is_authorized_card(&self, uid: &CardUid) -> bool {
        self.valid_card_uids.iter().any(|known| known == uid)
    }

    pub fn has_fingerprint(&self, slot: FingerprintSlot) -> bool {
        self.fingerprint_ids.contains(&slot)
    }

    /// Add a card, rejecting one already present.
    pub fn add_card(&mut self, uid: CardUid) -> Result<()> {
        if self.is_authorized_card(&uid) {
            return Err(Error::DuplicateCard(uid.to_string()));
        }
        self.valid_card_uids.push(uid);
        Ok(())
    }

    /// Remove a card, rejecting one not present.
    pub fn remove_card(&mut self, uid: &CardUid) -> Result<()> {
        let before = self.valid_card_uids.len();
        self.valid_card_uids.retain(|known| known != uid);
        if self.valid_card_uids.len() == before {
            return Err(Error::UnknownCard(uid.to_string()));
        }
        Ok(())
    }

    pub fn add_fingerprint(&mut self, slot: FingerprintSlot) -> Result<()> {
        if self.has_fingerprint(slot) {
            return Err(Error::DuplicateFingerprint(slot.as_u16()));
        }
        self.fingerprint_ids.push(slot);
        Ok(())
    }

    pub fn remove_fingerprint(&mut self, slot: FingerprintSlot) -> Result<()> {
        if !self.has_fingerprint(slot) {
            return Err(Error::UnknownFingerprint(slot.as_u16()));
        }
        self.fingerprint_ids.retain(|known| *known != slot);
        Ok(())
    }
}

/// The on-disk document with every key optional.
///
/// `valid_rfid_uids` is accepted as an older spelling of `valid_card_uids`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct StoredDocument {
    system_passcode: Option<Passcode>,
    #[serde(alias = "valid_rfid_uids")]
    valid_card_uids: Option<Vec<CardUid>>,
    fingerprint_ids: Option<Vec<FingerprintSlot>>,
}

impl StoredDocument {
    /// Fill missing keys with factory defaults.
    ///
    /// Returns the merged record and whether it differs from the document,
    /// either because keys were filled in or because duplicate entries were
    /// collapsed. A differing record must be written back.
    pub(crate) fn merge_defaults(self) -> (Credentials, bool) {
        let defaults = Credentials::default();
        let mut changed = self.system_passcode.is_none()
            || self.valid_card_uids.is_none()
            || self.fingerprint_ids.is_none();

        let mut credentials = Credentials {
            system_passcode: self.system_passcode.unwrap_or(defaults.system_passcode),
            valid_card_uids: Vec::new(),
            fingerprint_ids: Vec::new(),
        };

        for uid in self.valid_card_uids.unwrap_or(defaults.valid_card_uids) {
            changed |= credentials.add_card(uid).is_err();
        }
        for slot in self.fingerprint_ids.unwrap_or(defaults.fingerprint_ids) {
            changed |= credentials.add_fingerprint(slot).is_err();
        }

        (credentials, changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(bytes: &[u8]) -> CardUid {
        CardUid::new(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_defaults() {
        let credentials = Credentials::default();
        assert!(credentials.system_passcode.matches("1234"));
        assert_eq!(credentials.valid_card_uids, vec![uid(&[0x1b, 0x93, 0xf2, 0x3c])]);
        assert_eq!(
            credentials.fingerprint_ids,
            vec![FingerprintSlot::new(1), FingerprintSlot::new(2), FingerprintSlot::new(3)]
        );
    }

    #[test]
    fn test_schema_key_names() {
        let json = serde_json::to_value(Credentials::default()).unwrap();
        assert_eq!(json["system_passcode"], "1234");
        assert_eq!(json["valid_card_uids"][0][0], 0x1b);
        assert_eq!(json["fingerprint_ids"][2], 3);
    }

    #[test]
    fn test_add_duplicate_card_rejected() {
        let mut credentials = Credentials::default();
        let before = credentials.clone();

        let error = credentials.add_card(uid(&[0x1b, 0x93, 0xf2, 0x3c])).unwrap_err();
        assert!(matches!(error, Error::DuplicateCard(_)));
        assert_eq!(credentials, before);
    }

    #[test]
    fn test_remove_absent_card_rejected() {
        let mut credentials = Credentials::default();
        let error = credentials.remove_card(&uid(&[9, 9, 9, 9])).unwrap_err();
        assert!(matches!(error, Error::UnknownCard(_)));
    }

    #[test]
    fn test_fingerprint_uniqueness() {
        let mut credentials = Credentials::default();
        assert!(credentials.add_fingerprint(FingerprintSlot::new(2)).is_err());
        credentials.add_fingerprint(FingerprintSlot::new(7)).unwrap();
        credentials.remove_fingerprint(FingerprintSlot::new(7)).unwrap();
        assert!(matches!(
            credentials.remove_fingerprint(FingerprintSlot::new(7)),
            Err(Error::UnknownFingerprint(7))
        ));
    }

    #[test]
    fn test_merge_fills_missing_keys() {
        let document: StoredDocument =
            serde_json::from_str(r#"{"system_passcode": "5555"}"#).unwrap();
        let (credentials, filled) = document.merge_defaults();

        assert!(filled);
        assert!(credentials.system_passcode.matches("5555"));
        assert_eq!(credentials.valid_card_uids, Credentials::default().valid_card_uids);
        assert_eq!(credentials.fingerprint_ids.len(), 3);
    }

    #[test]
    fn test_merge_accepts_legacy_key_and_collapses_duplicates() {
        let document: StoredDocument = serde_json::from_str(
            r#"{"system_passcode": "1234", "valid_rfid_uids": [[1,2,3,4],[1,2,3,4]], "fingerprint_ids": []}"#,
        )
        .unwrap();
        let (credentials, changed) = document.merge_defaults();

        assert!(changed);
        assert_eq!(credentials.valid_card_uids, vec![uid(&[1, 2, 3, 4])]);
        assert!(credentials.fingerprint_ids.is_empty());
    }

    #[test]
    fn test_merge_complete_document_unchanged() {
        let document: StoredDocument = serde_json::from_str(
            r#"{"system_passcode": "1234", "valid_card_uids": [[1,2,3,4]], "fingerprint_ids": [4, 5]}"#,
        )
        .unwrap();
        let (credentials, changed) = document.merge_defaults();

        assert!(!changed);
        assert_eq!(
            credentials.fingerprint_ids,
            vec![FingerprintSlot::new(4), FingerprintSlot::new(5)]
        );
    }
}
