// src/normalizer.rs
//! Repair for tags enumerated with duplicate NfcA entries.
//!
//! Some NFC stacks report one physical Classic card with two or more NfcA
//! entries, each carrying part of the SAK, and with no extras on the
//! MifareClassic entry. The Classic accessor then cannot classify the card.
//! Repair merges the SAK bits into the first NfcA entry and lends that
//! entry's extras to the MifareClassic entry.

use std::borrow::Cow;

use crate::error::DescriptorError;
use crate::tag::{ExtraValue, Extras, RawTagDescriptor, TagHandle, TechnologyTag};
use crate::tech::EXTRA_SAK;

fn sak_of(extras: Option<&Extras>) -> Option<u16> {
    match extras?.get(EXTRA_SAK)? {
        ExtraValue::Short(sak) => Some(*sak),
        ExtraValue::Byte(sak) => Some(*sak as u16),
        _ => None,
    }
}

/// Corrects a descriptor in place of the platform. Returns `Ok(None)` when
/// there is nothing to correct.
pub fn normalize(
    mut descriptor: RawTagDescriptor,
) -> Result<Option<RawTagDescriptor>, DescriptorError> {
    if descriptor.identifier.is_none() {
        return Err(DescriptorError::MissingIdentifier);
    }
    if descriptor.technology_codes.len() != descriptor.technology_extras.len() {
        return Err(DescriptorError::LengthMismatch {
            codes: descriptor.technology_codes.len(),
            extras: descriptor.technology_extras.len(),
        });
    }

    let mut nfca_idx: Option<usize> = None;
    let mut classic_idx: Option<usize> = None;
    let mut original_sak: u16 = 0;
    let mut merged_sak: u16 = 0;

    for (idx, &code) in descriptor.technology_codes.iter().enumerate() {
        let tech = TechnologyTag::from_code(code).ok_or(DescriptorError::UnknownTechnology(code))?;
        match tech {
            TechnologyTag::NfcA => {
                let sak = sak_of(descriptor.technology_extras[idx].as_ref());
                if nfca_idx.is_none() {
                    nfca_idx = Some(idx);
                    if let Some(sak) = sak {
                        original_sak = sak;
                        merged_sak = sak;
                    }
                } else if let Some(sak) = sak {
                    merged_sak |= sak;
                }
            }
            TechnologyTag::MifareClassic => classic_idx = Some(idx),
            _ => {}
        }
    }

    let mut modified = false;

    // merged_sak only differs when at least one NfcA entry exists
    if let Some(nfca) = nfca_idx.filter(|_| merged_sak != original_sak) {
        descriptor.technology_extras[nfca]
            .get_or_insert_with(Extras::new)
            .insert(EXTRA_SAK.to_string(), ExtraValue::Short(merged_sak));
        modified = true;
    }

    if let (Some(nfca), Some(classic)) = (nfca_idx, classic_idx) {
        if descriptor.technology_extras[classic].is_none() {
            if let Some(borrowed) = descriptor.technology_extras[nfca].clone() {
                descriptor.technology_extras[classic] = Some(borrowed);
                modified = true;
            }
        }
    }

    Ok(modified.then_some(descriptor))
}

/// Returns the tag itself when nothing needed fixing, a newly assembled tag
/// when something did, and an error when the tag cannot be repaired.
pub fn repair(tag: &TagHandle) -> Result<Cow<'_, TagHandle>, DescriptorError> {
    match normalize(tag.disassemble())? {
        None => Ok(Cow::Borrowed(tag)),
        Some(fixed) => TagHandle::assemble(fixed).map(Cow::Owned),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::{ServiceReference, extras};
    use crate::tech::EXTRA_ATQA;

    fn nfca(sak: u16) -> Extras {
        extras([
            (EXTRA_ATQA, ExtraValue::Bytes(vec![0x04, 0x00])),
            (EXTRA_SAK, ExtraValue::Short(sak)),
        ])
    }

    fn split_sak_descriptor() -> RawTagDescriptor {
        RawTagDescriptor::new(vec![0x04, 0x3A, 0x9C, 0x1B])
            .with_technology(TechnologyTag::NfcA, Some(nfca(0x08)))
            .with_technology(TechnologyTag::NfcA, Some(nfca(0x20)))
            .with_technology(TechnologyTag::MifareClassic, None)
            .with_service(3, ServiceReference(0xBEEF))
    }

    #[test]
    fn test_merges_sak_and_lends_extras() {
        let fixed = normalize(split_sak_descriptor()).unwrap().unwrap();

        assert_eq!(sak_of(fixed.technology_extras[0].as_ref()), Some(0x28));
        assert_eq!(fixed.technology_extras[2], fixed.technology_extras[0]);
        // The duplicate is left alone
        assert_eq!(sak_of(fixed.technology_extras[1].as_ref()), Some(0x20));

        let original = split_sak_descriptor();
        assert_eq!(fixed.identifier, original.identifier);
        assert_eq!(fixed.technology_codes, original.technology_codes);
        assert_eq!(fixed.service_handle, 3);
        assert!(!fixed.is_mock);
        assert_eq!(fixed.service_reference, Some(ServiceReference(0xBEEF)));
    }

    #[test]
    fn test_repair_builds_new_tag_and_leaves_original() {
        let tag = TagHandle::assemble(split_sak_descriptor()).unwrap();
        let repaired = repair(&tag).unwrap();

        assert!(matches!(repaired, Cow::Owned(_)));
        assert_eq!(repaired.id(), tag.id());
        assert_eq!(repaired.technologies(), tag.technologies());
        assert!(tag.mifare_classic().is_err());
        assert_eq!(repaired.mifare_classic().unwrap().size_bytes, 1024);
        assert_eq!(tag.disassemble(), split_sak_descriptor());
    }

    #[test]
    fn test_repair_is_idempotent() {
        let tag = TagHandle::assemble(split_sak_descriptor()).unwrap();
        let once = repair(&tag).unwrap().into_owned();
        let twice = repair(&once).unwrap();

        assert!(matches!(twice, Cow::Borrowed(_)));
        assert_eq!(*twice, once);
    }

    #[test]
    fn test_clean_tag_is_returned_unchanged() {
        let tag = TagHandle::assemble(
            RawTagDescriptor::new(vec![1, 2, 3, 4])
                .with_technology(TechnologyTag::NfcA, Some(nfca(0x08)))
                .with_technology(TechnologyTag::MifareClassic, Some(nfca(0x08)))
                .with_technology(TechnologyTag::NdefFormatable, None),
        )
        .unwrap();

        let repaired = repair(&tag).unwrap();
        assert!(matches!(repaired, Cow::Borrowed(t) if std::ptr::eq(t, &tag)));
    }

    #[test]
    fn test_duplicate_without_sak_is_not_a_change() {
        let descriptor = RawTagDescriptor::new(vec![1])
            .with_technology(TechnologyTag::NfcA, Some(nfca(0x08)))
            .with_technology(TechnologyTag::NfcA, None);
        assert_eq!(normalize(descriptor), Ok(None));
    }

    #[test]
    fn test_sak_only_on_duplicate() {
        let descriptor = RawTagDescriptor::new(vec![1])
            .with_technology(TechnologyTag::NfcA, None)
            .with_technology(TechnologyTag::NfcA, Some(nfca(0x18)));
        let fixed = normalize(descriptor).unwrap().unwrap();
        assert_eq!(sak_of(fixed.technology_extras[0].as_ref()), Some(0x18));
    }

    #[test]
    fn test_classic_without_nfca_is_not_touched() {
        let descriptor = RawTagDescriptor::new(vec![1]).with_technology(TechnologyTag::MifareClassic, None);
        assert_eq!(normalize(descriptor), Ok(None));
    }

    #[test]
    fn test_unrepairable() {
        let mut no_id = split_sak_descriptor();
        no_id.identifier = None;
        assert_eq!(normalize(no_id), Err(DescriptorError::MissingIdentifier));

        let mut ragged = split_sak_descriptor();
        ragged.technology_extras.pop();
        assert_eq!(
            normalize(ragged),
            Err(DescriptorError::LengthMismatch { codes: 3, extras: 2 })
        );

        let mut unknown = split_sak_descriptor();
        unknown.technology_codes[2] = 10;
        assert_eq!(normalize(unknown), Err(DescriptorError::UnknownTechnology(10)));
    }
}
