use std::borrow::Cow;

use nfc_reader::codec::{from_hex, to_decimal, to_hex, to_reversed_decimal, to_reversed_hex};
use nfc_reader::normalizer::{normalize, repair};
use nfc_reader::tag::extras;
use nfc_reader::tech::{EXTRA_ATQA, EXTRA_NDEF_MAXLENGTH, EXTRA_NDEF_MSG, EXTRA_NDEF_TYPE, EXTRA_SAK};
use nfc_reader::{
    ExtraValue, Extras, NdefMessage, NdefRecord, RawTagDescriptor, TagHandle, TechnologyTag, inspect,
};

const ID: [u8; 4] = [0x04, 0x3A, 0x9C, 0x1B];

fn nfca(sak: u16) -> Extras {
    extras([
        (EXTRA_ATQA, ExtraValue::Bytes(vec![0x04, 0x00])),
        (EXTRA_SAK, ExtraValue::Short(sak)),
    ])
}

fn ndef_extras() -> Extras {
    let msg = NdefMessage::new(vec![NdefRecord::text("hello", "en", true).unwrap()]).unwrap();
    extras([
        (EXTRA_NDEF_MSG, ExtraValue::Bytes(msg.to_bytes())),
        (EXTRA_NDEF_MAXLENGTH, ExtraValue::Int(716)),
        (EXTRA_NDEF_TYPE, ExtraValue::Int(101)),
    ])
}

fn split_sak_tag() -> TagHandle {
    TagHandle::assemble(
        RawTagDescriptor::new(ID.to_vec())
            .with_technology(TechnologyTag::NfcA, Some(nfca(0x08)))
            .with_technology(TechnologyTag::NfcA, Some(nfca(0x20)))
            .with_technology(TechnologyTag::MifareClassic, None),
    )
    .unwrap()
}

#[test]
fn identifier_encodings() {
    assert_eq!(to_hex(&ID), "1b 9c 3a 04");
    assert_eq!(to_reversed_hex(&ID), "04 3a 9c 1b");
    assert_eq!(to_decimal(&ID), 463_223_300);
    assert_eq!(to_reversed_decimal(&ID), 70_949_915);
    assert_eq!(from_hex(&to_hex(&ID)), Some(ID.to_vec()));
}

#[test]
fn report_has_one_block_per_technology_in_priority_order() {
    // Declared out of dump order on purpose
    let tag = TagHandle::assemble(
        RawTagDescriptor::new(ID.to_vec())
            .with_technology(TechnologyTag::NfcA, Some(nfca(0x08)))
            .with_technology(TechnologyTag::MifareClassic, Some(Extras::new()))
            .with_technology(TechnologyTag::Ndef, Some(ndef_extras())),
    )
    .unwrap();

    let report = inspect(&tag);
    let lines = report.lines();

    assert_eq!(lines[0], "ID (hex): 1b 9c 3a 04");
    assert_eq!(lines[1], "ID (reversed hex): 04 3a 9c 1b");
    assert_eq!(lines[2], "ID (dec): 463223300");
    assert_eq!(lines[3], "ID (reversed dec): 70949915");
    assert_eq!(lines[4], "Technologies: NfcA, MifareClassic, Ndef");

    let order: Vec<_> = report.sections().map(|(tech, _)| tech).collect();
    assert_eq!(
        order,
        [TechnologyTag::MifareClassic, TechnologyTag::Ndef, TechnologyTag::NfcA]
    );

    assert_eq!(
        lines[5..],
        [
            "Mifare Classic type: Classic",
            "Mifare size: 1024 bytes",
            "Mifare sectors: 16",
            "Mifare blocks: 64",
            "Ndef type: com.nxp.ndef.mifareclassic, curSize: 12, maxSize: 716",
            "NfcA ATQA: 00 04, SAK: 8, timeout: 0, maxTransceiveLength: 0",
        ]
    );
}

#[test]
fn dump_is_deterministic() {
    let tag = split_sak_tag();
    assert_eq!(inspect(&tag).to_text(), inspect(&tag).to_text());
}

#[test]
fn split_sak_is_merged_and_classic_extras_borrowed() {
    let fixed = normalize(split_sak_tag().disassemble()).unwrap().unwrap();
    let canonical = fixed.technology_extras[0].as_ref().unwrap();

    assert_eq!(canonical.get(EXTRA_SAK), Some(&ExtraValue::Short(0x28)));
    assert_eq!(fixed.technology_extras[2].as_ref(), Some(canonical));
}

#[test]
fn repair_is_idempotent() {
    let tag = split_sak_tag();
    let once = repair(&tag).unwrap().into_owned();
    let twice = repair(&once).unwrap();
    assert_eq!(*twice, once);
    assert!(matches!(twice, Cow::Borrowed(_)));
}

#[test]
fn classic_is_readable_after_repair_in_report() {
    let report = inspect(&split_sak_tag());
    let (tech, classic) = report.sections().next().unwrap();
    assert_eq!(tech, TechnologyTag::MifareClassic);
    assert_eq!(classic[0], "Mifare Classic type: Classic");
    assert!(report.lines().iter().all(|l| !l.contains("error")));
}

#[test]
fn report_json_carries_id_and_lines() {
    let report = inspect(&split_sak_tag());
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["id"], serde_json::json!([4, 58, 156, 27]));
    assert_eq!(json["lines"][4], "Technologies: NfcA, NfcA, MifareClassic");
}
