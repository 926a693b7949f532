// src/dumper.rs
use std::borrow::Cow;

use crate::codec::{to_decimal, to_hex, to_reversed_decimal, to_reversed_hex};
use crate::error::AccessError;
use crate::inspect::InspectionReport;
use crate::normalizer;
use crate::tag::{TagHandle, TechnologyTag};
use crate::tech::{MifareClassicParams, TechnologyParameters};

/// Builds the report: four ID lines, the technology list, then one block per
/// technology present in [`TechnologyTag::DUMP_ORDER`]. A technology that
/// cannot be read yields an error line in its block.
pub fn dump(tag: &TagHandle) -> InspectionReport {
    let id = tag.id();
    let mut report = InspectionReport::new(id);

    report.push(format!("ID (hex): {}", to_hex(id)));
    report.push(format!("ID (reversed hex): {}", to_reversed_hex(id)));
    report.push(format!("ID (dec): {}", to_decimal(id)));
    report.push(format!("ID (reversed dec): {}", to_reversed_decimal(id)));

    let names: Vec<&str> = tag.technologies().iter().map(|t| t.name()).collect();
    report.push(format!("Technologies: {}", names.join(", ")));

    // Once Classic needed a repair, the rest is read from the repaired tag
    let mut current = Cow::Borrowed(tag);

    for tech in TechnologyTag::DUMP_ORDER {
        if !current.has(tech) {
            continue;
        }

        let lines = if tech == TechnologyTag::MifareClassic {
            let (result, repaired) = read_classic(&current);
            if let Some(repaired) = repaired {
                current = Cow::Owned(repaired);
            }
            match result {
                Ok(params) => describe_classic(&params),
                Err(e) => vec![format!("Mifare classic error: {}", e)],
            }
        } else {
            match current.parameters(tech) {
                Ok(params) => describe(&params),
                Err(e) => vec![format!("{} error: {}", tech, e)],
            }
        };

        report.push_section(tech, lines);
    }

    report
}

/// Reads Classic parameters, repairing the tag and retrying once when the
/// descriptor is malformed. The repaired tag is handed back only when the
/// retry succeeds; a failed retry reports its own error.
fn read_classic(tag: &TagHandle) -> (Result<MifareClassicParams, AccessError>, Option<TagHandle>) {
    let first = match tag.mifare_classic() {
        Err(e) if e.is_malformed_descriptor() => e,
        other => return (other, None),
    };

    match normalizer::repair(tag) {
        Ok(Cow::Owned(repaired)) => match repaired.mifare_classic() {
            Ok(params) => (Ok(params), Some(repaired)),
            Err(e) => (Err(e), None),
        },
        // Nothing to fix, or nothing fixable: the first failure stands
        Ok(Cow::Borrowed(_)) | Err(_) => (Err(first), None),
    }
}

fn describe_classic(p: &MifareClassicParams) -> Vec<String> {
    vec![
        format!("Mifare Classic type: {}", p.classic_type.name()),
        format!("Mifare size: {} bytes", p.size_bytes),
        format!("Mifare sectors: {}", p.sector_count),
        format!("Mifare blocks: {}", p.block_count),
    ]
}

fn describe(params: &TechnologyParameters) -> Vec<String> {
    let line = match params {
        TechnologyParameters::MifareClassic(p) => return describe_classic(p),
        TechnologyParameters::MifareUltralight(p) => {
            format!("Mifare Ultralight type: {}", p.ultralight_type.name())
        }
        TechnologyParameters::Ndef(p) => format!(
            "Ndef type: {}, curSize: {}, maxSize: {}",
            p.type_string, p.current_size_bytes, p.max_size_bytes
        ),
        TechnologyParameters::NdefFormatable => "NdefFormatable: formatable".to_string(),
        TechnologyParameters::NfcA(p) => format!(
            "NfcA ATQA: {}, SAK: {}, timeout: {}, maxTransceiveLength: {}",
            to_hex(&p.atqa),
            p.sak,
            p.timeout,
            p.max_transceive_length
        ),
        TechnologyParameters::NfcB(p) => format!(
            "NfcB applicationData: {}, protocolInfo: {}, maxTransceiveLength: {}",
            to_hex(&p.application_data),
            to_hex(&p.protocol_info),
            p.max_transceive_length
        ),
        TechnologyParameters::NfcF(p) => format!(
            "NfcF manufacturer: {}, systemCode: {}, timeout: {}, maxTransceiveLength: {}",
            to_hex(&p.manufacturer),
            to_hex(&p.system_code),
            p.timeout,
            p.max_transceive_length
        ),
        TechnologyParameters::NfcV(p) => format!(
            "NfcV dsfId: {}, responseFlags: {}, maxTransceiveLength: {}",
            p.dsf_id,
            to_hex(&[p.response_flags]),
            p.max_transceive_length
        ),
        TechnologyParameters::IsoDep(p) => format!(
            "IsoDep hiLayerResponse: {}, historicalBytes: {}, timeout: {}, maxTransceiveLength: {}",
            to_hex(&p.hi_layer_response),
            to_hex(&p.historical_bytes),
            p.timeout,
            p.max_transceive_length
        ),
    };
    vec![line]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::{ExtraValue, Extras, RawTagDescriptor, extras};
    use crate::tech::{EXTRA_ATQA, EXTRA_SAK};

    fn nfca(sak: u16) -> Extras {
        extras([
            (EXTRA_ATQA, ExtraValue::Bytes(vec![0x04, 0x00])),
            (EXTRA_SAK, ExtraValue::Short(sak)),
        ])
    }

    #[test]
    fn test_header_lines() {
        let tag = TagHandle::assemble(
            RawTagDescriptor::new(vec![0x04, 0x3A, 0x9C, 0x1B])
                .with_technology(TechnologyTag::NfcA, Some(nfca(0x08)))
                .with_technology(TechnologyTag::MifareClassic, Some(Extras::new())),
        )
        .unwrap();
        let report = dump(&tag);
        assert_eq!(
            report.lines()[..5],
            [
                "ID (hex): 1b 9c 3a 04",
                "ID (reversed hex): 04 3a 9c 1b",
                "ID (dec): 463223300",
                "ID (reversed dec): 70949915",
                "Technologies: NfcA, MifareClassic",
            ]
        );
    }

    #[test]
    fn test_classic_repair_on_split_sak() {
        let tag = TagHandle::assemble(
            RawTagDescriptor::new(vec![1, 2, 3, 4])
                .with_technology(TechnologyTag::NfcA, Some(nfca(0x08)))
                .with_technology(TechnologyTag::NfcA, Some(nfca(0x20)))
                .with_technology(TechnologyTag::MifareClassic, None),
        )
        .unwrap();
        let report = dump(&tag);
        let sections: Vec<_> = report.sections().collect();

        assert_eq!(sections[0].0, TechnologyTag::MifareClassic);
        assert_eq!(sections[0].1[0], "Mifare Classic type: Classic");
        assert_eq!(sections[0].1[1], "Mifare size: 1024 bytes");
        // NfcA is read from the repaired tag
        assert_eq!(sections[1].1, ["NfcA ATQA: 00 04, SAK: 40, timeout: 0, maxTransceiveLength: 0"]);
    }

    #[test]
    fn test_classic_unrepairable_reports_first_error() {
        let tag = TagHandle::assemble(
            RawTagDescriptor::new(vec![1])
                .with_technology(TechnologyTag::NfcA, Some(nfca(0x00)))
                .with_technology(TechnologyTag::MifareClassic, Some(Extras::new())),
        )
        .unwrap();
        let report = dump(&tag);
        let (tech, lines) = report.sections().next().unwrap();
        assert_eq!(tech, TechnologyTag::MifareClassic);
        assert_eq!(
            lines,
            ["Mifare classic error: Tag incorrectly enumerated as MIFARE Classic, SAK = 0"]
        );
    }

    #[test]
    fn test_failure_is_isolated() {
        let tag = TagHandle::assemble(
            RawTagDescriptor::new(vec![1])
                .with_technology(TechnologyTag::NfcB, None)
                .with_technology(TechnologyTag::NfcV, Some(extras([
                    ("dsfid", ExtraValue::Byte(0)),
                    ("respflags", ExtraValue::Byte(0x01)),
                ]))),
        )
        .unwrap();
        let report = dump(&tag);
        let sections: Vec<_> = report.sections().collect();
        assert_eq!(sections[0].1, ["NfcB error: NfcB has no extras"]);
        assert_eq!(sections[1].1, ["NfcV dsfId: 0, responseFlags: 01, maxTransceiveLength: 0"]);
    }

    #[test]
    fn test_empty_technology_list() {
        let tag = TagHandle::assemble(RawTagDescriptor::new(Vec::new())).unwrap();
        let report = dump(&tag);
        assert_eq!(report.lines().len(), 5);
        assert_eq!(report.lines()[0], "ID (hex): ");
        assert_eq!(report.lines()[2], "ID (dec): 0");
        assert_eq!(report.lines()[4], "Technologies: ");
    }

    #[test]
    fn test_failed_retry_keeps_original_tag() {
        // 0x08 | 0x40 merges to 72, which no Classic type uses
        let tag = TagHandle::assemble(
            RawTagDescriptor::new(vec![1, 2, 3, 4])
                .with_technology(TechnologyTag::NfcA, Some(nfca(0x08)))
                .with_technology(TechnologyTag::NfcA, Some(nfca(0x40)))
                .with_technology(TechnologyTag::MifareClassic, None),
        )
        .unwrap();
        let report = dump(&tag);
        let sections: Vec<_> = report.sections().collect();

        assert_eq!(
            sections[0].1,
            ["Mifare classic error: Tag incorrectly enumerated as MIFARE Classic, SAK = 72"]
        );
        // NfcA still reads the first entry of the unrepaired tag
        assert_eq!(sections[1].0, TechnologyTag::NfcA);
        assert_eq!(sections[1].1, ["NfcA ATQA: 00 04, SAK: 8, timeout: 0, maxTransceiveLength: 0"]);
    }
}
