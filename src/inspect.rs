// src/inspect.rs
//! The entry point the platform side calls, and what it gets back.

use serde::{Serialize, Serializer};

use crate::codec;
use crate::dumper;
use crate::ndef::NdefMessage;
use crate::tag::{TagHandle, TechnologyTag};

/// The four renderings of a tag identifier. The decimal forms serialize as
/// strings, since JSON numbers lose precision past 2^53.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct IdEncodings {
    pub hex: String,
    pub reversed_hex: String,
    #[serde(serialize_with = "decimal_string")]
    pub decimal: u64,
    #[serde(serialize_with = "decimal_string")]
    pub reversed_decimal: u64,
}

// Serde requires `&T` for custom serializers via `serialize_with`.
#[allow(clippy::trivially_copy_pass_by_ref)]
fn decimal_string<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(value)
}

impl IdEncodings {
    pub fn of(id: &[u8]) -> Self {
        Self {
            hex: codec::to_hex(id),
            reversed_hex: codec::to_reversed_hex(id),
            decimal: codec::to_decimal(id),
            reversed_decimal: codec::to_reversed_decimal(id),
        }
    }
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
struct Section {
    technology: TechnologyTag,
    start: usize,
    len: usize,
}

/// Text lines describing one tag. Built append-only by the dumper.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct InspectionReport {
    id: Vec<u8>,
    lines: Vec<String>,
    #[serde(skip)]
    sections: Vec<Section>,
}

impl InspectionReport {
    pub(crate) fn new(id: &[u8]) -> Self {
        Self {
            id: id.to_vec(),
            lines: Vec::new(),
            sections: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub(crate) fn push_section(&mut self, technology: TechnologyTag, lines: Vec<String>) {
        self.sections.push(Section {
            technology,
            start: self.lines.len(),
            len: lines.len(),
        });
        self.lines.extend(lines);
    }

    pub fn id(&self) -> &[u8] {
        &self.id
    }

    pub fn encodings(&self) -> IdEncodings {
        IdEncodings::of(&self.id)
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Technology blocks in report order.
    pub fn sections(&self) -> impl Iterator<Item = (TechnologyTag, &[String])> + '_ {
        self.sections
            .iter()
            .map(|s| (s.technology, &self.lines[s.start..s.start + s.len]))
    }

    pub fn to_text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Describes a tag.
pub fn inspect(tag: &TagHandle) -> InspectionReport {
    dumper::dump(tag)
}

/// Describes a tag and, when one was delivered with it, the header of each
/// record of its NDEF message. Payloads are not decoded.
pub fn inspect_with_message(tag: &TagHandle, message: Option<&NdefMessage>) -> InspectionReport {
    let mut report = dumper::dump(tag);
    if let Some(message) = message {
        report.push(format!("NDEF records: {}", message.records().len()));
        for (i, record) in message.records().iter().enumerate() {
            report.push(format!(
                "Record {}: TNF {}, type: {}, id: {}, payload: {} bytes",
                i,
                record.tnf.name(),
                codec::to_reversed_hex(&record.record_type),
                codec::to_reversed_hex(&record.id),
                record.payload.len()
            ));
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ndef::{NdefRecord, Tnf};
    use crate::tag::RawTagDescriptor;

    #[test]
    fn test_encodings() {
        let enc = IdEncodings::of(&[0x04, 0x3A, 0x9C, 0x1B]);
        assert_eq!(enc.hex, "1b 9c 3a 04");
        assert_eq!(enc.reversed_hex, "04 3a 9c 1b");
        assert_eq!(enc.decimal, 0x1B9C3A04);
        assert_eq!(enc.reversed_decimal, 0x043A9C1B);
    }

    #[test]
    fn test_decimal_encodings_are_json_strings() {
        // Seven byte UID, past what a JavaScript number holds exactly
        let id = [0x04, 0xA2, 0x5B, 0x1A, 0xC3, 0x6F, 0x80];
        let enc = IdEncodings::of(&id);
        assert!(enc.decimal > 1 << 53);

        let json = serde_json::to_value(&enc).unwrap();
        assert_eq!(json["decimal"], enc.decimal.to_string());
        assert_eq!(json["reversed_decimal"], enc.reversed_decimal.to_string());
        assert_eq!(json["decimal"], "36151680770482692");
        assert_eq!(json["hex"], "80 6f c3 1a 5b a2 04");
    }

    #[test]
    fn test_message_summary() {
        let tag = TagHandle::assemble(RawTagDescriptor::new(vec![0x01, 0x02])).unwrap();
        let message = NdefMessage::new(vec![
            NdefRecord::text("hi", "en", true).unwrap(),
            NdefRecord::new(Tnf::Unknown, &[], &[0xAB], vec![1, 2, 3]).unwrap(),
        ])
        .unwrap();

        let report = inspect_with_message(&tag, Some(&message));
        let tail = &report.lines()[report.lines().len() - 3..];
        assert_eq!(tail[0], "NDEF records: 2");
        assert_eq!(tail[1], "Record 0: TNF well-known, type: 54, id: , payload: 5 bytes");
        assert_eq!(tail[2], "Record 1: TNF unknown, type: , id: ab, payload: 3 bytes");

        assert_eq!(inspect_with_message(&tag, None), inspect(&tag));
    }
}
