// src/ndef.rs
use serde::{Deserialize, Serialize};

use crate::error::NdefError;

const FLAG_MB: u8 = 0x80;
const FLAG_ME: u8 = 0x40;
const FLAG_CF: u8 = 0x20;
const FLAG_SR: u8 = 0x10;
const FLAG_IL: u8 = 0x08;

const TLV_NDEF: u8 = 0x03;
const TLV_NULL: u8 = 0x00;
const TLV_TERMINATOR: u8 = 0xFE;

pub const RTD_TEXT: &[u8] = b"T";

// Type and id lengths are one byte each; the text status byte keeps 6 bits.
const MAX_SHORT_FIELD: usize = u8::MAX as usize;
const MAX_LANG_LEN: usize = 0x3F;
const MAX_PAYLOAD: usize = u32::MAX as usize;

/// Type Name Format, the low 3 bits of a record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tnf {
    Empty = 0,
    WellKnown = 1,
    MimeMedia = 2,
    AbsoluteUri = 3,
    External = 4,
    Unknown = 5,
    Unchanged = 6,
}

impl Tnf {
    pub fn from_bits(bits: u8) -> Result<Self, NdefError> {
        Ok(match bits & 0x07 {
            0 => Tnf::Empty,
            1 => Tnf::WellKnown,
            2 => Tnf::MimeMedia,
            3 => Tnf::AbsoluteUri,
            4 => Tnf::External,
            5 => Tnf::Unknown,
            6 => Tnf::Unchanged,
            other => return Err(NdefError::InvalidTnf(other)),
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Tnf::Empty => "empty",
            Tnf::WellKnown => "well-known",
            Tnf::MimeMedia => "mime",
            Tnf::AbsoluteUri => "absolute-uri",
            Tnf::External => "external",
            Tnf::Unknown => "unknown",
            Tnf::Unchanged => "unchanged",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NdefRecord {
    pub tnf: Tnf,
    pub record_type: Vec<u8>,
    pub id: Vec<u8>,
    pub payload: Vec<u8>,
}

impl NdefRecord {
    pub fn new(
        tnf: Tnf,
        record_type: &[u8],
        id: &[u8],
        payload: Vec<u8>,
    ) -> Result<Self, NdefError> {
        let record = Self {
            tnf,
            record_type: record_type.to_vec(),
            id: id.to_vec(),
            payload,
        };
        record.check()?;
        Ok(record)
    }

    /// Well-known Text record: [status] [lang] [text].
    /// Status bit 7 selects UTF-16, bits 5-0 hold the language code length.
    pub fn text(text: &str, lang: &str, utf8: bool) -> Result<Self, NdefError> {
        let lang = lang.as_bytes();
        check_len("language code", lang.len(), MAX_LANG_LEN)?;
        let mut payload = Vec::with_capacity(1 + lang.len() + text.len());

        let utf_bit = if utf8 { 0 } else { 0x80 };
        payload.push(utf_bit | lang.len() as u8);
        payload.extend_from_slice(lang);
        if utf8 {
            payload.extend_from_slice(text.as_bytes());
        } else {
            // Big-endian with byte order mark
            payload.extend_from_slice(&[0xFE, 0xFF]);
            for unit in text.encode_utf16() {
                payload.extend_from_slice(&unit.to_be_bytes());
            }
        }

        Self::new(Tnf::WellKnown, RTD_TEXT, &[], payload)
    }

    /// Fails if a field cannot be framed by its length byte or word.
    fn check(&self) -> Result<(), NdefError> {
        check_len("type", self.record_type.len(), MAX_SHORT_FIELD)?;
        check_len("id", self.id.len(), MAX_SHORT_FIELD)?;
        check_len("payload", self.payload.len(), MAX_PAYLOAD)
    }

    fn is_short(&self) -> bool {
        self.payload.len() < 256
    }

    fn encoded_len(&self) -> usize {
        let payload_len_field = if self.is_short() { 1 } else { 4 };
        let id_len_field = if self.id.is_empty() { 0 } else { 1 };
        2 + payload_len_field
            + id_len_field
            + self.record_type.len()
            + self.id.len()
            + self.payload.len()
    }

    fn encode(&self, mb: bool, me: bool, out: &mut Vec<u8>) {
        // Bit 7: MB, Bit 6: ME, Bit 5: CF(0), Bit 4: SR, Bit 3: IL, Bits 2-0: TNF
        let mut header = self.tnf as u8;
        if mb {
            header |= FLAG_MB;
        }
        if me {
            header |= FLAG_ME;
        }
        if self.is_short() {
            header |= FLAG_SR;
        }
        if !self.id.is_empty() {
            header |= FLAG_IL;
        }

        out.push(header);
        out.push(self.record_type.len() as u8);
        if self.is_short() {
            out.push(self.payload.len() as u8);
        } else {
            out.extend_from_slice(&(self.payload.len() as u32).to_be_bytes());
        }
        if !self.id.is_empty() {
            out.push(self.id.len() as u8);
        }
        out.extend_from_slice(&self.record_type);
        out.extend_from_slice(&self.id);
        out.extend_from_slice(&self.payload);
    }
}

/// A non-empty, ordered list of records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NdefMessage {
    records: Vec<NdefRecord>,
}

impl NdefMessage {
    pub fn new(records: Vec<NdefRecord>) -> Result<Self, NdefError> {
        if records.is_empty() {
            return Err(NdefError::Empty);
        }
        // Fields are public, so records built by hand are checked here too
        for record in &records {
            record.check()?;
        }
        Ok(Self { records })
    }

    pub fn records(&self) -> &[NdefRecord] {
        &self.records
    }

    /// Size of the encoded message in bytes.
    pub fn byte_array_length(&self) -> usize {
        self.records.iter().map(NdefRecord::encoded_len).sum()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.byte_array_length());
        let last = self.records.len() - 1;
        for (i, record) in self.records.iter().enumerate() {
            record.encode(i == 0, i == last, &mut out);
        }
        out
    }

    pub fn parse(data: &[u8]) -> Result<Self, NdefError> {
        let mut records = Vec::new();
        let mut cursor = Cursor { data, pos: 0 };

        while cursor.pos < data.len() {
            let header = cursor.byte()?;
            if header & FLAG_CF != 0 {
                return Err(NdefError::Chunked);
            }
            let tnf = Tnf::from_bits(header)?;

            let type_len = cursor.byte()? as usize;
            let payload_len = if header & FLAG_SR != 0 {
                cursor.byte()? as usize
            } else {
                let b = cursor.take(4)?;
                u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as usize
            };
            let id_len = if header & FLAG_IL != 0 {
                cursor.byte()? as usize
            } else {
                0
            };

            let record_type = cursor.take(type_len)?.to_vec();
            let id = cursor.take(id_len)?.to_vec();
            let payload = cursor.take(payload_len)?.to_vec();

            records.push(NdefRecord {
                tnf,
                record_type,
                id,
                payload,
            });

            if header & FLAG_ME != 0 {
                break;
            }
        }

        Self::new(records)
    }
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn byte(&mut self) -> Result<u8, NdefError> {
        Ok(self.take(1)?[0])
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], NdefError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(NdefError::Truncated(self.pos))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }
}

/// Finds the NDEF message TLV (tag 0x03) in a tag's data area and returns
/// its value. Handles both the 1-byte and the 3-byte (0xFF-prefixed) length.
pub fn unwrap_tlv(buffer: &[u8]) -> Result<&[u8], NdefError> {
    let mut pos = 0;
    while pos < buffer.len() {
        let tag = buffer[pos];
        if tag == TLV_NULL {
            pos += 1;
            continue;
        }
        if tag == TLV_TERMINATOR {
            break;
        }

        let (len, header) = match buffer.get(pos + 1) {
            Some(0xFF) => {
                let hi = *buffer.get(pos + 2).ok_or(NdefError::Truncated(pos))? as usize;
                let lo = *buffer.get(pos + 3).ok_or(NdefError::Truncated(pos))? as usize;
                ((hi << 8) | lo, 4)
            }
            Some(len) => (*len as usize, 2),
            None => return Err(NdefError::Truncated(pos)),
        };

        let start = pos + header;
        if tag == TLV_NDEF {
            return buffer
                .get(start..start + len)
                .ok_or(NdefError::Truncated(start));
        }
        // Lock control, memory control or proprietary TLV
        pos = start + len;
    }
    Err(NdefError::NoTlv)
}

fn check_len(field: &'static str, len: usize, max: usize) -> Result<(), NdefError> {
    if len > max {
        return Err(NdefError::FieldTooLong { field, len, max });
    }
    Ok(())
}
