// src/tech.rs
//! Per-technology parameter records and the accessors that read them off a
//! tag's extras.

use crate::error::{AccessError, AccessResult};
use crate::ndef::NdefMessage;
use crate::tag::{ExtraValue, Extras, TagHandle, TechnologyTag};

pub const EXTRA_SAK: &str = "sak";
pub const EXTRA_ATQA: &str = "atqa";
pub const EXTRA_APPDATA: &str = "appdata";
pub const EXTRA_PROTINFO: &str = "protinfo";
pub const EXTRA_PMM: &str = "pmm";
pub const EXTRA_SYSTEMCODE: &str = "systemcode";
pub const EXTRA_DSFID: &str = "dsfid";
pub const EXTRA_RESPFLAGS: &str = "respflags";
pub const EXTRA_HIRESP: &str = "hiresp";
pub const EXTRA_HISTBYTES: &str = "histbytes";
pub const EXTRA_ISULC: &str = "isulc";
pub const EXTRA_NDEF_MSG: &str = "ndefmsg";
pub const EXTRA_NDEF_MAXLENGTH: &str = "ndefmaxlength";
pub const EXTRA_NDEF_TYPE: &str = "ndeftype";
pub const EXTRA_TIMEOUT: &str = "timeout";
pub const EXTRA_MAX_TRANSCEIVE: &str = "maxTransceiveLength";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassicType {
    Classic,
    Plus,
    Pro,
    Unknown,
}

impl ClassicType {
    pub fn name(self) -> &'static str {
        match self {
            ClassicType::Classic => "Classic",
            ClassicType::Plus => "Plus",
            ClassicType::Pro => "Pro",
            ClassicType::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UltralightType {
    Ultralight,
    UltralightC,
    Unknown,
}

impl UltralightType {
    pub fn name(self) -> &'static str {
        match self {
            UltralightType::Ultralight => "Ultralight",
            UltralightType::UltralightC => "Ultralight C",
            UltralightType::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NfcAParams {
    pub atqa: Vec<u8>,
    pub sak: u16,
    pub timeout: i32,
    pub max_transceive_length: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NfcBParams {
    pub application_data: Vec<u8>,
    pub protocol_info: Vec<u8>,
    pub max_transceive_length: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NfcFParams {
    pub manufacturer: Vec<u8>,
    pub system_code: Vec<u8>,
    pub timeout: i32,
    pub max_transceive_length: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NfcVParams {
    pub dsf_id: u8,
    pub response_flags: u8,
    pub max_transceive_length: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsoDepParams {
    pub hi_layer_response: Vec<u8>,
    pub historical_bytes: Vec<u8>,
    pub timeout: i32,
    pub max_transceive_length: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MifareClassicParams {
    pub classic_type: ClassicType,
    pub size_bytes: usize,
    pub sector_count: usize,
    pub block_count: usize,
    /// SAK values that only smart cards emulating Classic report.
    pub emulated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MifareUltralightParams {
    pub ultralight_type: UltralightType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdefParams {
    pub type_string: &'static str,
    pub max_size_bytes: usize,
    pub current_size_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TechnologyParameters {
    NfcA(NfcAParams),
    NfcB(NfcBParams),
    NfcF(NfcFParams),
    NfcV(NfcVParams),
    IsoDep(IsoDepParams),
    MifareClassic(MifareClassicParams),
    MifareUltralight(MifareUltralightParams),
    Ndef(NdefParams),
    NdefFormatable,
}

const SIZE_MINI: usize = 320;
const SIZE_1K: usize = 1024;
const SIZE_2K: usize = 2048;
const SIZE_4K: usize = 4096;

/// Classic card type, size and whether the SAK marks an emulation.
fn classify_sak(sak: u16) -> Option<(ClassicType, usize, bool)> {
    Some(match sak {
        0x01 | 0x08 | 0x88 => (ClassicType::Classic, SIZE_1K, false),
        0x09 => (ClassicType::Classic, SIZE_MINI, false),
        0x10 => (ClassicType::Plus, SIZE_2K, false),
        0x11 => (ClassicType::Plus, SIZE_4K, false),
        0x18 => (ClassicType::Classic, SIZE_4K, false),
        0x28 => (ClassicType::Classic, SIZE_1K, true),
        0x38 => (ClassicType::Classic, SIZE_4K, true),
        0x98 | 0xB8 => (ClassicType::Pro, SIZE_4K, false),
        _ => return None,
    })
}

/// Sector and block counts for a Classic memory size.
fn classic_geometry(size: usize) -> (usize, usize) {
    match size {
        SIZE_MINI => (5, 20),
        SIZE_1K => (16, 64),
        SIZE_2K => (32, 128),
        // First 32 sectors hold 4 blocks, the last 8 hold 16
        _ => (40, 256),
    }
}

fn ndef_type_string(code: i32) -> &'static str {
    match code {
        1 => "org.nfcforum.ndef.type1",
        2 => "org.nfcforum.ndef.type2",
        3 => "org.nfcforum.ndef.type3",
        4 => "org.nfcforum.ndef.type4",
        101 => "com.nxp.ndef.mifareclassic",
        _ => "android.ndef.unknown",
    }
}

/// Typed reads from one technology's extras.
struct Reader<'a> {
    tech: TechnologyTag,
    extras: &'a Extras,
}

impl<'a> Reader<'a> {
    fn get(&self, key: &'static str) -> AccessResult<&'a ExtraValue> {
        self.extras.get(key).ok_or(AccessError::MissingField {
            tech: self.tech,
            key,
        })
    }

    fn wrong_type(&self, key: &'static str) -> AccessError {
        AccessError::WrongType {
            tech: self.tech,
            key,
        }
    }

    fn bytes(&self, key: &'static str) -> AccessResult<Vec<u8>> {
        match self.get(key)? {
            ExtraValue::Bytes(b) => Ok(b.clone()),
            _ => Err(self.wrong_type(key)),
        }
    }

    fn opt_bytes(&self, key: &'static str) -> AccessResult<Vec<u8>> {
        match self.extras.get(key) {
            None => Ok(Vec::new()),
            Some(_) => self.bytes(key),
        }
    }

    fn short(&self, key: &'static str) -> AccessResult<u16> {
        match self.get(key)? {
            ExtraValue::Short(v) => Ok(*v),
            ExtraValue::Byte(v) => Ok(*v as u16),
            _ => Err(self.wrong_type(key)),
        }
    }

    fn byte(&self, key: &'static str) -> AccessResult<u8> {
        match self.get(key)? {
            ExtraValue::Byte(v) => Ok(*v),
            _ => Err(self.wrong_type(key)),
        }
    }

    fn int(&self, key: &'static str) -> AccessResult<i32> {
        match self.get(key)? {
            ExtraValue::Int(v) => Ok(*v),
            _ => Err(self.wrong_type(key)),
        }
    }

    fn opt_int(&self, key: &'static str) -> AccessResult<i32> {
        match self.extras.get(key) {
            None => Ok(0),
            Some(_) => self.int(key),
        }
    }

    fn opt_bool(&self, key: &'static str) -> AccessResult<Option<bool>> {
        match self.extras.get(key) {
            None => Ok(None),
            Some(ExtraValue::Bool(v)) => Ok(Some(*v)),
            Some(_) => Err(self.wrong_type(key)),
        }
    }
}

impl TagHandle {
    fn reader(&self, tech: TechnologyTag) -> AccessResult<Reader<'_>> {
        if !self.has(tech) {
            return Err(AccessError::NotPresent(tech));
        }
        let extras = self.extras(tech).ok_or(AccessError::MissingExtras(tech))?;
        Ok(Reader { tech, extras })
    }

    /// Reads the parameter record of one technology.
    pub fn parameters(&self, tech: TechnologyTag) -> AccessResult<TechnologyParameters> {
        Ok(match tech {
            TechnologyTag::NfcA => TechnologyParameters::NfcA(self.nfc_a()?),
            TechnologyTag::NfcB => TechnologyParameters::NfcB(self.nfc_b()?),
            TechnologyTag::NfcF => TechnologyParameters::NfcF(self.nfc_f()?),
            TechnologyTag::NfcV => TechnologyParameters::NfcV(self.nfc_v()?),
            TechnologyTag::IsoDep => TechnologyParameters::IsoDep(self.iso_dep()?),
            TechnologyTag::MifareClassic => {
                TechnologyParameters::MifareClassic(self.mifare_classic()?)
            }
            TechnologyTag::MifareUltralight => {
                TechnologyParameters::MifareUltralight(self.mifare_ultralight()?)
            }
            TechnologyTag::Ndef => TechnologyParameters::Ndef(self.ndef()?),
            TechnologyTag::NdefFormatable => {
                if !self.has(tech) {
                    return Err(AccessError::NotPresent(tech));
                }
                TechnologyParameters::NdefFormatable
            }
        })
    }

    pub fn nfc_a(&self) -> AccessResult<NfcAParams> {
        let r = self.reader(TechnologyTag::NfcA)?;
        Ok(NfcAParams {
            atqa: r.bytes(EXTRA_ATQA)?,
            sak: r.short(EXTRA_SAK)?,
            timeout: r.opt_int(EXTRA_TIMEOUT)?,
            max_transceive_length: r.opt_int(EXTRA_MAX_TRANSCEIVE)?,
        })
    }

    pub fn nfc_b(&self) -> AccessResult<NfcBParams> {
        let r = self.reader(TechnologyTag::NfcB)?;
        Ok(NfcBParams {
            application_data: r.bytes(EXTRA_APPDATA)?,
            protocol_info: r.bytes(EXTRA_PROTINFO)?,
            max_transceive_length: r.opt_int(EXTRA_MAX_TRANSCEIVE)?,
        })
    }

    pub fn nfc_f(&self) -> AccessResult<NfcFParams> {
        let r = self.reader(TechnologyTag::NfcF)?;
        Ok(NfcFParams {
            manufacturer: r.bytes(EXTRA_PMM)?,
            system_code: r.bytes(EXTRA_SYSTEMCODE)?,
            timeout: r.opt_int(EXTRA_TIMEOUT)?,
            max_transceive_length: r.opt_int(EXTRA_MAX_TRANSCEIVE)?,
        })
    }

    pub fn nfc_v(&self) -> AccessResult<NfcVParams> {
        let r = self.reader(TechnologyTag::NfcV)?;
        Ok(NfcVParams {
            dsf_id: r.byte(EXTRA_DSFID)?,
            response_flags: r.byte(EXTRA_RESPFLAGS)?,
            max_transceive_length: r.opt_int(EXTRA_MAX_TRANSCEIVE)?,
        })
    }

    pub fn iso_dep(&self) -> AccessResult<IsoDepParams> {
        let r = self.reader(TechnologyTag::IsoDep)?;
        Ok(IsoDepParams {
            hi_layer_response: r.opt_bytes(EXTRA_HIRESP)?,
            historical_bytes: r.opt_bytes(EXTRA_HISTBYTES)?,
            timeout: r.opt_int(EXTRA_TIMEOUT)?,
            max_transceive_length: r.opt_int(EXTRA_MAX_TRANSCEIVE)?,
        })
    }

    /// Classifies the card from the SAK of the first NfcA entry. Every
    /// descriptor-level problem is reported as
    /// [`AccessError::MalformedDescriptor`], which a repair can fix.
    pub fn mifare_classic(&self) -> AccessResult<MifareClassicParams> {
        if !self.has(TechnologyTag::MifareClassic) {
            return Err(AccessError::NotPresent(TechnologyTag::MifareClassic));
        }
        if self.extras(TechnologyTag::MifareClassic).is_none() {
            return Err(AccessError::MalformedDescriptor(
                "MifareClassic entry carries no extras".to_string(),
            ));
        }
        let sak = match self.extras(TechnologyTag::NfcA).map(|e| e.get(EXTRA_SAK)) {
            Some(Some(ExtraValue::Short(sak))) => *sak,
            Some(Some(ExtraValue::Byte(sak))) => *sak as u16,
            _ => {
                return Err(AccessError::MalformedDescriptor(
                    "no NfcA SAK to classify MifareClassic".to_string(),
                ));
            }
        };
        let (classic_type, size_bytes, emulated) = classify_sak(sak).ok_or_else(|| {
            AccessError::MalformedDescriptor(format!(
                "Tag incorrectly enumerated as MIFARE Classic, SAK = {}",
                sak
            ))
        })?;
        let (sector_count, block_count) = classic_geometry(size_bytes);

        Ok(MifareClassicParams {
            classic_type,
            size_bytes,
            sector_count,
            block_count,
            emulated,
        })
    }

    pub fn mifare_ultralight(&self) -> AccessResult<MifareUltralightParams> {
        if !self.has(TechnologyTag::MifareUltralight) {
            return Err(AccessError::NotPresent(TechnologyTag::MifareUltralight));
        }
        let ultralight_type = match self.extras(TechnologyTag::MifareUltralight) {
            None => UltralightType::Unknown,
            Some(extras) => {
                let r = Reader {
                    tech: TechnologyTag::MifareUltralight,
                    extras,
                };
                match r.opt_bool(EXTRA_ISULC)? {
                    Some(true) => UltralightType::UltralightC,
                    Some(false) => UltralightType::Ultralight,
                    None => UltralightType::Unknown,
                }
            }
        };
        Ok(MifareUltralightParams { ultralight_type })
    }

    pub fn ndef(&self) -> AccessResult<NdefParams> {
        let r = self.reader(TechnologyTag::Ndef)?;
        let max_length = r.int(EXTRA_NDEF_MAXLENGTH)?;
        let type_code = r.int(EXTRA_NDEF_TYPE)?;

        // The cached message is what was read at discovery; absent means the
        // tag was blank.
        let cached = r.opt_bytes(EXTRA_NDEF_MSG)?;
        let current_size_bytes = if cached.is_empty() {
            0
        } else {
            NdefMessage::parse(&cached)
                .map_err(|e| AccessError::MalformedDescriptor(format!("cached NDEF message: {}", e)))?
                .byte_array_length()
        };

        Ok(NdefParams {
            type_string: ndef_type_string(type_code),
            max_size_bytes: max_length.max(0) as usize,
            current_size_bytes,
        })
    }
}
