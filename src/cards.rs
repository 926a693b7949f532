// src/cards.rs
// Builds a tag descriptor from what a PC/SC reader exposes: the ATR, the UID
// and, where the card allows it, the NDEF data area.
use log::{debug, warn};
use nfc_reader::ndef::unwrap_tlv;
use nfc_reader::tag::extras;
use nfc_reader::tech::{
    EXTRA_ATQA, EXTRA_HISTBYTES, EXTRA_ISULC, EXTRA_MAX_TRANSCEIVE, EXTRA_NDEF_MAXLENGTH,
    EXTRA_NDEF_MSG, EXTRA_NDEF_TYPE, EXTRA_SAK,
};
use nfc_reader::{ExtraValue, Extras, NdefMessage, RawTagDescriptor, ServiceReference, TechnologyTag};
use pcsc::Card;

use crate::apdu::{self, CardError, CardResult};

// Keys tried on every Classic sector
pub const COMMON_KEYS: [[u8; 6]; 8] = [
    [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
    [0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5],
    [0xD3, 0xF7, 0xD3, 0xF7, 0xD3, 0xF7],
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
    [0xB0, 0xB1, 0xB2, 0xB3, 0xB4, 0xB5],
    [0x4D, 0x3A, 0x99, 0xC3, 0x51, 0xDD],
    [0x1A, 0x98, 0x2C, 0x7E, 0x45, 0x9A],
    [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF],
];

// PC/SC part 3 storage card ATR: historical bytes 80 4F 0C RID SS NN NN ...
const STORAGE_CARD_PREFIX: [u8; 3] = [0x80, 0x4F, 0x0C];
const PCSC_RID: [u8; 5] = [0xA0, 0x00, 0x00, 0x03, 0x06];
const STANDARD_ISO14443A_3: u8 = 0x03;

const NAME_MIFARE_1K: u16 = 0x0001;
const NAME_MIFARE_4K: u16 = 0x0002;
const NAME_ULTRALIGHT: u16 = 0x0003;
const NAME_MIFARE_MINI: u16 = 0x0026;
const NAME_ULTRALIGHT_C: u16 = 0x003A;

const NFCA_MAX_TRANSCEIVE: i32 = 253;
const NDEF_TYPE_2: i32 = 2;
const NDEF_TYPE_MIFARE_CLASSIC: i32 = 101;
const CC_MAGIC: u8 = 0xE1;
// Holds MAD2 on a 4K card
const MAD2_SECTOR: u8 = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardKind {
    ClassicMini,
    Classic1K,
    Classic4K,
    Ultralight,
    UltralightC,
    // ISO 14443-4 card, with its historical bytes
    IsoDep(Vec<u8>),
    Other,
}

pub fn parse_atr(atr: &[u8]) -> CardKind {
    if atr.len() < 4 || atr[0] != 0x3B {
        return CardKind::Other;
    }
    let hist_len = (atr[1] & 0x0F) as usize;
    // Contactless readers emit TD1 = 80, TD2 = 01 before the historical bytes
    let hist = match atr.get(4..4 + hist_len) {
        Some(hist) => hist,
        None => return CardKind::Other,
    };

    let is_storage = hist.len() >= 11 && hist[..3] == STORAGE_CARD_PREFIX && hist[3..8] == PCSC_RID;
    if !is_storage {
        return CardKind::IsoDep(hist.to_vec());
    }
    if hist[8] != STANDARD_ISO14443A_3 {
        return CardKind::Other;
    }
    match u16::from_be_bytes([hist[9], hist[10]]) {
        NAME_MIFARE_1K => CardKind::Classic1K,
        NAME_MIFARE_4K => CardKind::Classic4K,
        NAME_MIFARE_MINI => CardKind::ClassicMini,
        NAME_ULTRALIGHT => CardKind::Ultralight,
        NAME_ULTRALIGHT_C => CardKind::UltralightC,
        _ => CardKind::Other,
    }
}

fn nfca_extras(atqa: &[u8], sak: u16) -> Extras {
    extras([
        (EXTRA_ATQA, ExtraValue::Bytes(atqa.to_vec())),
        (EXTRA_SAK, ExtraValue::Short(sak)),
        (EXTRA_MAX_TRANSCEIVE, ExtraValue::Int(NFCA_MAX_TRANSCEIVE)),
    ])
}

/// Enumerates the card the way the Android NFC stack does. ATQA is given in
/// the stack's byte order. Classic entries carry no extras of their own.
///
/// An ISO 14443-4 card is listed as IsoDep only. The ATR does not say whether
/// it runs over type A or type B, and the reader hides ATQA/SAK or ATQB, so
/// no NfcA or NfcB entry is invented for it.
pub fn base_descriptor(uid: Vec<u8>, kind: &CardKind) -> RawTagDescriptor {
    let desc = RawTagDescriptor::new(uid);
    match kind {
        CardKind::ClassicMini => desc
            .with_technology(TechnologyTag::NfcA, Some(nfca_extras(&[0x04, 0x00], 0x09)))
            .with_technology(TechnologyTag::MifareClassic, None),
        CardKind::Classic1K => desc
            .with_technology(TechnologyTag::NfcA, Some(nfca_extras(&[0x04, 0x00], 0x08)))
            .with_technology(TechnologyTag::MifareClassic, None),
        CardKind::Classic4K => desc
            .with_technology(TechnologyTag::NfcA, Some(nfca_extras(&[0x02, 0x00], 0x18)))
            .with_technology(TechnologyTag::MifareClassic, None),
        CardKind::Ultralight | CardKind::UltralightC => desc
            .with_technology(TechnologyTag::NfcA, Some(nfca_extras(&[0x44, 0x00], 0x00)))
            .with_technology(
                TechnologyTag::MifareUltralight,
                Some(extras([(
                    EXTRA_ISULC,
                    ExtraValue::Bool(*kind == CardKind::UltralightC),
                )])),
            ),
        CardKind::IsoDep(hist) => desc.with_technology(
            TechnologyTag::IsoDep,
            Some(extras([(EXTRA_HISTBYTES, ExtraValue::Bytes(hist.clone()))])),
        ),
        CardKind::Other => desc,
    }
}

/// The NDEF data area as read off a card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdefArea {
    pub ndef_type: i32,
    pub max_length: i32,
    pub message: Option<Vec<u8>>,
}

/// Adds Ndef when an NDEF area was found, NdefFormatable for a Classic card
/// without one.
pub fn with_ndef(desc: RawTagDescriptor, kind: &CardKind, area: Option<NdefArea>) -> RawTagDescriptor {
    match area {
        Some(area) => {
            let mut ndef = extras([
                (EXTRA_NDEF_MAXLENGTH, ExtraValue::Int(area.max_length)),
                (EXTRA_NDEF_TYPE, ExtraValue::Int(area.ndef_type)),
            ]);
            if let Some(message) = area.message {
                ndef.insert(EXTRA_NDEF_MSG.to_string(), ExtraValue::Bytes(message));
            }
            desc.with_technology(TechnologyTag::Ndef, Some(ndef))
        }
        None if matches!(
            kind,
            CardKind::ClassicMini | CardKind::Classic1K | CardKind::Classic4K
        ) =>
        {
            desc.with_technology(TechnologyTag::NdefFormatable, None)
        }
        None => desc,
    }
}

/// Reads everything needed to describe the card on the reader.
pub fn read_descriptor(card: &Card, atr: &[u8], scan: u64) -> CardResult<RawTagDescriptor> {
    let uid = apdu::get_uid(card)?;
    let kind = parse_atr(atr);
    debug!("ATR {} -> {:?}", hex::encode(atr), kind);

    let area = match kind {
        CardKind::Ultralight | CardKind::UltralightC => read_type2_ndef(card),
        CardKind::ClassicMini | CardKind::Classic1K | CardKind::Classic4K => {
            read_classic_ndef(card, &kind)
        }
        _ => Ok(None),
    };
    let area = area.unwrap_or_else(|e| {
        warn!("NDEF area unreadable: {}", e);
        None
    });

    let desc = with_ndef(base_descriptor(uid, &kind), &kind, area);
    Ok(desc.with_service(scan as i32, ServiceReference(scan)))
}

/// Keeps only a message that parses; a blank area is an empty Ndef tag.
fn checked_message(tlv: &[u8]) -> Option<Vec<u8>> {
    if tlv.is_empty() {
        return None;
    }
    match NdefMessage::parse(tlv) {
        Ok(msg) => Some(msg.to_bytes()),
        Err(e) => {
            warn!("Ignoring unparsable NDEF message: {}", e);
            None
        }
    }
}

// Type 2 tag: capability container on page 3, data area from page 4
fn read_type2_ndef(card: &Card) -> CardResult<Option<NdefArea>> {
    let cc = apdu::read_binary(card, 3, 4)?;
    if cc.len() < 4 || cc[0] != CC_MAGIC {
        return Ok(None);
    }
    let area_size = cc[2] as usize * 8;

    let mut data = Vec::new();
    let mut page = 4usize;
    // Each read returns 4 pages
    while data.len() < area_size && page <= u8::MAX as usize {
        let chunk = apdu::read_binary(card, page as u8, 16)?;
        data.extend_from_slice(&chunk);
        page += 4;
        if unwrap_tlv(&data).is_ok() {
            break;
        }
    }

    let tlv = unwrap_tlv(&data)?;
    Ok(Some(NdefArea {
        ndef_type: NDEF_TYPE_2,
        max_length: area_size as i32,
        message: checked_message(tlv),
    }))
}

fn authenticate_sector(card: &Card, block: u8) -> bool {
    for key in COMMON_KEYS.iter() {
        if apdu::load_key(card, key).is_ok() {
            // Try Key A (0x60) or Key B (0x61)
            if apdu::authenticate(card, block, 0x60).is_ok()
                || apdu::authenticate(card, block, 0x61).is_ok()
            {
                return true;
            }
        }
    }
    false
}

/// First block and data block count of every sector that may hold NDEF data.
/// Sector 0 holds manufacturer data and the MAD, so NDEF starts at sector 1.
fn classic_ndef_sectors(kind: &CardKind) -> Vec<(u8, u8)> {
    let small_sectors: u8 = match kind {
        CardKind::ClassicMini => 5,
        CardKind::Classic1K => 16,
        CardKind::Classic4K => 32,
        _ => return Vec::new(),
    };
    // Blocks 0, 1, 2 are data. 3 is the Trailer.
    let mut sectors: Vec<(u8, u8)> = (1..small_sectors)
        .filter(|&sector| sector != MAD2_SECTOR)
        .map(|sector| (sector * 4, 3))
        .collect();
    if *kind == CardKind::Classic4K {
        // Sectors 32 to 39 have 16 blocks from block 128 on
        sectors.extend((0..8u8).map(|i| (128 + i * 16, 15)));
    }
    sectors
}

/// Bytes available for NDEF data on a Classic card.
fn classic_ndef_capacity(kind: &CardKind) -> usize {
    classic_ndef_sectors(kind)
        .iter()
        .map(|&(_, blocks)| blocks as usize * 16)
        .sum()
}

fn read_classic_ndef(card: &Card, kind: &CardKind) -> CardResult<Option<NdefArea>> {
    let mut data = Vec::new();

    'sectors: for (first, count) in classic_ndef_sectors(kind) {
        // We must authenticate at the start of every sector
        if !authenticate_sector(card, first) {
            if data.is_empty() {
                return Err(CardError::AuthFailed(first));
            }
            debug!("Could not authenticate sector at block {}. Stopping.", first);
            break;
        }
        for block in first..first + count {
            match apdu::read_binary(card, block, 16) {
                Ok(chunk) => data.extend_from_slice(&chunk),
                Err(_) => break 'sectors,
            }
            if unwrap_tlv(&data).is_ok() {
                break 'sectors;
            }
        }
    }

    match unwrap_tlv(&data) {
        Ok(tlv) => Ok(Some(NdefArea {
            ndef_type: NDEF_TYPE_MIFARE_CLASSIC,
            max_length: classic_ndef_capacity(kind) as i32,
            message: checked_message(tlv),
        })),
        Err(_) => Ok(None),
    }
}
