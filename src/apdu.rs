// src/apdu.rs
// PC/SC pseudo-APDUs (ACR122U and compatible readers).
use pcsc::Card;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CardError {
    #[error("Transmit Error: {0}")]
    Transmit(#[from] pcsc::Error),

    #[error("{op} failed, SW={sw1:02X}{sw2:02X}")]
    Status { op: &'static str, sw1: u8, sw2: u8 },

    #[error("{0} failed: short response")]
    ShortResponse(&'static str),

    #[error("Auth Failed for block {0}")]
    AuthFailed(u8),

    #[error("NDEF: {0}")]
    Ndef(#[from] nfc_reader::NdefError),
}

pub type CardResult<T> = Result<T, CardError>;

/// Sends `apdu` and strips the trailing 90 00; anything else is an error.
fn transmit(card: &Card, op: &'static str, apdu: &[u8]) -> CardResult<Vec<u8>> {
    let mut recv_buffer = [0u8; 258];
    let resp = card.transmit(apdu, &mut recv_buffer)?;
    if resp.len() < 2 {
        return Err(CardError::ShortResponse(op));
    }
    let (data, sw) = resp.split_at(resp.len() - 2);
    if sw == [0x90, 0x00] {
        Ok(data.to_vec())
    } else {
        Err(CardError::Status {
            op,
            sw1: sw[0],
            sw2: sw[1],
        })
    }
}

// GET DATA: FF CA 00 00 00 returns the UID
pub fn get_uid(card: &Card) -> CardResult<Vec<u8>> {
    transmit(card, "Get UID", &[0xFF, 0xCA, 0x00, 0x00, 0x00])
}

// Load Authentication Keys into Reader Memory (Location 0x00)
// ACR122U standard: FF 82 00 key_num 06 [KEY]
pub fn load_key(card: &Card, key: &[u8; 6]) -> CardResult<()> {
    let mut apdu = vec![0xFF, 0x82, 0x00, 0x00, 0x06];
    apdu.extend_from_slice(key);
    transmit(card, "Load Key", &apdu).map(|_| ())
}

// Authenticate Block
// CMD: FF 86 00 00 05 01 00 Block KeyType KeyNumber
// KeyType: 0x60 (A), 0x61 (B)
pub fn authenticate(card: &Card, block: u8, key_type: u8) -> CardResult<()> {
    let apdu = [
        0xFF, 0x86, 0x00, 0x00, 0x05, 0x01, 0x00, block, key_type, 0x00,
    ];
    transmit(card, "Authenticate", &apdu)
        .map(|_| ())
        .map_err(|_| CardError::AuthFailed(block))
}

// Read: FF B0 00 Block Len
pub fn read_binary(card: &Card, block: u8, length: u8) -> CardResult<Vec<u8>> {
    transmit(card, "Read Binary", &[0xFF, 0xB0, 0x00, block, length])
}
