// src/types.rs
#![allow(non_camel_case_types)]

use nfc_reader::{IdEncodings, IdFormat, InspectionReport, RawTagDescriptor};
use serde::{Deserialize, Serialize};

// Messages sent TO the WebSocket client (Frontend)
#[derive(Serialize, Clone, Debug)]
#[serde(tag = "type")]
pub enum OutgoingMessage {
    READER_STATUS { success: bool },
    CARD_STATUS { success: bool, message: String },
    TAG_REPORT {
        id: IdEncodings,
        lines: Vec<String>,
        scanned: usize,
    },
    TAG_ERROR { error: String },
    IDS { format: IdFormat, ids: String },
    IDS_ERROR { error: String },
    READER_ERROR { error: String },
}

impl OutgoingMessage {
    pub fn report(report: &InspectionReport, scanned: usize) -> Self {
        OutgoingMessage::TAG_REPORT {
            id: report.encodings(),
            lines: report.lines().to_vec(),
            scanned,
        }
    }
}

// Messages received FROM the WebSocket client
#[derive(Deserialize, Debug)]
#[serde(tag = "type")]
pub enum IncomingMessage {
    GET_READER_STATUS,
    GET_IDS { format: IdFormat },
    CLEAR_TAGS,
    INSPECT_DESCRIPTOR { descriptor: RawTagDescriptor },
}

// Internal commands sent from WS Server -> NFC Thread
#[derive(Debug)]
pub enum NfcCommand {
    CheckReaderStatus,
    ExportIds { format: IdFormat },
    ClearTags,
    Inspect { descriptor: RawTagDescriptor },
}

impl From<IncomingMessage> for NfcCommand {
    fn from(msg: IncomingMessage) -> Self {
        match msg {
            IncomingMessage::GET_READER_STATUS => NfcCommand::CheckReaderStatus,
            IncomingMessage::GET_IDS { format } => NfcCommand::ExportIds { format },
            IncomingMessage::CLEAR_TAGS => NfcCommand::ClearTags,
            IncomingMessage::INSPECT_DESCRIPTOR { descriptor } => NfcCommand::Inspect { descriptor },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incoming_json() {
        let msg: IncomingMessage =
            serde_json::from_str(r#"{"type":"GET_IDS","format":"Decimal"}"#).unwrap();
        assert!(matches!(
            NfcCommand::from(msg),
            NfcCommand::ExportIds {
                format: IdFormat::Decimal
            }
        ));

        let msg: IncomingMessage = serde_json::from_str(
            r#"{"type":"INSPECT_DESCRIPTOR","descriptor":{
                "identifier":[1,2],"technology_codes":[7],"technology_extras":[null]}}"#,
        )
        .unwrap();
        assert!(matches!(msg, IncomingMessage::INSPECT_DESCRIPTOR { .. }));
    }

    #[test]
    fn test_outgoing_json() {
        let json = serde_json::to_value(OutgoingMessage::IDS {
            format: IdFormat::Hex,
            ids: "0102".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "IDS");
        assert_eq!(json["format"], "Hex");
        assert_eq!(json["ids"], "0102");
    }
}
