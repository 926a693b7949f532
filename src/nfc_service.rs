// src/nfc_service.rs
use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, info, warn};
use nfc_reader::{ScanHistory, TagHandle, inspect};
use pcsc::{Context, PNP_NOTIFICATION, Protocols, ReaderState, Scope, ShareMode, State};
use std::ffi::{CStr, CString};
use std::time::Duration;

use crate::cards;
use crate::config::Config;
use crate::types::{NfcCommand, OutgoingMessage};

struct Session {
    history: ScanHistory,
    scans: u64,
}

impl Session {
    fn new(config: &Config) -> Self {
        let history = match config.history_limit {
            0 => ScanHistory::new(),
            limit => ScanHistory::with_limit(limit),
        };
        Self { history, scans: 0 }
    }

    fn next_scan(&mut self) -> u64 {
        self.scans += 1;
        self.scans
    }

    /// Inspects a tag, records it and sends the report.
    fn report(&mut self, tag: &TagHandle, tx: &Sender<OutgoingMessage>) {
        let report = inspect(tag);
        for line in report.lines() {
            debug!("{}", line);
        }
        self.history.record(tag);
        info!(
            "Tag {} inspected ({} scanned)",
            report.encodings().reversed_hex,
            self.history.len()
        );
        let _ = tx.send(OutgoingMessage::report(&report, self.history.len()));
    }
}

pub fn run(config: Config, tx: Sender<OutgoingMessage>, rx: Receiver<NfcCommand>) {
    info!("Starting NFC Service (Event Driven)...");

    let ctx = match Context::establish(Scope::User) {
        Ok(ctx) => ctx,
        Err(err) => {
            error!("Failed to establish context: {}", err);
            let _ = tx.send(OutgoingMessage::READER_ERROR {
                error: err.to_string(),
            });
            return;
        }
    };

    let mut session = Session::new(&config);
    let mut readers_buf = [0; 2048];
    let mut reader_names: Vec<CString> = Vec::new();
    let mut reader_states = vec![ReaderState::new(PNP_NOTIFICATION(), State::UNAWARE)];
    let poll = Duration::from_millis(config.poll_ms);

    loop {
        // 1. Wait for State Change
        if let Err(err) = ctx.get_status_change(poll, &mut reader_states) {
            if err != pcsc::Error::Timeout {
                error!("PCSC Error: {}", err);
                std::thread::sleep(Duration::from_secs(1));
                continue;
            }
        }

        // 2. CHECK FOR COMMANDS
        while let Ok(cmd) = rx.try_recv() {
            match cmd {
                NfcCommand::CheckReaderStatus => {
                    match ctx.list_readers(&mut readers_buf) {
                        Ok(iter) => {
                            reader_names = iter.map(CString::from).collect();
                            let _ = tx.send(OutgoingMessage::READER_STATUS {
                                success: !reader_names.is_empty(),
                            });
                        }
                        Err(_) => {
                            reader_names.clear();
                            let _ = tx.send(OutgoingMessage::READER_STATUS { success: false });
                        }
                    }
                }
                NfcCommand::ExportIds { format } => match session.history.export(format) {
                    Ok(ids) => {
                        let _ = tx.send(OutgoingMessage::IDS { format, ids });
                    }
                    Err(e) => {
                        let _ = tx.send(OutgoingMessage::IDS_ERROR {
                            error: e.to_string(),
                        });
                    }
                },
                NfcCommand::ClearTags => {
                    info!("Clearing {} scanned tags", session.history.len());
                    session.history.clear();
                }
                NfcCommand::Inspect { descriptor } => match TagHandle::assemble(descriptor) {
                    Ok(tag) => session.report(&tag, &tx),
                    Err(e) => {
                        warn!("Rejected descriptor: {}", e);
                        let _ = tx.send(OutgoingMessage::TAG_ERROR {
                            error: e.to_string(),
                        });
                    }
                },
            }
        }

        // 3. PROCESS EVENTS
        let mut readers_changed = false;

        // Check PnP (Index 0)
        if reader_states[0].event_state().intersects(State::CHANGED) {
            info!("Hardware change detected");
            readers_changed = true;
            reader_states[0].sync_current_state();
        }

        // Check Readers (Indices 1..)
        for i in 1..reader_states.len() {
            let rs = &reader_states[i];
            if !rs.event_state().intersects(State::CHANGED) {
                continue;
            }
            let name = rs.name().to_owned();
            let current = rs.event_state();

            // Card Inserted
            if current.intersects(State::PRESENT) && !rs.current_state().intersects(State::PRESENT) {
                info!("Card Inserted on {:?}", name);
                handle_card_insertion(&ctx, &name, &mut session, &tx);
            }

            // Card Removed
            if current.intersects(State::EMPTY) && rs.current_state().intersects(State::PRESENT) {
                info!("Card Removed from {:?}", name);
                let _ = tx.send(OutgoingMessage::CARD_STATUS {
                    success: false,
                    message: "Card removed!".into(),
                });
            }

            reader_states[i].sync_current_state();
        }

        // 4. REFRESH LIST
        if readers_changed {
            // Keep the PnP state (index 0) and drop everything else
            reader_states.truncate(1);
            match ctx.list_readers(&mut readers_buf) {
                Ok(iter) => {
                    reader_names = iter.map(CString::from).collect();
                    for name in &reader_names {
                        reader_states.push(ReaderState::new(name.clone(), State::UNAWARE));
                    }
                    let _ = tx.send(OutgoingMessage::READER_STATUS {
                        success: !reader_names.is_empty(),
                    });
                }
                Err(_) => {
                    reader_names.clear();
                    let _ = tx.send(OutgoingMessage::READER_STATUS { success: false });
                }
            }
        }
    }
}

fn handle_card_insertion(
    ctx: &Context,
    reader_name: &CStr,
    session: &mut Session,
    tx: &Sender<OutgoingMessage>,
) {
    let _ = tx.send(OutgoingMessage::CARD_STATUS {
        success: true,
        message: "Card detected!".into(),
    });

    let card = match ctx.connect(reader_name, ShareMode::Shared, Protocols::ANY) {
        Ok(card) => card,
        Err(e) => {
            error!("Failed to connect to card: {}", e);
            return;
        }
    };

    let mut names_buf = [0u8; 128];
    let mut atr_buf = [0u8; 64];
    let atr = match card.status2(&mut names_buf, &mut atr_buf) {
        Ok(status) => status.atr().to_vec(),
        Err(e) => {
            warn!("No card status: {}", e);
            Vec::new()
        }
    };

    let scan = session.next_scan();
    let tag = cards::read_descriptor(&card, &atr, scan)
        .map_err(|e| e.to_string())
        .and_then(|desc| TagHandle::assemble(desc).map_err(|e| e.to_string()));

    match tag {
        Ok(tag) => session.report(&tag, tx),
        Err(error) => {
            error!("Failed to read tag: {}", error);
            let _ = tx.send(OutgoingMessage::TAG_ERROR { error });
        }
    }
}
