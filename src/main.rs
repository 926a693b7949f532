mod apdu;
mod cards;
mod config;
mod nfc_service;
mod types;
mod ws;

use clap::Parser;
use crossbeam_channel::unbounded;
use log::info;
use tokio::sync::broadcast;

#[tokio::main]
async fn main() {
    env_logger::init();
    let config = config::Config::parse();
    info!("Starting NFC Rust Service...");

    // Channel: WS -> NFC (Commands)
    // We use Crossbeam (Sync) because NFC thread is blocking
    let (cmd_tx, cmd_rx) = unbounded::<types::NfcCommand>();

    // Channel: NFC -> WS (Events)
    let (event_tx, event_rx) = broadcast::channel::<types::OutgoingMessage>(100);

    // Bridge: NFC thread -> crossbeam -> broadcast
    let nfc_config = config.clone();
    std::thread::spawn(move || {
        let (bridge_tx, bridge_rx) = unbounded::<types::OutgoingMessage>();

        std::thread::spawn(move || {
            nfc_service::run(nfc_config, bridge_tx, cmd_rx);
        });

        while let Ok(msg) = bridge_rx.recv() {
            let _ = event_tx.send(msg);
        }
    });

    ws::start_server(config.bind, cmd_tx, event_rx).await;
}
