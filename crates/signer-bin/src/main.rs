//! Host entrypoint: wires configuration, the scene/panel runtime, and the
//! transport layer together and runs the frame/event loop.
//!
//! There's no real serial link on a host build, so `simulate_boot_exchange`
//! plays the far end of the wire itself: it builds a digest-framed QUERY and
//! a signed `getAddress` request the same way a paired device would, feeds
//! them through the same `Connection` the real link would use, and lets the
//! reply travel back out through the ordinary panel/event/crypto path. This
//! is the harness for manually exercising the pipeline end to end without
//! hardware.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use sha2::{Digest, Sha256};
use signer_codec::{Builder as CodecBuilder, Cursor};
use signer_events::{EventBus, EventCategory, EventPayload};
use signer_panel::{PanelStack, PanelStyle};
use signer_scene::Scene;
use signer_transport::{CMD_QUERY, CMD_START, Connection, InboundEvent};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

const SCENE_CAPACITY: usize = 256;
const EVENT_FILTER_CAPACITY: usize = 64;
const SCREEN_WIDTH: i32 = 240;
const SCREEN_HEIGHT: i32 = 240;
const FRAGMENT_COUNT: u32 = 4;

#[derive(Parser, Debug)]
#[command(name = "signer", version, about = "Handheld signer runtime")]
struct Args {
    /// Optional configuration file path (overrides discovery of `signer.toml`).
    #[arg(long = "config")]
    config: Option<PathBuf>,
}

fn configure_logging() -> Result<Option<WorkerGuard>> {
    let log_dir = Path::new(".");
    let log_path = log_dir.join("signer.log");
    if log_path.exists() {
        let _ = std::fs::remove_file(&log_path);
    }

    let file_appender = tracing_appender::rolling::never(log_dir, "signer.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    match tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(writer)
        .try_init()
    {
        Ok(_) => Ok(Some(guard)),
        Err(_) => Ok(None),
    }
}

/// Wraps a codec-encoded body in the digest-then-body payload
/// `Connection::receive` expects, then frames it as a single `START` frame.
/// Only used to play the sender's side of the wire in `simulate_boot_exchange`.
fn framed_start(body: &[u8]) -> Vec<u8> {
    let digest = Sha256::digest(body);
    let mut payload = Vec::with_capacity(digest.len() + body.len());
    payload.extend_from_slice(&digest);
    payload.extend_from_slice(body);

    let mut frame = vec![CMD_START];
    frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    frame.extend_from_slice(&payload);
    frame
}

fn encode_get_address_request(id: u64) -> Vec<u8> {
    let mut buf = [0u8; 128];
    let mut b = CodecBuilder::new(&mut buf);
    let mut map = b.begin_map().expect("scratch buffer sized for a small request");
    b.map_entry(&mut map, |b| b.append_string("id"), |b| b.append_number(id)).unwrap();
    b.map_entry(&mut map, |b| b.append_string("method"), |b| b.append_string("getAddress")).unwrap();
    b.map_entry(&mut map, |b| b.append_string("params"), |b| b.append_array(0)).unwrap();
    b.end_map(map).unwrap();
    b.finished().to_vec()
}

fn encode_get_address_reply(id: u64, compressed_pubkey: &[u8; 33]) -> Vec<u8> {
    let mut buf = [0u8; 128];
    let mut b = CodecBuilder::new(&mut buf);
    let mut map = b.begin_map().expect("scratch buffer sized for a small reply");
    b.map_entry(&mut map, |b| b.append_string("id"), |b| b.append_number(id)).unwrap();
    b.map_entry(&mut map, |b| b.append_string("result"), |b| b.append_data(compressed_pubkey)).unwrap();
    b.end_map(map).unwrap();
    b.finished().to_vec()
}

/// Plays a QUERY and a signed `getAddress` request through `connection`,
/// publishing the decoded message on `events` and driving the reply back
/// out through `connection`'s outbound chunking. Mirrors the request the
/// active panel would actually receive over the wire.
async fn simulate_boot_exchange(
    connection: &mut Connection,
    events: &Arc<EventBus>,
    curve: &signer_crypto::CurveParams,
    mut inbox: tokio::sync::mpsc::Receiver<EventPayload>,
) {
    let (status, event) = connection.receive(&[CMD_QUERY]);
    if let InboundEvent::Query(device_info) = event {
        info!(status, protocol_version = device_info.protocol_version, model = device_info.model_number, "query answered");
    }

    let request = framed_start(&encode_get_address_request(1));
    let (status, event) = connection.receive(&request);
    let InboundEvent::Message(decoded) = event else {
        warn!(status, "boot getAddress request was not accepted");
        return;
    };

    events
        .publish(EventPayload::Message {
            id: decoded.id,
            method: decoded.method.clone(),
            params: decoded.params.clone(),
        })
        .await;

    let Some(delivered) = inbox.recv().await else {
        warn!("active panel never received the getAddress message");
        return;
    };
    let EventPayload::Message { id, method, .. } = delivered else {
        warn!("active panel received an unexpected event kind");
        return;
    };
    info!(id, %method, "active panel observed the inbound message");

    let Some(accepted) = connection.accept(id) else {
        warn!(id, "connection refused to hand off an accepted message");
        return;
    };

    let keypair = match signer_crypto::Keypair::generate(curve) {
        Ok(pair) => pair,
        Err(err) => {
            warn!(%err, "failed to derive a signing key for the boot getAddress reply");
            return;
        }
    };
    let reply = encode_get_address_reply(accepted.id, &keypair.public_key.compress());
    connection.send_reply(&reply);

    let mut frames_sent = 0;
    while let Some(frame) = connection.pump_outbound() {
        frames_sent += 1;
        info!(frame_len = frame.len(), frames_sent, "reply frame ready to send");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = configure_logging()?;

    let config_path = args.config.clone().or_else(|| Some(signer_config::discover()));
    let config = signer_config::load_from(config_path)?;
    info!(
        chunk_size = config.file.transport.chunk_size,
        curve = ?config.file.runtime.default_curve,
        "startup"
    );

    let scene = Scene::new(SCENE_CAPACITY);
    let events = Arc::new(EventBus::new(EVENT_FILTER_CAPACITY));
    let panels = PanelStack::new(scene, events.clone(), SCREEN_WIDTH, SCREEN_HEIGHT);

    let curve = signer_crypto::CurveParams::for_kind(match config.file.runtime.default_curve {
        signer_config::Curve::Secp256k1 => signer_crypto::CurveKind::Secp256k1,
        signer_config::Curve::P256 => signer_crypto::CurveKind::P256,
    });
    let info = signer_transport::DeviceInfo {
        protocol_version: config.file.transport.protocol_version,
        model_number: config.file.device.model,
        serial_number: config.file.device.serial,
    };
    let mut connection = Connection::new(config.file.transport.chunk_size, info);

    panels.push(PanelStyle::Instant, 0, move |scene, node| {
        let fill = scene.create_node(signer_scene::NodeKind::Fill {
            color: signer_scene::Color(0x0000),
        });
        if let Some(fill) = fill {
            scene.append_child(node, fill);
        }
    });

    let (message_tx, message_rx) = tokio::sync::mpsc::channel(EVENT_FILTER_CAPACITY);
    panels.register_filter(EventCategory::Message, message_tx);

    info!(curve = ?curve.kind, "runtime ready");
    simulate_boot_exchange(&mut connection, &events, &curve, message_rx).await;

    let mut tick_interval = tokio::time::interval(std::time::Duration::from_millis(config.file.runtime.frame_interval_ms));
    let mut now_ms: u64 = 0;
    let mut frames = 0;
    loop {
        tick_interval.tick().await;
        now_ms += config.file.runtime.frame_interval_ms;
        events.publish(EventPayload::RenderScene).await;

        panels.with_scene(|scene| {
            scene.sequence(now_ms);
            for fragment in 0..FRAGMENT_COUNT {
                let y0 = fragment as i32 * (SCREEN_HEIGHT / FRAGMENT_COUNT as i32);
                let _ = scene.render_fragment(SCREEN_WIDTH as u32, y0, (SCREEN_HEIGHT / FRAGMENT_COUNT as i32) as u32);
            }
        });

        frames += 1;
        if frames >= 3 {
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_address_request_round_trips_through_the_codec() {
        let body = encode_get_address_request(9);
        let cursor = Cursor::new(body);
        assert_eq!(cursor.follow_key("id").unwrap().value().unwrap(), 9);
        assert_eq!(cursor.follow_key("method").unwrap().as_str().unwrap(), "getAddress");
    }

    #[tokio::test]
    async fn boot_exchange_delivers_a_reply_to_the_active_panel() {
        let curve = signer_crypto::CurveParams::secp256k1();
        let info = signer_transport::DeviceInfo { protocol_version: 1, model_number: 1, serial_number: 1 };
        let mut connection = Connection::new(506, info);
        let events = Arc::new(EventBus::new(8));
        events.set_active_panel(Some(signer_events::PanelId(1)));

        let (tx, rx) = tokio::sync::mpsc::channel(8);
        events.register(signer_events::PanelId(1), EventCategory::Message, tx).unwrap();

        simulate_boot_exchange(&mut connection, &events, &curve, rx).await;

        assert_eq!(connection.state(), signer_transport::ConnectionState::Ready);
    }
}
