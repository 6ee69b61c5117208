use std::sync::Arc;
use std::time::Duration;

use overlay_device::DeviceSettings;
use overlay_manager::Manager;
use overlay_net::Arena;
use overlay_oracle::{ChatOracle, MockOracle, StreamEvent};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Reads an environment variable and parses it, falling back to `default`
/// on absence or a parse failure — the same role the original's
/// `OPENAI_API_KEY`/`OPENAI_BASE_URL` env reads play, scaled down to the
/// couple of knobs this smoke harness actually has.
fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// A minimal, manually-driven mesh: two connected rooms and a single
/// scripted device, useful for eyeballing log output while developing the
/// forwarding and reasoning-loop logic. Not a production server — see
/// `overlay-manager`/`overlay-hub`/`overlay-device` for the library the
/// real binary integration would be built from.
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let model: String = env_or("OVERLAY_ORACLE_MODEL", "gpt-4o".to_string());
    let time_out = Duration::from_secs(env_or("OVERLAY_POLL_SECS", 10));

    let manager = Manager::new();
    let arena: Arc<dyn Arena> = manager.clone();

    let lobby = manager.create_room_hub("lobby").await;
    let annex = manager.create_room_hub("annex").await;
    manager
        .connect_room_hubs(lobby.id(), annex.id())
        .await
        .expect("lobby and annex are freshly created and not yet connected");

    let alice = manager.create_device("alice", DeviceSettings { model, time_out, ..DeviceSettings::default() }).await;
    manager
        .set_device_hub(alice.id(), lobby.id())
        .await
        .expect("lobby was just created, joining it cannot fail");

    let oracle: Arc<dyn ChatOracle> = Arc::new(MockOracle::new(vec![vec![
        StreamEvent::TextDelta("Looking around the room.".to_string()),
        StreamEvent::Done,
    ]]));

    let loop_handle = alice.spawn_reasoning_loop(oracle, arena, "A quiet lobby with one other room attached.");

    info!("overlay mesh running, press ctrl-c to stop");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = tokio::time::sleep(Duration::from_secs(30)) => {}
    }

    loop_handle.abort();
}
