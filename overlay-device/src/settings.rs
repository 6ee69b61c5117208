use std::time::Duration;

/// Per-device tunables (spec §3's "settings" field on `Device`).
///
/// A plain struct rather than a process-wide config file: the mesh
/// substrate has no file-based configuration surface of its own, only
/// per-device knobs the original's `AIDevice.__init__` keyword arguments
/// already capture.
#[derive(Debug, Clone)]
pub struct DeviceSettings {
    /// Minimum time an oracle stream must have been running before a fresh
    /// inbox arrival is allowed to interrupt it (spec §5, §9's resolved
    /// "now - start > coolTime" open question).
    pub cool_time: Duration,
    /// How long a reasoning-loop tick waits for the inbox before giving up
    /// and running with an empty transcript (spec §5).
    pub time_out: Duration,
    /// Suppresses transcript lines for whisper/text packets not addressed
    /// to this device, and hides control events entirely (spec §4.4).
    pub privacy_mode: bool,
    /// Whether the reasoning loop actually runs. A device with `run_ai =
    /// false` still joins/leaves/moves and answers pings, it just never
    /// calls the oracle — useful for scripted test fixtures.
    pub run_ai: bool,
    pub model: String,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            cool_time: Duration::from_millis(200),
            time_out: Duration::from_secs(10),
            privacy_mode: false,
            run_ai: true,
            model: "gpt-4o".to_string(),
        }
    }
}
