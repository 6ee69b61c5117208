//! The reasoning participant: packet inbox, contact directory, tool
//! dispatch and the oracle-driven reasoning loop (spec §4.4, §6).

mod contacts;
mod device;
mod events;
mod gate;
mod interrupt;
mod prompt;
mod settings;
mod tools;
mod transcript;

pub use contacts::ContactDirectory;
pub use device::Device;
pub use events::{DeviceEvent, DeviceEventListener, DeviceListenerId};
pub use gate::{ReasoningGate, THINKING_REQUIRED_REMINDER};
pub use settings::DeviceSettings;
pub use tools::catalogue;
pub use transcript::{DETECTION_THRESHOLD, RETENTION_THRESHOLD};
