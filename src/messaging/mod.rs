mod bus;
mod types;

pub use self::bus::MessageBus;
pub use self::types::{ChimeEvent, ChimeMessage};
