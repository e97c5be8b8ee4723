//! Temporary voice rooms.

#[cfg(test)]
pub mod fake;
mod lifecycle;
pub mod naming;
mod owner;
mod provider;
mod transition;

pub use lifecycle::LifecycleSettings;
pub use lifecycle::RoomManager;
pub use provider::ChannelInfo;
pub use provider::ChannelProvider;
pub use provider::Overwrite;
pub use transition::VoiceTransition;
