// Talking avatar animation core
// Facial animation, lip-sync playback and chat glue for a rigged 3D avatar

pub mod avatar;
pub mod chat;
pub mod cli;
pub mod config;
pub mod face;
pub mod logging;
pub mod sound;
pub mod time;

pub use avatar::Avatar;
pub use cli::Cli;
pub use config::Options;
pub use logging::LogLevel;
