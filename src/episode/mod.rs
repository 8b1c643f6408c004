pub mod builder;
pub mod script;
pub mod transcript;

pub use builder::EpisodeBuilder;
pub use script::EpisodeScriptEngine;
