pub mod config;
pub mod formatting;
pub mod milestone;
pub mod text;

pub use config::{DamageConfig, DisplayConfig, PinConfig, RespawnMode, SplitrunConfig};
pub use milestone::Milestone;
pub use text::{Span, StyledText, TextColor};
