/// Settings inline-button handlers
pub mod callbacks;
/// Command dispatch table, command and dialogue handlers
pub mod handlers;
/// Inline keyboard builders
pub mod keyboards;
/// Response template catalog
pub mod texts;
