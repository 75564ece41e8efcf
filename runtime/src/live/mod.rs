//! Live browser sessions: page loading and best-effort interaction.

pub mod interact;
pub mod session;
#[doc(hidden)]
pub mod testing;
