//! Conversational game master engine for tabletop RPG sessions.
//!
//! This crate provides:
//! - Dice notation parsing and evaluation (keep-highest/lowest,
//!   advantage and disadvantage, arbitrary die sizes)
//! - An AI game master driving narration through tool calls
//! - Scene and event tracking for one session
//! - Campaign persistence across sessions
//!
//! # Quick Start
//!
//! ```ignore
//! use gm_core::{GameMaster, GmConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = openrouter::Client::from_env()?;
//!     let mut gm = GameMaster::new(client);
//!
//!     let response = gm.respond("I look around the tavern").await?;
//!     println!("{}", response.narrative);
//!     Ok(())
//! }
//! ```

pub mod campaign;
pub mod dice;
pub mod gm;
pub mod provider;
pub mod session;
pub mod testing;

// Primary public API
pub use campaign::{Campaign, CampaignError, CampaignManager, CampaignSummary, PlotStatus, PlotThread};
pub use dice::{DiceError, DiceExpression, DiceRoller, RollMode, RollResult};
pub use gm::{GameMaster, GmConfig, GmError, GmResponse, StreamedEvent};
pub use provider::ChatProvider;
pub use session::{EventKind, Scene, SessionEvent, SessionLog};
pub use testing::ScriptedProvider;
