//! Session log and scene state.
//!
//! The session log is the single record of what happened during play:
//! player actions, dice rolls, narration, and state changes, grouped
//! into scenes. At most one scene is active at any time; starting a new
//! scene implicitly ends the previous one.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// How many trailing events of the active scene feed the model context.
const MAX_SCENE_CONTEXT_EVENTS: usize = 20;

/// How many characters of an event survive into the context block.
const MAX_CONTEXT_CONTENT: usize = 200;

/// The closed set of event kinds a session records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Narration,
    PlayerAction,
    DiceRoll,
    NpcAction,
    NpcDialogue,
    System,
    ToolCall,
    StateChange,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Narration => "narration",
            EventKind::PlayerAction => "player_action",
            EventKind::DiceRoll => "dice_roll",
            EventKind::NpcAction => "npc_action",
            EventKind::NpcDialogue => "npc_dialogue",
            EventKind::System => "system",
            EventKind::ToolCall => "tool_call",
            EventKind::StateChange => "state_change",
        }
    }

    /// Parse an event kind as it appears in tool arguments.
    pub fn from_name(name: &str) -> Option<EventKind> {
        match name {
            "narration" => Some(EventKind::Narration),
            "player_action" => Some(EventKind::PlayerAction),
            "dice_roll" => Some(EventKind::DiceRoll),
            "npc_action" => Some(EventKind::NpcAction),
            "npc_dialogue" => Some(EventKind::NpcDialogue),
            "system" => Some(EventKind::System),
            "tool_call" => Some(EventKind::ToolCall),
            "state_change" => Some(EventKind::StateChange),
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One logged event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEvent {
    pub kind: EventKind,
    pub content: String,
    pub actor: String,
    #[serde(default)]
    pub metadata: Value,
}

/// Lifecycle state of a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SceneStatus {
    Active,
    Ended,
}

/// A bounded narrative unit grouping events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    pub id: String,
    pub title: String,
    pub location: String,
    pub status: SceneStatus,
    pub summary: Option<String>,
    /// Indices into the session event log, in order.
    pub events: Vec<usize>,
}

impl Scene {
    pub fn is_active(&self) -> bool {
        self.status == SceneStatus::Active
    }
}

/// The event log and scene state for one game session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLog {
    pub session_id: String,
    events: Vec<SessionEvent>,
    scenes: Vec<Scene>,
}

impl SessionLog {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    pub fn with_id(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            events: Vec::new(),
            scenes: Vec::new(),
        }
    }

    /// Append an event, attaching it to the active scene if there is one.
    pub fn log_event(
        &mut self,
        kind: EventKind,
        content: impl Into<String>,
        actor: impl Into<String>,
        metadata: Value,
    ) {
        let index = self.events.len();
        self.events.push(SessionEvent {
            kind,
            content: content.into(),
            actor: actor.into(),
            metadata,
        });
        if let Some(scene) = self.scenes.iter_mut().find(|s| s.is_active()) {
            scene.events.push(index);
        }
    }

    /// Begin a new scene, implicitly ending any active one.
    pub fn start_scene(&mut self, title: impl Into<String>, location: impl Into<String>) -> &Scene {
        self.end_scene(None);

        let id = format!("scene_{:03}", self.scenes.len() + 1);
        self.scenes.push(Scene {
            id,
            title: title.into(),
            location: location.into(),
            status: SceneStatus::Active,
            summary: None,
            events: Vec::new(),
        });
        let index = self.scenes.len() - 1;
        &self.scenes[index]
    }

    /// End the active scene, storing the summary.
    ///
    /// Returns false when no scene is active.
    pub fn end_scene(&mut self, summary: Option<&str>) -> bool {
        match self.scenes.iter_mut().find(|s| s.is_active()) {
            Some(scene) => {
                scene.status = SceneStatus::Ended;
                if let Some(summary) = summary {
                    scene.summary = Some(summary.to_string());
                }
                true
            }
            None => false,
        }
    }

    pub fn active_scene(&self) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.is_active())
    }

    pub fn events(&self) -> &[SessionEvent] {
        &self.events
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    /// Build a bounded textual context block for the next model call:
    /// summaries of the most recent ended scenes, then the active
    /// scene's recent events.
    pub fn context_for_model(&self, previous_scenes: usize) -> String {
        let mut context = String::new();

        let ended: Vec<&Scene> = self.scenes.iter().filter(|s| !s.is_active()).collect();
        if previous_scenes > 0 && !ended.is_empty() {
            context.push_str("## Previous Scenes\n");
            let skip = ended.len().saturating_sub(previous_scenes);
            for scene in &ended[skip..] {
                let summary = scene.summary.as_deref().unwrap_or("(no summary)");
                context.push_str(&format!(
                    "- '{}' at {}: {}\n",
                    scene.title, scene.location, summary
                ));
            }
        }

        if let Some(scene) = self.active_scene() {
            context.push_str(&format!(
                "## Current Scene: '{}' at {}\n",
                scene.title, scene.location
            ));
            let skip = scene.events.len().saturating_sub(MAX_SCENE_CONTEXT_EVENTS);
            for &index in &scene.events[skip..] {
                let event = &self.events[index];
                context.push_str(&format!(
                    "- [{}] {}: {}\n",
                    event.kind,
                    event.actor,
                    truncate(&event.content, MAX_CONTEXT_CONTENT)
                ));
            }
        } else if !self.events.is_empty() {
            context.push_str("## Recent Events\n");
            let skip = self.events.len().saturating_sub(MAX_SCENE_CONTEXT_EVENTS);
            for event in &self.events[skip..] {
                context.push_str(&format!(
                    "- [{}] {}: {}\n",
                    event.kind,
                    event.actor,
                    truncate(&event.content, MAX_CONTEXT_CONTENT)
                ));
            }
        }

        context
    }
}

impl Default for SessionLog {
    fn default() -> Self {
        Self::new()
    }
}

fn truncate(content: &str, max: usize) -> String {
    if content.len() <= max {
        content.to_string()
    } else {
        let mut end = max;
        while !content.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &content[..end])
    }
}
