//! Tool declarations and execution for the game master.
//!
//! The model never mutates game state directly. It requests a tool by
//! name with JSON arguments, the loop parses that into a
//! [`ToolInvocation`], and execution runs against a [`ToolContext`].
//! Anything the model can get wrong (unknown tool, bad notation,
//! missing argument) comes back as a result string for the model to
//! read, not as an error that aborts the turn.

use crate::campaign::{CampaignError, CampaignLocation, CampaignManager, NpcProfile, PlotStatus, PlotThread};
use crate::dice::{DiceRoller, RollMode};
use crate::session::{EventKind, SessionLog};
use openrouter::ToolSpec;
use serde_json::{json, Value};
use std::collections::HashMap;

/// Mutable game state a tool invocation runs against.
pub struct ToolContext<'a> {
    pub log: &'a mut SessionLog,
    pub dice: &'a mut DiceRoller,
    pub campaign: Option<&'a mut CampaignManager>,
}

/// The tool declarations advertised to the model. Campaign tools are
/// included only when a campaign manager is attached.
pub fn tool_declarations(include_campaign: bool) -> Vec<ToolSpec> {
    let core = vec![
        ToolSpec {
            name: "roll_dice".to_string(),
            description: "Roll dice using standard notation. After rolling, you MUST narrate what happens based on the result. Supports d20, 2d6+3, 4d6kh3 (keep highest), advantage/disadvantage, and arbitrary dice sizes like d3, d7, d25, d100.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "notation": {
                        "type": "string",
                        "description": "Dice notation (e.g., 'd20', '2d6+3', '4d6kh3', 'd25')"
                    },
                    "roll_type": {
                        "type": "string",
                        "enum": ["normal", "advantage", "disadvantage"],
                        "description": "Type of roll (default: normal)"
                    },
                    "purpose": {
                        "type": "string",
                        "description": "What this roll is for (e.g., 'Goblin attack roll', 'Perception check')"
                    }
                },
                "required": ["notation", "purpose"]
            }),
        },
        ToolSpec {
            name: "start_scene".to_string(),
            description: "Begin a new narrative scene when the location or situation changes significantly. Scenes help organize the story into manageable chunks.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "title": {
                        "type": "string",
                        "description": "Descriptive title for the scene (e.g., 'The Leaky Dragon Tavern', 'Ambush on the Road')"
                    },
                    "location": {
                        "type": "string",
                        "description": "Where this scene takes place (e.g., 'Tavern', 'Forest Road', 'Castle Throne Room')"
                    }
                },
                "required": ["title", "location"]
            }),
        },
        ToolSpec {
            name: "end_scene".to_string(),
            description: "End the current scene with an optional summary. Use when transitioning to a new location or significant situation change.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "summary": {
                        "type": "string",
                        "description": "Brief summary of what happened in this scene (2-3 sentences)"
                    }
                },
                "required": []
            }),
        },
        ToolSpec {
            name: "log_event".to_string(),
            description: "Log an important event, state change, or significant moment. Use for tracking key narrative beats, item acquisitions, NPC reactions, or world state changes.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "event_type": {
                        "type": "string",
                        "enum": [
                            "narration",
                            "player_action",
                            "dice_roll",
                            "npc_action",
                            "npc_dialogue",
                            "system",
                            "tool_call",
                            "state_change"
                        ],
                        "description": "Type of event being logged"
                    },
                    "content": {
                        "type": "string",
                        "description": "Description of what happened"
                    },
                    "actor": {
                        "type": "string",
                        "description": "Who performed this action (player name, NPC name, or 'system')"
                    }
                },
                "required": ["event_type", "content"]
            }),
        },
    ];

    if !include_campaign {
        return core;
    }

    let mut tools = vec![
        ToolSpec {
            name: "track_npc".to_string(),
            description: "Track or update an important NPC in the campaign. Use when introducing a new significant NPC or updating their knowledge/relationships.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "NPC name"},
                    "description": {
                        "type": "string",
                        "description": "Physical appearance and personality"
                    },
                    "role": {
                        "type": "string",
                        "description": "NPC's role (e.g., 'quest giver', 'antagonist', 'merchant', 'ally')"
                    },
                    "knowledge": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "What this NPC knows (add new knowledge items)"
                    },
                    "location": {"type": "string", "description": "Where NPC was last seen"}
                },
                "required": ["name", "description"]
            }),
        },
        ToolSpec {
            name: "track_location".to_string(),
            description: "Track or update a location in the campaign. Use when visiting a new important place or when significant events occur at a location.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Location name"},
                    "description": {"type": "string", "description": "Location description"},
                    "event": {
                        "type": "string",
                        "description": "Notable event that just happened here"
                    }
                },
                "required": ["name", "description"]
            }),
        },
        ToolSpec {
            name: "add_plot_thread".to_string(),
            description: "Create a new plot thread when a new story arc or quest begins.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "title": {"type": "string", "description": "Plot thread title"},
                    "description": {
                        "type": "string",
                        "description": "What this plot thread is about"
                    },
                    "related_npcs": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "NPCs involved in this plot"
                    }
                },
                "required": ["title", "description"]
            }),
        },
        ToolSpec {
            name: "update_plot_thread".to_string(),
            description: "Update an existing plot thread when significant developments occur.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "title": {"type": "string", "description": "Plot thread title to update"},
                    "update": {"type": "string", "description": "What happened in this plot"},
                    "status": {
                        "type": "string",
                        "enum": ["active", "completed", "abandoned", "on_hold"],
                        "description": "Updated status if changed"
                    }
                },
                "required": ["title", "update"]
            }),
        },
    ];
    tools.extend(core);
    tools
}

/// A tool call decoded from the model's arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocation {
    RollDice {
        notation: String,
        mode: RollMode,
        purpose: String,
    },
    StartScene {
        title: String,
        location: String,
    },
    EndScene {
        summary: Option<String>,
    },
    LogEvent {
        kind: EventKind,
        content: String,
        actor: String,
    },
    TrackNpc {
        name: String,
        description: String,
        role: Option<String>,
        knowledge: Vec<String>,
        location: Option<String>,
    },
    TrackLocation {
        name: String,
        description: String,
        event: Option<String>,
    },
    AddPlotThread {
        title: String,
        description: String,
        related_npcs: Vec<String>,
    },
    UpdatePlotThread {
        title: String,
        update: String,
        status: Option<PlotStatus>,
    },
    /// A tool name the loop does not recognize.
    Unknown { name: String },
    /// A recognized tool with arguments the loop could not decode. The
    /// message becomes the tool result so the model can correct itself.
    Invalid { message: String },
}

fn required_str(name: &str, args: &Value, key: &str) -> Result<String, ToolInvocation> {
    match args.get(key).and_then(Value::as_str) {
        Some(s) => Ok(s.to_string()),
        None => Err(ToolInvocation::Invalid {
            message: format!("Missing required argument '{key}' for {name}"),
        }),
    }
}

fn optional_str(args: &Value, key: &str) -> Option<String> {
    args.get(key).and_then(Value::as_str).map(str::to_string)
}

fn str_list(args: &Value, key: &str) -> Vec<String> {
    args.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

impl ToolInvocation {
    /// Decode a named tool call. Never fails: unrecognized names and
    /// malformed arguments map to the `Unknown` and `Invalid` variants.
    pub fn parse(name: &str, arguments: &Value) -> ToolInvocation {
        let result = match name {
            "roll_dice" => Self::parse_roll_dice(arguments),
            "start_scene" => Self::parse_start_scene(arguments),
            "end_scene" => Ok(ToolInvocation::EndScene {
                summary: optional_str(arguments, "summary"),
            }),
            "log_event" => Self::parse_log_event(arguments),
            "track_npc" => Self::parse_track_npc(arguments),
            "track_location" => Self::parse_track_location(arguments),
            "add_plot_thread" => Self::parse_add_plot_thread(arguments),
            "update_plot_thread" => Self::parse_update_plot_thread(arguments),
            other => Ok(ToolInvocation::Unknown {
                name: other.to_string(),
            }),
        };
        match result {
            Ok(invocation) => invocation,
            Err(invalid) => invalid,
        }
    }

    fn parse_roll_dice(args: &Value) -> Result<ToolInvocation, ToolInvocation> {
        let notation = required_str("roll_dice", args, "notation")?;
        let purpose = required_str("roll_dice", args, "purpose")?;
        // Unrecognized roll_type values fall back to a normal roll.
        let mode = optional_str(args, "roll_type")
            .and_then(|s| RollMode::from_name(&s))
            .unwrap_or(RollMode::Normal);
        Ok(ToolInvocation::RollDice {
            notation,
            mode,
            purpose,
        })
    }

    fn parse_start_scene(args: &Value) -> Result<ToolInvocation, ToolInvocation> {
        Ok(ToolInvocation::StartScene {
            title: required_str("start_scene", args, "title")?,
            location: required_str("start_scene", args, "location")?,
        })
    }

    fn parse_log_event(args: &Value) -> Result<ToolInvocation, ToolInvocation> {
        let event_type = required_str("log_event", args, "event_type")?;
        let kind = EventKind::from_name(&event_type).ok_or_else(|| ToolInvocation::Invalid {
            message: format!("Unknown event type: {event_type}"),
        })?;
        Ok(ToolInvocation::LogEvent {
            kind,
            content: required_str("log_event", args, "content")?,
            actor: optional_str(args, "actor").unwrap_or_else(|| "system".to_string()),
        })
    }

    fn parse_track_npc(args: &Value) -> Result<ToolInvocation, ToolInvocation> {
        Ok(ToolInvocation::TrackNpc {
            name: required_str("track_npc", args, "name")?,
            description: required_str("track_npc", args, "description")?,
            role: optional_str(args, "role"),
            knowledge: str_list(args, "knowledge"),
            location: optional_str(args, "location"),
        })
    }

    fn parse_track_location(args: &Value) -> Result<ToolInvocation, ToolInvocation> {
        Ok(ToolInvocation::TrackLocation {
            name: required_str("track_location", args, "name")?,
            description: required_str("track_location", args, "description")?,
            event: optional_str(args, "event"),
        })
    }

    fn parse_add_plot_thread(args: &Value) -> Result<ToolInvocation, ToolInvocation> {
        Ok(ToolInvocation::AddPlotThread {
            title: required_str("add_plot_thread", args, "title")?,
            description: required_str("add_plot_thread", args, "description")?,
            related_npcs: str_list(args, "related_npcs"),
        })
    }

    fn parse_update_plot_thread(args: &Value) -> Result<ToolInvocation, ToolInvocation> {
        let status = match optional_str(args, "status") {
            Some(s) => Some(PlotStatus::from_name(&s).ok_or_else(|| ToolInvocation::Invalid {
                message: format!("Unknown plot status: {s}"),
            })?),
            None => None,
        };
        Ok(ToolInvocation::UpdatePlotThread {
            title: required_str("update_plot_thread", args, "title")?,
            update: required_str("update_plot_thread", args, "update")?,
            status,
        })
    }

    /// Execute against the game state and produce the result string
    /// fed back to the model. Only persistence failures surface as
    /// errors; everything the model can correct comes back as text.
    pub async fn execute(self, ctx: &mut ToolContext<'_>) -> Result<String, CampaignError> {
        match self {
            ToolInvocation::RollDice {
                notation,
                mode,
                purpose,
            } => Ok(execute_roll(ctx, &notation, mode, &purpose)),

            ToolInvocation::StartScene { title, location } => {
                let scene = ctx.log.start_scene(&title, &location);
                Ok(format!(
                    "Started new scene: '{}' at {} (Scene ID: {})",
                    title, location, scene.id
                ))
            }

            ToolInvocation::EndScene { summary } => {
                if ctx.log.end_scene(summary.as_deref()) {
                    Ok(format!(
                        "Ended current scene. Summary: {}",
                        summary.as_deref().unwrap_or("None")
                    ))
                } else {
                    Ok("No active scene to end".to_string())
                }
            }

            ToolInvocation::LogEvent {
                kind,
                content,
                actor,
            } => {
                ctx.log.log_event(kind, &content, actor, Value::Null);
                Ok(format!(
                    "Logged {} event: {}...",
                    kind.as_str(),
                    truncate_chars(&content, 50)
                ))
            }

            ToolInvocation::TrackNpc {
                name,
                description,
                role,
                knowledge,
                location,
            } => match ctx.campaign {
                Some(ref mut campaign) => {
                    track_npc(campaign, &ctx.log.session_id, name.clone(), description, role, knowledge, location);
                    campaign.save().await?;
                    Ok(format!("Tracked NPC '{name}' in campaign"))
                }
                None => Ok("Unknown tool: track_npc".to_string()),
            },

            ToolInvocation::TrackLocation {
                name,
                description,
                event,
            } => match ctx.campaign {
                Some(ref mut campaign) => {
                    track_location(campaign, &ctx.log.session_id, name.clone(), description, event);
                    campaign.save().await?;
                    Ok(format!("Tracked location '{name}' in campaign"))
                }
                None => Ok("Unknown tool: track_location".to_string()),
            },

            ToolInvocation::AddPlotThread {
                title,
                description,
                related_npcs,
            } => match ctx.campaign {
                Some(ref mut campaign) => {
                    let thread = PlotThread {
                        id: campaign.campaign().next_plot_id(),
                        title: title.clone(),
                        description,
                        status: PlotStatus::Active,
                        related_npcs,
                        related_locations: Vec::new(),
                        created_in_session: ctx.log.session_id.clone(),
                        updates: Vec::new(),
                    };
                    campaign.campaign_mut().add_plot_thread(thread);
                    campaign.save().await?;
                    Ok(format!("Added new plot thread: '{title}'"))
                }
                None => Ok("Unknown tool: add_plot_thread".to_string()),
            },

            ToolInvocation::UpdatePlotThread {
                title,
                update,
                status,
            } => match ctx.campaign {
                Some(ref mut campaign) => {
                    match campaign.campaign_mut().plot_thread_by_title_mut(&title) {
                        Some(thread) => {
                            thread.add_update(ctx.log.session_id.clone(), update.clone());
                            if let Some(status) = status {
                                thread.status = status;
                            }
                            campaign.save().await?;
                            Ok(format!("Updated plot thread '{title}': {update}"))
                        }
                        None => Ok(format!("Plot thread '{title}' not found")),
                    }
                }
                None => Ok("Unknown tool: update_plot_thread".to_string()),
            },

            ToolInvocation::Unknown { name } => Ok(format!("Unknown tool: {name}")),
            ToolInvocation::Invalid { message } => Ok(message),
        }
    }
}

fn execute_roll(ctx: &mut ToolContext<'_>, notation: &str, mode: RollMode, purpose: &str) -> String {
    match ctx.dice.roll(notation, mode) {
        Ok(result) => {
            ctx.log.log_event(
                EventKind::DiceRoll,
                format!("{purpose}: {}", result.details),
                "DM",
                json!({
                    "notation": notation,
                    "roll_type": mode.to_string(),
                    "total": result.total,
                }),
            );
            format!("Roll result: {}", result.details)
        }
        Err(e) => format!("Error rolling dice: {e}"),
    }
}

fn track_npc(
    campaign: &mut CampaignManager,
    session_id: &str,
    name: String,
    description: String,
    role: Option<String>,
    knowledge: Vec<String>,
    location: Option<String>,
) {
    match campaign.campaign_mut().get_npc_mut(&name) {
        Some(npc) => {
            npc.description = description;
            if role.is_some() {
                npc.role = role;
            }
            for item in knowledge {
                npc.add_knowledge(item);
            }
            if let Some(location) = location {
                npc.last_seen_location = Some(location);
                npc.last_seen_session = Some(session_id.to_string());
            }
        }
        None => {
            campaign.campaign_mut().add_npc(NpcProfile {
                name,
                description,
                role,
                knowledge,
                relationships: HashMap::new(),
                last_seen_location: location,
                last_seen_session: Some(session_id.to_string()),
                first_appeared_session: Some(session_id.to_string()),
            });
        }
    }
}

fn track_location(
    campaign: &mut CampaignManager,
    session_id: &str,
    name: String,
    description: String,
    event: Option<String>,
) {
    match campaign.campaign_mut().get_location_mut(&name) {
        Some(location) => {
            location.description = description;
            if let Some(event) = event {
                location.add_event(event);
            }
            location.last_visited_session = Some(session_id.to_string());
        }
        None => {
            campaign.campaign_mut().add_location(CampaignLocation {
                name,
                description,
                notable_events: event.into_iter().collect(),
                npcs_present: Vec::new(),
                first_visited_session: Some(session_id.to_string()),
                last_visited_session: Some(session_id.to_string()),
            });
        }
    }
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context<'a>(
        log: &'a mut SessionLog,
        dice: &'a mut DiceRoller,
        campaign: Option<&'a mut CampaignManager>,
    ) -> ToolContext<'a> {
        ToolContext {
            log,
            dice,
            campaign,
        }
    }

    #[test]
    fn test_declarations_without_campaign() {
        let tools = tool_declarations(false);
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["roll_dice", "start_scene", "end_scene", "log_event"]);
    }

    #[test]
    fn test_declarations_with_campaign() {
        let tools = tool_declarations(true);
        assert_eq!(tools.len(), 8);
        assert_eq!(tools[0].name, "track_npc");
        assert_eq!(tools[4].name, "roll_dice");
    }

    #[test]
    fn test_parse_roll_dice() {
        let invocation = ToolInvocation::parse(
            "roll_dice",
            &json!({"notation": "2d6+3", "purpose": "damage", "roll_type": "advantage"}),
        );
        assert_eq!(
            invocation,
            ToolInvocation::RollDice {
                notation: "2d6+3".to_string(),
                mode: RollMode::Advantage,
                purpose: "damage".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_roll_dice_bad_roll_type_defaults_to_normal() {
        let invocation = ToolInvocation::parse(
            "roll_dice",
            &json!({"notation": "d20", "purpose": "check", "roll_type": "lucky"}),
        );
        assert!(matches!(
            invocation,
            ToolInvocation::RollDice {
                mode: RollMode::Normal,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_missing_required_argument() {
        let invocation = ToolInvocation::parse("roll_dice", &json!({"notation": "d20"}));
        assert_eq!(
            invocation,
            ToolInvocation::Invalid {
                message: "Missing required argument 'purpose' for roll_dice".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_unknown_tool() {
        let invocation = ToolInvocation::parse("cast_spell", &json!({}));
        assert_eq!(
            invocation,
            ToolInvocation::Unknown {
                name: "cast_spell".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_execute_roll_logs_event() {
        let mut log = SessionLog::new();
        let mut dice = DiceRoller::with_seed(7);
        let mut ctx = context(&mut log, &mut dice, None);

        let result = ToolInvocation::parse(
            "roll_dice",
            &json!({"notation": "d20", "purpose": "Perception check"}),
        )
        .execute(&mut ctx)
        .await
        .unwrap();

        assert!(result.starts_with("Roll result: d20:"));
        assert_eq!(log.events().len(), 1);
        assert_eq!(log.events()[0].kind, EventKind::DiceRoll);
        assert!(log.events()[0].content.starts_with("Perception check:"));
    }

    #[tokio::test]
    async fn test_execute_roll_bad_notation_is_result_string() {
        let mut log = SessionLog::new();
        let mut dice = DiceRoller::with_seed(7);
        let mut ctx = context(&mut log, &mut dice, None);

        let result = ToolInvocation::parse(
            "roll_dice",
            &json!({"notation": "2x6", "purpose": "check"}),
        )
        .execute(&mut ctx)
        .await
        .unwrap();

        assert!(result.starts_with("Error rolling dice:"));
        assert!(log.events().is_empty());
    }

    #[tokio::test]
    async fn test_scene_lifecycle_via_tools() {
        let mut log = SessionLog::new();
        let mut dice = DiceRoller::with_seed(7);
        let mut ctx = context(&mut log, &mut dice, None);

        let started = ToolInvocation::parse(
            "start_scene",
            &json!({"title": "The Leaky Dragon", "location": "Tavern"}),
        )
        .execute(&mut ctx)
        .await
        .unwrap();
        assert_eq!(
            started,
            "Started new scene: 'The Leaky Dragon' at Tavern (Scene ID: scene_001)"
        );

        let ended = ToolInvocation::parse(
            "end_scene",
            &json!({"summary": "The party met a hooded stranger."}),
        )
        .execute(&mut ctx)
        .await
        .unwrap();
        assert_eq!(
            ended,
            "Ended current scene. Summary: The party met a hooded stranger."
        );
        assert!(ctx.log.active_scene().is_none());

        let nothing = ToolInvocation::parse("end_scene", &json!({}))
            .execute(&mut ctx)
            .await
            .unwrap();
        assert_eq!(nothing, "No active scene to end");
    }

    #[tokio::test]
    async fn test_log_event_truncates_result() {
        let mut log = SessionLog::new();
        let mut dice = DiceRoller::with_seed(7);
        let mut ctx = context(&mut log, &mut dice, None);

        let content = "x".repeat(80);
        let result = ToolInvocation::parse(
            "log_event",
            &json!({"event_type": "state_change", "content": content}),
        )
        .execute(&mut ctx)
        .await
        .unwrap();

        assert_eq!(result, format!("Logged state_change event: {}...", "x".repeat(50)));
        assert_eq!(log.events()[0].actor, "system");
    }

    #[tokio::test]
    async fn test_log_event_unknown_type_is_result_string() {
        let mut log = SessionLog::new();
        let mut dice = DiceRoller::with_seed(7);
        let mut ctx = context(&mut log, &mut dice, None);

        let invocation = ToolInvocation::parse(
            "log_event",
            &json!({"event_type": "combat", "content": "Swords are drawn"}),
        );
        assert_eq!(
            invocation,
            ToolInvocation::Invalid {
                message: "Unknown event type: combat".to_string(),
            }
        );

        let result = invocation.execute(&mut ctx).await.unwrap();
        assert_eq!(result, "Unknown event type: combat");
        assert!(log.events().is_empty());
    }

    #[tokio::test]
    async fn test_campaign_tools_without_manager_report_unknown() {
        let mut log = SessionLog::new();
        let mut dice = DiceRoller::with_seed(7);
        let mut ctx = context(&mut log, &mut dice, None);

        let result = ToolInvocation::parse(
            "track_npc",
            &json!({"name": "Mira", "description": "A herbalist"}),
        )
        .execute(&mut ctx)
        .await
        .unwrap();

        assert_eq!(result, "Unknown tool: track_npc");
    }

    #[tokio::test]
    async fn test_track_npc_creates_then_updates() {
        let dir = std::env::temp_dir().join(format!("gm-tools-test-{}", std::process::id()));
        let mut log = SessionLog::with_id("s1");
        let mut dice = DiceRoller::with_seed(7);
        let mut manager = CampaignManager::create(&dir, "c1", "Test", "Setting");

        {
            let mut ctx = context(&mut log, &mut dice, Some(&mut manager));
            let result = ToolInvocation::parse(
                "track_npc",
                &json!({
                    "name": "Mira",
                    "description": "A herbalist",
                    "role": "quest giver",
                    "knowledge": ["The crown is lost"],
                    "location": "Saltmarsh"
                }),
            )
            .execute(&mut ctx)
            .await
            .unwrap();
            assert_eq!(result, "Tracked NPC 'Mira' in campaign");
        }

        {
            let mut ctx = context(&mut log, &mut dice, Some(&mut manager));
            ToolInvocation::parse(
                "track_npc",
                &json!({
                    "name": "Mira",
                    "description": "A worried herbalist",
                    "knowledge": ["The crown is lost", "The tide is wrong"]
                }),
            )
            .execute(&mut ctx)
            .await
            .unwrap();
        }

        let campaign = manager.campaign();
        assert_eq!(campaign.npcs.len(), 1);
        assert_eq!(campaign.npcs[0].description, "A worried herbalist");
        assert_eq!(campaign.npcs[0].role.as_deref(), Some("quest giver"));
        assert_eq!(campaign.npcs[0].knowledge.len(), 2);
        assert_eq!(campaign.npcs[0].first_appeared_session.as_deref(), Some("s1"));

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn test_plot_thread_lifecycle() {
        let dir = std::env::temp_dir().join(format!("gm-plot-test-{}", std::process::id()));
        let mut log = SessionLog::with_id("s1");
        let mut dice = DiceRoller::with_seed(7);
        let mut manager = CampaignManager::create(&dir, "c1", "Test", "Setting");

        {
            let mut ctx = context(&mut log, &mut dice, Some(&mut manager));
            let added = ToolInvocation::parse(
                "add_plot_thread",
                &json!({"title": "Missing Fishermen", "description": "Boats return empty"}),
            )
            .execute(&mut ctx)
            .await
            .unwrap();
            assert_eq!(added, "Added new plot thread: 'Missing Fishermen'");

            let updated = ToolInvocation::parse(
                "update_plot_thread",
                &json!({
                    "title": "Missing Fishermen",
                    "update": "A sea cave was found",
                    "status": "completed"
                }),
            )
            .execute(&mut ctx)
            .await
            .unwrap();
            assert_eq!(
                updated,
                "Updated plot thread 'Missing Fishermen': A sea cave was found"
            );

            let missing = ToolInvocation::parse(
                "update_plot_thread",
                &json!({"title": "Nope", "update": "irrelevant"}),
            )
            .execute(&mut ctx)
            .await
            .unwrap();
            assert_eq!(missing, "Plot thread 'Nope' not found");
        }

        let thread = &manager.campaign().plot_threads[0];
        assert_eq!(thread.id, "plot_001");
        assert_eq!(thread.status, PlotStatus::Completed);
        assert_eq!(thread.updates.len(), 1);

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
