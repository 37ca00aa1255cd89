//! The game master agent and its tool dispatch loop.

use crate::campaign::{CampaignError, CampaignManager};
use crate::dice::DiceRoller;
use crate::gm::tools::{tool_declarations, ToolContext, ToolInvocation};
use crate::provider::ChatProvider;
use crate::session::{EventKind, SessionLog};
use futures::StreamExt;
use openrouter::{ChatMessage, Request, ToolCall, ToolSpec};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use thiserror::Error;

const SYSTEM_PROMPT: &str = "You are an expert Dungeon Master running a tabletop RPG game.

Your role is to:
- Create engaging narratives and describe the world vividly
- Manage NPCs with distinct personalities and motivations
- Apply game rules fairly and consistently
- Respond to player actions with appropriate consequences
- Maintain narrative pacing and player engagement
- Use your tools to roll dice, manage scenes, and log events

When narrating:
- Be descriptive but concise
- Focus on sensory details (sights, sounds, smells)
- Show consequences of player actions
- Give players clear choices when appropriate
- Maintain tension and drama

When using tools:
- Roll dice for NPCs and environmental effects
- AFTER rolling dice, ALWAYS narrate what happens based on the result:
  * Low rolls (1-7): describe failure, setbacks, or complications
  * Mid rolls (8-14): describe partial success or mixed outcomes
  * High rolls (15+): describe clear success and positive outcomes
- Start new scenes when the location or situation changes significantly
- End scenes with a brief summary when transitioning
- Log important events and state changes

Campaign tracking (if available):
- Use track_npc when introducing or updating important NPCs
- Use track_location when visiting significant places
- Use add_plot_thread when a new story arc begins
- Use update_plot_thread when plot developments occur
- Consult campaign context for NPC knowledge and relationships
- Maintain consistency with established locations and events

Remember:
- Players have agency - avoid railroading
- NPCs have limited knowledge - they don't know everything you know as DM
- Track what each NPC knows separately for realistic interactions
- The rules serve the story, not the other way around
- Safety and comfort of players comes first

Be creative, fair, and engaging. Focus on collaborative storytelling.";

/// Errors from a game master turn.
#[derive(Debug, Error)]
pub enum GmError {
    #[error("API error: {0}")]
    Api(#[from] openrouter::Error),

    #[error("Campaign error: {0}")]
    Campaign(#[from] CampaignError),
}

/// Tunable parameters for the game master.
#[derive(Debug, Clone)]
pub struct GmConfig {
    /// Model override; `None` uses the client's default.
    pub model: Option<String>,
    pub max_tokens: usize,
    pub temperature: f32,
    /// Tool rounds allowed per player turn before the loop gives up.
    pub max_tool_rounds: usize,
    /// System prompt override for custom game styles.
    pub system_prompt: Option<String>,
}

impl Default for GmConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 2048,
            temperature: 0.8,
            max_tool_rounds: 8,
            system_prompt: None,
        }
    }
}

/// One completed game master turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GmResponse {
    pub narrative: String,
    /// True when the turn hit the tool round limit before the model
    /// produced a final narration.
    pub truncated: bool,
}

/// An incremental event surfaced during a streamed turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamedEvent {
    /// A fragment of narration, in order.
    Narration(String),
    /// A tool finished executing; surfaced before the next model call.
    ToolResult { name: String, content: String },
}

/// The game master: narrates the world and drives tools against the
/// session and campaign state.
pub struct GameMaster<P: ChatProvider> {
    provider: P,
    config: GmConfig,
    log: SessionLog,
    dice: DiceRoller,
    campaign: Option<CampaignManager>,
    tools: Vec<ToolSpec>,
}

impl<P: ChatProvider> GameMaster<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            config: GmConfig::default(),
            log: SessionLog::new(),
            dice: DiceRoller::new(),
            campaign: None,
            tools: tool_declarations(false),
        }
    }

    pub fn with_config(mut self, config: GmConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_session(mut self, log: SessionLog) -> Self {
        self.log = log;
        self
    }

    pub fn with_dice(mut self, dice: DiceRoller) -> Self {
        self.dice = dice;
        self
    }

    /// Attach campaign tracking. This also extends the advertised tool
    /// set with the campaign tools.
    pub fn with_campaign(mut self, campaign: CampaignManager) -> Self {
        self.campaign = Some(campaign);
        self.tools = tool_declarations(true);
        self
    }

    pub fn session(&self) -> &SessionLog {
        &self.log
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn campaign_manager(&self) -> Option<&CampaignManager> {
        self.campaign.as_ref()
    }

    /// Respond to a player message, buffered. Runs the full tool
    /// dispatch loop and returns the final narration.
    pub async fn respond(&mut self, player_input: &str) -> Result<GmResponse, GmError> {
        self.link_session();
        self.log
            .log_event(EventKind::PlayerAction, player_input, "Player", Value::Null);

        let mut messages = self.build_messages(player_input);
        let mut rounds = 0;
        let mut truncated = false;

        let request = self.build_request(&messages);
        let mut response = self.provider.chat(request).await?;

        while !response.tool_calls.is_empty() {
            rounds += 1;
            if rounds > self.config.max_tool_rounds {
                truncated = true;
                break;
            }

            messages.push(ChatMessage::assistant_tool_calls(
                response.content.clone(),
                response.tool_calls.clone(),
            ));
            for call in &response.tool_calls {
                let result = self.execute_tool(&call.name, &call.arguments).await?;
                messages.push(ChatMessage::tool(call.id.clone(), result));
            }

            let request = self.build_request(&messages);
            response = self.provider.chat(request).await?;
        }

        let narrative = response.content.unwrap_or_default();
        self.log_narration(&narrative);
        Ok(GmResponse {
            narrative,
            truncated,
        })
    }

    /// Respond to a player message, streamed. Narration fragments and
    /// tool results are handed to `on_event` as they happen; the
    /// returned response carries the final accumulated narration.
    pub async fn respond_stream<F>(
        &mut self,
        player_input: &str,
        mut on_event: F,
    ) -> Result<GmResponse, GmError>
    where
        F: FnMut(StreamedEvent),
    {
        self.link_session();
        self.log
            .log_event(EventKind::PlayerAction, player_input, "Player", Value::Null);

        let mut messages = self.build_messages(player_input);
        let mut rounds = 0;
        let mut truncated = false;

        let narrative = loop {
            let request = self.build_request(&messages);
            let mut stream = self.provider.chat_stream(request).await?;

            let mut content = String::new();
            let mut builders: BTreeMap<usize, ToolCallBuilder> = BTreeMap::new();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                if let Some(text) = chunk.content {
                    content.push_str(&text);
                    on_event(StreamedEvent::Narration(text));
                }
                for delta in chunk.tool_call_deltas {
                    let builder = builders.entry(delta.index).or_default();
                    if let Some(id) = delta.id {
                        builder.id = id;
                    }
                    if let Some(name) = delta.name {
                        builder.name = name;
                    }
                    if let Some(fragment) = delta.arguments_fragment {
                        builder.arguments.push_str(&fragment);
                    }
                }
                if chunk.finish_reason.is_some() {
                    break;
                }
            }
            drop(stream);

            if builders.is_empty() {
                break content;
            }

            rounds += 1;
            if rounds > self.config.max_tool_rounds {
                truncated = true;
                break content;
            }

            // Arguments text is only parsed now that the turn is
            // complete; partial JSON mid-stream is expected.
            let calls: Vec<(ToolCall, Option<String>)> =
                builders.into_values().map(ToolCallBuilder::finish).collect();

            messages.push(ChatMessage::assistant_tool_calls(
                if content.is_empty() {
                    None
                } else {
                    Some(content)
                },
                calls.iter().map(|(call, _)| call.clone()).collect(),
            ));

            for (call, decode_error) in calls {
                let result = match decode_error {
                    Some(message) => message,
                    None => self.execute_tool(&call.name, &call.arguments).await?,
                };
                on_event(StreamedEvent::ToolResult {
                    name: call.name.clone(),
                    content: result.clone(),
                });
                messages.push(ChatMessage::tool(call.id, result));
            }
        };

        self.log_narration(&narrative);
        Ok(GmResponse {
            narrative,
            truncated,
        })
    }

    async fn execute_tool(&mut self, name: &str, arguments: &Value) -> Result<String, GmError> {
        let invocation = ToolInvocation::parse(name, arguments);
        let mut ctx = ToolContext {
            log: &mut self.log,
            dice: &mut self.dice,
            campaign: self.campaign.as_mut(),
        };
        Ok(invocation.execute(&mut ctx).await?)
    }

    /// Link the current session into the campaign record. Repeated
    /// turns in the same session are recorded once.
    fn link_session(&mut self) {
        if let Some(ref mut campaign) = self.campaign {
            let session_id = self.log.session_id.clone();
            campaign.campaign_mut().add_session(session_id);
        }
    }

    fn log_narration(&mut self, narrative: &str) {
        if !narrative.is_empty() {
            self.log
                .log_event(EventKind::Narration, narrative, "DM", Value::Null);
        }
    }

    fn build_messages(&self, player_input: &str) -> Vec<ChatMessage> {
        let prompt = self
            .config
            .system_prompt
            .as_deref()
            .unwrap_or(SYSTEM_PROMPT);
        let mut messages = vec![ChatMessage::system(prompt)];

        if let Some(ref campaign) = self.campaign {
            let campaign_context = campaign.context_for_model();
            if !campaign_context.is_empty() {
                messages.push(ChatMessage::system(format!(
                    "Campaign Context:\n{campaign_context}"
                )));
            }
        }

        messages.push(ChatMessage::system(format!(
            "Session context:\n{}",
            self.log.context_for_model(2)
        )));
        messages.push(ChatMessage::user(player_input));
        messages
    }

    fn build_request(&self, messages: &[ChatMessage]) -> Request {
        let mut request = Request::new(messages.to_vec())
            .with_max_tokens(self.config.max_tokens)
            .with_temperature(self.config.temperature)
            .with_tools(self.tools.clone());
        if let Some(ref model) = self.config.model {
            request = request.with_model(model.clone());
        }
        request
    }
}

/// Accumulator for one streamed tool call, keyed by chunk index.
#[derive(Debug, Default)]
struct ToolCallBuilder {
    id: String,
    name: String,
    arguments: String,
}

impl ToolCallBuilder {
    /// Parse the accumulated arguments text. Undecodable arguments
    /// become a result string for the model rather than a turn failure.
    fn finish(self) -> (ToolCall, Option<String>) {
        let (arguments, decode_error) = if self.arguments.is_empty() {
            (json!({}), None)
        } else {
            match serde_json::from_str(&self.arguments) {
                Ok(value) => (value, None),
                Err(e) => (
                    json!({}),
                    Some(format!("Invalid tool arguments for {}: {e}", self.name)),
                ),
            }
        };
        (
            ToolCall {
                id: self.id,
                name: self.name,
                arguments,
            },
            decode_error,
        )
    }
}
