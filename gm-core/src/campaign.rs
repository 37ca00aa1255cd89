//! Campaign tracking across sessions.
//!
//! A campaign carries the persistent world state the game master builds
//! up over many sessions: notable NPCs, visited locations, and plot
//! threads. The manager persists it as plain JSON under a data
//! directory; durability beyond overwrite-on-save is out of scope.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Errors from campaign persistence.
#[derive(Debug, Error)]
pub enum CampaignError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Campaign file not found: {0}")]
    NotFound(PathBuf),
}

/// Status of a plot thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlotStatus {
    Active,
    Completed,
    Abandoned,
    OnHold,
}

impl PlotStatus {
    /// Parse a status name as it appears in tool arguments.
    pub fn from_name(name: &str) -> Option<PlotStatus> {
        match name {
            "active" => Some(PlotStatus::Active),
            "completed" => Some(PlotStatus::Completed),
            "abandoned" => Some(PlotStatus::Abandoned),
            "on_hold" => Some(PlotStatus::OnHold),
            _ => None,
        }
    }
}

/// An update to a plot thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotUpdate {
    pub session_id: String,
    pub description: String,
}

/// A plot thread or story arc within the campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotThread {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: PlotStatus,
    #[serde(default)]
    pub related_npcs: Vec<String>,
    #[serde(default)]
    pub related_locations: Vec<String>,
    pub created_in_session: String,
    #[serde(default)]
    pub updates: Vec<PlotUpdate>,
}

impl PlotThread {
    pub fn add_update(&mut self, session_id: impl Into<String>, description: impl Into<String>) {
        self.updates.push(PlotUpdate {
            session_id: session_id.into(),
            description: description.into(),
        });
    }
}

/// Profile for a persistent NPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpcProfile {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub role: Option<String>,
    /// What this NPC knows; NPCs have limited knowledge, tracked per NPC.
    #[serde(default)]
    pub knowledge: Vec<String>,
    /// Other character name to relationship description.
    #[serde(default)]
    pub relationships: HashMap<String, String>,
    #[serde(default)]
    pub last_seen_location: Option<String>,
    #[serde(default)]
    pub last_seen_session: Option<String>,
    #[serde(default)]
    pub first_appeared_session: Option<String>,
}

impl NpcProfile {
    pub fn add_knowledge(&mut self, item: impl Into<String>) {
        let item = item.into();
        if !self.knowledge.contains(&item) {
            self.knowledge.push(item);
        }
    }

    /// Set or update the relationship with another character.
    pub fn set_relationship(
        &mut self,
        target_name: impl Into<String>,
        relationship: impl Into<String>,
    ) {
        self.relationships
            .insert(target_name.into(), relationship.into());
    }
}

/// A location in the campaign world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignLocation {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub notable_events: Vec<String>,
    /// Names of NPCs currently here.
    #[serde(default)]
    pub npcs_present: Vec<String>,
    #[serde(default)]
    pub first_visited_session: Option<String>,
    #[serde(default)]
    pub last_visited_session: Option<String>,
}

impl CampaignLocation {
    pub fn add_event(&mut self, description: impl Into<String>) {
        self.notable_events.push(description.into());
    }

    pub fn add_npc(&mut self, npc_name: impl Into<String>) {
        let npc_name = npc_name.into();
        if !self.npcs_present.contains(&npc_name) {
            self.npcs_present.push(npc_name);
        }
    }

    /// Returns false when the NPC was not here.
    pub fn remove_npc(&mut self, npc_name: &str) -> bool {
        match self.npcs_present.iter().position(|n| n == npc_name) {
            Some(index) => {
                self.npcs_present.remove(index);
                true
            }
            None => false,
        }
    }
}

/// Persistent world state spanning multiple sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub campaign_id: String,
    pub name: String,
    pub setting: String,
    #[serde(default)]
    pub overarching_goal: Option<String>,
    #[serde(default)]
    pub npcs: Vec<NpcProfile>,
    #[serde(default)]
    pub locations: Vec<CampaignLocation>,
    #[serde(default)]
    pub plot_threads: Vec<PlotThread>,
    /// Chronological session ids.
    #[serde(default)]
    pub sessions: Vec<String>,
    #[serde(default)]
    pub metadata: Value,
}

impl Campaign {
    pub fn new(
        campaign_id: impl Into<String>,
        name: impl Into<String>,
        setting: impl Into<String>,
    ) -> Self {
        Self {
            campaign_id: campaign_id.into(),
            name: name.into(),
            setting: setting.into(),
            overarching_goal: None,
            npcs: Vec::new(),
            locations: Vec::new(),
            plot_threads: Vec::new(),
            sessions: Vec::new(),
            metadata: Value::Null,
        }
    }

    pub fn get_npc_mut(&mut self, name: &str) -> Option<&mut NpcProfile> {
        self.npcs.iter_mut().find(|n| n.name == name)
    }

    pub fn add_npc(&mut self, npc: NpcProfile) {
        self.npcs.push(npc);
    }

    pub fn get_location_mut(&mut self, name: &str) -> Option<&mut CampaignLocation> {
        self.locations.iter_mut().find(|l| l.name == name)
    }

    pub fn add_location(&mut self, location: CampaignLocation) {
        self.locations.push(location);
    }

    pub fn add_plot_thread(&mut self, thread: PlotThread) {
        self.plot_threads.push(thread);
    }

    pub fn plot_thread_by_title_mut(&mut self, title: &str) -> Option<&mut PlotThread> {
        self.plot_threads.iter_mut().find(|pt| pt.title == title)
    }

    pub fn plot_threads_by_status(&self, status: PlotStatus) -> Vec<&PlotThread> {
        self.plot_threads
            .iter()
            .filter(|pt| pt.status == status)
            .collect()
    }

    /// Next sequential plot thread id (`plot_001`, `plot_002`, ...).
    pub fn next_plot_id(&self) -> String {
        format!("plot_{:03}", self.plot_threads.len() + 1)
    }

    pub fn add_session(&mut self, session_id: impl Into<String>) {
        let session_id = session_id.into();
        if !self.sessions.contains(&session_id) {
            self.sessions.push(session_id);
        }
    }
}

/// At-a-glance counts for a campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignSummary {
    pub campaign_id: String,
    pub name: String,
    pub setting: String,
    pub overarching_goal: Option<String>,
    pub npc_count: usize,
    pub location_count: usize,
    pub active_plot_count: usize,
    pub completed_plot_count: usize,
    pub session_count: usize,
    pub sessions: Vec<String>,
}

/// Manages campaign persistence and context assembly.
#[derive(Debug)]
pub struct CampaignManager {
    campaigns_dir: PathBuf,
    campaign: Campaign,
}

impl CampaignManager {
    /// Create a manager for a new campaign rooted at `data_dir`.
    pub fn create(
        data_dir: impl AsRef<Path>,
        campaign_id: impl Into<String>,
        name: impl Into<String>,
        setting: impl Into<String>,
    ) -> Self {
        Self {
            campaigns_dir: data_dir.as_ref().join("campaigns"),
            campaign: Campaign::new(campaign_id, name, setting),
        }
    }

    /// Load an existing campaign from disk.
    pub async fn load(
        data_dir: impl AsRef<Path>,
        campaign_id: &str,
    ) -> Result<Self, CampaignError> {
        let campaigns_dir = data_dir.as_ref().join("campaigns");
        let path = campaigns_dir.join(format!("{campaign_id}.json"));
        if !path.exists() {
            return Err(CampaignError::NotFound(path));
        }

        let content = fs::read_to_string(&path).await?;
        let campaign: Campaign = serde_json::from_str(&content)?;
        Ok(Self {
            campaigns_dir,
            campaign,
        })
    }

    /// Save the campaign to disk, overwriting any previous save.
    pub async fn save(&self) -> Result<(), CampaignError> {
        fs::create_dir_all(&self.campaigns_dir).await?;
        let path = self
            .campaigns_dir
            .join(format!("{}.json", self.campaign.campaign_id));
        let content = serde_json::to_string_pretty(&self.campaign)?;
        fs::write(path, content).await?;
        Ok(())
    }

    pub fn campaign(&self) -> &Campaign {
        &self.campaign
    }

    pub fn campaign_mut(&mut self) -> &mut Campaign {
        &mut self.campaign
    }

    /// Summarize the campaign: counts of NPCs, locations, plots by
    /// status, and linked sessions.
    pub fn summary(&self) -> CampaignSummary {
        let campaign = &self.campaign;
        CampaignSummary {
            campaign_id: campaign.campaign_id.clone(),
            name: campaign.name.clone(),
            setting: campaign.setting.clone(),
            overarching_goal: campaign.overarching_goal.clone(),
            npc_count: campaign.npcs.len(),
            location_count: campaign.locations.len(),
            active_plot_count: campaign.plot_threads_by_status(PlotStatus::Active).len(),
            completed_plot_count: campaign
                .plot_threads_by_status(PlotStatus::Completed)
                .len(),
            session_count: campaign.sessions.len(),
            sessions: campaign.sessions.clone(),
        }
    }

    /// Build the bounded campaign context block for the model: active
    /// plots with their latest developments, then known NPCs and
    /// locations, most recent first.
    pub fn context_for_model(&self) -> String {
        let campaign = &self.campaign;
        let mut context = String::new();

        context.push_str(&format!("Campaign: {}\n", campaign.name));
        context.push_str(&format!("Setting: {}\n", campaign.setting));
        if let Some(ref goal) = campaign.overarching_goal {
            context.push_str(&format!("Overarching Goal: {goal}\n"));
        }

        let active = campaign.plot_threads_by_status(PlotStatus::Active);
        if !active.is_empty() {
            context.push_str("\nActive Plot Threads:\n");
            for plot in active {
                context.push_str(&format!("- {}: {}\n", plot.title, plot.description));
                if let Some(latest) = plot.updates.last() {
                    context.push_str(&format!("  Latest: {}\n", latest.description));
                }
            }
        }

        if !campaign.npcs.is_empty() {
            context.push_str("\nKnown NPCs:\n");
            let skip = campaign.npcs.len().saturating_sub(10);
            for npc in &campaign.npcs[skip..] {
                let role = npc.role.as_deref().unwrap_or("NPC");
                context.push_str(&format!("- {} ({}): {}\n", npc.name, role, npc.description));
                if !npc.knowledge.is_empty() {
                    let known: Vec<&str> =
                        npc.knowledge.iter().take(3).map(String::as_str).collect();
                    context.push_str(&format!("  Knows: {}\n", known.join(", ")));
                }
                if let Some(ref location) = npc.last_seen_location {
                    context.push_str(&format!("  Last seen: {location}\n"));
                }
            }
        }

        if !campaign.locations.is_empty() {
            context.push_str("\nKnown Locations:\n");
            let skip = campaign.locations.len().saturating_sub(8);
            for location in &campaign.locations[skip..] {
                let mut description = location.description.clone();
                if description.len() > 100 {
                    let mut end = 100;
                    while !description.is_char_boundary(end) {
                        end -= 1;
                    }
                    description.truncate(end);
                }
                context.push_str(&format!("- {}: {}\n", location.name, description));
                if let Some(event) = location.notable_events.last() {
                    context.push_str(&format!("  Events: {event}\n"));
                }
            }
        }

        context
    }
}
