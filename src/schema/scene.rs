use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;
use thiserror::Error;

use super::line::{LanguageTag, LineCatalog};
use crate::core::ledger::RankId;
use crate::core::tween::Vec3;

#[derive(Debug, Error)]
pub enum StoryError {
    #[error("unknown scene: {0}")]
    UnknownScene(SceneId),
    #[error("story has no scenes")]
    Empty,
    #[error("story failed validation: {0:?}")]
    Invalid(Vec<StoryIssue>),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// Identifier of a scene node in the story graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneId(pub String);

/// Handle of a décor object the host renders (billboard, door, boat...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropId(pub String);

/// Handle of everything shown or hidden together while a scene is live.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RootId(pub String);

macro_rules! string_id {
    ($name:ident) => {
        impl $name {
            pub fn new(id: &str) -> Self {
                Self(id.to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(SceneId);
string_id!(PropId);
string_id!(RootId);

/// One of the two mutually exclusive branch directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChoiceSide {
    Left,
    Right,
}

impl ChoiceSide {
    /// Offset from a choice pair's base line: left = base, right = base + 1.
    pub fn offset(self) -> usize {
        match self {
            Self::Left => 0,
            Self::Right => 1,
        }
    }
}

/// Which ambience channel a destination leads into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AmbienceRoute {
    /// No ambience: previews stop, confirming releases the bus.
    #[default]
    Silence,
    Channel(usize),
}

/// Where a confirmed side leads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDestination {
    pub next: SceneId,
    #[serde(default)]
    pub ambience: AmbienceRoute,
    #[serde(default)]
    pub commit_ambience: bool,
    /// Switch the display language when this destination is taken.
    #[serde(default)]
    pub language: Option<LanguageTag>,
}

impl SceneDestination {
    pub fn to(next: &str) -> Self {
        Self {
            next: SceneId::new(next),
            ambience: AmbienceRoute::Silence,
            commit_ambience: false,
            language: None,
        }
    }

    pub fn with_ambience(mut self, channel: usize, commit: bool) -> Self {
        self.ambience = AmbienceRoute::Channel(channel);
        self.commit_ambience = commit;
        self
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.language = Some(LanguageTag::new(language));
        self
    }
}

/// Per-node mapping from confirmed side to destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingTable {
    pub left: SceneDestination,
    pub right: SceneDestination,
}

impl RoutingTable {
    /// Both sides lead to the same place (a scripted, linear beat).
    pub fn linear(destination: SceneDestination) -> Self {
        Self {
            left: destination.clone(),
            right: destination,
        }
    }

    pub fn get(&self, side: ChoiceSide) -> &SceneDestination {
        match side {
            ChoiceSide::Left => &self.left,
            ChoiceSide::Right => &self.right,
        }
    }
}

/// A 2x2 routing decision: the recorded random pick either falls in
/// `matching` or not, crossed with the side the visitor chooses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeMatrix {
    pub matching: Vec<u8>,
    pub matched: RoutingTable,
    pub unmatched: RoutingTable,
}

impl OutcomeMatrix {
    pub fn resolve(&self, pick: Option<u8>) -> &RoutingTable {
        match pick {
            Some(p) if self.matching.contains(&p) => &self.matched,
            _ => &self.unmatched,
        }
    }
}

/// Parameters of the perpetual drifting-prop loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriftParams {
    /// Units per second.
    pub velocity: Vec3,
    /// Maximum roll in degrees.
    #[serde(default = "default_roll_degrees")]
    pub roll_degrees: f32,
    /// Roll cycles per second.
    #[serde(default = "default_roll_hz")]
    pub roll_hz: f32,
    /// Seconds until the sway reaches full amplitude.
    #[serde(default = "default_roll_ease_in")]
    pub roll_ease_in_seconds: f32,
    /// Higher settles faster.
    #[serde(default = "default_roll_damping")]
    pub roll_damping: f32,
}

fn default_roll_degrees() -> f32 {
    4.0
}
fn default_roll_hz() -> f32 {
    0.2
}
fn default_roll_ease_in() -> f32 {
    2.0
}
fn default_roll_damping() -> f32 {
    0.35
}

/// One instruction of a scene's entry routine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Step {
    /// Set prop values instantly.
    Place {
        prop: PropId,
        #[serde(default)]
        position: Option<Vec3>,
        #[serde(default)]
        opacity: Option<f32>,
        #[serde(default)]
        scale: Option<Vec3>,
    },
    /// Background opacity tween (linear).
    Fade { prop: PropId, to: f32, seconds: f32 },
    /// Background position tween (eased).
    Move { prop: PropId, to: Vec3, seconds: f32 },
    /// Background scale tween (eased).
    Scale { prop: PropId, to: Vec3, seconds: f32 },
    /// Start a perpetual drift loop on a prop.
    Drift { prop: PropId, drift: DriftParams },
    /// Start a perpetual cross-fading slideshow over props.
    Carousel {
        props: Vec<PropId>,
        hold_seconds: f32,
        crossfade_seconds: f32,
    },
    /// Pick one of `options` images for a prop and record the pick.
    PickImage { prop: PropId, options: u8 },
    Wait { seconds: f32 },
    /// Wait the configured preroll so décor moves under the cover.
    Preroll,
    /// Wait until every non-looping task this routine started has finished.
    Join,
    /// Fade the screen cover away in the background.
    Reveal,
    /// Open the textbox and type a dialogue line in the background.
    Say { line: usize },
    /// Close the textbox.
    Hush,
    Route {
        left: SceneDestination,
        right: SceneDestination,
    },
    RouteByPick(OutcomeMatrix),
    /// Arm choice input using choice lines `2 * pair` and `2 * pair + 1`,
    /// then suspend until the choice is confirmed.
    EnableChoice { pair: usize },
    Record { rank: RankId },
    /// Route both sides to one destination and confirm immediately.
    Continue { to: SceneDestination },
}

/// One addressable beat: a visual root plus an entry routine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneNode {
    #[serde(default)]
    pub root: Option<RootId>,
    pub steps: Vec<Step>,
}

impl SceneNode {
    /// Every destination any step of this node can route to.
    pub fn destinations(&self) -> Vec<&SceneDestination> {
        let mut out = Vec::new();
        for step in &self.steps {
            match step {
                Step::Route { left, right } => {
                    out.push(left);
                    out.push(right);
                }
                Step::RouteByPick(matrix) => {
                    out.extend([
                        &matrix.matched.left,
                        &matrix.matched.right,
                        &matrix.unmatched.left,
                        &matrix.unmatched.right,
                    ]);
                }
                Step::Continue { to } => out.push(to),
                _ => {}
            }
        }
        out
    }

    /// Whether the routine arms a branch or advances by itself.
    pub fn has_exit(&self) -> bool {
        self.steps
            .iter()
            .any(|s| matches!(s, Step::EnableChoice { .. } | Step::Continue { .. }))
    }
}

/// A problem found while linting a story against its catalogs.
#[derive(Debug, Clone, PartialEq)]
pub enum StoryIssue {
    MissingScene(SceneId),
    DanglingRoute { scene: SceneId, target: SceneId },
    LineOutOfRange { scene: SceneId, line: usize, len: usize },
    ChoicePairOutOfRange { scene: SceneId, pair: usize, len: usize },
    ChannelOutOfRange { scene: SceneId, channel: usize, channels: usize },
    NoExit(SceneId),
    Unreachable(SceneId),
}

impl StoryIssue {
    /// Fatal issues make a story unusable; the rest are authoring warnings.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::MissingScene(_) | Self::DanglingRoute { .. })
    }
}

impl std::fmt::Display for StoryIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingScene(id) => write!(f, "scene '{}' is referenced but not defined", id),
            Self::DanglingRoute { scene, target } => {
                write!(f, "scene '{}' routes to unknown scene '{}'", scene, target)
            }
            Self::LineOutOfRange { scene, line, len } => write!(
                f,
                "scene '{}' says line {} but the dialogue catalog has {} lines",
                scene, line, len
            ),
            Self::ChoicePairOutOfRange { scene, pair, len } => write!(
                f,
                "scene '{}' arms choice pair {} but the choice catalog has {} lines",
                scene, pair, len
            ),
            Self::ChannelOutOfRange {
                scene,
                channel,
                channels,
            } => write!(
                f,
                "scene '{}' routes ambience to channel {} but only {} exist",
                scene, channel, channels
            ),
            Self::NoExit(id) => write!(f, "scene '{}' never arms a choice or continues", id),
            Self::Unreachable(id) => write!(f, "scene '{}' is unreachable from the entry", id),
        }
    }
}

/// The authored story: scene nodes keyed by id plus the two special nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryGraph {
    /// Safe resting node the idle watchdog returns to.
    pub title: SceneId,
    /// Node activated at startup.
    pub entry: SceneId,
    pub nodes: FxHashMap<SceneId, SceneNode>,
}

impl StoryGraph {
    /// Load a story from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<StoryGraph, StoryError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse a story from a RON string.
    pub fn parse_ron(input: &str) -> Result<StoryGraph, StoryError> {
        let story: StoryGraph = ron::from_str(input)?;
        if story.nodes.is_empty() {
            return Err(StoryError::Empty);
        }
        Ok(story)
    }

    pub fn node(&self, id: &SceneId) -> Result<&SceneNode, StoryError> {
        self.nodes
            .get(id)
            .ok_or_else(|| StoryError::UnknownScene(id.clone()))
    }

    /// Merge another story's nodes into this one. Nodes from `other`
    /// override nodes with the same id; title and entry stay.
    pub fn merge(&mut self, other: StoryGraph) {
        for (id, node) in other.nodes {
            self.nodes.insert(id, node);
        }
    }

    /// Check structure only (no catalogs): special nodes exist and every
    /// route points at a defined node.
    pub fn validate(&self) -> Result<(), StoryError> {
        let fatal: Vec<StoryIssue> = self
            .structural_issues()
            .into_iter()
            .filter(StoryIssue::is_fatal)
            .collect();
        if fatal.is_empty() {
            Ok(())
        } else {
            Err(StoryError::Invalid(fatal))
        }
    }

    fn structural_issues(&self) -> Vec<StoryIssue> {
        let mut issues = Vec::new();
        for special in [&self.title, &self.entry] {
            if !self.nodes.contains_key(special) {
                issues.push(StoryIssue::MissingScene(special.clone()));
            }
        }

        let mut ids: Vec<&SceneId> = self.nodes.keys().collect();
        ids.sort();
        for id in ids {
            let node = &self.nodes[id];
            for dest in node.destinations() {
                if !self.nodes.contains_key(&dest.next) {
                    issues.push(StoryIssue::DanglingRoute {
                        scene: id.clone(),
                        target: dest.next.clone(),
                    });
                }
            }
            if !node.has_exit() {
                issues.push(StoryIssue::NoExit(id.clone()));
            }
        }
        issues
    }

    /// Full authoring lint against the catalogs and channel count.
    pub fn lint(
        &self,
        dialogue: &LineCatalog,
        choices: &LineCatalog,
        channels: usize,
    ) -> Vec<StoryIssue> {
        let mut issues = self.structural_issues();

        let mut ids: Vec<&SceneId> = self.nodes.keys().collect();
        ids.sort();
        for id in ids {
            let node = &self.nodes[id];
            for step in &node.steps {
                match step {
                    Step::Say { line } if *line >= dialogue.len() => {
                        issues.push(StoryIssue::LineOutOfRange {
                            scene: id.clone(),
                            line: *line,
                            len: dialogue.len(),
                        });
                    }
                    Step::EnableChoice { pair } if pair * 2 + 1 >= choices.len() => {
                        issues.push(StoryIssue::ChoicePairOutOfRange {
                            scene: id.clone(),
                            pair: *pair,
                            len: choices.len(),
                        });
                    }
                    _ => {}
                }
            }
            for dest in node.destinations() {
                if let AmbienceRoute::Channel(channel) = dest.ambience {
                    if channel >= channels {
                        issues.push(StoryIssue::ChannelOutOfRange {
                            scene: id.clone(),
                            channel,
                            channels,
                        });
                    }
                }
            }
        }

        let reachable = self.reachable();
        let mut unreachable: Vec<&SceneId> = self
            .nodes
            .keys()
            .filter(|id| !reachable.contains(*id))
            .collect();
        unreachable.sort();
        for id in unreachable {
            issues.push(StoryIssue::Unreachable(id.clone()));
        }

        issues
    }

    /// Scenes reachable from the entry or the title.
    pub fn reachable(&self) -> FxHashSet<SceneId> {
        let mut seen = FxHashSet::default();
        let mut queue = VecDeque::new();
        queue.push_back(self.entry.clone());
        queue.push_back(self.title.clone());
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id.clone()) {
                continue;
            }
            if let Some(node) = self.nodes.get(&id) {
                for dest in node.destinations() {
                    if !seen.contains(&dest.next) {
                        queue.push_back(dest.next.clone());
                    }
                }
            }
        }
        seen
    }

    /// Every prop any routine touches, for wiring a default stage.
    pub fn props(&self) -> FxHashSet<PropId> {
        let mut props = FxHashSet::default();
        for node in self.nodes.values() {
            for step in &node.steps {
                match step {
                    Step::Place { prop, .. }
                    | Step::Fade { prop, .. }
                    | Step::Move { prop, .. }
                    | Step::Scale { prop, .. }
                    | Step::Drift { prop, .. }
                    | Step::PickImage { prop, .. } => {
                        props.insert(prop.clone());
                    }
                    Step::Carousel { props: list, .. } => {
                        props.extend(list.iter().cloned());
                    }
                    _ => {}
                }
            }
        }
        props
    }

    /// Every visual root any node declares.
    pub fn roots(&self) -> FxHashSet<RootId> {
        self.nodes
            .values()
            .filter_map(|node| node.root.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STORY: &str = r#"(
        title: "title",
        entry: "title",
        nodes: {
            "title": (
                root: Some("title_root"),
                steps: [
                    Reveal,
                    Route(left: (next: "fork"), right: (next: "fork")),
                    EnableChoice(pair: 0),
                ],
            ),
            "fork": (
                steps: [
                    Place(prop: "door_l", position: Some((x: -2.0, y: 0.0, z: 5.0)), opacity: Some(0.0)),
                    Fade(prop: "door_l", to: 1.0, seconds: 3.0),
                    Say(line: 0),
                    Route(
                        left: (next: "title", ambience: Channel(0), commit_ambience: true),
                        right: (next: "title", language: Some("de")),
                    ),
                    EnableChoice(pair: 1),
                ],
            ),
        },
    )"#;

    fn catalog(lines: usize) -> LineCatalog {
        let mut src = String::from("(languages: [\"en\"], lines: [");
        for i in 0..lines {
            src.push_str(&format!("(text: {{\"en\": \"line {}\"}}, font_size: 20.0),", i));
        }
        src.push_str("])");
        LineCatalog::parse_ron(&src).unwrap()
    }

    #[test]
    fn parse_story() {
        let story = StoryGraph::parse_ron(STORY).unwrap();
        assert_eq!(story.nodes.len(), 2);
        assert_eq!(story.title, SceneId::new("title"));
        let fork = story.node(&SceneId::new("fork")).unwrap();
        assert_eq!(fork.steps.len(), 5);
        assert!(matches!(&fork.steps[0], Step::Place { opacity: Some(o), .. } if *o == 0.0));
    }

    #[test]
    fn destination_defaults() {
        let story = StoryGraph::parse_ron(STORY).unwrap();
        let fork = story.node(&SceneId::new("fork")).unwrap();
        let dests = fork.destinations();
        assert_eq!(dests[0].ambience, AmbienceRoute::Channel(0));
        assert!(dests[0].commit_ambience);
        assert_eq!(dests[1].ambience, AmbienceRoute::Silence);
        assert_eq!(dests[1].language, Some(LanguageTag::new("de")));
    }

    #[test]
    fn validate_accepts_closed_graph() {
        let story = StoryGraph::parse_ron(STORY).unwrap();
        assert!(story.validate().is_ok());
    }

    #[test]
    fn validate_rejects_dangling_route() {
        let mut story = StoryGraph::parse_ron(STORY).unwrap();
        story.nodes.insert(
            SceneId::new("broken"),
            SceneNode {
                root: None,
                steps: vec![Step::Continue {
                    to: SceneDestination::to("nowhere"),
                }],
            },
        );
        let err = story.validate().unwrap_err();
        assert!(matches!(
            err,
            StoryError::Invalid(ref issues) if issues.iter().any(|i| matches!(i, StoryIssue::DanglingRoute { target, .. } if target.as_str() == "nowhere"))
        ));
    }

    #[test]
    fn lint_reports_catalog_faults() {
        let story = StoryGraph::parse_ron(STORY).unwrap();
        let issues = story.lint(&catalog(0), &catalog(2), 1);
        assert!(issues.contains(&StoryIssue::LineOutOfRange {
            scene: SceneId::new("fork"),
            line: 0,
            len: 0,
        }));
        assert!(issues.contains(&StoryIssue::ChoicePairOutOfRange {
            scene: SceneId::new("fork"),
            pair: 1,
            len: 2,
        }));
        assert!(issues.iter().all(|i| !i.is_fatal()));
    }

    #[test]
    fn lint_clean_with_full_catalogs() {
        let story = StoryGraph::parse_ron(STORY).unwrap();
        let issues = story.lint(&catalog(1), &catalog(4), 2);
        assert!(issues.is_empty(), "unexpected issues: {:?}", issues);
    }

    #[test]
    fn outcome_matrix_resolves_pick() {
        let matrix = OutcomeMatrix {
            matching: vec![0, 1, 2, 3],
            matched: RoutingTable::linear(SceneDestination::to("a")),
            unmatched: RoutingTable::linear(SceneDestination::to("b")),
        };
        assert_eq!(matrix.resolve(Some(2)).left.next.as_str(), "a");
        assert_eq!(matrix.resolve(Some(6)).left.next.as_str(), "b");
        assert_eq!(matrix.resolve(None).right.next.as_str(), "b");
    }

    #[test]
    fn merge_overrides_nodes() {
        let mut base = StoryGraph::parse_ron(STORY).unwrap();
        let mut patch = StoryGraph::parse_ron(STORY).unwrap();
        patch.nodes.get_mut(&SceneId::new("fork")).unwrap().steps.clear();
        base.merge(patch);
        assert!(base.node(&SceneId::new("fork")).unwrap().steps.is_empty());
    }

    #[test]
    fn props_and_roots_collected() {
        let story = StoryGraph::parse_ron(STORY).unwrap();
        assert!(story.props().contains(&PropId::new("door_l")));
        assert!(story.roots().contains(&RootId::new("title_root")));
    }
}
