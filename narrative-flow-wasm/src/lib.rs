//! WASM bindings for narrative-flow: runs the GAIA story in a browser,
//! with mouse zones standing in for the hover sensor.

use wasm_bindgen::prelude::*;

use narrative_flow::core::config::DirectorConfig;
use narrative_flow::core::director::Director;
use narrative_flow::core::stage::{Cover, Prop, Textbox};
use narrative_flow::core::tween::Vec2;
use narrative_flow::schema::cue::Cue;
use narrative_flow::schema::input::{FrameInput, GestureFlags, HoverEdge};
use narrative_flow::schema::line::LineCatalog;
use narrative_flow::schema::scene::{ChoiceSide, StoryGraph};

// ---------------------------------------------------------------------------
// Embedded story data, compiled into the WASM binary
// ---------------------------------------------------------------------------
mod data {
    pub const GAIA_STORY: &str = include_str!("../../story_data/gaia/story.ron");
    pub const GAIA_DIALOGUE: &str = include_str!("../../story_data/gaia/dialogue.ron");
    pub const GAIA_CHOICES: &str = include_str!("../../story_data/gaia/choices.ron");
    pub const GAIA_CONFIG: &str = include_str!("../../story_data/gaia/config.ron");
}

// ---------------------------------------------------------------------------
// JSON helper types for communication across the WASM boundary
// ---------------------------------------------------------------------------
#[derive(serde::Deserialize, Default)]
#[serde(default)]
struct FrameJson {
    enter: Option<String>,
    exit: Option<String>,
    left_raised: bool,
    right_raised: bool,
    present: bool,
    pick: Option<u8>,
}

#[derive(serde::Serialize)]
struct PreviewInfo {
    side: Option<String>,
    text: String,
    font_size: f32,
    scale: f32,
    position: Vec2,
    ring_visible: bool,
    ring_progress: f32,
    ring_position: Vec2,
}

#[derive(serde::Serialize)]
struct PropInfo {
    id: String,
    #[serde(flatten)]
    prop: Prop,
}

#[derive(serde::Serialize)]
struct Snapshot {
    scene: Option<String>,
    root: Option<String>,
    input_enabled: bool,
    hold_seconds: f32,
    preview: Option<PreviewInfo>,
    textbox: Textbox,
    cover: Cover,
    effect_strength: f32,
    volumes: Vec<f32>,
    language: String,
    props: Vec<PropInfo>,
}

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------
fn parse_side(s: &str) -> Option<ChoiceSide> {
    match s.to_lowercase().as_str() {
        "left" => Some(ChoiceSide::Left),
        "right" => Some(ChoiceSide::Right),
        _ => None,
    }
}

fn side_label(side: ChoiceSide) -> &'static str {
    match side {
        ChoiceSide::Left => "left",
        ChoiceSide::Right => "right",
    }
}

impl FrameJson {
    fn into_input(self) -> FrameInput {
        let mut hover = Vec::new();
        if let Some(side) = self.exit.as_deref().and_then(parse_side) {
            hover.push(HoverEdge::exit(side));
        }
        if let Some(side) = self.enter.as_deref().and_then(parse_side) {
            hover.push(HoverEdge::enter(side));
        }
        FrameInput {
            hover,
            gesture: GestureFlags {
                left_raised: self.left_raised,
                right_raised: self.right_raised,
            },
            user_present: self.present,
            random_pick: self.pick,
        }
    }
}

fn build_director(seed: u64) -> Result<Director, JsError> {
    let story = StoryGraph::parse_ron(data::GAIA_STORY)
        .map_err(|e| JsError::new(&format!("Story parse error: {e}")))?;
    let dialogue = LineCatalog::parse_ron(data::GAIA_DIALOGUE)
        .map_err(|e| JsError::new(&format!("Dialogue parse error: {e}")))?;
    let choices = LineCatalog::parse_ron(data::GAIA_CHOICES)
        .map_err(|e| JsError::new(&format!("Choice parse error: {e}")))?;
    let config = DirectorConfig::parse_ron(data::GAIA_CONFIG)
        .map_err(|e| JsError::new(&format!("Config parse error: {e}")))?;

    let mut director = Director::builder()
        .with_story(story)
        .with_dialogue(dialogue)
        .with_choices(choices)
        .with_config(config)
        .seed(seed)
        .build()
        .map_err(|e| JsError::new(&format!("Director build error: {e}")))?;
    director
        .start()
        .map_err(|e| JsError::new(&format!("Director start error: {e}")))?;
    Ok(director)
}

#[wasm_bindgen]
pub struct FlowDemo {
    director: Director,
}

#[wasm_bindgen]
impl FlowDemo {
    /// Create a demo running the embedded story from its title scene.
    #[wasm_bindgen(constructor)]
    pub fn new(seed: u64) -> Result<FlowDemo, JsError> {
        Ok(FlowDemo {
            director: build_director(seed)?,
        })
    }

    /// Advance one frame. Returns the cues produced as a JSON array.
    ///
    /// Expected JSON shape (every field optional):
    /// ```json
    /// {
    ///   "enter": "left",
    ///   "exit": "right",
    ///   "left_raised": false,
    ///   "right_raised": true,
    ///   "present": true,
    ///   "pick": 3
    /// }
    /// ```
    pub fn tick(&mut self, dt: f32, frame_json: &str) -> Result<String, JsError> {
        let frame: FrameJson = if frame_json.trim().is_empty() {
            FrameJson::default()
        } else {
            serde_json::from_str(frame_json)
                .map_err(|e| JsError::new(&format!("Invalid frame JSON: {e}")))?
        };
        self.director
            .tick(dt, &frame.into_input())
            .map_err(|e| JsError::new(&format!("Tick error: {e}")))?;
        self.drain_cues()
    }

    /// Confirm a side without holding. Returns false if nothing happened.
    pub fn confirm(&mut self, side: &str) -> Result<bool, JsError> {
        let side = parse_side(side).ok_or_else(|| JsError::new(&format!("Unknown side: {side}")))?;
        Ok(self.director.confirm_choice(side))
    }

    /// Return a JSON snapshot of everything a renderer needs to draw.
    pub fn snapshot(&self) -> Result<String, JsError> {
        let director = &self.director;
        let arbiter = director.arbiter();
        let preview = arbiter.preview();
        let preview = preview.is_visible().then(|| PreviewInfo {
            side: preview.side().map(|s| side_label(s).to_string()),
            text: preview.text().to_string(),
            font_size: preview.font_size(),
            scale: preview.scale(),
            position: preview.position(),
            ring_visible: preview.ring_visible(),
            ring_progress: preview.ring_progress(),
            ring_position: arbiter.ring_position(),
        });

        let mut props: Vec<PropInfo> = director
            .stage()
            .props()
            .map(|(id, prop)| PropInfo {
                id: id.as_str().to_string(),
                prop: *prop,
            })
            .collect();
        props.sort_by(|a, b| a.id.cmp(&b.id));

        let snapshot = Snapshot {
            scene: director.current_scene().map(|s| s.as_str().to_string()),
            root: director.stage().active_root().map(|r| r.as_str().to_string()),
            input_enabled: director.input_enabled(),
            hold_seconds: director
                .confirm_state()
                .map_or(0.0, |state| state.hold_elapsed),
            preview,
            textbox: director.stage().textbox().clone(),
            cover: director.stage().cover(),
            effect_strength: director.stage().effect_strength(),
            volumes: director.ambience().volumes(),
            language: director.language().as_str().to_string(),
            props,
        };
        serde_json::to_string(&snapshot)
            .map_err(|e| JsError::new(&format!("Serialization error: {e}")))
    }

    /// Hard reset back to the title scene.
    pub fn reset(&mut self) -> Result<String, JsError> {
        self.director.hard_reset();
        self.drain_cues()
    }
}

impl FlowDemo {
    fn drain_cues(&mut self) -> Result<String, JsError> {
        let cues: Vec<Cue> = self.director.drain_cues();
        serde_json::to_string(&cues)
            .map_err(|e| JsError::new(&format!("Serialization error: {e}")))
    }
}
