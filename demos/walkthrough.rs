/// Walkthrough demo: a scripted visitor plays the GAIA story end to end.
///
/// The first visitor answers every choice and reaches an ending. The second
/// one walks off halfway through, and the idle watchdog resets the
/// installation to the title.
///
/// Run with: cargo run --example walkthrough

use narrative_flow::core::director::Director;
use narrative_flow::schema::cue::Cue;
use narrative_flow::schema::input::{FrameInput, HoverEdge};
use narrative_flow::schema::scene::ChoiceSide;

const DT: f32 = 1.0 / 30.0;

/// Which zone the scripted visitor walks into in each scene.
const SCRIPT: &[(&str, ChoiceSide)] = &[
    ("title", ChoiceSide::Left),
    ("language_select", ChoiceSide::Right),
    ("intro", ChoiceSide::Right),
    ("demonstration", ChoiceSide::Right),
    ("purity_test", ChoiceSide::Left),
];

struct Visitor {
    hovering: Option<ChoiceSide>,
    /// Scene after which the visitor leaves the sensor for good.
    leaves_after: Option<&'static str>,
    gone: bool,
}

impl Visitor {
    /// Input for this frame: walk into the scripted zone once the scene
    /// arms its choice, step out of the old one first.
    fn frame(&mut self, director: &Director) -> FrameInput {
        if self.gone {
            let mut input = FrameInput::absent();
            if let Some(old) = self.hovering.take() {
                input.hover.push(HoverEdge::exit(old));
            }
            return input;
        }
        let mut input = FrameInput::present();
        let scene = director.current_scene().map(|s| s.as_str()).unwrap_or("");
        let wanted = SCRIPT
            .iter()
            .find(|(name, _)| *name == scene)
            .map(|(_, side)| *side);

        if director.input_enabled() && wanted.is_some() && self.hovering != wanted {
            if let Some(old) = self.hovering.take() {
                input.hover.push(HoverEdge::exit(old));
            }
            if let Some(side) = wanted {
                input.hover.push(HoverEdge::enter(side));
                self.hovering = Some(side);
            }
        }
        input
    }
}

fn run(director: &mut Director, visitor: &mut Visitor, max_seconds: f32) {
    let mut last_scene = String::new();
    let mut last_text = String::new();
    let mut elapsed = 0.0;

    while elapsed < max_seconds {
        let input = visitor.frame(director);
        director.tick(DT, &input).expect("tick failed");
        elapsed += DT;

        let textbox = director.stage().textbox();
        if textbox.visible && !textbox.text.is_empty() {
            last_text = textbox.text.clone();
        }

        for cue in director.drain_cues() {
            match cue {
                Cue::OutcomeRecorded(stats) => println!(
                    "    rank {:?}: {} of {} runs ({:.0}%)",
                    stats.rank, stats.total, stats.total_runs, stats.percent_total
                ),
                Cue::ImagePicked { prop, index } => println!("    {} shows image {}", prop, index),
                Cue::HardReset => println!("    [idle] nobody there, resetting"),
                _ => {}
            }
        }

        let scene = director.current_scene().map(|s| s.to_string()).unwrap_or_default();
        if scene != last_scene {
            if !last_text.is_empty() {
                println!("    \"{}\"", last_text);
                last_text.clear();
            }
            println!("[{:6.2}s] {} ({})", elapsed, scene, director.language());
            if Some(last_scene.as_str()) == visitor.leaves_after {
                println!("    the visitor walks away");
                visitor.gone = true;
            }
            if scene == "title" && !last_scene.is_empty() {
                return;
            }
            last_scene = scene;
        }
    }
}

fn main() {
    let mut director = Director::builder()
        .story_dir("story_data/gaia")
        .seed(2026)
        .build()
        .expect("Failed to build director");
    director.start().expect("Failed to start director");
    director.drain_cues();

    println!("=== Visitor 1: plays to the end ===\n");
    let mut first = Visitor {
        hovering: None,
        leaves_after: None,
        gone: false,
    };
    run(&mut director, &mut first, 600.0);

    println!("\n=== Visitor 2: leaves halfway ===\n");
    let mut second = Visitor {
        hovering: None,
        leaves_after: Some("intro"),
        gone: false,
    };
    run(&mut director, &mut second, 600.0);
}
