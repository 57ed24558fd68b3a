/// Content tests: the shipped GAIA story and its catalogs, plus the
/// fixture catalogs' fallback behaviour.

use narrative_flow::core::config::DirectorConfig;
use narrative_flow::core::director::Director;
use narrative_flow::core::ledger::RankId;
use narrative_flow::schema::cue::Cue;
use narrative_flow::schema::input::{FrameInput, HoverEdge};
use narrative_flow::schema::line::{CatalogError, LanguageTag, LineCatalog};
use narrative_flow::schema::scene::{ChoiceSide, PropId, StoryGraph};
use std::path::Path;

const GAIA: &str = "story_data/gaia";

fn load_gaia() -> (StoryGraph, LineCatalog, LineCatalog, DirectorConfig) {
    let dir = Path::new(GAIA);
    let story = StoryGraph::load_from_ron(&dir.join("story.ron")).unwrap();
    let dialogue = LineCatalog::load_from_ron(&dir.join("dialogue.ron")).unwrap();
    let choices = LineCatalog::load_from_ron(&dir.join("choices.ron")).unwrap();
    let config = DirectorConfig::load_from_ron(&dir.join("config.ron")).unwrap();
    (story, dialogue, choices, config)
}

#[test]
fn gaia_story_lints_clean() {
    let (story, dialogue, choices, config) = load_gaia();
    let issues = story.lint(&dialogue, &choices, config.ambience.channels);
    let rendered: Vec<String> = issues.iter().map(|i| i.to_string()).collect();
    assert!(issues.is_empty(), "lint issues: {:#?}", rendered);
    assert!(story.validate().is_ok());
}

#[test]
fn gaia_catalogs_cover_every_language() {
    let (_, dialogue, choices, _) = load_gaia();
    assert_eq!(dialogue.languages.len(), 2);
    assert!(dialogue.missing_variants().is_empty());
    assert!(choices.missing_variants().is_empty());
    // choice lines come in left/right pairs
    assert_eq!(choices.len() % 2, 0);
}

#[test]
fn gaia_config_overrides_defaults() {
    let (_, _, _, config) = load_gaia();
    assert_eq!(config.choice.hold_seconds, 1.25);
    assert_eq!(config.watchdog.idle_timeout_seconds, 30.0);
    assert_eq!(config.default_language, LanguageTag::new("en"));
    // left out of the file, so still the built-in value
    assert_eq!(config.cover, DirectorConfig::default().cover);
}

#[test]
fn fixture_choice_falls_back_to_first_language() {
    let choices = LineCatalog::load_from_ron(Path::new("tests/fixtures/choices.ron")).unwrap();
    let de = LanguageTag::new("de");
    assert_eq!(choices.localized(3, &de).unwrap(), ("Harbor", 20.0));
    assert_eq!(choices.localized(2, &de).unwrap().0, "Wiese");
    assert_eq!(choices.missing_variants(), vec![(3, de)]);
}

#[test]
fn out_of_range_line_is_an_error() {
    let dialogue = LineCatalog::load_from_ron(Path::new("tests/fixtures/dialogue.ron")).unwrap();
    let err = dialogue.localized(99, &LanguageTag::new("en")).unwrap_err();
    assert!(matches!(err, CatalogError::OutOfRange { index: 99, len: 2 }));
}

#[test]
fn title_carousel_cross_fades_backgrounds() {
    let mut director = Director::builder().story_dir(GAIA).seed(11).build().unwrap();
    director.start().unwrap();

    let backgrounds: Vec<PropId> = (0..4).map(|i| PropId::new(&format!("title_bg_{}", i))).collect();
    let mut shown = Vec::new();
    for _ in 0..40 {
        director.tick(0.25, &FrameInput::absent()).unwrap();
        let opacities: Vec<f32> = backgrounds
            .iter()
            .map(|id| director.stage().prop(id).unwrap().opacity)
            .collect();
        let total: f32 = opacities.iter().sum();
        assert!((total - 1.0).abs() < 1e-4, "opacities {:?}", opacities);
        if let Some(full) = opacities.iter().position(|o| *o == 1.0) {
            if shown.last() != Some(&full) {
                shown.push(full);
            }
        }
    }
    // 7.5 s hold plus a 1.25 s crossfade fits in ten seconds
    assert!(shown.len() >= 2, "only showed {:?}", shown);
    assert_eq!(director.current_scene().unwrap().as_str(), "title");
}

/// A visitor who walks into the left zone and stays there rides the whole
/// story on its left branches and ends up back at the title.
#[test]
fn gaia_left_branch_playthrough() {
    let mut director = Director::builder().story_dir(GAIA).build().unwrap();
    director.start().unwrap();

    let mut visited = vec![director.current_scene().unwrap().as_str().to_string()];
    let mut recorded = Vec::new();
    let enter = FrameInput::present().with_hover(HoverEdge::enter(ChoiceSide::Left));
    director.tick(0.25, &enter).unwrap();

    for _ in 0..4000 {
        director.tick(0.25, &FrameInput::present()).unwrap();
        for cue in director.drain_cues() {
            if let Cue::OutcomeRecorded(stats) = cue {
                recorded.push(stats.rank);
            }
        }
        let scene = director.current_scene().unwrap().as_str();
        if visited.last().map(String::as_str) != Some(scene) {
            visited.push(scene.to_string());
        }
        if visited.len() > 1 && scene == "title" {
            break;
        }
    }

    assert_eq!(
        &visited[..6],
        &[
            "title",
            "language_select",
            "intro",
            "checkup_ai",
            "demonstration",
            "purity_test",
        ]
    );
    assert_eq!(visited.last().map(String::as_str), Some("title"));
    assert_eq!(visited.len(), 8);

    let ending = visited[6].as_str();
    let expected = match ending {
        "ending_boat" => RankId::Visionary,
        "ending_garden" => RankId::Humanist,
        other => panic!("left branch ended in {}", other),
    };
    assert_eq!(recorded, vec![expected]);
    assert_eq!(director.language().as_str(), "en");
}
