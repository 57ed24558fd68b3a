/// Story Linter: checks a story directory against its catalogs and config.
///
/// Usage: story_linter <story_dir> [--strict]
///
/// Exits non-zero on errors, or on warnings too with `--strict`.

use narrative_flow::core::config::DirectorConfig;
use narrative_flow::schema::line::LineCatalog;
use narrative_flow::schema::scene::StoryGraph;
use std::path::Path;
use std::process;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: story_linter <story_dir> [--strict]");
        process::exit(0);
    }

    let story_dir = Path::new(&args[1]);
    let strict = args[2..].iter().any(|a| a == "--strict");

    if !story_dir.is_dir() {
        eprintln!("ERROR: '{}' is not a directory", story_dir.display());
        process::exit(1);
    }

    let story = match StoryGraph::load_from_ron(&story_dir.join("story.ron")) {
        Ok(story) => story,
        Err(e) => {
            eprintln!("ERROR: Failed to load story.ron: {}", e);
            process::exit(1);
        }
    };
    let dialogue = load_catalog(story_dir, "dialogue.ron");
    let choices = load_catalog(story_dir, "choices.ron");

    let config_path = story_dir.join("config.ron");
    let config = if config_path.exists() {
        match DirectorConfig::load_from_ron(&config_path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("ERROR: Failed to load config.ron: {}", e);
                process::exit(1);
            }
        }
    } else {
        println!("No config.ron, using defaults");
        DirectorConfig::default()
    };

    println!(
        "Loaded {} scenes, {} dialogue lines, {} choice lines",
        story.nodes.len(),
        dialogue.len(),
        choices.len()
    );

    let (errors, warnings) = lint_story(&story, &dialogue, &choices, &config);

    println!("\n=== Story Lint Report ===\n");

    if errors.is_empty() && warnings.is_empty() {
        println!("All checks passed!");
    }

    for warning in &warnings {
        println!("WARNING: {}", warning);
    }

    for error in &errors {
        println!("ERROR: {}", error);
    }

    println!(
        "\nSummary: {} errors, {} warnings",
        errors.len(),
        warnings.len()
    );

    if errors.is_empty() && (!strict || warnings.is_empty()) {
        process::exit(0);
    } else {
        process::exit(1);
    }
}

fn load_catalog(dir: &Path, file: &str) -> LineCatalog {
    let path = dir.join(file);
    match LineCatalog::load_from_ron(&path) {
        Ok(catalog) => {
            println!("  Loaded: {}", path.display());
            catalog
        }
        Err(e) => {
            eprintln!("ERROR: Failed to load {}: {}", path.display(), e);
            process::exit(1);
        }
    }
}

fn lint_story(
    story: &StoryGraph,
    dialogue: &LineCatalog,
    choices: &LineCatalog,
    config: &DirectorConfig,
) -> (Vec<String>, Vec<String>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for issue in story.lint(dialogue, choices, config.ambience.channels) {
        if issue.is_fatal() {
            errors.push(issue.to_string());
        } else {
            warnings.push(issue.to_string());
        }
    }

    if let Err(e) = config.validate() {
        errors.push(format!("config: {}", e));
    }

    if choices.len() % 2 != 0 {
        warnings.push(format!(
            "choice catalog has {} lines; the last one has no partner",
            choices.len()
        ));
    }

    for (name, catalog) in [("dialogue", dialogue), ("choices", choices)] {
        if catalog.languages.is_empty() {
            warnings.push(format!("{} catalog declares no languages", name));
        }
        if !catalog.languages.contains(&config.default_language) {
            warnings.push(format!(
                "{} catalog does not declare the default language '{}'",
                name, config.default_language
            ));
        }
        for (index, language) in catalog.missing_variants() {
            warnings.push(format!(
                "{} line {} has no '{}' variant",
                name, index, language
            ));
        }
    }

    (errors, warnings)
}
