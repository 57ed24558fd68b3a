/// Preview: interactive shell that drives a director without any sensors.
///
/// Usage: preview --story <dir> [--seed <n>] [--dt <seconds>]
///
/// Commands:
///   tick [n]                 advance n frames (default 1)
///   enter <left|right>       hover edge: visitor steps into a zone
///   exit <left|right>        hover edge: visitor leaves a zone
///   gesture <none|left|right|both>
///   present <on|off>         whether a visitor is in front of the sensor
///   pick <0-7>               report an externally recorded random pick
///   confirm <left|right>     confirm a side without holding
///   hold <left|right>        hover a side until the scene changes
///   reset                    hard reset to the title
///   status                   print the director state
///   help                     list commands
///   quit                     exit

use narrative_flow::core::director::Director;
use narrative_flow::schema::cue::Cue;
use narrative_flow::schema::input::{FrameInput, GestureFlags, HoverEdge};
use narrative_flow::schema::scene::ChoiceSide;
use std::io::{self, BufRead, Write};
use tracing_subscriber::EnvFilter;

/// Frames `hold` will run before giving up.
const HOLD_LIMIT: usize = 400;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let mut story_dir = None;
    let mut seed = None;
    let mut dt: f32 = 1.0 / 30.0;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--story" if i + 1 < args.len() => {
                i += 1;
                story_dir = Some(args[i].clone());
            }
            "--seed" if i + 1 < args.len() => {
                i += 1;
                seed = args[i].parse::<u64>().ok();
            }
            "--dt" if i + 1 < args.len() => {
                i += 1;
                dt = args[i].parse().unwrap_or(dt);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let Some(story_dir) = story_dir else {
        eprintln!("--story is required");
        print_usage();
        std::process::exit(1);
    };

    let mut builder = Director::builder().story_dir(&story_dir);
    if let Some(seed) = seed {
        builder = builder.seed(seed);
    }
    let mut director = match builder.build() {
        Ok(director) => director,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = director.start() {
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }

    println!("Loaded {} scenes from {}", director.story().nodes.len(), story_dir);
    println!("Frame time: {:.4}s", dt);
    println!("Type 'help' for commands.\n");
    print_cues(&mut director);

    // Sticky per-frame input; hover edges and the pick are sent once.
    let mut gesture = GestureFlags::default();
    let mut present = true;
    let mut pending_pick: Option<u8> = None;

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("preview> ");
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        let cmd = parts[0].to_lowercase();

        let frame = move |hover: Vec<HoverEdge>, pick: Option<u8>| FrameInput {
            hover,
            gesture,
            user_present: present,
            random_pick: pick,
        };

        match cmd.as_str() {
            "quit" | "exit" | "q" if parts.len() == 1 => {
                println!("Goodbye.");
                break;
            }
            "help" | "h" | "?" => {
                print_help();
            }
            "tick" | "t" => {
                let count: usize = match parts.get(1).map(|s| s.parse()) {
                    None => 1,
                    Some(Ok(n)) => n,
                    Some(Err(_)) => {
                        println!("Invalid count: {}", parts[1]);
                        continue;
                    }
                };
                for n in 0..count {
                    let pick = if n == 0 { pending_pick.take() } else { None };
                    if let Err(e) = director.tick(dt, &frame(Vec::new(), pick)) {
                        println!("ERROR: {}", e);
                        break;
                    }
                    print_cues(&mut director);
                }
            }
            "enter" | "exit" => {
                let Some(side) = parts.get(1).and_then(|s| parse_side(s)) else {
                    println!("Usage: {} <left|right>", cmd);
                    continue;
                };
                let edge = if cmd == "enter" {
                    HoverEdge::enter(side)
                } else {
                    HoverEdge::exit(side)
                };
                let pick = pending_pick.take();
                if let Err(e) = director.tick(dt, &frame(vec![edge], pick)) {
                    println!("ERROR: {}", e);
                }
                print_cues(&mut director);
            }
            "gesture" => {
                gesture = match parts.get(1).copied() {
                    Some("none") => GestureFlags::default(),
                    Some("left") => GestureFlags {
                        left_raised: true,
                        right_raised: false,
                    },
                    Some("right") => GestureFlags {
                        left_raised: false,
                        right_raised: true,
                    },
                    Some("both") => GestureFlags {
                        left_raised: true,
                        right_raised: true,
                    },
                    _ => {
                        println!("Usage: gesture <none|left|right|both>");
                        continue;
                    }
                };
                println!("Gesture: {:?}", gesture.preview_side());
            }
            "present" => {
                present = match parts.get(1).copied() {
                    Some("on") => true,
                    Some("off") => false,
                    _ => {
                        println!("Usage: present <on|off> (currently {})", present);
                        continue;
                    }
                };
            }
            "pick" => match parts.get(1).and_then(|s| s.parse::<u8>().ok()) {
                Some(pick) if pick < 8 => {
                    pending_pick = Some(pick);
                    println!("Pick {} will be reported on the next frame", pick);
                }
                _ => println!("Usage: pick <0-7>"),
            },
            "confirm" => {
                let Some(side) = parts.get(1).and_then(|s| parse_side(s)) else {
                    println!("Usage: confirm <left|right>");
                    continue;
                };
                if director.confirm_choice(side) {
                    println!("Confirmed {:?}", side);
                } else {
                    println!("Nothing to confirm (no routing yet, or already leaving)");
                }
                print_cues(&mut director);
            }
            "hold" => {
                let Some(side) = parts.get(1).and_then(|s| parse_side(s)) else {
                    println!("Usage: hold <left|right>");
                    continue;
                };
                let start = director.activation().map(|a| a.id);
                let pick = pending_pick.take();
                let mut input = frame(vec![HoverEdge::enter(side)], pick);
                input.user_present = true;
                let mut frames = 0;
                while frames < HOLD_LIMIT && director.activation().map(|a| a.id) == start {
                    if let Err(e) = director.tick(dt, &input) {
                        println!("ERROR: {}", e);
                        break;
                    }
                    input.hover.clear();
                    input.random_pick = None;
                    print_cues(&mut director);
                    frames += 1;
                }
                director.on_hover(HoverEdge::exit(side));
                println!("Held {:?} for {} frames", side, frames);
            }
            "reset" => {
                director.hard_reset();
                print_cues(&mut director);
            }
            "status" | "s" => {
                print_status(&director);
            }
            _ => {
                println!("Unknown command: {}. Type 'help' for commands.", cmd);
            }
        }
    }
}

fn parse_side(s: &str) -> Option<ChoiceSide> {
    match s.to_lowercase().as_str() {
        "left" | "l" => Some(ChoiceSide::Left),
        "right" | "r" => Some(ChoiceSide::Right),
        _ => None,
    }
}

fn print_cues(director: &mut Director) {
    for cue in director.drain_cues() {
        match cue {
            Cue::SceneEntered(scene) => println!("  >> scene '{}'", scene),
            Cue::PlaySound { sound, volume, pitch } => {
                println!("  ~  {:?} (volume {:.2}, pitch {:.2})", sound, volume, pitch)
            }
            Cue::OutcomeRecorded(stats) => println!(
                "  ** {:?}: {} total ({:.1}%), {} today ({:.1}%)",
                stats.rank, stats.total, stats.percent_total, stats.today, stats.percent_today
            ),
            other => println!("  .  {:?}", other),
        }
    }
}

fn print_status(director: &Director) {
    match director.activation() {
        Some(act) => {
            println!("Scene:      {} (activation {})", act.scene, act.id);
            println!(
                "Choice:     armed={} ending={} pair base={}",
                act.input_enabled, act.ending, act.choice_base
            );
            if let Some(routing) = &act.routing {
                println!("  left  ->  {}", routing.left.next);
                println!("  right ->  {}", routing.right.next);
            }
        }
        None => println!("Scene:      none"),
    }
    if let Some(state) = director.confirm_state() {
        println!(
            "Hold:       {:?} {:.2}s confirmed={}",
            state.active_side, state.hold_elapsed, state.confirmed
        );
    }
    let preview = director.arbiter().preview();
    if preview.is_visible() {
        println!(
            "Preview:    {:?} \"{}\" ring={} ({:.0}%)",
            preview.side(),
            preview.text(),
            preview.ring_visible(),
            preview.ring_progress() * 100.0
        );
    }
    let textbox = director.stage().textbox();
    if textbox.visible {
        println!("Textbox:    \"{}\"", textbox.text);
    }
    println!("Cover:      {:.2}", director.stage().cover().alpha);
    println!(
        "Ambience:   {:?} committed={}",
        director.ambience().volumes(),
        director.ambience().is_committed()
    );
    println!("Language:   {}", director.language());
    println!("Pick:       {:?}", director.random_pick());
    println!("Idle:       {:.1}s", director.idle_seconds());
    println!("Tasks:      {}", director.live_tasks());
}

fn print_help() {
    println!("Commands:");
    println!("  tick [n]                 Advance n frames (default 1)");
    println!("  enter <left|right>       Visitor steps into a zone");
    println!("  exit <left|right>        Visitor leaves a zone");
    println!("  gesture <none|left|right|both>");
    println!("                           Raised arms reported every frame");
    println!("  present <on|off>         Visitor in front of the sensor");
    println!("  pick <0-7>               Report a recorded random pick");
    println!("  confirm <left|right>     Confirm without holding");
    println!("  hold <left|right>        Hover a side until the scene changes");
    println!("  reset                    Hard reset to the title");
    println!("  status                   Show director state");
    println!("  help                     Show this help");
    println!("  quit                     Exit");
}

fn print_usage() {
    println!("Preview: interactive shell for walking a story without sensors.");
    println!();
    println!("Usage: preview --story <dir> [--seed <n>] [--dt <seconds>]");
    println!();
    println!("  --story <dir>   Directory with story.ron, dialogue.ron, choices.ron");
    println!("  --seed <n>      RNG seed (default: the config's seed)");
    println!("  --dt <seconds>  Frame time per tick (default: 1/30)");
}
