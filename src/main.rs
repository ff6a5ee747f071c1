use fic::app::{Shown, Viewer};
use fic::cli::Args;
use fic::config::{self, PathConfig, Settings};
use fic::core::anim_player::AnimationPlayer;
use fic::core::event_bus::downcast_event;
use fic::core::player::Action;
use fic::core::viewer_events::{FrameShownEvent, StatusEvent};
use fic::entities::storage::node_id;
use fic::entities::tree::TreeIndex;

use anyhow::{Context, Result, bail};
use clap::Parser;
use crossbeam_channel::{RecvTimeoutError, unbounded};
use log::{debug, info, warn};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Frame fed from the playback thread to the console
struct FrameLine {
    index: usize,
    key: String,
    detail: String,
}

fn describe(shown: &Shown) -> String {
    match shown {
        Shown::Media(media) => {
            let (w, h) = media.dimensions();
            if media.is_animated() {
                format!("{}x{} gif, {} frame(s)", w, h, media.frame_count())
            } else {
                format!("{}x{}", w, h)
            }
        }
        Shown::Previews(previews) => format!("folder, {} preview(s)", previews.len()),
    }
}

fn init_logging(args: &Args, path_config: &PathConfig) -> Result<()> {
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt
            .clone()
            .unwrap_or_else(|| config::data_file(config::LOG_FILE, path_config));
        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();
        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        let default_level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .format_timestamp_millis()
            .init();
    }
    Ok(())
}

/// Settings file, then CLI overrides
fn effective_settings(args: &Args, settings_path: &Path) -> Result<Settings> {
    let mut settings = Settings::load(settings_path)?;
    if args.no_subfolders {
        settings.include_subfolders = false;
    }
    if let Some(workers) = args.workers {
        settings.max_workers = workers;
    }
    if let Some(mb) = args.max_file_size {
        settings.max_file_size_mb = mb;
    }
    if let Some(ms) = args.interval {
        settings.slideshow_interval_ms = ms;
    }
    Ok(settings.sanitized())
}

fn print_tree(tree: &TreeIndex, id: &str, depth: usize) {
    let name = tree.name(id).unwrap_or_else(|| id.to_string());
    if tree.is_branch(id) {
        let (folders, files) = tree.counts(id);
        println!("{}{}/ ({} folder(s), {} file(s))", "  ".repeat(depth), name, folders, files);
        for child in tree.children(id) {
            print_tree(tree, child, depth + 1);
        }
    } else {
        println!("{}{}", "  ".repeat(depth), name);
    }
}

/// Drain queued viewer events, echoing status lines at info level
fn drain_events(viewer: &Viewer) {
    for event in viewer.bus().poll() {
        if let Some(status) = downcast_event::<StatusEvent>(&event) {
            info!("{}", status.message);
        } else if let Some(frame) = downcast_event::<FrameShownEvent>(&event)
            && let Some(error) = &frame.error
        {
            println!("[{}/{}] {} skipped: {}", frame.index + 1, frame.total, frame.key, error);
        }
    }
}

/// Timed slideshow over the playlist, `count` frames
fn run_slideshow(viewer: &mut Viewer, count: usize) -> Result<()> {
    let total = viewer.player().len();
    if total == 0 {
        bail!("Nothing to play");
    }
    let (tx, rx) = unbounded();
    viewer.set_presenter(move |index, key, shown| {
        let _ = tx.send(FrameLine { index, key: key.to_string(), detail: describe(shown) });
    });

    println!(
        "Playing {} frame(s), {} ms each (~{:.1} s per loop)",
        count,
        viewer.player().interval().as_millis(),
        viewer.player().estimated_playtime().as_secs_f64()
    );
    viewer.player_mut().play_pause();

    // Generous bound: a loop full of undecodable files presents nothing
    let patience = viewer.player().interval() * 10 + Duration::from_secs(5);
    let mut shown = 0;
    while shown < count {
        match rx.recv_timeout(patience) {
            Ok(frame) => {
                shown += 1;
                println!("[{}/{}] {} ({})", frame.index + 1, total, frame.key, frame.detail);
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("No frame presented for {:?}, stopping", patience);
                break;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
        drain_events(viewer);
    }

    viewer.player_mut().stop();
    viewer.cancel_precache();
    drain_events(viewer);
    Ok(())
}

/// Play the first animated entry of the playlist through its frames
fn run_animation(viewer: &Viewer, speed: f64, frames: Option<usize>) -> Result<()> {
    let media = viewer
        .player()
        .list()
        .iter()
        .find_map(|key| match viewer.display(key) {
            Ok(Shown::Media(media)) if media.is_animated() => Some((key.clone(), media)),
            _ => None,
        });
    let Some((key, media)) = media else {
        bail!("No animated GIF in the playlist");
    };

    let (tx, rx) = unbounded();
    let mut player = AnimationPlayer::new(Arc::clone(&media), move |index, _frame| {
        let _ = tx.send(index);
    });
    if !player.set_speed(speed) {
        warn!("Speed {} out of range, playing at {}", speed, player.speed());
    }

    let count = frames.unwrap_or(media.frame_count());
    println!("Animating {} ({} frame(s)) at {}x", key, media.frame_count(), player.speed());
    player.play_pause();
    for _ in 0..count {
        match rx.recv_timeout(Duration::from_secs(30)) {
            Ok(index) => {
                let delay = media.delays.get(index).copied().unwrap_or_default();
                println!("  frame {} ({} cs)", index, delay);
            }
            Err(_) => break,
        }
    }
    player.stop();
    Ok(())
}

const CONSOLE_HELP: &str = "\
commands:
  play | pause | resume | toggle | stop | playstop
  next | prev | seek N | dir N
  select PATH | search TEXT | list | status | mem | precache | help | quit";

/// Line-oriented command console on stdin
fn run_console(viewer: &mut Viewer) -> Result<()> {
    viewer.set_presenter(|index, key, shown| {
        println!("[{}] {} ({})", index + 1, key, describe(shown));
    });
    println!("{}", CONSOLE_HELP);

    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        std::io::stdout().flush().context("Failed to flush stdout")?;
        line.clear();
        if stdin.lock().read_line(&mut line).context("Failed to read stdin")? == 0 {
            break;
        }

        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            continue;
        };
        let rest = words.collect::<Vec<_>>().join(" ");

        match command {
            "quit" | "exit" | "q" => break,
            "help" | "?" => println!("{}", CONSOLE_HELP),
            "list" => {
                let cursor = viewer.player().cursor();
                for (i, key) in viewer.player().list().iter().enumerate() {
                    let mark = if i as i64 == cursor { '>' } else { ' ' };
                    println!("{} {:>4} {}", mark, i, key);
                }
            }
            "status" => println!(
                "{} | {}/{} | {}",
                viewer.player().status(),
                viewer.player().cursor(),
                viewer.player().len(),
                viewer.player().current().unwrap_or_default()
            ),
            "mem" => match viewer.refresh_memory_usage() {
                Some(usage) => println!("{}", usage),
                None => println!("memory info unavailable"),
            },
            "precache" => viewer.precache_in_background(),
            "search" => println!("{} hit(s)", viewer.search(&rest).len()),
            "select" => {
                let id = node_id(Path::new(&rest));
                println!("{}", if viewer.select(&id) { "selected" } else { "not found" });
            }
            other => match other.parse::<Action>() {
                Ok(action) => {
                    let args: Result<Vec<i64>, _> = rest.split_whitespace().map(str::parse).collect();
                    match args {
                        Ok(args) => println!("{}", viewer.player_mut().dispatch(action, &args)),
                        Err(e) => println!("bad argument: {}", e),
                    }
                }
                Err(e) => println!("{}", e),
            },
        }
        drain_events(viewer);
    }

    viewer.player_mut().stop();
    viewer.cancel_precache();
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let path_config = PathConfig::from_env_and_cli(args.config_dir.clone());
    if let Err(e) = config::ensure_dirs(&path_config) {
        eprintln!("Warning: Failed to create application directories: {}", e);
    }
    init_logging(&args, &path_config)?;

    info!("fic starting...");
    debug!("Command-line args: {:?}", args);

    let settings_path = config::config_file(config::SETTINGS_FILE, &path_config);
    info!("Config path: {}", settings_path.display());
    let settings = effective_settings(&args, &settings_path)?;
    debug!("Settings: {:?}", settings);
    if args.save_settings {
        settings.save(&settings_path)?;
        println!("Settings saved to {}", settings_path.display());
    }

    let Some(root) = args.root.clone() else {
        if !args.save_settings {
            use clap::CommandFactory;
            Args::command().print_help().context("Failed to print help")?;
            println!();
        }
        return Ok(());
    };
    if !root.is_dir() {
        bail!("Not a directory: {}", root.display());
    }

    let mut viewer = Viewer::new(settings);
    let took = viewer.open(&root);
    let tree = viewer.tree();
    println!(
        "Indexed {} in {:.3} sec: {} node(s), {} playlist item(s)",
        root.display(),
        took,
        tree.len(),
        viewer.player().len()
    );
    drain_events(&viewer);

    if let Some(select) = &args.select {
        let path: PathBuf = if select.is_absolute() { select.clone() } else { root.join(select) };
        if !viewer.select(&node_id(&path)) {
            warn!("{} is not in the index", path.display());
        }
    }
    if args.tree
        && let Some(root_id) = tree.root()
    {
        print_tree(&tree, root_id, 0);
    }
    if let Some(query) = &args.search {
        let hits = viewer.search(query);
        println!("Search '{}': {} hit(s)", query, hits.len());
        for hit in &hits {
            println!("  {}", hit);
        }
    }
    if args.precache {
        viewer.precache();
        let stats = viewer.cache().stats();
        println!(
            "Cached {} item(s), {:.1} MB ({} decode(s))",
            viewer.cache().len(),
            viewer.cache().mem() as f64 / (1024.0 * 1024.0),
            stats.decodes()
        );
        if let Some(usage) = viewer.refresh_memory_usage() {
            println!("{}", usage);
        }
    }
    drain_events(&viewer);

    if args.animate {
        run_animation(&viewer, args.speed, args.frames)?;
    } else if let Some(count) = args.frames {
        run_slideshow(&mut viewer, count)?;
    }
    if args.interactive {
        run_console(&mut viewer)?;
    }

    info!("fic exiting");
    Ok(())
}
