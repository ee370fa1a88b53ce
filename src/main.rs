//! Storybook - on-device story preview
//!
//! # Usage
//!
//! ```bash
//! cargo run -- list
//! cargo run -- --root ./app show components-button
//! cargo run -- watch
//! ```

use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use storybook_ondevice::bootstrap::{global_context, Bootstrap, PreviewContext};
use storybook_ondevice::config::{self, DEFAULT_CONFIG_PATH};
use storybook_ondevice::error::ResultExt;
use storybook_ondevice::logging;
use storybook_ondevice::preview::{Preview, PreviewRuntime, StorySlot};
use storybook_ondevice::watcher::{StoryReloadEvent, StoryWatcher, WatchPlan};

#[derive(Parser)]
#[command(name = "storybook-ondevice", about = "Discover and preview component stories")]
struct Cli {
    /// Project root that story directories are relative to
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// Config file (defaults to <root>/.storybook/main.json)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print every discovered story, grouped by title
    List,
    /// Load one story by id or import path
    Show { story: String },
    /// Keep the preview live, reloading on every story change
    Watch,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = logging::init();

    let config_file = match &cli.config {
        Some(path) => config::config_path(Some(path.as_str())),
        None => cli.root.join(DEFAULT_CONFIG_PATH),
    };
    let config = config::load_config(&config_file);
    let debounce = Duration::from_millis(config.watch.debounce_ms);

    let bootstrap = Bootstrap::new(&cli.root, config, PreviewRuntime);
    let ctx = global_context();

    let outcome = bootstrap
        .reload(ctx)
        .context("Failed to start the preview session")?;
    logging::log_reload_event(None, &outcome);

    match cli.command.unwrap_or(Command::List) {
        Command::List => list_stories(ctx),
        Command::Show { story } => show_story(ctx, &story),
        Command::Watch => {
            let registry = ctx
                .published_stories()
                .context("No story registry was published")?;
            let preview_path = bootstrap
                .project_root()
                .join(bootstrap.config().get_preview_path());
            let plan = WatchPlan::from_registry(&registry, preview_path);

            let (mut watcher, rx) = StoryWatcher::new(plan, debounce);
            watcher.start().context("Failed to start the story watcher")?;
            watch(&bootstrap, rx);
            Ok(())
        }
    }
}

fn list_stories(ctx: &PreviewContext<Preview>) -> Result<()> {
    let preview = ctx.view().context("Preview session is not active")?;
    let index = preview.story_index();

    if index.is_empty() {
        println!("No stories found");
        return Ok(());
    }

    for group in index.groups() {
        println!("{}", group);
        for entry in index
            .entries()
            .iter()
            .filter(|e| e.title.split('/').next() == Some(group))
        {
            println!("  {:<40} {}", entry.id, entry.import_path);
        }
    }
    Ok(())
}

fn show_story(ctx: &PreviewContext<Preview>, story: &str) -> Result<()> {
    let preview = ctx.view().context("Preview session is not active")?;
    let index = preview.story_index();
    let import_path = index
        .find(story)
        .map(|e| e.import_path.clone())
        .unwrap_or_else(|| story.to_string());

    match preview.render_slot(&import_path) {
        StorySlot::Ready(module) => {
            println!("{}", import_path);
            if let Some(title) = &module.title {
                println!("  title: {}", title);
            }
            for name in &module.exports {
                println!("  - {}", name);
            }
            Ok(())
        }
        StorySlot::Failed { message, .. } => bail!(message),
    }
}

fn watch(bootstrap: &Bootstrap<PreviewRuntime>, rx: Receiver<StoryReloadEvent>) {
    info!("Watching for story changes (Ctrl+C to stop)");

    while let Ok(event) = rx.recv() {
        // Coalesce a burst of events into one reload
        let mut last = event;
        while let Ok(next) = rx.try_recv() {
            last = next;
        }

        if let Some(outcome) = bootstrap.reload(global_context()).log_err() {
            logging::log_reload_event(Some(&last), &outcome);
        }

        if let Some(preview) = global_context().view() {
            let index = preview.story_index();
            for entry in index.entries() {
                if let StorySlot::Failed { message, .. } = preview.render_slot(&entry.import_path) {
                    error!(import_path = %entry.import_path, message = %message, "Story is broken");
                }
            }
            info!(stories = index.len(), "Preview is current");
        }
    }
}
