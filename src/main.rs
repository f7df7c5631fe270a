use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{LevelFilter, info, warn};
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::widgets::Widget;
use serde::Serialize;
use simplelog::{Config, WriteLogger};

use storymark::connector::{ConnectorLine, ConnectorWidget};
use storymark::document::StoryDocument;
use storymark::layout::{LayoutOptions, SectionLayout};
use storymark::render::RenderedSection;
use storymark::session::AnnotationSession;
use storymark::settings::load_settings;

#[derive(Debug, Parser)]
#[command(
    name = "storymark",
    version,
    about = "Render annotated story sections in the terminal"
)]
struct Cli {
    /// Story or derivation document (.json, .yaml or .yml)
    document: PathBuf,

    /// Section to render; all sections when omitted
    #[arg(short, long)]
    section: Option<String>,

    /// Total width in columns, margin included
    #[arg(short, long)]
    width: Option<u16>,

    /// Annotation id to hover, drawing its connector
    #[arg(long)]
    hover: Option<String>,

    /// Print rendered sections as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Settings file; defaults to the per-user config directory
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    log_file: Option<PathBuf>,

    /// off, error, warn, info, debug or trace
    #[arg(long)]
    log_level: Option<LevelFilter>,
}

#[derive(Debug, Serialize)]
struct SectionOutput {
    section: RenderedSection,
    #[serde(skip_serializing_if = "Option::is_none")]
    connector: Option<ConnectorLine>,
}

fn main() -> Result<()> {
    better_panic::install();
    let cli = Cli::parse();

    let settings = load_settings(cli.config.as_deref())?;
    if let Some(path) = &cli.log_file {
        let level = cli.log_level.unwrap_or_else(|| settings.log_level_filter());
        let file =
            File::create(path).with_context(|| format!("Failed to create log file {path:?}"))?;
        WriteLogger::init(level, Config::default(), file)?;
    }
    info!("Starting storymark on {:?}", cli.document);

    let document = StoryDocument::load(&cli.document)?;
    let keys: Vec<String> = match &cli.section {
        Some(key) => {
            if document.section(key).is_none() {
                return Err(anyhow!("No section {key:?} in {:?}", cli.document));
            }
            vec![key.clone()]
        }
        None => document.sections.iter().map(|s| s.key.clone()).collect(),
    };

    let mut session = AnnotationSession::from_document(document);
    let (style, color) = session.defaults();
    info!("New annotations default to {style:?} in {color:?}");
    let width = cli.width.unwrap_or(settings.wrap_width);
    let options = LayoutOptions {
        margin_width: settings.margin_width,
        background: settings.background_rgba(),
        ..LayoutOptions::default()
    };

    let mut outputs = Vec::new();
    for key in &keys {
        let output = render(&mut session, key, width, options, cli.hover.as_deref())?;
        if cli.json {
            outputs.push(output.0);
        } else {
            if keys.len() > 1 {
                println!("[{key}]");
            }
            for line in output.1 {
                println!("{line}");
            }
            println!();
        }
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outputs)?);
    }

    info!("Rendered {} section(s)", keys.len());
    Ok(())
}

/// Lays out one section, hovers `hover` when it lives there, and paints the
/// result into an off-screen buffer.
fn render(
    session: &mut AnnotationSession,
    key: &str,
    width: u16,
    options: LayoutOptions,
    hover: Option<&str>,
) -> Result<(SectionOutput, Vec<String>)> {
    let layout_at = |session: &AnnotationSession, height: u16| -> Result<SectionLayout> {
        session
            .layout_section(key, Rect::new(0, 0, width, height), options)
            .ok_or_else(|| anyhow!("No section {key:?}"))
    };

    // wrapping only depends on width, so a one-row layout gives the height
    let sizing = layout_at(session, 1)?;
    let rows = sizing
        .margin()
        .iter()
        .map(|slot| slot.line + 1)
        .chain([sizing.lines().len()])
        .max()
        .unwrap_or(1);
    let height = u16::try_from(rows).unwrap_or(u16::MAX);
    let measured = layout_at(session, height)?;

    session.hover_leave();
    let connector = match hover {
        Some(id) if session.annotation(id).is_some_and(|a| a.section_key == key) => {
            let line = session.hover_enter(id, &measured);
            if line.is_none() {
                warn!("Annotation {id} has no connector in section {key:?}");
            }
            line
        }
        _ => None,
    };

    let layout = layout_at(session, height)?;
    let area = layout.area();
    let mut buf = Buffer::empty(area);
    (&layout).render(area, &mut buf);
    if let Some(line) = &connector {
        ConnectorWidget::new(line, area)
            .clip(layout.connector_area())
            .render(area, &mut buf);
    }

    let lines = (area.y..area.y + area.height)
        .map(|y| {
            let row: String = (area.x..area.x + area.width)
                .map(|x| buf[(x, y)].symbol().to_string())
                .collect();
            row.trim_end().to_string()
        })
        .collect();

    let output = SectionOutput {
        section: layout.section().clone(),
        connector,
    };
    Ok((output, lines))
}
