//! Truncate a markup fragment to a line budget using fixed-width wrapping.

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use markup_truncate::{
    parse_fragment, to_markup_string, MonospaceHost, OptionsPatch, TruncateOptions,
    TruncationSession,
};

/// Truncate HTML-like markup so it wraps to at most N lines.
#[derive(Parser, Debug)]
#[command(name = "markup-truncate", version, about)]
struct Args {
    /// Markup file to read; stdin when omitted
    file: Option<PathBuf>,

    /// Lines shown before truncation triggers
    #[arg(long)]
    max_lines: Option<u32>,

    /// Characters per line for the monospace measurer
    #[arg(long, default_value_t = 80)]
    columns: usize,

    /// Height of one line
    #[arg(long, default_value_t = 1.0)]
    line_height: f32,

    /// Markup inserted at the cut point
    #[arg(long)]
    marker: Option<String>,

    /// Label of the link that expands truncated text
    #[arg(long)]
    show_label: Option<String>,

    /// Label of the link that collapses expanded text
    #[arg(long)]
    hide_label: Option<String>,

    /// Print the expanded view instead of the collapsed one
    #[arg(long)]
    expanded: bool,

    /// Slack lines tolerated before truncation triggers
    #[arg(long)]
    allowed_extra_lines: Option<u32>,

    /// Bisection step cap
    #[arg(long)]
    max_search_steps: Option<u32>,

    /// JSON options file; flags override its values
    #[arg(long)]
    options: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(&args) {
        Ok(rendered) => {
            println!("{}", rendered);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("markup-truncate: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<String, Box<dyn std::error::Error>> {
    let input = match &args.file {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let mut options = match &args.options {
        Some(path) => TruncateOptions::from_json_str(&fs::read_to_string(path)?)?,
        None => TruncateOptions::default(),
    };
    let patch = OptionsPatch {
        max_lines: args.max_lines,
        allowed_extra_lines: args.allowed_extra_lines,
        truncate_marker: args.marker.clone(),
        show_label: args.show_label.clone(),
        hide_label: args.hide_label.clone(),
        max_search_steps: args.max_search_steps,
        ..OptionsPatch::default()
    };
    patch.apply(&mut options);

    let fragment = parse_fragment(input.trim_end())?;
    let mut host = MonospaceHost::new(args.columns, Some(args.line_height));
    let mut session = TruncationSession::create(fragment, options, &mut host)?;
    if args.expanded {
        session.show(&mut host);
    }
    let search = session.last_search();
    log::info!(
        "offset={} steps={} measurements={} exhausted={}",
        search.offset,
        search.steps,
        search.measurements,
        search.exhausted
    );
    Ok(to_markup_string(&session.view()))
}
