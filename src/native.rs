#![cfg(not(target_arch = "wasm32"))]

//! Command-line front end: build and inspect permalinks, and export
//! filtered observations without a browser.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use geodata::{BoundingBox, Timestamp, parse_timestamp};

use crate::actions::Action;
use crate::config::DashboardConfig;
use crate::effects::{Environment, FetchRequest};
use crate::layout::{LayoutModel, Viewport, Widget, WidgetKind};
use crate::permalink::{self, Permalink};
use crate::state::State;

const USAGE: &str = "Usage: native [--config <path>] <command> [...]\n\n\
Commands:\n  \
encode --url <source> [--interval <s>] [--widget <kind>]... \
[--color <type>=<#rrggbb>]... [--base <url>]\n  \
decode <link-or-token>\n  \
export (--link <link-or-token> | --source <path>) [--from <time>] \
[--to <time>] [--bbox <south,west,north,east>] [--out <dir>]";

const DEFAULT_CONFIG: &str = "config.json";

/// Entry point used by the native executable.
pub fn run(args: &[String]) -> Result<()> {
    let mut config_path = PathBuf::from(DEFAULT_CONFIG);
    let mut rest = args.get(1..).unwrap_or_default();
    if let [flag, path, tail @ ..] = rest
        && flag == "--config"
    {
        config_path = PathBuf::from(path);
        rest = tail;
    }
    let config = DashboardConfig::load_or_default(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    match rest.split_first() {
        Some((cmd, tail)) if cmd == "encode" => encode(&config, tail),
        Some((cmd, tail)) if cmd == "decode" => decode(tail),
        Some((cmd, tail)) if cmd == "export" => export(&config, tail),
        Some((cmd, _)) if cmd == "help" || cmd == "--help" => {
            println!("{USAGE}");
            Ok(())
        }
        _ => bail!(USAGE),
    }
}

fn value<'a>(args: &'a [String], idx: usize, flag: &str) -> Result<&'a str> {
    args.get(idx)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("{flag} requires a value"))
}

// ------------------------------------------------------------------
// encode / decode
// ------------------------------------------------------------------

fn encode(config: &DashboardConfig, args: &[String]) -> Result<()> {
    let mut source_url: Option<String> = None;
    let mut interval_seconds = config.default_interval_seconds;
    let mut layout = LayoutModel::new();
    let mut type_colors = crate::colors::TypeColorMap::new();
    let mut base: Option<String> = None;

    let mut idx = 0;
    while idx < args.len() {
        let flag = args[idx].as_str();
        let v = value(args, idx + 1, flag)?;
        match flag {
            "--url" => source_url = Some(v.to_string()),
            "--interval" => {
                interval_seconds = v
                    .parse()
                    .with_context(|| "--interval must be whole seconds")?;
            }
            "--widget" => {
                layout.add_widget(v.parse::<WidgetKind>()?);
            }
            "--color" => {
                let (kind, color) = v
                    .split_once('=')
                    .ok_or_else(|| anyhow!("--color expects <type>=<#rrggbb>"))?;
                type_colors.assign(kind, color)?;
            }
            "--base" => base = Some(v.to_string()),
            other => bail!("unknown flag `{other}`\n\n{USAGE}"),
        }
        idx += 2;
    }

    let link = Permalink {
        layout: layout.into_items(),
        source_url: source_url.ok_or_else(|| anyhow!("--url is required"))?,
        interval_seconds,
        type_colors,
    };

    let out = match base {
        Some(origin) => permalink::href(&config.base_url(&origin), &link)?,
        None => permalink::encode(&link)?,
    };
    println!("{out}");
    Ok(())
}

fn decode(args: &[String]) -> Result<()> {
    let [input] = args else {
        bail!("decode takes exactly one link or token\n\n{USAGE}");
    };
    let summary = describe_link(input)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Permalink contents, with each layout item resolved to the widget this
/// build renders for it (`null` for a placeholder).
fn describe_link(input: &str) -> Result<serde_json::Value> {
    let link = permalink::decode_link(input)?;
    let widgets: Vec<_> = link
        .layout
        .iter()
        .map(|item| {
            let widget = match item.widget() {
                Widget::Known(kind) => Some(kind.to_string()),
                Widget::Unsupported(_) => None,
            };
            serde_json::json!({ "id": item.i, "widget": widget })
        })
        .collect();

    Ok(serde_json::json!({
        "url": link.source_url,
        "interval": link.interval_seconds,
        "layout": link.layout,
        "widgets": widgets,
        "typeColors": link.type_colors,
    }))
}

// ------------------------------------------------------------------
// export
// ------------------------------------------------------------------

/// Serves fetches from the local file system and writes saved files
/// into `out_dir`.
pub struct LocalEnvironment {
    base_url: String,
    out_dir: PathBuf,
    completed: Vec<(FetchRequest, Result<String, String>)>,
    saved: Vec<PathBuf>,
}

impl LocalEnvironment {
    pub fn new(base_url: impl Into<String>, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_url: base_url.into(),
            out_dir: out_dir.into(),
            completed: Vec::new(),
            saved: Vec::new(),
        }
    }

    /// Feed finished fetches back into `state` until none are left.
    pub fn settle(&mut self, state: &mut State) {
        while !self.completed.is_empty() {
            for (request, response) in std::mem::take(&mut self.completed) {
                state.handle(Action::FetchCompleted { request, response }, self);
            }
        }
    }

    pub fn saved(&self) -> &[PathBuf] {
        &self.saved
    }
}

impl Environment for LocalEnvironment {
    fn base_url(&self) -> String {
        self.base_url.clone()
    }

    fn viewport(&self) -> Viewport {
        Viewport {
            width: 1920.0,
            height: 1080.0,
            root_font_size: 16.0,
        }
    }

    fn fetch(&mut self, request: FetchRequest) {
        let path = request
            .url
            .strip_prefix("file://")
            .unwrap_or(&request.url)
            .to_string();
        let response = std::fs::read_to_string(&path)
            .map_err(|e| format!("{path}: {e}"));
        self.completed.push((request, response));
    }

    fn start_timer(&mut self, interval: Duration) {
        tracing::debug!(?interval, "refresh timer not used by the CLI");
    }

    fn stop_timer(&mut self) {}

    fn write_clipboard(&mut self, text: &str) {
        println!("{text}");
    }

    fn save_file(&mut self, file_name: &str, contents: &str) {
        let path = self.out_dir.join(file_name);
        match std::fs::write(&path, contents) {
            Ok(()) => {
                tracing::info!(path = %path.display(), "export written");
                self.saved.push(path);
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "export failed");
            }
        }
    }
}

#[derive(Debug, Default)]
struct ExportArgs {
    link: Option<String>,
    source: Option<String>,
    from: Option<Timestamp>,
    to: Option<Timestamp>,
    bbox: Option<BoundingBox>,
    out: Option<PathBuf>,
}

impl ExportArgs {
    fn parse(args: &[String]) -> Result<Self> {
        let mut parsed = ExportArgs::default();
        let mut idx = 0;
        while idx < args.len() {
            let flag = args[idx].as_str();
            let v = value(args, idx + 1, flag)?;
            match flag {
                "--link" => parsed.link = Some(v.to_string()),
                "--source" => parsed.source = Some(v.to_string()),
                "--from" => parsed.from = Some(parse_timestamp(v)?),
                "--to" => parsed.to = Some(parse_timestamp(v)?),
                "--bbox" => parsed.bbox = Some(parse_bbox(v)?),
                "--out" => parsed.out = Some(PathBuf::from(v)),
                other => bail!("unknown flag `{other}`\n\n{USAGE}"),
            }
            idx += 2;
        }
        Ok(parsed)
    }
}

fn parse_bbox(raw: &str) -> Result<BoundingBox> {
    let parts = raw
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("invalid --bbox `{raw}`"))?;
    let [south, west, north, east] = parts[..] else {
        bail!("--bbox expects four numbers: south,west,north,east");
    };
    Ok(BoundingBox::from_corners((south, west), (north, east)))
}

fn export(config: &DashboardConfig, args: &[String]) -> Result<()> {
    let opts = ExportArgs::parse(args)?;
    let out_dir = opts.out.clone().unwrap_or_else(|| PathBuf::from("."));
    let saved = export_to(config, &opts, &out_dir)?;
    println!("{}", saved.display());
    Ok(())
}

fn export_to(
    config: &DashboardConfig,
    opts: &ExportArgs,
    out_dir: &Path,
) -> Result<PathBuf> {
    let mut env = LocalEnvironment::new(config.base_url("http://localhost"), out_dir);
    let mut state = State::from_config(config);

    let open = match (&opts.link, &opts.source) {
        (Some(link), None) => Action::OpenPermalink { link: link.clone() },
        (None, Some(source)) => {
            state.handle(Action::SetSourceUrl { url: source.clone() }, &mut env);
            Action::OpenDashboard
        }
        _ => bail!("export needs exactly one of --link or --source"),
    };
    state.handle(open, &mut env);
    if let Some(e) = state.store.error_message.take() {
        bail!(e);
    }
    env.settle(&mut state);

    // Export the whole chosen window, not just the latest instant.
    let timestamps = state.slider_timestamps().to_vec();
    if let (Some(first), Some(last)) = (timestamps.first(), timestamps.last()) {
        let from = opts.from.unwrap_or(*first);
        let to = opts.to.unwrap_or(*last);
        state.handle(
            Action::SelectSliderRange {
                values: vec![from, to],
            },
            &mut env,
        );
    }
    state.handle(Action::SetBoundingBox { bbox: opts.bbox }, &mut env);
    state.handle(Action::ExportVisible, &mut env);

    if let Some(e) = state.store.error_message.take() {
        bail!(e);
    }
    env.saved()
        .last()
        .cloned()
        .ok_or_else(|| anyhow!("nothing was written to {}", out_dir.display()))
}
