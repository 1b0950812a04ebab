use futures::executor::block_on;
use narwhal::{GraphModel, LayoutOptions, RenderOptions, layout_graph};
use std::io::Read;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum CliError {
    Usage(&'static str),
    Io(std::io::Error),
    Layout(narwhal::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}"),
            CliError::Io(err) => write!(f, "I/O error: {err}"),
            CliError::Layout(err) => write!(f, "{err}"),
            CliError::Json(err) => write!(f, "JSON error: {err}"),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<narwhal::Error> for CliError {
    fn from(value: narwhal::Error) -> Self {
        Self::Layout(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

#[derive(Debug, Default)]
struct Args {
    input: Option<String>,
    config: Option<String>,
    pretty: bool,
}

fn usage() -> &'static str {
    "narwhal\n\
\n\
USAGE:\n\
  narwhal [--config <render-options.json>] [--pretty] [<graph.json>|-]\n\
\n\
NOTES:\n\
  - If <graph.json> is omitted or '-', the graph model is read from stdin.\n\
  - The positioned graph is written to stdout as JSON.\n\
  - Set RUST_LOG=narwhal=debug for layout diagnostics on stderr.\n\
  - Set NARWHAL_LAYOUT_TIMING=1 for a one-line timing summary on stderr.\n\
"
}

fn parse_args(argv: &[String]) -> Result<Args, CliError> {
    let mut args = Args::default();

    let mut it = argv.iter().skip(1);
    while let Some(a) = it.next() {
        match a.as_str() {
            "--help" | "-h" => return Err(CliError::Usage(usage())),
            "--pretty" => args.pretty = true,
            "--config" => {
                let Some(path) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.config = Some(path.clone());
            }
            "-" => {
                if args.input.is_some() {
                    return Err(CliError::Usage(usage()));
                }
                args.input = Some("-".to_string());
            }
            other if other.starts_with('-') => return Err(CliError::Usage(usage())),
            path => {
                if args.input.is_some() {
                    return Err(CliError::Usage(usage()));
                }
                args.input = Some(path.to_string());
            }
        }
    }

    Ok(args)
}

fn read_input(input: Option<&str>) -> Result<String, CliError> {
    match input {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
        Some(path) => Ok(std::fs::read_to_string(path)?),
    }
}

fn load_render_options(path: Option<&str>) -> Result<RenderOptions, CliError> {
    let Some(path) = path else {
        return Ok(RenderOptions::default());
    };
    let text = std::fs::read_to_string(path)?;
    Ok(RenderOptions::from_json_str(&text)?)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(args: Args) -> Result<(), CliError> {
    let render = load_render_options(args.config.as_deref())?;
    let text = read_input(args.input.as_deref())?;
    let model: GraphModel = serde_json::from_str(&text)?;
    tracing::debug!(
        nodes = model.nodes.len(),
        edges = model.edges.len(),
        subgraphs = model.subgraphs.len(),
        "graph model loaded"
    );

    let options = LayoutOptions::default().with_render(render);
    let graph = block_on(layout_graph(&model, &options))?;

    let stdout = std::io::stdout().lock();
    if args.pretty {
        serde_json::to_writer_pretty(stdout, &graph)?;
    } else {
        serde_json::to_writer(stdout, &graph)?;
    }
    println!();
    Ok(())
}

fn main() {
    let args = match parse_args(&std::env::args().collect::<Vec<_>>()) {
        Ok(v) => v,
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    init_tracing();

    if let Err(err) = run(args) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
