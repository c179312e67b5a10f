use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use clap::{ArgAction, Parser, ValueEnum};

use sankey::{SankeyDef, SankeyLayout, Viewport, render_svg};

#[derive(Debug, Parser)]
#[command(
    name = "sankey",
    about = "Lay out and render Sankey flow diagrams from JSON definitions."
)]
struct RenderArgs {
    /// Path to the JSON flow definition. Use '-' to read from stdin.
    #[arg(short = 'i', long = "input")]
    input: Option<String>,

    /// Path to the output file. Use '-' to write to stdout.
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Output format (defaults to the output file extension or svg).
    #[arg(short = 'e', long = "output-format")]
    output_format: Option<OutputFormat>,

    /// Width of the rendered viewport in pixels.
    #[arg(short = 'W', long = "width", default_value_t = 960.0)]
    width: f32,

    /// Height of the rendered viewport in pixels.
    #[arg(short = 'H', long = "height", default_value_t = 540.0)]
    height: f32,

    /// Background color for the rendered diagram.
    #[arg(short = 'b', long = "background-color", default_value = "white")]
    background_color: String,

    /// Raster scale factor applied when exporting PNG.
    #[arg(short = 's', long = "scale", default_value_t = 1.0)]
    scale: f32,

    /// Suppress informational output.
    #[arg(short = 'q', long = "quiet", action = ArgAction::SetTrue)]
    quiet: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum InputSource {
    Stdin,
    File(PathBuf),
}

#[derive(Debug, Clone)]
enum OutputDestination {
    Stdout,
    File(PathBuf),
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Svg,
    Png,
}

impl OutputFormat {
    fn from_path(path: &Path) -> Option<Self> {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
        {
            Some(ext) if ext == "svg" => Some(OutputFormat::Svg),
            Some(ext) if ext == "png" => Some(OutputFormat::Png),
            _ => None,
        }
    }
}

fn main() {
    if let Err(err) = run_render(RenderArgs::parse()) {
        eprintln!("\u{001b}[31merror:\u{001b}[0m {err:?}");
        std::process::exit(1);
    }
}

fn run_render(cli: RenderArgs) -> Result<()> {
    if !cli.width.is_finite() || cli.width <= 0.0 || !cli.height.is_finite() || cli.height <= 0.0 {
        bail!("viewport dimensions must be positive numbers");
    }

    let input_source = parse_input(cli.input.as_deref())?;
    let output_dest = parse_output(cli.output.as_deref(), &input_source)?;
    let format = determine_format(cli.output_format, &output_dest)?;

    let definition = load_definition(&input_source)?;
    let def: SankeyDef =
        serde_json::from_str(&definition).context("failed to parse flow definition")?;

    let layout = SankeyLayout::compute(&def, Viewport::new(cli.width, cli.height))
        .context("failed to lay out flow diagram")?;

    let bytes = match format {
        OutputFormat::Svg => render_svg(&layout, &cli.background_color)?.into_bytes(),
        OutputFormat::Png => render_png(&layout, &cli.background_color, cli.scale)?,
    };

    write_output(output_dest, &bytes, cli.quiet)?;

    Ok(())
}

#[cfg(feature = "png")]
fn render_png(layout: &SankeyLayout, background: &str, scale: f32) -> Result<Vec<u8>> {
    Ok(sankey::render_png(layout, background, scale)?)
}

#[cfg(not(feature = "png"))]
fn render_png(_layout: &SankeyLayout, _background: &str, _scale: f32) -> Result<Vec<u8>> {
    bail!("PNG output requires building with the 'png' feature. Please target SVG instead.");
}

fn parse_input(input: Option<&str>) -> Result<InputSource> {
    match input {
        Some("-") => Ok(InputSource::Stdin),
        Some(path_str) => {
            let path = PathBuf::from(path_str);
            if !path.exists() {
                return Err(anyhow!("input file '{path_str}' does not exist"));
            }
            Ok(InputSource::File(path))
        }
        None => Ok(InputSource::Stdin),
    }
}

fn parse_output(output: Option<&str>, input: &InputSource) -> Result<OutputDestination> {
    match output {
        Some("-") => Ok(OutputDestination::Stdout),
        Some(path_str) => {
            let path = PathBuf::from(path_str);
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    return Err(anyhow!(
                        "output directory '{}' does not exist",
                        parent.display()
                    ));
                }
            }
            Ok(OutputDestination::File(path))
        }
        None => match input {
            InputSource::File(path) => {
                let default_name = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .map(|name| format!("{name}.svg"))
                    .unwrap_or_else(|| "out.svg".to_string());
                let mut default_path = path.to_path_buf();
                default_path.set_file_name(default_name);
                Ok(OutputDestination::File(default_path))
            }
            InputSource::Stdin => Ok(OutputDestination::File(PathBuf::from("out.svg"))),
        },
    }
}

fn determine_format(
    explicit: Option<OutputFormat>,
    output: &OutputDestination,
) -> Result<OutputFormat> {
    if let Some(fmt) = explicit {
        return Ok(fmt);
    }

    match output {
        OutputDestination::Stdout => Ok(OutputFormat::Svg),
        OutputDestination::File(path) => OutputFormat::from_path(path).ok_or_else(|| {
            anyhow!(
                "unable to determine output format from '{}'; please specify --output-format",
                path.display()
            )
        }),
    }
}

fn load_definition(source: &InputSource) -> Result<String> {
    match source {
        InputSource::Stdin => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            if buffer.trim().is_empty() {
                Err(anyhow!("no flow definition supplied on stdin"))
            } else {
                Ok(buffer)
            }
        }
        InputSource::File(path) => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("failed to read '{}'", path.display()))?;
            if contents.trim().is_empty() {
                Err(anyhow!("input file '{}' was empty", path.display()))
            } else {
                Ok(contents)
            }
        }
    }
}

fn write_output(dest: OutputDestination, bytes: &[u8], quiet: bool) -> Result<()> {
    match dest {
        OutputDestination::Stdout => {
            let mut stdout = io::stdout();
            stdout.write_all(bytes)?;
            stdout.flush()?;
        }
        OutputDestination::File(path) => {
            fs::write(&path, bytes)?;
            if !quiet {
                println!("Generated diagram -> {}", path.display());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_is_inferred_from_extension() {
        assert_eq!(
            OutputFormat::from_path(Path::new("flows.svg")),
            Some(OutputFormat::Svg)
        );
        assert_eq!(
            OutputFormat::from_path(Path::new("flows.PNG")),
            Some(OutputFormat::Png)
        );
        assert_eq!(OutputFormat::from_path(Path::new("flows.txt")), None);
        assert_eq!(OutputFormat::from_path(Path::new("flows")), None);
    }

    #[test]
    fn missing_input_defaults_to_stdin() {
        assert_eq!(parse_input(None).unwrap(), InputSource::Stdin);
        assert_eq!(parse_input(Some("-")).unwrap(), InputSource::Stdin);
    }

    #[test]
    fn default_output_derives_from_input_name() {
        let dest = parse_output(None, &InputSource::File(PathBuf::from("data/flows.json")))
            .expect("default output");
        match dest {
            OutputDestination::File(path) => {
                assert_eq!(path, PathBuf::from("data/flows.json.svg"));
            }
            OutputDestination::Stdout => panic!("expected a file destination"),
        }
    }
}
