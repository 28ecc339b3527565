//! CLI tool for turning a Word document into a slide deck.

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use deck_core::assign::DEFAULT_IMAGE_THRESHOLD;
use deck_core::locate::DEFAULT_MARKER_THRESHOLD;
use deck_core::{
    AssignmentPolicy, DocumentFormat, FuzzyWindowLocator, ImageAsset, OutlineFormatter,
    PipelineConfig, PlanMode, SlidePlan, SlidePlanner, SourceDocument,
};
use deck_docx::DocxExtractor;
use deck_llm::{AnthropicClient, LlmConfig};
use deck_pptx::{DeckComposer, Template};
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

/// Generate a presentation from a Word document using an LLM.
#[derive(Parser, Debug)]
#[command(name = "doc2deck")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input Word document (.docx)
    #[arg(default_value = "input/doc.docx")]
    input: PathBuf,

    /// Presentation template (.pptx) supplying masters and layouts
    #[arg(short, long, default_value = "template/template.pptx")]
    template: PathBuf,

    /// Output presentation path
    #[arg(short, long, default_value = "output/output_presentation.pptx")]
    output: PathBuf,

    /// Directory for extracted images and intermediate JSON
    #[arg(long, default_value = "intermediate")]
    scratch: PathBuf,

    /// How the document is split into prompts
    #[arg(long, value_enum, default_value_t = ModeArg::Topics)]
    mode: ModeArg,

    /// How images are matched to slides
    #[arg(long, value_enum, default_value_t = ImagesArg::Fuzzy)]
    images: ImagesArg,

    /// Minimum fuzzy score (0-100) for locating a topic marker
    #[arg(long, default_value_t = DEFAULT_MARKER_THRESHOLD, value_parser = clap::value_parser!(u8).range(0..=100))]
    marker_threshold: u8,

    /// Minimum fuzzy score (0-100) for matching an image to a slide
    #[arg(long, default_value_t = DEFAULT_IMAGE_THRESHOLD, value_parser = clap::value_parser!(u8).range(0..=100))]
    image_threshold: u8,

    /// Do not append the closing "Thank You!" slide
    #[arg(long)]
    no_closing_slide: bool,

    /// Print the slide outline to stdout
    #[arg(short, long)]
    print: bool,

    /// Leave image and table notes out of the outline
    #[arg(long)]
    no_attachments: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ModeArg {
    Topics,
    Structured,
    Paragraphs,
}

impl From<ModeArg> for PlanMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Topics => PlanMode::Topics,
            ModeArg::Structured => PlanMode::Structured,
            ModeArg::Paragraphs => PlanMode::Paragraphs,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ImagesArg {
    /// Title words found in the image file name
    Keyword,
    /// Fuzzy match of slide text against the image caption
    Fuzzy,
}

/// Contents of `extracted_data.json`.
#[derive(Serialize)]
struct ExtractedData<'a> {
    text: String,
    images: Vec<ImageAsset>,
    tables: Vec<&'a [Vec<String>]>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    // Fail before any work when the credential is missing.
    let llm_config = LlmConfig::from_env().context("Cannot reach the LLM")?;

    run(&args, llm_config)
}

fn run(args: &Args, llm_config: LlmConfig) -> Result<()> {
    check_input_format(&args.input)?;

    let image_dir = args.scratch.join("images");
    std::fs::create_dir_all(&image_dir)
        .with_context(|| format!("Failed to create {}", image_dir.display()))?;

    if args.verbose {
        eprintln!("Processing: {}", args.input.display());
    }

    let document = DocxExtractor::open(&args.input)
        .and_then(|mut extractor| extractor.extract(&image_dir))
        .with_context(|| format!("Failed to extract {}", args.input.display()))?;

    if args.verbose {
        eprintln!(
            "  Found {} blocks, {} images, {} tables",
            document.blocks.len(),
            document.image_assets().len(),
            document.tables().len()
        );
    }
    write_json(&args.scratch.join("extracted_data.json"), &extracted_data(&document))?;

    // Load the template up front so a bad path fails before the LLM calls.
    let template = Template::open(&args.template)
        .with_context(|| format!("Failed to load template {}", args.template.display()))?;

    let plan = plan_slides(args, llm_config, &document)?;

    write_json(&args.scratch.join("topics.json"), &plan.topics)?;
    write_json(&args.scratch.join("slides_response.json"), &plan.responses)?;

    let outline = OutlineFormatter::new()
        .with_attachments(!args.no_attachments)
        .format_with_newline(&plan.slides);
    write_output(&args.scratch.join("outline.txt"), &outline)?;

    if plan.slides.is_empty() {
        log::warn!("No slides were generated; the deck will only hold the closing slide");
    }

    let report = DeckComposer::new()
        .with_closing_slide(!args.no_closing_slide)
        .compose(&template, &plan.slides, &args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    if args.print {
        print!("{}", outline);
    }

    if args.verbose {
        eprintln!(
            "  Wrote {} slides ({} images, {} tables) to {}",
            report.slides_written,
            report.images_placed,
            report.tables_placed,
            args.output.display()
        );
    }
    if !report.images_skipped.is_empty() {
        eprintln!(
            "Warning: {} image(s) could not be placed",
            report.images_skipped.len()
        );
    }

    Ok(())
}

fn plan_slides(args: &Args, llm_config: LlmConfig, document: &SourceDocument) -> Result<SlidePlan> {
    let config = PipelineConfig {
        mode: args.mode.into(),
        images: match args.images {
            ImagesArg::Keyword => AssignmentPolicy::KeywordOverlap,
            ImagesArg::Fuzzy => AssignmentPolicy::FuzzyContext {
                threshold: args.image_threshold,
            },
        },
        ..PipelineConfig::default()
    };

    let client = AnthropicClient::new(llm_config);
    if args.verbose {
        eprintln!("  Using model {}", client.config().model);
    }

    let planner = SlidePlanner::new(client)
        .with_config(config)
        .with_locator(FuzzyWindowLocator::new().with_threshold(args.marker_threshold));

    let plan = planner.plan(document).context("Slide planning aborted")?;
    if args.verbose {
        eprintln!(
            "  Planned {} slides from {} topics",
            plan.slides.len(),
            plan.topics.len()
        );
    }
    Ok(plan)
}

/// Reject anything that is not a DOCX before extraction starts.
fn check_input_format(input_path: &Path) -> Result<()> {
    let file = File::open(input_path)
        .with_context(|| format!("Failed to open {}", input_path.display()))?;
    let mut reader = BufReader::new(file);

    // Read magic bytes to detect format
    let mut magic = Vec::with_capacity(8);
    reader
        .by_ref()
        .take(8)
        .read_to_end(&mut magic)
        .with_context(|| "Failed to read file header")?;

    let format = DocumentFormat::from_magic(&magic).or_else(|| {
        input_path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(DocumentFormat::from_extension)
    });

    match format {
        Some(DocumentFormat::Docx) => Ok(()),
        Some(DocumentFormat::Doc) => bail!(
            "{} is a legacy .doc file; save it as .docx first",
            input_path.display()
        ),
        None => bail!("Could not detect file format of {}", input_path.display()),
    }
}

fn extracted_data(document: &SourceDocument) -> ExtractedData<'_> {
    ExtractedData {
        text: document.text(),
        images: document.image_assets(),
        tables: document.tables(),
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    write_output(path, &json)
}

/// Write output to a file.
fn write_output(path: &Path, content: &str) -> Result<()> {
    let mut file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;

    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write to {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use deck_core::ContentBlock;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["doc2deck"]).unwrap();
        assert_eq!(args.input, PathBuf::from("input/doc.docx"));
        assert_eq!(args.template, PathBuf::from("template/template.pptx"));
        assert_eq!(args.output, PathBuf::from("output/output_presentation.pptx"));
        assert_eq!(args.scratch, PathBuf::from("intermediate"));
        assert_eq!(args.mode, ModeArg::Topics);
        assert_eq!(args.images, ImagesArg::Fuzzy);
        assert_eq!(args.marker_threshold, 70);
        assert!(!args.no_closing_slide);
        assert!(!args.no_attachments);
    }

    #[test]
    fn test_flags() {
        let args = Args::try_parse_from([
            "doc2deck",
            "report.docx",
            "-t",
            "brand.pptx",
            "--mode",
            "paragraphs",
            "--images",
            "keyword",
            "--image-threshold",
            "85",
            "--no-closing-slide",
            "--no-attachments",
            "-v",
        ])
        .unwrap();
        assert_eq!(args.input, PathBuf::from("report.docx"));
        assert_eq!(args.template, PathBuf::from("brand.pptx"));
        assert_eq!(PlanMode::from(args.mode), PlanMode::Paragraphs);
        assert_eq!(args.images, ImagesArg::Keyword);
        assert_eq!(args.image_threshold, 85);
        assert!(args.no_closing_slide);
        assert!(args.no_attachments);
        assert!(args.verbose);
    }

    #[test]
    fn test_threshold_out_of_range() {
        assert!(Args::try_parse_from(["doc2deck", "--marker-threshold", "101"]).is_err());
    }

    #[test]
    fn test_extracted_data_json() {
        let mut doc = SourceDocument::new("a.docx", DocumentFormat::Docx);
        doc.add_block(ContentBlock::Paragraph { text: "Hello".into() });
        doc.add_block(ContentBlock::Table {
            rows: vec![vec!["h".into()]],
        });

        let json = serde_json::to_value(extracted_data(&doc)).unwrap();
        assert_eq!(json["text"], "Hello");
        assert_eq!(json["images"].as_array().unwrap().len(), 0);
        assert_eq!(json["tables"][0][0][0], "h");
    }
}
