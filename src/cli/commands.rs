//! CLI command definitions using clap.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use crate::client::auth::IMS_TOKEN_URL;
use crate::client::{AzureSasUploader, Credentials, FireflyClient, JobApi, LocalFileUploader, Uploader};
use crate::config::{BatchConfig, StorageConfig};
use crate::metrics::{export_metrics, init_metrics};
use crate::operations::image::{DEFAULT_IMAGE_MODEL, DEFAULT_REFERENCE_STRENGTH};
use crate::operations::speech::DEFAULT_SPEECH_LOCALE;
use crate::operations::video::{DEFAULT_VIDEO_MODEL, DEFAULT_VIDEO_SIZE};
use crate::operations::{
    display_name, normalize_model_name, parse_image_size, parse_video_size, ContentClass, Dimensions,
    ImageOperation, ImageOptions, Operation, RemoteJobUnit, SimilarImageOperation, SimilarImageOptions,
    SpeechOperation, SpeechOptions, VideoOperation, VideoOptions,
};
use crate::ratelimit::RateLimiter;
use crate::scheduler::{BatchReport, JobStatusPoller, TaskDispatcher};
use crate::template::{OutputTemplate, RenderContext};
use crate::variation::{TaskMatrix, TaskSpec, VariationInputs};

/// Default output template for generated images.
pub const DEFAULT_IMAGE_OUTPUT: &str = "{datetime}_{model}_{prompt}_{n}.jpg";

/// Default output template for generated videos.
pub const DEFAULT_VIDEO_OUTPUT: &str = "{datetime}_{prompt}_{n}.mp4";

/// Default output template for generated speech; `{model}` is the voice id.
pub const DEFAULT_SPEECH_OUTPUT: &str = "{datetime}_{model}_{n}.wav";

/// Default output template for similar images.
pub const DEFAULT_SIMILAR_OUTPUT: &str = "{datetime}_{model}_similar_{n}.jpg";

/// Width of the prompt column in the task table.
const PROMPT_COLUMN_WIDTH: usize = 40;

/// batchforge - Batch media generation against asynchronous job APIs
#[derive(Parser)]
#[command(name = "batchforge")]
#[command(about = "Expand parameter variations into batches of remote generation jobs")]
#[command(version)]
#[command(
    long_about = "batchforge expands bracketed parameter lists such as \"a [cat,dog] on a sofa\" \
into the full cartesian product of tasks, submits each task to the remote generation API under a \
shared rate limit, polls the jobs to completion and downloads the results to templated filenames. \
Failed tasks get one retry pass once the batch has finished."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Generate images for every combination of prompt, model and references
    Image(ImageArgs),

    /// Generate videos for every prompt and model version variation
    Video(VideoArgs),

    /// Generate speech for every script variation and voice
    #[command(visible_alias = "speech")]
    Tts(TtsArgs),

    /// Generate images similar to a source image for every model
    #[command(name = "similar-image", visible_alias = "sim")]
    SimilarImage(SimilarImageArgs),
}

/// Options shared by every batch command.
#[derive(clap::Args, Debug, Clone)]
pub struct BatchArgs {
    /// Number of iterations per combination (1-4)
    #[arg(short = 'n', long = "num-variations", default_value = "1")]
    pub iterations: u32,

    /// Overwrite existing output files instead of adding a numeric suffix
    #[arg(long)]
    pub overwrite: bool,

    /// Use the output template as written; do not append the model or
    /// prompt options it leaves out
    #[arg(long)]
    pub literal_output: bool,

    /// Maximum concurrent tasks; overrides THROTTLE_LIMIT_FIREFLY
    #[arg(short = 'c', long)]
    pub concurrency: Option<usize>,

    /// Do not retry failed tasks after the batch finishes
    #[arg(long)]
    pub no_retry: bool,

    /// Leave tasks whose remote job failed out of the retry pass
    #[arg(long)]
    pub no_retry_remote_failures: bool,

    /// Print the task table and exit without contacting the API
    #[arg(long)]
    pub dry_run: bool,

    /// Output the batch report as JSON
    #[arg(short = 'j', long)]
    pub json: bool,

    /// Write Prometheus metrics to this file when the batch ends
    #[arg(long)]
    pub metrics_out: Option<PathBuf>,
}

/// Arguments for the image command.
#[derive(clap::Args, Debug, Clone)]
pub struct ImageArgs {
    /// Prompt; bracketed lists such as "a [cat,dog]" expand into variations
    #[arg(short, long)]
    pub prompt: String,

    /// Model or bracketed list of models (image3, image4, ultra, ...)
    #[arg(short, long, default_value = DEFAULT_IMAGE_MODEL)]
    pub model: String,

    /// Style reference image path or URL; accepts a bracketed list
    #[arg(long = "sref", visible_alias = "style-reference")]
    pub style_reference: Option<String>,

    /// Composition reference image path or URL; accepts a bracketed list
    #[arg(long = "cref", visible_alias = "composition-reference")]
    pub composition_reference: Option<String>,

    /// Style reference strength (1-100)
    #[arg(long, default_value_t = DEFAULT_REFERENCE_STRENGTH)]
    pub style_strength: u8,

    /// Composition reference strength (1-100)
    #[arg(long, default_value_t = DEFAULT_REFERENCE_STRENGTH)]
    pub composition_strength: u8,

    /// Content class (photo, art)
    #[arg(long, default_value = "photo")]
    pub content_class: String,

    /// Things to keep out of the image
    #[arg(long)]
    pub negative_prompt: Option<String>,

    /// Prompt biasing locale, e.g. en-US
    #[arg(long)]
    pub locale: Option<String>,

    /// Named size (square, landscape, 16:9, ...) or WIDTHxHEIGHT
    #[arg(short, long)]
    pub size: Option<String>,

    /// Comma-separated seeds sent with every request (at most 4)
    #[arg(long, value_delimiter = ',')]
    pub seeds: Vec<u64>,

    /// Visual intensity (1-10)
    #[arg(long)]
    pub visual_intensity: Option<u8>,

    /// Output filename template ({prompt}, {model}, {n}, {var1}, {datetime}, ...)
    #[arg(short, long, default_value = DEFAULT_IMAGE_OUTPUT)]
    pub output: String,

    #[command(flatten)]
    pub batch: BatchArgs,
}

/// Arguments for the video command.
#[derive(clap::Args, Debug, Clone)]
pub struct VideoArgs {
    /// Prompt; bracketed lists such as "a [cat,dog]" expand into variations
    #[arg(short, long)]
    pub prompt: String,

    /// Named video size (1080p, sq720p, 960x540, ...)
    #[arg(short, long, default_value = DEFAULT_VIDEO_SIZE)]
    pub size: String,

    /// Video model version; "[a,b]" runs each version
    #[arg(short, long, default_value = DEFAULT_VIDEO_MODEL)]
    pub model_version: String,

    /// Output filename template ({prompt}, {n}, {var1}, {datetime}, ...)
    #[arg(short, long, default_value = DEFAULT_VIDEO_OUTPUT)]
    pub output: String,

    #[command(flatten)]
    pub batch: BatchArgs,
}

/// Arguments for the tts command.
#[derive(clap::Args, Debug, Clone)]
pub struct TtsArgs {
    /// Script to speak (at least 15 characters); bracketed lists expand
    #[arg(short, long)]
    pub text: String,

    /// Voice id or bracketed list of voice ids
    #[arg(short, long)]
    pub voice_id: String,

    /// Locale code of the script
    #[arg(long, default_value = DEFAULT_SPEECH_LOCALE)]
    pub locale: String,

    /// Output filename template ({model} is the voice id, {n}, {datetime}, ...)
    #[arg(short, long, default_value = DEFAULT_SPEECH_OUTPUT)]
    pub output: String,

    #[command(flatten)]
    pub batch: BatchArgs,
}

/// Arguments for the similar-image command.
#[derive(clap::Args, Debug, Clone)]
pub struct SimilarImageArgs {
    /// Source image path or URL
    #[arg(short, long)]
    pub input: String,

    /// Model or bracketed list of models (image3, image4, ultra, ...)
    #[arg(short, long, default_value = DEFAULT_IMAGE_MODEL)]
    pub model: String,

    /// Named size (square, landscape, 16:9, ...) or WIDTHxHEIGHT
    #[arg(short, long)]
    pub size: Option<String>,

    /// Comma-separated seeds sent with every request (at most 4)
    #[arg(long, value_delimiter = ',')]
    pub seeds: Vec<u64>,

    /// Output filename template ({model}, {n}, {datetime}, {dimensions}, ...)
    #[arg(short, long, default_value = DEFAULT_SIMILAR_OUTPUT)]
    pub output: String,

    #[command(flatten)]
    pub batch: BatchArgs,
}

/// Parse CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI with parsed arguments.
pub async fn run() -> anyhow::Result<()> {
    let cli = parse_cli();
    run_with_cli(cli).await
}

/// Run the CLI with already-parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Image(args) => run_image_command(args).await,
        Commands::Video(args) => run_video_command(args).await,
        Commands::Tts(args) => run_tts_command(args).await,
        Commands::SimilarImage(args) => run_similar_image_command(args).await,
    }
}

async fn run_image_command(args: ImageArgs) -> anyhow::Result<()> {
    let mut inputs = VariationInputs::new(&args.prompt, &args.model).with_iterations(args.batch.iterations);
    if let Some(style) = &args.style_reference {
        inputs = inputs.with_style_reference(style);
    }
    if let Some(composition) = &args.composition_reference {
        inputs = inputs.with_composition_reference(composition);
    }

    let matrix =
        TaskMatrix::expand_with(&inputs, normalize_model_name).context("Invalid batch parameters")?;

    let size = match &args.size {
        Some(value) => Some(resolve_image_size(value, matrix.tasks())?),
        None => None,
    };

    let content_class: ContentClass = args.content_class.parse()?;
    let options = ImageOptions {
        content_class,
        negative_prompt: args.negative_prompt.clone(),
        locale: args.locale.clone(),
        size,
        seeds: args.seeds.clone(),
        visual_intensity: args.visual_intensity,
        style_strength: args.style_strength,
        composition_strength: args.composition_strength,
        ..ImageOptions::default()
    };
    let operation = ImageOperation::new(options).context("Invalid image options")?;

    let context = RenderContext::now()
        .with_seeds(args.seeds.clone())
        .with_size(size);

    run_batch(operation, matrix, &args.output, &args.batch, context).await
}

/// Prompt variations times model versions times iterations.
fn video_matrix(args: &VideoArgs) -> anyhow::Result<TaskMatrix> {
    let inputs =
        VariationInputs::new(&args.prompt, &args.model_version).with_iterations(args.batch.iterations);
    TaskMatrix::expand(&inputs).context("Invalid batch parameters")
}

async fn run_video_command(args: VideoArgs) -> anyhow::Result<()> {
    let matrix = video_matrix(&args)?;

    let size = parse_video_size(&args.size)?;
    let options = VideoOptions::default().with_size(size);

    let context = RenderContext::now().with_size(Some(size));

    run_batch(VideoOperation::new(options), matrix, &args.output, &args.batch, context).await
}

/// Script variations times voices times iterations.
fn speech_matrix(args: &TtsArgs) -> anyhow::Result<TaskMatrix> {
    let inputs = VariationInputs::new(&args.text, &args.voice_id).with_iterations(args.batch.iterations);
    TaskMatrix::expand(&inputs).context("Invalid batch parameters")
}

async fn run_tts_command(args: TtsArgs) -> anyhow::Result<()> {
    let matrix = speech_matrix(&args)?;
    let operation = SpeechOperation::new(SpeechOptions::default().with_locale(&args.locale));
    operation
        .check_tasks(matrix.tasks())
        .context("Invalid speech script")?;

    run_batch(operation, matrix, &args.output, &args.batch, RenderContext::now()).await
}

/// Models times iterations; the source image is shared by every task.
fn similar_image_matrix(args: &SimilarImageArgs) -> anyhow::Result<TaskMatrix> {
    let inputs = VariationInputs::new("", &args.model).with_iterations(args.batch.iterations);
    TaskMatrix::expand_with(&inputs, normalize_model_name).context("Invalid batch parameters")
}

async fn run_similar_image_command(args: SimilarImageArgs) -> anyhow::Result<()> {
    let matrix = similar_image_matrix(&args)?;
    let size = match &args.size {
        Some(value) => Some(resolve_image_size(value, matrix.tasks())?),
        None => None,
    };

    let options = SimilarImageOptions {
        size,
        seeds: args.seeds.clone(),
        ..SimilarImageOptions::new(&args.input)
    };
    let operation = SimilarImageOperation::new(options).context("Invalid similar-image options")?;
    let context = RenderContext::now()
        .with_seeds(args.seeds.clone())
        .with_size(size);

    run_batch(operation, matrix, &args.output, &args.batch, context).await
}

/// Validates `value` against every model in the batch. The first model's
/// dimensions are used for the request.
fn resolve_image_size(value: &str, tasks: &[TaskSpec]) -> anyhow::Result<Dimensions> {
    let mut resolved = None;
    for task in tasks {
        let dims = parse_image_size(value, &task.model)
            .with_context(|| format!("Size '{}' is not available for {}", value, display_name(&task.model)))?;
        resolved.get_or_insert(dims);
    }
    resolved.context("Batch has no tasks")
}

async fn run_batch<O: Operation>(
    operation: O,
    matrix: TaskMatrix,
    output: &str,
    args: &BatchArgs,
    context: RenderContext,
) -> anyhow::Result<()> {
    if !args.json {
        print_task_table(&matrix);
    }

    if args.dry_run {
        info!(tasks = matrix.len(), "Dry run, nothing submitted");
        return Ok(());
    }

    let mut config = BatchConfig::from_env().context("Invalid batch configuration")?;
    if let Some(concurrency) = args.concurrency {
        config = config.with_concurrency(concurrency);
    }
    config.validate().context("Invalid batch configuration")?;

    if args.metrics_out.is_some() {
        init_metrics().context("Failed to initialize metrics")?;
    }

    let credentials = Credentials::from_env().context("Missing API credentials")?;
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("Failed to build HTTP client")?;
    let token = credentials
        .access_token(&http, IMS_TOKEN_URL)
        .await
        .context("Failed to obtain access token")?;

    let api: Arc<dyn JobApi> = Arc::new(FireflyClient::new(credentials.client_id.clone(), token)?);
    let uploader: Arc<dyn Uploader> = match &config.storage {
        StorageConfig::Local => Arc::new(LocalFileUploader),
        StorageConfig::AzureSas(url) => Arc::new(AzureSasUploader::new(url)?),
    };

    let limiter = Arc::new(RateLimiter::new(config.rate_limit));
    let poller = JobStatusPoller::new(Arc::clone(&api))
        .with_limiter(config.rate_limit_polls.then(|| Arc::clone(&limiter)))
        .with_retry(config.retry)
        .with_interval(config.poll_interval);

    let unit = RemoteJobUnit::new(
        operation,
        api,
        limiter,
        OutputTemplate::new(output, args.overwrite, context).with_variation_suffix(!args.literal_output),
    )
    .with_uploader(uploader)
    .with_retry(config.retry)
    .with_poller(poller);

    let dispatch = config
        .dispatch_config()
        .with_retry_failed(!args.no_retry)
        .with_retry_remote_failures(!args.no_retry_remote_failures);

    info!(
        tasks = matrix.len(),
        concurrency = dispatch.concurrency,
        max_calls = config.rate_limit.max_calls,
        period_secs = config.rate_limit.period.as_secs(),
        "Starting batch"
    );

    let report = TaskDispatcher::new(dispatch)
        .run(matrix.into_tasks(), Arc::new(unit))
        .await;

    if let Some(path) = &args.metrics_out {
        std::fs::write(path, export_metrics())
            .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    if !report.is_success() {
        anyhow::bail!("{} of {} tasks failed", report.failed, report.total);
    }

    Ok(())
}

fn print_task_table(matrix: &TaskMatrix) {
    println!(
        "{:<4} {:<16} {:<width$} {:<20} {:<20}",
        "#",
        "Model",
        "Prompt",
        "Style Ref",
        "Comp Ref",
        width = PROMPT_COLUMN_WIDTH
    );
    for task in matrix.tasks() {
        println!("{}", task_row(task));
    }

    let axes = matrix.axes();
    println!();
    println!(
        "{} tasks: {} model(s) x {} style ref(s) x {} composition ref(s) x {} prompt(s) x {} iteration(s)",
        axes.total(),
        axes.models,
        axes.style_references,
        axes.composition_references,
        axes.prompts,
        axes.iterations
    );
    println!();
}

fn task_row(task: &TaskSpec) -> String {
    format!(
        "{:<4} {:<16} {:<width$} {:<20} {:<20}",
        task.sequence + 1,
        display_name(&task.model),
        truncate(&task.prompt, PROMPT_COLUMN_WIDTH),
        truncate(task.style_reference.as_deref().unwrap_or("-"), 20),
        truncate(task.composition_reference.as_deref().unwrap_or("-"), 20),
        width = PROMPT_COLUMN_WIDTH
    )
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let kept: String = value.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept)
}

fn summary_headline(report: &BatchReport) -> String {
    format!(
        "Completed {} of {} tasks successfully ({:.0}%)",
        report.succeeded,
        report.total,
        report.success_rate() * 100.0
    )
}

fn print_summary(report: &BatchReport) {
    println!();
    println!("Batch {}", report.batch_id);
    println!("{}", summary_headline(report));
    if report.recovered > 0 {
        println!("  {} recovered on retry", report.recovered);
    }
    println!("  Duration: {:.1}s", report.duration_ms as f64 / 1000.0);

    for outcome in report.outcomes.iter().filter(|o| o.success) {
        if let Some(path) = &outcome.output_path {
            println!("  [{}] {}", outcome.sequence + 1, path.display());
        }
    }

    let failures: Vec<_> = report.failures().collect();
    if !failures.is_empty() {
        println!();
        println!("Failed tasks:");
        for outcome in failures {
            let reason = outcome.error.as_deref().unwrap_or("unknown error");
            warn!(sequence = outcome.sequence, task = %outcome.task, error = reason, "Task failed");
            println!("  [{}] {}: {}", outcome.sequence + 1, outcome.task, reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_image_command_defaults() {
        let cli = Cli::try_parse_from(["batchforge", "image", "-p", "a cat"]).expect("should parse");

        match cli.command {
            Commands::Image(args) => {
                assert_eq!(args.prompt, "a cat");
                assert_eq!(args.model, DEFAULT_IMAGE_MODEL);
                assert_eq!(args.output, DEFAULT_IMAGE_OUTPUT);
                assert_eq!(args.style_strength, DEFAULT_REFERENCE_STRENGTH);
                assert_eq!(args.content_class, "photo");
                assert!(args.seeds.is_empty());
                assert_eq!(args.batch.iterations, 1);
                assert!(args.batch.concurrency.is_none());
                assert!(!args.batch.no_retry);
                assert!(!args.batch.json);
                assert!(!args.batch.literal_output);
            }
            _ => panic!("Expected Image command"),
        }
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_image_command_with_all_options() {
        let cli = Cli::try_parse_from([
            "batchforge",
            "image",
            "-p",
            "a [cat,dog]",
            "-m",
            "[image3,ultra]",
            "--sref",
            "style.png",
            "--composition-reference",
            "comp.png",
            "-n",
            "3",
            "--seeds",
            "1,2",
            "--size",
            "16:9",
            "--visual-intensity",
            "7",
            "-c",
            "2",
            "--no-retry-remote-failures",
            "--json",
            "-l",
            "debug",
        ])
        .expect("should parse");

        match cli.command {
            Commands::Image(args) => {
                assert_eq!(args.style_reference.as_deref(), Some("style.png"));
                assert_eq!(args.composition_reference.as_deref(), Some("comp.png"));
                assert_eq!(args.batch.iterations, 3);
                assert_eq!(args.seeds, vec![1, 2]);
                assert_eq!(args.size.as_deref(), Some("16:9"));
                assert_eq!(args.visual_intensity, Some(7));
                assert_eq!(args.batch.concurrency, Some(2));
                assert!(args.batch.no_retry_remote_failures);
                assert!(args.batch.json);
            }
            _ => panic!("Expected Image command"),
        }
        assert_eq!(cli.log_level, "debug");
    }

    #[test]
    fn test_video_command_defaults() {
        let cli = Cli::try_parse_from(["batchforge", "video", "-p", "waves"]).expect("should parse");

        match cli.command {
            Commands::Video(args) => {
                assert_eq!(args.size, DEFAULT_VIDEO_SIZE);
                assert_eq!(args.model_version, DEFAULT_VIDEO_MODEL);
                assert_eq!(args.output, DEFAULT_VIDEO_OUTPUT);
            }
            _ => panic!("Expected Video command"),
        }
    }

    #[test]
    fn test_video_model_axis_reaches_request_headers() {
        let cli = Cli::try_parse_from([
            "batchforge",
            "video",
            "-p",
            "waves",
            "-m",
            "[video1_8_standard,video2_0_fast]",
        ])
        .expect("should parse");
        let Commands::Video(args) = cli.command else {
            panic!("Expected Video command");
        };

        let matrix = video_matrix(&args).expect("expand");
        let op = VideoOperation::default();
        let versions: Vec<String> = matrix
            .tasks()
            .iter()
            .map(|task| op.build_request(task, &Default::default()).headers[0].1.clone())
            .collect();
        assert_eq!(versions, vec!["video1_8_standard", "video2_0_fast"]);
    }

    #[test]
    fn test_summary_headline_reports_success_rate() {
        use crate::error::JobError;
        use crate::scheduler::TaskOutcome;

        let inputs = VariationInputs::new("a [cat,dog,owl,fox]", "image3");
        let tasks = TaskMatrix::expand(&inputs).expect("expand").into_tasks();
        let outcomes = tasks
            .into_iter()
            .map(|task| {
                if task.sequence == 3 {
                    TaskOutcome::failure(task, &JobError::from_status(400, "bad"), 2, Duration::ZERO)
                } else {
                    TaskOutcome::success(task, PathBuf::from("out.png"), 1, Duration::ZERO)
                }
            })
            .collect();
        let report = BatchReport::new(chrono::Utc::now(), outcomes, 1, Duration::ZERO);

        assert_eq!(summary_headline(&report), "Completed 3 of 4 tasks successfully (75%)");
    }

    #[test]
    fn test_tts_voice_axis() {
        let cli = Cli::try_parse_from([
            "batchforge",
            "tts",
            "-t",
            "Welcome to the quarterly update",
            "-v",
            "[v-101,v-202]",
            "-n",
            "2",
        ])
        .expect("should parse");
        let Commands::Tts(args) = cli.command else {
            panic!("Expected Tts command");
        };
        assert_eq!(args.locale, DEFAULT_SPEECH_LOCALE);
        assert_eq!(args.output, DEFAULT_SPEECH_OUTPUT);

        let matrix = speech_matrix(&args).expect("expand");
        let voices: Vec<&str> = matrix.tasks().iter().map(|t| t.model.as_str()).collect();
        assert_eq!(voices, vec!["v-101", "v-101", "v-202", "v-202"]);

        let op = SpeechOperation::default();
        assert!(op.check_tasks(matrix.tasks()).is_ok());
        let request = op.build_request(&matrix.tasks()[2], &Default::default());
        assert_eq!(request.body["voiceId"], "v-202");
    }

    #[test]
    fn test_tts_alias_and_required_voice() {
        assert!(Cli::try_parse_from(["batchforge", "speech", "-t", "hello there everyone", "-v", "v1"]).is_ok());
        assert!(Cli::try_parse_from(["batchforge", "tts", "-t", "hello there everyone"]).is_err());
    }

    #[test]
    fn test_similar_image_models_times_iterations() {
        let cli = Cli::try_parse_from([
            "batchforge",
            "sim",
            "-i",
            "photo.jpg",
            "-m",
            "[image3,ultra]",
            "-n",
            "3",
        ])
        .expect("should parse");
        let Commands::SimilarImage(args) = cli.command else {
            panic!("Expected SimilarImage command");
        };
        assert_eq!(args.output, DEFAULT_SIMILAR_OUTPUT);

        let matrix = similar_image_matrix(&args).expect("expand");
        assert_eq!(matrix.len(), 6);
        assert_eq!(matrix.tasks()[3].model, "image4_ultra");
    }

    #[test]
    fn test_prompt_is_required() {
        assert!(Cli::try_parse_from(["batchforge", "image"]).is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a much longer value", 10), "a much ...");
        assert_eq!(truncate("a much longer value", 10).chars().count(), 10);
    }

    #[test]
    fn test_resolve_image_size_checks_every_model() {
        let inputs = VariationInputs::new("a cat", "[image3,image4]");
        let matrix = TaskMatrix::expand_with(&inputs, normalize_model_name).expect("expand");

        let dims = resolve_image_size("square", matrix.tasks()).expect("square exists for both");
        assert_eq!(dims, Dimensions::new(2048, 2048));
        assert!(resolve_image_size("not-a-size", matrix.tasks()).is_err());
        assert!(resolve_image_size("square", &[]).is_err());
    }

    #[tokio::test]
    async fn test_dry_run_submits_nothing() {
        let cli = Cli::try_parse_from(["batchforge", "video", "-p", "a [cat,dog]", "--dry-run"])
            .expect("should parse");
        run_with_cli(cli).await.expect("dry run succeeds without credentials");
    }
}
