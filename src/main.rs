use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use reel_gen::{
    audio::{chimege::ChimegeClient, structs::audio_result::AudioResult},
    errors::constants::{
        AUDIO_FOLDER, DEFAULT_DURATION_SECONDS, DEFAULT_GENRE, DEFAULT_LANGUAGE, DEFAULT_PITCH,
        DEFAULT_SAMPLE_RATE, DEFAULT_SPEED, DEFAULT_VOICE_ID,
    },
    image::{
        magic_hour::MagicHourClient,
        structs::generated_image::{BatchStats, GeneratedImage},
    },
    script::{groq::GroqClient, structs::scene::Scene},
    storage::cloudinary::CloudinaryStore,
    trace::init_tracing_subscriber,
    AudioSynthesizer, BatchFailurePolicy, Config, ImageGenerator, ObjectStore, ScriptDocument,
    ScriptGenerator, ScriptOptions, SynthesisOptions, TextNormalizer,
};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "reel-gen")]
#[command(about = "Generate short-form reels: script, scene images and narration", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a scene-by-scene script for a topic
    Script {
        #[arg(short, long)]
        topic: String,

        #[command(flatten)]
        script: ScriptArgs,

        /// Write the script JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Rewrite one scene of an existing script file in place
    Regenerate {
        /// Script JSON produced by `script`
        #[arg(short, long)]
        script: PathBuf,

        /// Zero-based scene index
        #[arg(short, long)]
        index: usize,

        /// Prompt sent instead of the built-in rewrite instruction
        #[arg(short, long)]
        prompt: Option<String>,

        /// Also generate a fresh image for the rewritten scene
        #[arg(long)]
        image: bool,
    },

    /// Generate one image per scene of a script file
    Images {
        #[arg(short, long)]
        script: PathBuf,

        /// Parallel group size; sequential when omitted
        #[arg(short, long)]
        batch: Option<usize>,

        /// Keep empty entries for failed scenes in batch mode
        #[arg(long)]
        keep_failed: bool,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Synthesize narration audio
    Audio {
        #[arg(short, long)]
        text: Option<String>,

        #[arg(short, long)]
        file: Option<PathBuf>,

        #[command(flatten)]
        voice: VoiceArgs,

        #[arg(short, long, default_value = "narration.wav")]
        output: PathBuf,

        /// Upload to object storage and print the URL
        #[arg(long)]
        upload: bool,
    },

    /// Show how narration text is cleaned before synthesis
    Clean {
        #[arg(short, long)]
        text: String,
    },

    /// Script, images and narration in one go
    Run {
        #[arg(short, long)]
        topic: String,

        #[command(flatten)]
        script: ScriptArgs,

        #[command(flatten)]
        voice: VoiceArgs,

        /// Parallel group size for images; sequential when omitted
        #[arg(short, long)]
        batch: Option<usize>,

        /// Working directory for generated files
        #[arg(short = 'w', long, default_value = "./output")]
        work_dir: PathBuf,

        #[arg(long)]
        upload: bool,
    },
}

#[derive(Args, Debug)]
struct ScriptArgs {
    /// Reel length in seconds
    #[arg(short, long, default_value_t = DEFAULT_DURATION_SECONDS)]
    duration: u32,

    #[arg(short, long, default_value = DEFAULT_GENRE)]
    genre: String,

    #[arg(short, long, default_value = DEFAULT_LANGUAGE)]
    language: String,
}

impl From<ScriptArgs> for ScriptOptions {
    fn from(args: ScriptArgs) -> Self {
        Self {
            duration_seconds: args.duration,
            genre: args.genre,
            language: args.language,
        }
    }
}

#[derive(Args, Debug)]
struct VoiceArgs {
    #[arg(long, default_value = DEFAULT_VOICE_ID)]
    voice: String,

    #[arg(long, default_value_t = DEFAULT_SPEED)]
    speed: f32,

    #[arg(long, default_value_t = DEFAULT_PITCH)]
    pitch: f32,

    #[arg(long, default_value_t = DEFAULT_SAMPLE_RATE)]
    sample_rate: u32,
}

impl From<VoiceArgs> for SynthesisOptions {
    fn from(args: VoiceArgs) -> Self {
        Self {
            voice_id: args.voice,
            speed: args.speed,
            pitch: args.pitch,
            sample_rate: args.sample_rate,
        }
    }
}

/// Generators wired to the upstream clients, each built once.
struct Services {
    scripts: ScriptGenerator,
    images: ImageGenerator,
    audio: AudioSynthesizer,
    store: Option<Arc<dyn ObjectStore>>,
}

impl Services {
    fn new(config: &Config, failure_policy: BatchFailurePolicy) -> anyhow::Result<Self> {
        let time_unit = config.time_unit();

        let groq = Arc::new(GroqClient::new(&config.groq_api_key, &config.groq_model));
        let magic_hour = Arc::new(MagicHourClient::new(&config.magic_hour_api_key));
        let chimege = Arc::new(
            ChimegeClient::new(&config.chimege_token, time_unit)
                .context("Failed to create speech client")?,
        );
        let store = config
            .cloudinary
            .clone()
            .map(|cloudinary| Arc::new(CloudinaryStore::new(cloudinary)) as Arc<dyn ObjectStore>);

        Ok(Self {
            scripts: ScriptGenerator::new(groq),
            images: ImageGenerator::new(magic_hour)
                .with_time_unit(time_unit)
                .with_failure_policy(failure_policy),
            audio: AudioSynthesizer::new(chimege).with_time_unit(time_unit),
            store,
        })
    }

    fn store(&self) -> anyhow::Result<&dyn ObjectStore> {
        match &self.store {
            Some(store) => Ok(store.as_ref()),
            None => bail!("Upload requested but CLOUDNAME, CLOUD_API_KEY and CLOUD_API_SECRET are not set"),
        }
    }
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

async fn print_or_write<T: Serialize>(output: Option<&Path>, value: &T) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            write_json(path, value).await?;
            info!("Wrote {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}

async fn read_script(path: &Path) -> anyhow::Result<ScriptDocument> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read script: {}", path.display()))?;
    let value = serde_json::from_str(&content)
        .with_context(|| format!("Script is not valid JSON: {}", path.display()))?;
    Ok(ScriptDocument::from_value(value)?)
}

async fn generate_images(
    services: &Services,
    document: &ScriptDocument,
    batch: Option<usize>,
) -> anyhow::Result<Vec<GeneratedImage>> {
    let images = match batch {
        Some(batch_size) => {
            services
                .images
                .generate_batch(&document.scenes, &document.background_images, batch_size)
                .await?
        }
        None => {
            services
                .images
                .generate_from_script(&document.scenes, &document.background_images)
                .await
        }
    };

    let stats = BatchStats::from_results(document.scenes.len(), &images);
    info!(
        total = stats.total,
        successful = stats.successful,
        failed = stats.failed,
        "Image generation finished"
    );
    Ok(images)
}

async fn write_audio(path: &Path, audio: &AudioResult) -> anyhow::Result<()> {
    tokio::fs::write(path, &audio.buffer)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!(size = audio.len(), "Wrote {}", path.display());
    Ok(())
}

fn print_cleaning_report(text: &str) -> anyhow::Result<()> {
    let report = TextNormalizer::new().inspect(text);
    if report.has_forbidden {
        warn!(chars = ?report.remaining_forbidden, "Cleaned text still has forbidden characters");
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run_command(command: Command, services: &Services) -> anyhow::Result<()> {
    match command {
        Command::Script {
            topic,
            script,
            output,
        } => {
            let document = services.scripts.generate(&topic, &script.into()).await?;
            print_or_write(output.as_deref(), &document).await?;
        }
        Command::Regenerate {
            script,
            index,
            prompt,
            image,
        } => {
            let mut document = read_script(&script).await?;
            let scene: Scene = services
                .scripts
                .regenerate_scene(&document, index, prompt.as_deref())
                .await?;
            document.scenes[index] = scene.clone();
            write_json(&script, &document).await?;
            println!("{}", serde_json::to_string_pretty(&scene)?);

            if image {
                let generated = services.images.regenerate(&scene, None).await?;
                println!("{}", serde_json::to_string_pretty(&generated)?);
            }
        }
        Command::Images {
            script,
            batch,
            keep_failed,
            output,
        } => {
            if keep_failed && batch.is_none() {
                info!("Sequential generation always keeps failed scenes");
            }
            let document = read_script(&script).await?;
            let images = generate_images(services, &document, batch).await?;
            print_or_write(output.as_deref(), &images).await?;
        }
        Command::Audio {
            text,
            file,
            voice,
            output,
            upload,
        } => {
            let narration = match (text, file) {
                (Some(text), _) => text,
                (None, Some(file)) => tokio::fs::read_to_string(&file)
                    .await
                    .with_context(|| format!("Failed to read file: {}", file.display()))?,
                (None, None) => bail!("Either --text or --file must be provided"),
            };
            let options: SynthesisOptions = voice.into();

            if upload {
                let url = services
                    .audio
                    .generate_and_upload(&narration, &options, services.store()?, AUDIO_FOLDER)
                    .await?;
                println!("{}", url);
            } else {
                let audio = services.audio.generate_from_script(&narration, &options).await?;
                write_audio(&output, &audio).await?;
            }
        }
        Command::Run {
            topic,
            script,
            voice,
            batch,
            work_dir,
            upload,
        } => {
            tokio::fs::create_dir_all(&work_dir)
                .await
                .context("Failed to create work directory")?;

            info!("Step 1/3: Generating script...");
            let document = services.scripts.generate(&topic, &script.into()).await?;
            write_json(&work_dir.join("script.json"), &document).await?;

            info!("Step 2/3: Generating images...");
            let images = generate_images(services, &document, batch).await?;
            write_json(&work_dir.join("images.json"), &images).await?;

            info!("Step 3/3: Generating narration...");
            let options: SynthesisOptions = voice.into();
            let narration = document.narration();
            if upload {
                let url = services
                    .audio
                    .generate_and_upload(&narration, &options, services.store()?, AUDIO_FOLDER)
                    .await?;
                println!("{}", url);
            } else {
                let audio = services.audio.generate_from_script(&narration, &options).await?;
                write_audio(&work_dir.join("narration.wav"), &audio).await?;
            }

            info!("Reel assets written to {}", work_dir.display());
        }
        Command::Clean { text } => print_cleaning_report(&text)?,
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Command::Clean { text } = &cli.command {
        let _guard = init_tracing_subscriber(&None)?;
        return print_cleaning_report(text);
    }

    let config = Config::load().context("Cannot load config")?;
    let _guard = init_tracing_subscriber(&config.otel_http_url)?;

    let failure_policy = match &cli.command {
        Command::Images {
            keep_failed: true, ..
        } => BatchFailurePolicy::Placeholder,
        _ => BatchFailurePolicy::Drop,
    };
    let services = Services::new(&config, failure_policy)?;
    run_command(cli.command, &services).await
}
