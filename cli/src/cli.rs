use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "easel", version, about = "Sketch-to-image generation from the command line")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Model to generate with. Overrides `model` in config.toml.
    #[arg(long, short = 'm', global = true)]
    pub model: Option<String>,

    /// Provider base URL. Overrides `base_url` in config.toml.
    #[arg(long = "base-url", global = true, value_name = "URL")]
    pub base_url: Option<String>,

    /// Print session events to stdout as JSONL.
    #[arg(long = "json", default_value_t = false, global = true)]
    pub json: bool,

    /// Specifies color settings for use in the output.
    #[arg(long = "color", value_enum, default_value_t = Color::Auto, global = true)]
    pub color: Color,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Turn a sketch and a prompt into an image.
    Generate(GenerateArgs),

    /// Store the provider API key. Reads it from stdin when --api-key is omitted.
    Login(LoginArgs),

    /// Remove the stored API key.
    Logout,

    /// Manage previously generated images.
    #[command(subcommand)]
    Images(ImagesCommand),
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// What to generate. Read from stdin when omitted or `-`.
    #[arg(value_name = "PROMPT")]
    pub prompt: Option<String>,

    /// PNG, JPEG or WebP sketch to start from. A blank canvas is used when omitted.
    #[arg(long, value_name = "FILE")]
    pub canvas: Option<PathBuf>,

    /// Where to write the generated image. Defaults to a name derived from the prompt.
    #[arg(long, short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Draw the generated image onto the canvas and write the result here.
    #[arg(long, value_name = "FILE")]
    pub commit: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    #[arg(long = "api-key", value_name = "KEY")]
    pub api_key: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum ImagesCommand {
    /// List stored images, oldest first.
    List,

    /// Write a stored image to disk.
    Save {
        id: String,

        #[arg(long, short = 'o', value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Forget one stored image.
    Remove { id: String },

    /// Forget every stored image.
    Clear,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum Color {
    Always,
    Never,
    #[default]
    Auto,
}
