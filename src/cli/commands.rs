use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "shopchat")]
#[command(author, version, about = "Chat with the shopping assistant from your terminal", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a single message, optionally with an image
    Chat {
        message: Option<String>,

        /// Image to search by (resized and compressed before upload)
        #[arg(short, long)]
        image: Option<PathBuf>,
    },

    /// Start an interactive chat session
    Interactive {
        /// Save the conversation under this name and resume it next time
        #[arg(short, long)]
        transcript: Option<String>,

        /// Directory for saved transcripts (default: "./transcripts")
        #[arg(long, default_value = "./transcripts")]
        storage_dir: PathBuf,
    },

    /// List saved transcripts, or delete one
    Transcripts {
        /// Directory for saved transcripts (default: "./transcripts")
        #[arg(long, default_value = "./transcripts")]
        storage_dir: PathBuf,

        /// Delete the transcript with this name
        #[arg(short, long)]
        delete: Option<String>,
    },

    /// List the product catalog
    Products {
        /// Only show the first N products
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Check whether the backend is ready
    Health {
        /// Enable continuous monitoring (refresh every N seconds)
        #[arg(short, long)]
        watch: Option<u64>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_with_image() {
        let cli = Cli::try_parse_from(["shopchat", "chat", "--image", "shoe.png", "shoes"]).unwrap();
        match cli.command {
            Commands::Chat { message, image } => {
                assert_eq!(message.as_deref(), Some("shoes"));
                assert_eq!(image, Some(PathBuf::from("shoe.png")));
            }
            _ => panic!("expected chat"),
        }
    }

    #[test]
    fn test_parse_transcripts_delete() {
        let cli = Cli::try_parse_from(["shopchat", "transcripts", "--delete", "shoes"]).unwrap();
        match cli.command {
            Commands::Transcripts { storage_dir, delete } => {
                assert_eq!(storage_dir, PathBuf::from("./transcripts"));
                assert_eq!(delete.as_deref(), Some("shoes"));
            }
            _ => panic!("expected transcripts"),
        }
    }
}
