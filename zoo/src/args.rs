use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Zoo image prediction service
#[derive(Debug, Parser)]
#[command(name = "zoo", about = "Compare image generators side by side")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "zoo.toml", env = "ZOO_CONFIG")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve {
        /// Override the listen address
        #[arg(long, env = "ZOO_LISTEN")]
        listen: Option<SocketAddr>,
    },

    /// Run one submission and print its predictions as JSON lines
    Generate {
        #[arg(short, long)]
        prompt: String,

        /// Model names; the catalog's checked models when omitted
        #[arg(short, long = "model")]
        models: Vec<String>,

        /// Outputs per model
        #[arg(short = 'n', long, default_value_t = 1)]
        outputs: u32,

        #[arg(long)]
        anon_id: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_optional() {
        let args = Args::try_parse_from(["zoo", "--config", "custom.toml"]).unwrap();
        assert_eq!(args.config, PathBuf::from("custom.toml"));
        assert!(args.command.is_none());
    }

    #[test]
    fn generate_collects_models() {
        let args = Args::try_parse_from([
            "zoo", "generate", "--prompt", "a red fox", "-m", "DALL-E", "-m", "SDXL", "-n", "2",
        ])
        .unwrap();

        let Some(Command::Generate { prompt, models, outputs, anon_id }) = args.command else {
            panic!("expected generate");
        };
        assert_eq!(prompt, "a red fox");
        assert_eq!(models, ["DALL-E", "SDXL"]);
        assert_eq!(outputs, 2);
        assert!(anon_id.is_none());
    }
}
