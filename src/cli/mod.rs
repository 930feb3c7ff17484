pub mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "places")]
#[command(about = "Places CLI - administration for the Places API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "User management (requires DATABASE_URL)")]
    User {
        #[command(subcommand)]
        cmd: commands::user::UserCommands,
    },

    #[command(about = "Issue a bearer token for a user id")]
    Token(commands::token::TokenArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let config = crate::config::config();

    match cli.command {
        Commands::User { cmd } => commands::user::handle(cmd, config, output_format).await,
        Commands::Token(args) => commands::token::handle(args, config, output_format),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_user_add() {
        let cli = Cli::try_parse_from(["places", "user", "add", "ada"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::User { cmd: commands::user::UserCommands::Add { ref name } } if name == "ada"
        ));
        assert_eq!(OutputFormat::from_cli(&cli), OutputFormat::Text);
    }

    #[test]
    fn parses_token_with_global_json_flag() {
        let id = uuid::Uuid::new_v4().to_string();
        let cli = Cli::try_parse_from(["places", "token", id.as_str(), "--name", "ada", "--json"]).unwrap();
        assert_eq!(OutputFormat::from_cli(&cli), OutputFormat::Json);
        match cli.command {
            Commands::Token(args) => {
                assert_eq!(args.user_id.to_string(), id);
                assert_eq!(args.name, "ada");
            }
            _ => panic!("expected token command"),
        }
    }
}
