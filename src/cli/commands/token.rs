use clap::Args;
use serde_json::json;
use uuid::Uuid;

use crate::auth::{generate_jwt, Claims};
use crate::cli::OutputFormat;
use crate::config::AppConfig;

#[derive(Args)]
pub struct TokenArgs {
    #[arg(help = "User id the token authenticates")]
    pub user_id: Uuid,

    #[arg(long, default_value = "", help = "Display name carried in the token")]
    pub name: String,

    #[arg(long, help = "Lifetime in hours (defaults to SECURITY_JWT_EXPIRY_HOURS)")]
    pub hours: Option<u64>,
}

pub fn handle(args: TokenArgs, config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    let hours = args.hours.unwrap_or(config.security.jwt_expiry_hours);
    let claims = Claims::new(args.user_id, args.name, hours);
    let token = generate_jwt(&claims, &config.security.jwt_secret)?;

    match output_format {
        OutputFormat::Json => println!(
            "{}",
            json!({ "user_id": claims.user_id, "token": token, "expires_at": claims.exp })
        ),
        OutputFormat::Text => println!("{token}"),
    }
    Ok(())
}
