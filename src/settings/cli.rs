use super::Parser;

#[derive(Parser, Debug)]
#[command(about = "Walk two users through the friend-request lifecycle")]
pub struct Cli {
    #[arg(long)]
    pub settings: Option<String>,
    #[arg(long, default_value = "u1")]
    pub from: String,
    #[arg(long, default_value = "u2")]
    pub to: String,
}
