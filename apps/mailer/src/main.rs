//! Mailer CLI - Entry Point

#[tokio::main]
async fn main() -> eyre::Result<()> {
    mailer_cli::run().await
}
