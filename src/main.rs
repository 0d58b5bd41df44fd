#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    router_cli::cli::run().await
}
