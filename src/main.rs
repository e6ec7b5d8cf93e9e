use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    pncp_tracker::run().await
}
