use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    fahrensight::run().await
}
