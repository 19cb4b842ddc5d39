use anyhow::Result;

#[tokio::main]
pub async fn main() -> Result<()> {
    balance_sentinel::start_monitor().await?;
    Ok(())
}
