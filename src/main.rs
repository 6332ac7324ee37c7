#[tokio::main]
async fn main() -> anyhow::Result<()> {
    output_bridge_lib::run().await
}
