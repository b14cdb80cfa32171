#[tokio::main]
async fn main() -> anyhow::Result<()> {
    noisedash_lib::run().await
}
