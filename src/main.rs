#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = quizdeck::run().await {
        eprintln!("quizdeck fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
