#[tokio::main]
async fn main() {
    if let Err(e) = rxhub::run().await {
        tracing::error!("rxhub failed: {e}");
        eprintln!("rxhub failed: {e}");
        std::process::exit(1);
    }
}
