#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    lib_pcv_editor::init().await
}
