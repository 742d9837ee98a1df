/// Dialog CLI client
fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    dialog_core::cli_app::run(args)
}
