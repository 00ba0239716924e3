fn main() {
    env_logger::init();
    log::info!("Linkboard starting up");

    if let Err(e) = linkboard::app::run() {
        log::error!("Fatal error: {e}");
        std::process::exit(1);
    }
}
