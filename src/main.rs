fn main() -> anyhow::Result<()> {
    eventpulse::logging::init()?;
    eventpulse::cli::run()
}
