fn main() -> anyhow::Result<()> {
    famannot::cli::run()
}
