fn main() -> anyhow::Result<()> {
    til_notes::cli::run()
}
