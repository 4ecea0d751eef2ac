use anyhow::Result;

fn main() -> Result<()> {
    tsh::cli::run()
}
