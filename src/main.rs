fn main() -> anyhow::Result<()> {
    solvestat::run()?;
    Ok(())
}
