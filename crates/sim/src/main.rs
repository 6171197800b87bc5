fn main() -> anyhow::Result<()> {
    farmgate_observability::init();

    let config = farmgate_sim::SimConfig::from_env()?;
    tracing::info!(?config, "starting checkout simulation");

    let report = farmgate_sim::run(&config)?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.consistent() {
        anyhow::bail!("ledger and order lines disagree");
    }
    Ok(())
}
