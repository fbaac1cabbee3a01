use anyhow::Result;

pub fn execute() -> Result<()> {
    println!("drivecrawl version {}", env!("CARGO_PKG_VERSION"));
    Ok(())
}
