use kconfig::Kconfig;

pub fn run(prefix: &str) -> anyhow::Result<()> {
    let kconfig = Kconfig::load()?;
    for nickname in kconfig.nicknames.keys() {
        if nickname.starts_with(prefix) {
            println!("{nickname}");
        }
    }
    Ok(())
}
