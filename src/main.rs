fn main() -> anyhow::Result<()> {
    humniz_lib::run()
}
