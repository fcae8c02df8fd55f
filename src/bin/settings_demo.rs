use rapport::app::App;
use rapport::settings::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load settings from the default location
    let project_settings = parse_settings(None)?;
    println!("Loaded settings: {:?}", project_settings);

    // Attempt to load from an invalid path (expected to fail)
    let is_err = parse_settings(Some("")).is_err();
    println!("Error on invalid path: {:?}", is_err);

    // Load from a custom path and wire the services from it
    // $ cargo run --bin settings_demo -- --settings=settings/release.toml
    let cli = Cli::parse();
    let project_settings = parse_settings(cli.settings.as_deref())?;
    let app = App::try_new(&project_settings).await?;
    println!(
        "Wired {} backend, profile page size {:?}",
        project_settings.store.backend, app.profile_page_size
    );

    Ok(())
}
