use portal_scene::Settings;

fn main() -> anyhow::Result<()> {
    portal_scene::run(Settings::default())
}
