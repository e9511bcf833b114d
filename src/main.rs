use deep_engine::RenderSettings;

fn main() {
    if let Err(err) = deep_engine::run(RenderSettings::load()) {
        eprintln!("Application error: {err}");
    }
}
