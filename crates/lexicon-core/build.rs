const SETTINGS_PATH: &str = "src/default_settings.toml";
const SECTIONS: [&str; 4] = ["query", "tiers", "builder", "cache"];

fn main() {
    println!("cargo:rerun-if-changed={SETTINGS_PATH}");

    // Backs `Settings::default()`.
    let table = match include_str!("src/default_settings.toml").parse::<toml::Table>() {
        Ok(table) => table,
        Err(e) => panic!("{SETTINGS_PATH} contains invalid TOML: {e}"),
    };
    for section in SECTIONS {
        if !table.get(section).is_some_and(toml::Value::is_table) {
            panic!("{SETTINGS_PATH} is missing the [{section}] table");
        }
    }
}
