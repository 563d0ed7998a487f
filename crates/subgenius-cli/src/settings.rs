use clap::Subcommand;

use crate::context::Context;
use crate::output::print_json;

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Print the effective settings as JSON
    Show,
    /// Print the settings file location
    Path,
    /// Delete the settings file and restore defaults
    Reset,
}

pub fn run(action: SettingsAction, ctx: &Context) -> anyhow::Result<()> {
    let manager = ctx.settings_manager();

    match action {
        SettingsAction::Show => print_json(&manager.load()),
        SettingsAction::Path => {
            if ctx.json {
                print_json(&serde_json::json!({ "path": manager.settings_path() }))
            } else {
                println!("{}", manager.settings_path().display());
                Ok(())
            }
        }
        SettingsAction::Reset => {
            let settings = manager.reset()?;
            if ctx.json {
                print_json(&settings)
            } else {
                println!("Settings reset to defaults");
                Ok(())
            }
        }
    }
}
