// Support configuring Bevy lints within code.
#![cfg_attr(bevy_lint, feature(register_tool), register_tool(bevy))]
// Disable console on Windows for non-dev builds.
#![cfg_attr(not(feature = "dev"), windows_subsystem = "windows")]

#[cfg(feature = "dev_native")]
mod debug_tools;

mod camera;
mod cli;
mod hud;
mod input;
mod module_bindings;
mod room;
mod scene;
mod server;
mod session;

use bevy::prelude::*;

fn main() -> AppExit {
    App::new().add_plugins(AppPlugin).run()
}

pub struct AppPlugin;
impl Plugin for AppPlugin {
    fn build(&self, app: &mut App) {
        let options = cli::LaunchOptions::from_env();

        app.add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Window {
                title: "Drift Road".to_string(),
                fit_canvas_to_parent: true,
                ..default()
            }
            .into(),
            ..default()
        }));

        if !options.offline {
            server::plugin(app, &options);
        }
        app.insert_resource(options);

        app.add_plugins((
            session::plugin,
            scene::plugin,
            input::plugin,
            camera::plugin,
            hud::plugin,
        ));

        #[cfg(feature = "dev_native")]
        app.add_plugins(debug_tools::plugin);
    }
}
