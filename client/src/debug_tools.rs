//! Debug/performance tooling for native dev builds.
//!
//! Adds Bevy's diagnostics with the perf overlay, plus a streaming readout (live tiles,
//! road segments, boosts and physics bodies) toggled with F3.

use crate::session::{FrameSet, Session};
use bevy::diagnostic::{
    EntityCountDiagnosticsPlugin, FrameTimeDiagnosticsPlugin, SystemInformationDiagnosticsPlugin,
};
use bevy::prelude::*;
use bevy::render::diagnostic::RenderDiagnosticsPlugin;
use iyes_perf_ui::prelude::*;

#[derive(Component)]
struct StreamStatsText;

pub(super) fn plugin(app: &mut App) {
    app.add_plugins((
        FrameTimeDiagnosticsPlugin::default(),
        EntityCountDiagnosticsPlugin::default(),
        SystemInformationDiagnosticsPlugin::default(),
        RenderDiagnosticsPlugin,
        PerfUiPlugin,
    ));

    app.add_systems(Startup, (spawn_perf_ui, spawn_stream_stats));
    app.add_systems(
        Update,
        (
            toggle_stream_stats,
            update_stream_stats.run_if(resource_exists::<Session>),
        )
            .in_set(FrameSet::Present),
    );
}

fn spawn_perf_ui(mut commands: Commands) {
    commands.spawn(PerfUiAllEntries::default());
}

fn spawn_stream_stats(mut commands: Commands) {
    commands.spawn((
        StreamStatsText,
        Text::default(),
        TextFont {
            font_size: 14.0,
            ..default()
        },
        TextColor(Color::srgb(1.0, 1.0, 0.6)),
        Node {
            position_type: PositionType::Absolute,
            left: Val::Px(12.0),
            bottom: Val::Px(12.0),
            ..default()
        },
        Visibility::Hidden,
    ));
}

fn toggle_stream_stats(
    keys: Res<ButtonInput<KeyCode>>,
    mut stats: Single<&mut Visibility, With<StreamStatsText>>,
) {
    if keys.just_pressed(KeyCode::F3) {
        stats.toggle_visible_hidden();
    }
}

fn update_stream_stats(session: Res<Session>, mut text: Single<&mut Text, With<StreamStatsText>>) {
    let streamer = session.inner.streamer();
    let world = session.inner.world();
    let report = &session.last_report;
    text.0 = format!(
        "tiles {} | roads {} | boosts {} | bodies {} | colliders {} | proxies {} | substeps {}",
        streamer.tile_count(),
        streamer.road_count(),
        streamer.boost_count(),
        world.body_count(),
        world.collider_count(),
        session.inner.sync().proxy_count(),
        report.substeps,
    );
}
