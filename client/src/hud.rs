//! Telemetry readout and the jump leaderboard.

use crate::session::{FrameSet, Session};
use bevy::prelude::*;
use std::fmt::Write;

#[derive(Component)]
struct TelemetryText;

#[derive(Component)]
struct LeaderboardText;

pub(super) fn plugin(app: &mut App) {
    app.add_systems(Startup, spawn_hud);
    app.add_systems(
        Update,
        (update_telemetry, update_leaderboard)
            .run_if(resource_exists::<Session>)
            .in_set(FrameSet::Present),
    );
}

fn hud_text(commands: &mut Commands, node: Node) -> EntityCommands<'_> {
    commands.spawn((
        Text::default(),
        TextFont {
            font_size: 18.0,
            ..default()
        },
        TextColor(Color::WHITE),
        node,
    ))
}

fn spawn_hud(mut commands: Commands) {
    hud_text(
        &mut commands,
        Node {
            position_type: PositionType::Absolute,
            left: Val::Px(12.0),
            top: Val::Px(12.0),
            ..default()
        },
    )
    .insert(TelemetryText);

    hud_text(
        &mut commands,
        Node {
            position_type: PositionType::Absolute,
            right: Val::Px(12.0),
            top: Val::Px(12.0),
            ..default()
        },
    )
    .insert(LeaderboardText);
}

fn update_telemetry(session: Res<Session>, mut text: Single<&mut Text, With<TelemetryText>>) {
    let t = session.inner.telemetry();
    let mut out = String::new();
    let _ = writeln!(out, "Speed: {:.0} km/h", session.last_report.speed_kmh);
    let _ = writeln!(out, "Distance: {:.0} m", t.distance_traveled);
    let _ = writeln!(out, "Height: {:.1} m", t.current_height);
    let _ = writeln!(out, "Air time: {:.1} s", t.current_air_time);
    let _ = writeln!(out, "Boost: x{:.2}", t.acceleration_modifier);
    let _ = writeln!(out, "Top speed: {:.0} km/h", t.top_speed_kmh);
    let _ = write!(
        out,
        "Best jump: {:.1} m / {:.1} s",
        t.max_height, t.max_air_time
    );
    text.0 = out;
}

fn update_leaderboard(session: Res<Session>, mut text: Single<&mut Text, With<LeaderboardText>>) {
    let mut out = String::from("Highest jumps\n");
    for (rank, entry) in session.leaderboard.iter().enumerate() {
        let marker = if entry.is_local { " (you)" } else { "" };
        let _ = writeln!(
            out,
            "{}. {}{marker}: {}",
            rank + 1,
            entry.username,
            entry.summary()
        );
    }
    text.0 = out;
}
