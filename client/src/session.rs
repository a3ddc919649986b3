//! Owns the `SessionLoop` and runs it once per rendered frame.

use crate::cli::LaunchOptions;
use crate::input::FrameIntent;
use crate::module_bindings::DbConnection;
use crate::room::StdbRoom;
use crate::server::{PresenceDirty, SpacetimeDB};
use bevy::prelude::*;
use bevy_spacetimedb::StdbConnection;
use shared::{
    ClientId, FrameInput, FrameReport, GameConfig, LeaderboardEntry, MemoryHub, MemoryRoom,
    PresenceRoom, SessionLoop,
};

/// Ordering of the per-frame work inside `Update`.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameSet {
    Input,
    Simulate,
    Present,
}

#[derive(Resource)]
pub struct Session {
    pub inner: SessionLoop,
    started: bool,
    pub last_report: FrameReport,
    pub leaderboard: Vec<LeaderboardEntry>,
}

/// The in-process room used with `--offline`.
#[derive(Resource)]
pub struct OfflineRoom(pub MemoryRoom);

pub(super) fn plugin(app: &mut App) {
    app.configure_sets(
        Update,
        (FrameSet::Input, FrameSet::Simulate, FrameSet::Present).chain(),
    );
    app.add_systems(Startup, start_offline.run_if(is_offline));
    app.add_systems(
        Update,
        (
            drive_offline.run_if(resource_exists::<OfflineRoom>),
            drive_online.run_if(resource_exists::<StdbConnection<DbConnection>>),
        )
            .run_if(resource_exists::<Session>)
            .in_set(FrameSet::Simulate),
    );
}

fn is_offline(options: Res<LaunchOptions>) -> bool {
    options.offline
}

impl Session {
    /// A fresh world with a random layout and a random car color.
    pub fn new(config: GameConfig, local: ClientId) -> Self {
        let palette = config.car_colors.len().max(1) as u32;
        let color_index = rand::random::<u32>() % palette;
        Self {
            inner: SessionLoop::new(config, rand::random(), local, color_index),
            started: false,
            last_report: FrameReport::default(),
            leaderboard: Vec::new(),
        }
    }

    fn run_frame(&mut self, room: &mut dyn PresenceRoom, input: FrameInput) {
        if !self.started {
            if let Err(err) = self.inner.start(room) {
                warn!("Initial presence rejected: {err}");
            }
            self.started = true;
        }

        let report = self.inner.frame(input, room);
        for impact in &report.impacts {
            info!(
                "Hit {} at {:.1} m/s",
                room.username(&impact.with_client)
                    .unwrap_or_else(|| impact.with_client.to_string()),
                impact.speed
            );
        }
        if let Some(reconciled) = self.inner.pump(room) {
            for client in &reconciled.spawned {
                debug!("Proxy spawned for {client}");
            }
        }
        self.leaderboard = self.inner.leaderboard(&*room);
        self.last_report = report;
    }
}

fn start_offline(mut commands: Commands, options: Res<LaunchOptions>) {
    let hub = MemoryHub::shared();
    let local = ClientId::new("local");
    let room = MemoryRoom::join(&hub, local.clone(), options.username.clone());
    info!("Running offline.");
    commands.insert_resource(OfflineRoom(room));
    commands.insert_resource(Session::new(options.config.clone(), local));
}

fn frame_input(intent: &FrameIntent, time: &Time) -> FrameInput {
    FrameInput {
        intent: intent.intent,
        flip: intent.flip,
        wall_dt: time.delta_secs(),
    }
}

fn drive_offline(
    mut session: ResMut<Session>,
    mut room: ResMut<OfflineRoom>,
    intent: Res<FrameIntent>,
    time: Res<Time>,
) {
    session.run_frame(&mut room.0, frame_input(&intent, &time));
}

fn drive_online(
    mut session: ResMut<Session>,
    stdb: SpacetimeDB,
    mut dirty: ResMut<PresenceDirty>,
    intent: Res<FrameIntent>,
    time: Res<Time>,
) {
    let local = session.inner.sync().local_client().clone();
    let mut room = StdbRoom::new(&stdb, local, &mut dirty);
    session.run_frame(&mut room, frame_input(&intent, &time));
}
