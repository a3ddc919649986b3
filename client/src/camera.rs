use crate::scene::LocalCar;
use crate::session::FrameSet;
use bevy::prelude::*;

pub(super) fn plugin(app: &mut App) {
    app.add_systems(Startup, add_camera);
    app.add_systems(Update, follow_car.after(FrameSet::Present));
}

/// Chase offset in the car's frame: above and behind (the car faces +Z).
const CAMERA_OFFSET_LOCAL: Vec3 = Vec3::new(0.0, 5.0, -10.0);
const CAMERA_DECAY_RATE: f32 = 6.0;

fn add_camera(mut commands: Commands) {
    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(-10.0, 6.0, 0.0).looking_at(Vec3::ZERO, Vec3::Y),
        DistanceFog {
            color: Color::srgb(0.53, 0.81, 0.92),
            falloff: FogFalloff::Linear {
                start: 500.0,
                end: 1_500.0,
            },
            ..default()
        },
    ));
}

fn follow_car(
    mut camera: Single<&mut Transform, With<Camera3d>>,
    car: Single<&Transform, (With<LocalCar>, Without<Camera3d>)>,
    time: Res<Time>,
) {
    // Yaw only, so the camera does not roll with the car.
    let (yaw, _, _) = car.rotation.to_euler(EulerRot::YXZ);
    let target = car.translation + Quat::from_rotation_y(yaw) * CAMERA_OFFSET_LOCAL;

    camera
        .translation
        .smooth_nudge(&target, CAMERA_DECAY_RATE, time.delta_secs());
    camera.look_at(car.translation + Vec3::Y, Vec3::Y);
}
