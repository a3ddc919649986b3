//! Applies the session's scene commands to Bevy entities.
//!
//! Every `VisualId` maps to one root entity. Multi-part visuals (trees, clouds, wheels) are
//! spawned as a root carrying the pose with mesh children, so pose updates only touch the root.

use crate::session::{FrameSet, Session};
use bevy::prelude::*;
use nalgebra as na;
use shared::constants::{
    CHASSIS_HALF_EXTENTS, TREE_TRUNK_HEIGHT, TREE_TRUNK_RADIUS, WHEEL_RADIUS, WHEEL_WIDTH,
};
use shared::render::{SceneCommand, VisualId, VisualKind};
use std::collections::HashMap;
use std::f32::consts::FRAC_PI_2;

#[derive(Resource, Default)]
struct VisualEntities(HashMap<VisualId, Entity>);

#[derive(Resource)]
struct SceneAssets {
    unit_sphere: Handle<Mesh>,
    trunk: Handle<Mesh>,
    foliage: Handle<Mesh>,
    boost: Handle<Mesh>,
    wheel: Handle<Mesh>,
    tire_mark: Handle<Mesh>,
    chassis: Handle<Mesh>,
    grass: Handle<StandardMaterial>,
    asphalt: Handle<StandardMaterial>,
    bark: Handle<StandardMaterial>,
    leaves: Handle<StandardMaterial>,
    ramp: Handle<StandardMaterial>,
    boost_glow: Handle<StandardMaterial>,
    cloud: Handle<StandardMaterial>,
    rubber: Handle<StandardMaterial>,
    skid: Handle<StandardMaterial>,
}

/// The local player's car body.
#[derive(Component)]
pub struct LocalCar;

/// Screen-space label pinned above a world point.
#[derive(Component)]
struct NameTag {
    anchor: Vec3,
}

pub(super) fn plugin(app: &mut App) {
    app.init_resource::<VisualEntities>();
    app.insert_resource(ClearColor(Color::srgb(0.53, 0.81, 0.92)));
    app.add_systems(Startup, setup);
    app.add_systems(
        Update,
        (apply_scene_commands, place_name_tags)
            .chain()
            .run_if(resource_exists::<Session>)
            .in_set(FrameSet::Present),
    );
}

pub fn to_transform(pose: &na::Isometry3<f32>) -> Transform {
    let t = pose.translation.vector;
    let q = pose.rotation.into_inner();
    Transform {
        translation: Vec3::new(t.x, t.y, t.z),
        rotation: Quat::from_xyzw(q.i, q.j, q.k, q.w),
        scale: Vec3::ONE,
    }
}

/// `0xRRGGBB` to a Bevy color.
fn rgb(color: u32) -> Color {
    Color::srgb_u8((color >> 16) as u8, (color >> 8) as u8, color as u8)
}

fn matte(materials: &mut Assets<StandardMaterial>, color: Color) -> Handle<StandardMaterial> {
    materials.add(StandardMaterial {
        base_color: color,
        perceptual_roughness: 1.0,
        metallic: 0.0,
        ..default()
    })
}

fn setup(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    commands.spawn((
        DirectionalLight {
            illuminance: 8_000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(10.0, 20.0, 10.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    let [hx, hy, hz] = CHASSIS_HALF_EXTENTS;
    let assets = SceneAssets {
        unit_sphere: meshes.add(Sphere::new(1.0)),
        trunk: meshes.add(Cylinder::new(TREE_TRUNK_RADIUS, TREE_TRUNK_HEIGHT)),
        foliage: meshes.add(Cone {
            radius: 3.0,
            height: 6.0,
        }),
        boost: meshes.add(Sphere::new(0.5)),
        wheel: meshes.add(Cylinder::new(WHEEL_RADIUS, WHEEL_WIDTH)),
        tire_mark: meshes.add(Plane3d::default().mesh().size(0.2, 0.4)),
        chassis: meshes.add(Cuboid::new(hx * 2.0, hy * 2.0, hz * 2.0)),
        grass: matte(&mut materials, Color::srgb(0.2, 0.6, 0.2)),
        asphalt: matte(&mut materials, Color::srgb(0.2, 0.2, 0.2)),
        bark: matte(&mut materials, Color::srgb(0.4, 0.26, 0.13)),
        leaves: matte(&mut materials, Color::srgb(0.13, 0.55, 0.13)),
        ramp: matte(&mut materials, Color::srgb(0.6, 0.6, 0.6)),
        boost_glow: materials.add(StandardMaterial {
            base_color: Color::srgb(1.0, 0.85, 0.0),
            emissive: LinearRgba::rgb(1.0, 0.8, 0.0),
            ..default()
        }),
        cloud: matte(&mut materials, Color::WHITE),
        rubber: matte(&mut materials, Color::srgb(0.1, 0.1, 0.1)),
        skid: materials.add(StandardMaterial {
            base_color: Color::srgba(0.05, 0.05, 0.05, 0.7),
            alpha_mode: AlphaMode::Blend,
            unlit: true,
            ..default()
        }),
    };
    commands.insert_resource(assets);
}

fn apply_scene_commands(
    mut commands: Commands,
    mut session: ResMut<Session>,
    mut entities: ResMut<VisualEntities>,
    assets: Res<SceneAssets>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut transforms: Query<&mut Transform, Without<NameTag>>,
    mut tags: Query<(&mut NameTag, &mut Text)>,
) {
    let local_car = session.inner.car_visual();
    for command in session.inner.drain_scene() {
        match command {
            SceneCommand::Spawn { id, kind, pose } => {
                let entity = spawn_visual(
                    &mut commands,
                    &assets,
                    &mut meshes,
                    &mut materials,
                    kind,
                    &pose,
                );
                if id == local_car {
                    commands.entity(entity).insert(LocalCar);
                }
                if let Some(stale) = entities.0.insert(id, entity) {
                    commands.entity(stale).despawn();
                }
            }
            SceneCommand::Despawn { id } => {
                if let Some(entity) = entities.0.remove(&id) {
                    commands.entity(entity).despawn();
                }
            }
            SceneCommand::SetPose { id, pose } => {
                let Some(&entity) = entities.0.get(&id) else {
                    continue;
                };
                if let Ok((mut tag, _)) = tags.get_mut(entity) {
                    tag.anchor = to_transform(&pose).translation;
                } else if let Ok(mut transform) = transforms.get_mut(entity) {
                    *transform = to_transform(&pose);
                } else {
                    // Spawned this frame; the spawn bundle is not applied yet.
                    commands.entity(entity).insert(to_transform(&pose));
                }
            }
            SceneCommand::SetLabel { id, text } => {
                let Some(&entity) = entities.0.get(&id) else {
                    continue;
                };
                match tags.get_mut(entity) {
                    Ok((_, mut label)) => label.0 = text,
                    Err(_) => {
                        commands.entity(entity).insert(Text::new(text));
                    }
                }
            }
        }
    }
}

fn spawn_visual(
    commands: &mut Commands,
    assets: &SceneAssets,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    kind: VisualKind,
    pose: &na::Isometry3<f32>,
) -> Entity {
    let transform = to_transform(pose);
    match kind {
        VisualKind::Ground { size } => commands
            .spawn((
                Mesh3d(meshes.add(Plane3d::default().mesh().size(size, size))),
                MeshMaterial3d(assets.grass.clone()),
                transform,
            ))
            .id(),
        VisualKind::Road { length, width } => commands
            .spawn((
                Mesh3d(meshes.add(Plane3d::default().mesh().size(length, width))),
                MeshMaterial3d(assets.asphalt.clone()),
                transform,
            ))
            .id(),
        VisualKind::Tree => commands
            .spawn((transform, Visibility::default()))
            .with_children(|tree| {
                tree.spawn((
                    Mesh3d(assets.trunk.clone()),
                    MeshMaterial3d(assets.bark.clone()),
                    Transform::from_xyz(0.0, TREE_TRUNK_HEIGHT * 0.5, 0.0),
                ));
                tree.spawn((
                    Mesh3d(assets.foliage.clone()),
                    MeshMaterial3d(assets.leaves.clone()),
                    Transform::from_xyz(0.0, TREE_TRUNK_HEIGHT + 3.0, 0.0),
                ));
            })
            .id(),
        VisualKind::Ramp { half_extents } => commands
            .spawn((
                Mesh3d(meshes.add(Cuboid::new(
                    half_extents.x * 2.0,
                    half_extents.y * 2.0,
                    half_extents.z * 2.0,
                ))),
                MeshMaterial3d(assets.ramp.clone()),
                transform,
            ))
            .id(),
        VisualKind::Boost => commands
            .spawn((
                Mesh3d(assets.boost.clone()),
                MeshMaterial3d(assets.boost_glow.clone()),
                transform,
            ))
            .id(),
        VisualKind::Cloud { puffs } => commands
            .spawn((transform, Visibility::default()))
            .with_children(|cloud| {
                for puff in puffs {
                    cloud.spawn((
                        Mesh3d(assets.unit_sphere.clone()),
                        MeshMaterial3d(assets.cloud.clone()),
                        Transform::from_xyz(puff.offset.x, puff.offset.y, puff.offset.z)
                            .with_scale(Vec3::splat(puff.radius)),
                    ));
                }
            })
            .id(),
        VisualKind::Car { color } => commands
            .spawn((
                Mesh3d(assets.chassis.clone()),
                MeshMaterial3d(materials.add(StandardMaterial {
                    base_color: rgb(color),
                    ..default()
                })),
                transform,
            ))
            .id(),
        VisualKind::Wheel => commands
            .spawn((transform, Visibility::default()))
            .with_children(|wheel| {
                // Cylinders are built along Y; wheels spin about the X axle.
                wheel.spawn((
                    Mesh3d(assets.wheel.clone()),
                    MeshMaterial3d(assets.rubber.clone()),
                    Transform::from_rotation(Quat::from_rotation_z(FRAC_PI_2)),
                ));
            })
            .id(),
        VisualKind::TireMark => commands
            .spawn((
                Mesh3d(assets.tire_mark.clone()),
                MeshMaterial3d(assets.skid.clone()),
                transform,
            ))
            .id(),
        VisualKind::NameTag { text } => commands
            .spawn((
                NameTag {
                    anchor: transform.translation,
                },
                Text::new(text),
                TextFont {
                    font_size: 16.0,
                    ..default()
                },
                TextColor(Color::WHITE),
                Node {
                    position_type: PositionType::Absolute,
                    ..default()
                },
                Visibility::Hidden,
            ))
            .id(),
    }
}

fn place_name_tags(
    camera: Single<(&Camera, &GlobalTransform), With<Camera3d>>,
    mut tags: Query<(&NameTag, &mut Node, &mut Visibility)>,
) {
    let (camera, camera_transform) = *camera;
    for (tag, mut node, mut visibility) in &mut tags {
        match camera.world_to_viewport(camera_transform, tag.anchor) {
            Ok(screen) => {
                node.left = Val::Px(screen.x);
                node.top = Val::Px(screen.y);
                *visibility = Visibility::Inherited;
            }
            Err(_) => *visibility = Visibility::Hidden,
        }
    }
}
