//! Keyboard and touch controls, folded into one `FrameIntent` per frame.

use crate::session::FrameSet;
use bevy::input::touch::Touches;
use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use leafwing_input_manager::prelude::*;
use shared::InputIntent;
use std::f32::consts::TAU;

#[derive(Reflect, Actionlike, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DriveAction {
    Accelerate,
    Brake,
    Left,
    Right,
    Flip,
}

/// What the session consumes this frame.
#[derive(Resource, Debug, Default, Clone, Copy)]
pub struct FrameIntent {
    pub intent: InputIntent,
    pub flip: bool,
}

/// On-screen stick driven by the first touch on the left half of the window.
#[derive(Resource, Debug, Default)]
struct TouchJoystick {
    finger: Option<u64>,
    origin: Vec2,
    angle: Option<f32>,
}

/// Touches shorter than this from the origin leave the stick centered.
const JOYSTICK_DEAD_ZONE_PX: f32 = 10.0;

#[derive(Component)]
struct FlipButton;

#[derive(Resource, Default)]
struct FlipPressed(bool);

pub(super) fn plugin(app: &mut App) {
    app.add_plugins(InputManagerPlugin::<DriveAction>::default());

    app.register_type::<DriveAction>();

    let mut input_map = InputMap::<DriveAction>::default();
    input_map.insert(DriveAction::Accelerate, KeyCode::ArrowUp);
    input_map.insert(DriveAction::Accelerate, KeyCode::KeyW);
    input_map.insert(DriveAction::Brake, KeyCode::ArrowDown);
    input_map.insert(DriveAction::Brake, KeyCode::KeyS);
    input_map.insert(DriveAction::Left, KeyCode::ArrowLeft);
    input_map.insert(DriveAction::Left, KeyCode::KeyA);
    input_map.insert(DriveAction::Right, KeyCode::ArrowRight);
    input_map.insert(DriveAction::Right, KeyCode::KeyD);
    input_map.insert(DriveAction::Flip, KeyCode::KeyF);
    app.insert_resource(input_map);
    app.insert_resource(ActionState::<DriveAction>::default());

    app.init_resource::<FrameIntent>();
    app.init_resource::<TouchJoystick>();
    app.init_resource::<FlipPressed>();

    app.add_systems(Startup, spawn_flip_button);
    app.add_systems(
        Update,
        (track_joystick, press_flip_button, sample_intent)
            .chain()
            .in_set(FrameSet::Input),
    );
}

fn spawn_flip_button(mut commands: Commands) {
    commands.spawn((
        FlipButton,
        Button,
        Node {
            position_type: PositionType::Absolute,
            right: Val::Px(24.0),
            bottom: Val::Px(24.0),
            padding: UiRect::axes(Val::Px(18.0), Val::Px(12.0)),
            ..default()
        },
        BackgroundColor(Color::srgba(0.0, 0.0, 0.0, 0.5)),
        children![(
            Text::new("Flip"),
            TextFont {
                font_size: 22.0,
                ..default()
            },
            TextColor(Color::WHITE),
        )],
    ));
}

fn track_joystick(
    touches: Res<Touches>,
    window: Single<&Window, With<PrimaryWindow>>,
    mut stick: ResMut<TouchJoystick>,
) {
    if stick.finger.is_none() {
        if let Some(touch) = touches
            .iter_just_pressed()
            .find(|t| t.position().x < window.width() * 0.5)
        {
            stick.finger = Some(touch.id());
            stick.origin = touch.position();
            stick.angle = None;
        }
    }

    let Some(finger) = stick.finger else {
        return;
    };
    match touches.get_pressed(finger) {
        Some(touch) => {
            let delta = touch.position() - stick.origin;
            stick.angle = (delta.length() > JOYSTICK_DEAD_ZONE_PX)
                // Screen y grows downwards; the stick angle is counter-clockwise from +x.
                .then(|| (-delta.y).atan2(delta.x).rem_euclid(TAU));
        }
        None => {
            stick.finger = None;
            stick.angle = None;
        }
    }
}

fn press_flip_button(
    buttons: Query<&Interaction, (Changed<Interaction>, With<FlipButton>)>,
    mut pressed: ResMut<FlipPressed>,
) {
    for interaction in &buttons {
        if *interaction == Interaction::Pressed {
            pressed.0 = true;
        }
    }
}

fn sample_intent(
    action: Res<ActionState<DriveAction>>,
    stick: Res<TouchJoystick>,
    mut pressed: ResMut<FlipPressed>,
    mut frame: ResMut<FrameIntent>,
) {
    let mut intent = InputIntent {
        accelerate: action.pressed(&DriveAction::Accelerate),
        brake: action.pressed(&DriveAction::Brake),
        left: action.pressed(&DriveAction::Left),
        right: action.pressed(&DriveAction::Right),
    };
    if let Some(angle) = stick.angle {
        let touch = InputIntent::from_joystick(angle);
        intent.accelerate |= touch.accelerate;
        intent.brake |= touch.brake;
        intent.left |= touch.left;
        intent.right |= touch.right;
    }

    frame.intent = intent.normalized();
    frame.flip = action.just_pressed(&DriveAction::Flip) || std::mem::take(&mut pressed.0);
}
