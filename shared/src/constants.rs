use std::f32::consts::PI;

/// Fixed physics step (seconds). The integrator always advances by exactly this much.
pub const FIXED_TIME_STEP: f32 = 1.0 / 60.0;

/// Maximum number of fixed steps taken per rendered frame.
///
/// Wall-clock backlog beyond this budget is dropped rather than caught up.
pub const MAX_SUBSTEPS: u32 = 3;

/// Gravity along -Y (m/s^2).
pub const GRAVITY_MPS2: f32 = 9.82;

/// Chassis box half extents (meters): width, height, length.
pub const CHASSIS_HALF_EXTENTS: [f32; 3] = [1.0, 0.25, 2.0];

/// Chassis mass (kg).
pub const CHASSIS_MASS: f32 = 300.0;

pub const CHASSIS_ANGULAR_DAMPING: f32 = 0.9;

pub const CHASSIS_LINEAR_DAMPING: f32 = 0.0;

/// Spawn position of the local chassis.
pub const CHASSIS_SPAWN: [f32; 3] = [0.0, 1.0, 0.0];

/// Spawn yaw of the local chassis. Chassis-local forward is +Z, so a quarter turn
/// points the car down the road (+X).
pub const CHASSIS_SPAWN_YAW: f32 = PI / 2.0;

/// Number of wheels on every car (local and remote).
pub const WHEEL_COUNT: usize = 4;

/// Wheel attachment points in chassis space: the two front (steered) wheels, then the rear pair.
pub const WHEEL_CONNECTION_POINTS: [[f32; 3]; WHEEL_COUNT] = [
    [-0.9, 0.0, 1.5],
    [0.9, 0.0, 1.5],
    [-0.9, 0.0, -1.5],
    [0.9, 0.0, -1.5],
];

pub const WHEEL_RADIUS: f32 = 0.4;
pub const WHEEL_WIDTH: f32 = 0.2;
pub const SUSPENSION_REST_LENGTH: f32 = 0.4;
pub const SUSPENSION_STIFFNESS: f32 = 80.0;
pub const SUSPENSION_MAX_TRAVEL: f32 = 0.4;
pub const SUSPENSION_MAX_FORCE: f32 = 500_000.0;
pub const DAMPING_RELAXATION: f32 = 5.5;
pub const DAMPING_COMPRESSION: f32 = 6.4;
pub const FRICTION_SLIP: f32 = 5.0;
pub const ROLL_INFLUENCE: f32 = 0.01;

/// Brake applied to every wheel when no drive input is held.
pub const COAST_BRAKE: f32 = 0.5;

/// Base brake per unit of acceleration modifier while moving forward.
pub const BRAKE_PER_MODIFIER: f32 = 20.0;

/// "mode-2" driving engages above this acceleration modifier...
pub const MODE2_MIN_MODIFIER: f32 = 5.0;

/// ...while the chassis rides below this height.
pub const MODE2_MAX_RIDE_HEIGHT: f32 = 1.0;

/// Chassis-local force per unit of acceleration modifier applied in mode-2 (N).
pub const MODE2_FORCE_PER_MODIFIER: f32 = 500.0;

/// Boosts closer than this to the chassis are picked up (meters).
pub const BOOST_PICKUP_RADIUS: f32 = 2.0;

/// Multiplicative acceleration modifier gain per boost. Unbounded.
pub const BOOST_MULTIPLIER: f32 = 1.1;

/// Boost hover height (meters).
pub const BOOST_HEIGHT: f32 = 1.0;

/// Relative speed above which a car-to-car contact is published (m/s).
pub const IMPACT_SPEED_THRESHOLD: f32 = 10.0;

/// Conversion from m/s to km/h for the top-speed record.
pub const MPS_TO_KMH: f32 = 3.6;

/// Road strip width (meters). The road runs along X, centred on z = 0.
pub const ROAD_WIDTH: f32 = 20.0;

/// Trees, ramps and boosts are never placed with |z| below this.
pub const ROAD_EXCLUSION_HALF_WIDTH: f32 = 10.0;

/// Half-width of the band road boosts are dropped into.
pub const ROAD_BOOST_HALF_SPREAD: f32 = 5.0;

/// Half thickness of the road collider, centred on y = 0.
pub const ROAD_HALF_THICKNESS: f32 = 0.1;

/// Road surface is drawn just above the grass to avoid z-fighting.
pub const ROAD_VISUAL_HEIGHT: f32 = 0.02;

pub const TREES_PER_TILE: usize = 10;
pub const RAMPS_PER_TILE: usize = 2;
pub const BOOSTS_PER_TILE: usize = 20;
pub const CLOUDS_PER_TILE: usize = 2;
pub const BOOSTS_PER_ROAD_SEGMENT: usize = 2;

pub const TREE_TRUNK_RADIUS: f32 = 0.5;
pub const TREE_TRUNK_HEIGHT: f32 = 5.0;

/// Ramp box half extents (meters) and resting height.
pub const RAMP_HALF_EXTENTS: [f32; 3] = [10.0, 0.5, 25.0];
pub const RAMP_HEIGHT: f32 = 0.5;
/// Ramp pitch about X (radians).
pub const RAMP_PITCH: f32 = -PI / 18.0;

pub const CLOUD_MIN_HEIGHT: f32 = 100.0;
pub const CLOUD_HEIGHT_SPREAD: f32 = 50.0;
/// Puff count range (inclusive) per cloud.
pub const CLOUD_PUFFS: (usize, usize) = (5, 9);
/// Puff radius range (meters).
pub const CLOUD_PUFF_RADIUS: (f32, f32) = (5.0, 10.0);
/// Horizontal scatter of puffs around the cloud origin (meters, each side).
pub const CLOUD_PUFF_SCATTER: f32 = 5.0;
/// Vertical scatter of puffs above the cloud origin (meters).
pub const CLOUD_PUFF_LIFT: f32 = 5.0;

/// Ground slab thickness under every tile (meters). The top face sits at y = 0.
pub const GROUND_THICKNESS: f32 = 1.0;

/// Wall-clock interval between tire mark drops (seconds).
pub const TIRE_MARK_INTERVAL: f32 = 0.05;

/// Maximum number of live tire marks.
pub const MAX_TIRE_MARKS: usize = 500;

/// Name shown for peers without a username.
pub const DEFAULT_USERNAME: &str = "Player";

/// Name tags float this far above a remote car (meters).
pub const NAME_TAG_HEIGHT: f32 = 3.0;
